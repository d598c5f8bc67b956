use std::fs;
use tempfile::TempDir;

use figment::providers::{Format, Toml};
use figment::Figment;
use healthrag_core::articles::{list_article_files, load_all, ArticleProcessor, ChunkingConfig};
use healthrag_core::config::{Config, EmbeddingBackend, IndexBackend};

#[test]
fn articles_become_documents_with_running_ids() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(
        dir.join("a.json"),
        r#"[
            {"title": "Sleep", "text": "  Sleep hygiene matters.  ", "source_url": "https://pmc/1", "keyword": "sleep"},
            {"title": "Empty", "text": "   "},
            {"title": "Diet", "text": "Mediterranean diet.", "mesh_query": "diet"}
        ]"#,
    )
    .unwrap();
    fs::write(dir.join("b.json"), r#"[{"title": "Smoking", "text": "Quit smoking."}]"#).unwrap();

    let files = list_article_files(dir, &[]);
    assert_eq!(files.len(), 2, "every json file is picked up");
    let articles = load_all(&files).expect("load");
    assert_eq!(articles.len(), 4);

    let docs = ArticleProcessor::new(ChunkingConfig::default()).expect("chunking").documents(&articles);
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["pmc_0", "pmc_1", "pmc_2"], "empty article is skipped without consuming an id");
    assert_eq!(docs[0].text, "Sleep hygiene matters.");
    assert_eq!(docs[0].metadata["source_url"], "https://pmc/1");
    assert_eq!(docs[1].metadata["keyword"], "diet");
    assert_eq!(docs[2].metadata["keyword"], "");
}

#[test]
fn missing_article_file_is_skipped() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("present.json"), r#"[{"text": "x"}]"#).unwrap();
    let files = list_article_files(tmp.path(), &["absent.json".into(), "present.json".into()]);
    let articles = load_all(&files).expect("load");
    assert_eq!(articles.len(), 1);
}

#[test]
fn settings_default_when_sections_absent() {
    let config = Config::from_figment(Figment::new(), "test");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.retrieval.k, 5);
    assert_eq!(settings.retrieval.top_n, 3);
    assert_eq!(settings.index.backend, IndexBackend::Lance);
    assert_eq!(settings.index.collection, "pmc_medicine_preventive");
    assert_eq!(settings.ingest.chunk_size, 800);
    assert_eq!(settings.ingest.chunk_overlap, 200);
}

#[test]
fn toml_overrides_individual_keys() {
    let figment = Figment::new().merge(Toml::string(
        r#"
        [embedding]
        backend = "hash"
        dim = 64

        [index]
        backend = "memory"

        [retrieval]
        k = 10
        "#,
    ));
    let config = Config::from_figment(figment, "test");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.embedding.backend, EmbeddingBackend::Hash);
    assert_eq!(settings.embedding.dim, 64);
    assert_eq!(settings.embedding.max_len, 256, "untouched keys keep defaults");
    assert_eq!(settings.index.backend, IndexBackend::Memory);
    assert_eq!(settings.retrieval.k, 10);
    assert_eq!(settings.retrieval.top_n, 3);
    let k: usize = config.get("retrieval.k").expect("raw key");
    assert_eq!(k, 10);
}

#[test]
fn k_below_top_n_is_rejected() {
    let figment = Figment::new().merge(Toml::string("[retrieval]\nk = 2\ntop_n = 3\n"));
    let err = Config::from_figment(figment, "test").settings().unwrap_err();
    assert!(err.to_string().contains("retrieval.k"), "{err}");
}

#[test]
fn overlap_must_be_smaller_than_chunk() {
    let figment = Figment::new().merge(Toml::string("[ingest]\nchunk_size = 100\nchunk_overlap = 100\n"));
    assert!(Config::from_figment(figment, "test").settings().is_err());
}
