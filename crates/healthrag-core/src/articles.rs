//! Crawled article files and their conversion into index documents.
//!
//! Crawlers write a JSON array of articles per file. Each article's text is
//! cut into fixed-size character windows with overlap, and every window
//! becomes one [`Document`] with id `pmc_<n>` where `n` runs across the whole
//! ingestion run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::Document;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub keyword: Option<serde_json::Value>,
    #[serde(default)]
    pub mesh_query: Option<serde_json::Value>,
}

impl Article {
    /// `keyword`, else `mesh_query`, else empty. Non-string values are rendered as JSON.
    fn keyword_label(&self) -> String {
        [&self.keyword, &self.mesh_query]
            .into_iter()
            .flatten()
            .find(|v| !v.is_null() && v.as_str() != Some(""))
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Window length in characters.
    pub size: usize,
    /// Characters shared by consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { size: 800, overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 || self.overlap >= self.size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.size
            )));
        }
        Ok(())
    }
}

/// Split `text` into windows of `size` chars starting every `size - overlap` chars.
///
/// Counts chars, not bytes, so multi-byte text never splits inside a code point.
/// The last window may be shorter than `size`, and a window is emitted for every
/// start offset below the text length.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;
    Ok(windows(text, config))
}

fn windows(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = config.size - config.overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }
    chunks
}

#[derive(Default)]
pub struct ArticleProcessor {
    chunking_config: ChunkingConfig,
}

impl ArticleProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Result<Self> {
        chunking_config.validate()?;
        Ok(Self { chunking_config })
    }

    /// Chunk every article with non-empty text. Ids continue across articles.
    pub fn documents(&self, articles: &[Article]) -> Vec<Document> {
        let mut documents = Vec::new();
        let mut next_id = 0usize;
        for article in articles {
            let text = article.text.as_deref().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            let keyword = article.keyword_label();
            for chunk in windows(text, &self.chunking_config) {
                let doc = Document::new(format!("pmc_{next_id}"), chunk)
                    .with_meta("title", article.title.clone().unwrap_or_default())
                    .with_meta("source_url", article.source_url.clone().unwrap_or_default())
                    .with_meta("keyword", keyword.clone());
                documents.push(doc);
                next_id += 1;
            }
        }
        debug!(articles = articles.len(), chunks = documents.len(), "chunked articles");
        documents
    }
}

pub fn load_articles(path: &Path) -> Result<Vec<Article>> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::InvalidData(format!("{}: not an article array: {}", path.display(), e)))
}

/// Resolve the article files to ingest. With an empty `files` list every
/// `*.json` under `data_dir` is used, sorted for a stable id sequence.
pub fn list_article_files(data_dir: &Path, files: &[String]) -> Vec<PathBuf> {
    if !files.is_empty() {
        return files.iter().map(|f| data_dir.join(f)).collect();
    }
    let mut json_files: Vec<PathBuf> = walkdir::WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .map(|e| e.path().to_path_buf())
        .collect();
    json_files.sort();
    json_files
}

/// Load every listed file in order. Missing files are logged and skipped.
pub fn load_all(paths: &[PathBuf]) -> Result<Vec<Article>> {
    let mut all = Vec::new();
    for path in paths {
        if !path.exists() {
            warn!(path = %path.display(), "article file not found, skipping");
            continue;
        }
        let articles = load_articles(path)?;
        info!(path = %path.display(), count = articles.len(), "loaded articles");
        all.extend(articles);
    }
    info!(total = all.len(), "articles loaded");
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig { size, overlap }
    }

    #[test]
    fn windows_step_by_size_minus_overlap() {
        let text: String = "abcdefghij".into();
        let chunks = chunk_text(&text, &cfg(4, 1)).unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "j"]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", &cfg(800, 200)).unwrap(), vec!["hello"]);
        assert!(chunk_text("", &cfg(800, 200)).unwrap().is_empty());
    }

    #[test]
    fn counts_chars_not_bytes() {
        let chunks = chunk_text("ação saúde", &cfg(4, 0)).unwrap();
        assert_eq!(chunks, vec!["ação", " saú", "de"]);
    }

    #[test]
    fn degenerate_windows_are_config_errors() {
        assert!(matches!(chunk_text("abc", &cfg(0, 0)), Err(Error::InvalidConfig(_))));
        assert!(matches!(chunk_text("abc", &cfg(4, 4)), Err(Error::InvalidConfig(_))));
        assert!(ArticleProcessor::new(cfg(10, 20)).is_err());
    }

    #[test]
    fn malformed_file_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"title\": \"not an array\"}").unwrap();
        let err = load_articles(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)), "{err}");
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn keyword_falls_back_to_mesh_query() {
        let a = Article { mesh_query: Some(serde_json::json!("diabetes")), ..Default::default() };
        assert_eq!(a.keyword_label(), "diabetes");
        let b = Article { keyword: Some(serde_json::json!(["a", "b"])), ..Default::default() };
        assert_eq!(b.keyword_label(), "[\"a\",\"b\"]");
        assert_eq!(Article::default().keyword_label(), "");
    }
}
