//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys are separated by `__` in the environment, so `APP_LLM__MODEL`
//! overrides `llm.model`. [`Settings`] is the typed view every binary uses;
//! each section falls back to defaults when absent.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name };
        config.validate_for_env()?;
        Ok(config)
    }

    /// Build from an explicit figment, e.g. an inline TOML string in tests.
    pub fn from_figment(figment: Figment, env_name: impl Into<String>) -> Self {
        Self { figment, env_name: env_name.into() }
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        match self.env_name.as_str() {
            "prod" | "production" => {
                if settings.embedding.backend == EmbeddingBackend::Hash {
                    anyhow::bail!("embedding.backend = \"hash\" is a test double and not allowed in production");
                }
                if settings.rerank.backend == RerankBackend::Lexical {
                    anyhow::bail!("rerank.backend = \"lexical\" is a test double and not allowed in production");
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub rerank: RerankSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
    pub prompt: PromptSettings,
    pub ingest: IngestSettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.top_n == 0 {
            return Err(Error::InvalidConfig("retrieval.top_n must be at least 1".into()));
        }
        if r.k < r.top_n {
            return Err(Error::InvalidConfig(format!(
                "retrieval.k ({}) must be >= retrieval.top_n ({})",
                r.k, r.top_n
            )));
        }
        let i = &self.ingest;
        if i.chunk_size == 0 || i.chunk_overlap >= i.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                i.chunk_overlap, i.chunk_size
            )));
        }
        if i.batch_size == 0 || self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("batch sizes must be at least 1".into()));
        }
        if self.embedding.backend == EmbeddingBackend::Hash && self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    Bge,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_dir: String,
    pub max_len: usize,
    pub batch_size: usize,
    /// Output dimension of the hash embedder; the BGE model reports its own.
    pub dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Bge,
            model_dir: "models/bge-base-en-v1.5".to_string(),
            max_len: 256,
            batch_size: 32,
            dim: 768,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankBackend {
    CrossEncoder,
    Lexical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub backend: RerankBackend,
    pub model_dir: String,
    pub max_len: usize,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            backend: RerankBackend::CrossEncoder,
            model_dir: "models/bge-reranker-base".to_string(),
            max_len: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    Lance,
    Chroma,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    pub collection: String,
    pub lance_dir: String,
    pub chroma_url: String,
    pub chroma_tenant: String,
    pub chroma_database: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Lance,
            collection: "pmc_medicine_preventive".to_string(),
            lance_dir: "data/indexes/lancedb".to_string(),
            chroma_url: "http://localhost:8000".to_string(),
            chroma_tenant: "default_tenant".to_string(),
            chroma_database: "default_database".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidates fetched from the index.
    pub k: usize,
    /// Passages kept after reranking.
    pub top_n: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k: 5, top_n: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: Option<u64>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3:4b".to_string(),
            timeout_secs: Some(120),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Overrides the built-in template. Must contain `{context}` and `{question}`.
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub data_dir: String,
    /// Article files under `data_dir`. Empty means every `*.json` file.
    pub files: Vec<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            files: vec![
                "pmc_simples.json".to_string(),
                "pmc_preventive_medicine_clean.json".to_string(),
            ],
            chunk_size: 800,
            chunk_overlap: 200,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
