//! Client for an Ollama-compatible `/api/generate` endpoint.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use healthrag_core::config::LlmSettings;
use healthrag_core::traits::Generator;
use healthrag_core::{Cause, Error, Result};
use healthrag_vector::http::{http_cause, status_cause};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::generation(Cause::Permanent, format!("http client: {e}")))?;
        info!(base_url = %settings.base_url, model = %settings.model, "configured LLM");
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }
}

fn request_err(e: reqwest::Error) -> Error {
    Error::generation(http_cause(&e), format!("llm request: {e}"))
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest { model: &self.model, prompt, stream: false };
        let start = Instant::now();
        let resp = self.client.post(&url).json(&body).send().await.map_err(request_err)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::generation(status_cause(status), format!("llm returned {status}: {text}")));
        }
        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| Error::generation(Cause::Permanent, format!("llm response: {e}")))?;
        debug!(model = %self.model, elapsed_ms = start.elapsed().as_millis() as u64, chars = parsed.response.len(), "generated answer");
        Ok(parsed.response)
    }
}
