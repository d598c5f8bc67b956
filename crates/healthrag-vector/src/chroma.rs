//! Client for a Chroma server over its v2 REST API.
//!
//! The collection is created lazily with cosine space; its server-side id is
//! cached until `reset` drops the collection.
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use healthrag_core::traits::VectorIndex;
use healthrag_core::types::{Candidate, Document, Meta};
use healthrag_core::{Cause, Error, Result};

use crate::check_upsert;
use crate::http::{http_cause, status_cause};

pub struct ChromaIndex {
    client: Client,
    base_url: String,
    tenant: String,
    database: String,
    collection: String,
    dim: usize,
    collection_id: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

/// Column-major result of `/query`; one inner list per query embedding.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

fn request_err(e: reqwest::Error) -> Error {
    Error::retrieval(http_cause(&e), format!("chroma: {e}"))
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() { return Ok(resp); }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::retrieval(status_cause(status), format!("chroma returned {status}: {body}")))
}

/// Chroma metadata values may be strings, numbers or booleans.
fn flatten_meta(map: serde_json::Map<String, Value>) -> Meta {
    map.into_iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, s)
        })
        .collect()
}

impl QueryResponse {
    pub(crate) fn into_candidates(self) -> Vec<Candidate> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut documents = self.documents.and_then(|d| d.into_iter().next()).unwrap_or_default().into_iter();
        let mut metadatas = self.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default().into_iter();
        let mut distances = self.distances.and_then(|d| d.into_iter().next()).unwrap_or_default().into_iter();
        ids.into_iter()
            .map(|id| {
                let text = documents.next().flatten().unwrap_or_default();
                let metadata = metadatas.next().flatten().map(flatten_meta).unwrap_or_default();
                let distance = distances.next().flatten().unwrap_or(1.0);
                Candidate { document: Document { id, text, metadata }, similarity_score: 1.0 - distance }
            })
            .collect()
    }
}

impl ChromaIndex {
    pub fn new(base_url: &str, tenant: &str, database: &str, collection: &str, dim: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::retrieval(Cause::Permanent, format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: tenant.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            dim,
            collection_id: Mutex::new(None),
        })
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v2/tenants/{}/databases/{}/collections", self.base_url, self.tenant, self.database)
    }

    fn cached_id(&self) -> Option<String> {
        self.collection_id.lock().ok().and_then(|g| g.clone())
    }

    fn set_cached_id(&self, id: Option<String>) {
        if let Ok(mut g) = self.collection_id.lock() { *g = id; }
    }

    /// `GET /api/v2/heartbeat`; used at startup to fail fast when the server is down.
    pub async fn heartbeat(&self) -> Result<()> {
        let resp = self.client.get(format!("{}/api/v2/heartbeat", self.base_url)).send().await.map_err(request_err)?;
        check(resp).await?;
        Ok(())
    }

    async fn collection_id(&self) -> Result<String> {
        if let Some(id) = self.cached_id() { return Ok(id); }
        let body = json!({
            "name": self.collection,
            "get_or_create": true,
            "metadata": { "hnsw:space": "cosine" },
        });
        let resp = self.client.post(self.collections_url()).json(&body).send().await.map_err(request_err)?;
        let info: CollectionInfo = check(resp).await?.json().await.map_err(request_err)?;
        debug!(collection = %self.collection, id = %info.id, "resolved chroma collection");
        self.set_cached_id(Some(info.id.clone()));
        Ok(info.id)
    }
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
        check_upsert(documents, embeddings, self.dim)?;
        if documents.is_empty() { return Ok(()); }
        let id = self.collection_id().await?;
        let body = json!({
            "ids": documents.iter().map(|d| &d.id).collect::<Vec<_>>(),
            "embeddings": embeddings,
            "documents": documents.iter().map(|d| &d.text).collect::<Vec<_>>(),
            // chroma rejects empty metadata maps
            "metadatas": documents.iter().map(|d| (!d.metadata.is_empty()).then_some(&d.metadata)).collect::<Vec<_>>(),
        });
        let url = format!("{}/{}/upsert", self.collections_url(), id);
        let resp = self.client.post(url).json(&body).send().await.map_err(request_err)?;
        check(resp).await?;
        debug!(collection = %self.collection, count = documents.len(), "upserted into chroma");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>> {
        if k == 0 { return Ok(Vec::new()); }
        if embedding.len() != self.dim {
            return Err(Error::retrieval(Cause::Permanent, format!("query vector has dim {}, index expects {}", embedding.len(), self.dim)));
        }
        let id = self.collection_id().await?;
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        let url = format!("{}/{}/query", self.collections_url(), id);
        let resp = self.client.post(url).json(&body).send().await.map_err(request_err)?;
        let parsed: QueryResponse = check(resp).await?.json().await.map_err(request_err)?;
        let mut hits = parsed.into_candidates();
        hits.truncate(k);
        Ok(hits)
    }

    async fn reset(&self) -> Result<()> {
        let url = format!("{}/{}", self.collections_url(), self.collection);
        let resp = self.client.delete(url).send().await.map_err(request_err)?;
        // 404: nothing to drop yet
        if resp.status() != reqwest::StatusCode::NOT_FOUND { check(resp).await?; }
        self.set_cached_id(None);
        self.collection_id().await?;
        info!(collection = %self.collection, "reset chroma collection");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let id = self.collection_id().await?;
        let url = format!("{}/{}/count", self.collections_url(), id);
        let resp = self.client.get(url).send().await.map_err(request_err)?;
        check(resp).await?.json::<usize>().await.map_err(request_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_becomes_candidates() {
        let raw = r#"{
            "ids": [["pmc_0", "pmc_7"]],
            "documents": [["Exercise helps.", null]],
            "metadatas": [[{"title": "Walk", "year": 2020}, null]],
            "distances": [[0.1, 0.4]]
        }"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        let hits = parsed.into_candidates();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id, "pmc_0");
        assert_eq!(hits[0].document.text, "Exercise helps.");
        assert_eq!(hits[0].document.metadata["title"], "Walk");
        assert_eq!(hits[0].document.metadata["year"], "2020");
        assert!((hits[0].similarity_score - 0.9).abs() < 1e-6);
        assert_eq!(hits[1].document.text, "");
        assert!(hits[1].document.metadata.is_empty());
    }

    #[test]
    fn empty_query_response_has_no_candidates() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"ids": [[]]}"#).unwrap();
        assert!(parsed.into_candidates().is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_is_transient() {
        let index = ChromaIndex::new("http://127.0.0.1:1", "default_tenant", "default_database", "c", 3).unwrap();
        let err = index.query(&[0.0, 0.0, 1.0], 5).await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }
}
