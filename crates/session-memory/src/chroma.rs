//! Chroma Cloud REST implementation of the [`VectorStore`] seam.
//!
//! Documents are embedded server-side by the collection's default embedding
//! function, matching the way sessions were originally stored. This client
//! is deliberately thin: the vector database is a collaborator, not part of
//! the core.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::MemoryError;
use crate::store::{ScoredMatch, VectorStore};

/// Connection settings for Chroma Cloud.
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub api_key: String,
    pub tenant: String,
    pub database: String,
    pub base_url: String,
    pub collection: String,
}

impl ChromaConfig {
    pub fn new(
        api_key: impl Into<String>,
        tenant: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            tenant: tenant.into(),
            database: database.into(),
            base_url: "https://api.trychroma.com".to_string(),
            collection: "agent_sessions".to_string(),
        }
    }
}

/// REST client bound to one collection.
pub struct ChromaStore {
    config: ChromaConfig,
    http: reqwest::Client,
    collection_id: String,
}

#[derive(Deserialize)]
struct Collection {
    id: String,
}

#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
    #[serde(default)]
    metadatas: Vec<Vec<Value>>,
}

#[derive(Deserialize, Default)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
}

impl ChromaStore {
    /// Resolve (or create) the collection and return a bound store.
    pub async fn connect(config: ChromaConfig) -> Result<Self, MemoryError> {
        let http = reqwest::Client::new();
        let url = format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            config.base_url, config.tenant, config.database
        );
        let response = http
            .post(&url)
            .header("x-chroma-token", &config.api_key)
            .json(&json!({ "name": config.collection, "get_or_create": true }))
            .send()
            .await?;
        let collection: Collection = Self::check(response).await?.json().await?;
        info!(collection = %config.collection, id = %collection.id, "chroma collection ready");
        Ok(Self {
            config,
            http,
            collection_id: collection.id,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections/{}/{}",
            self.config.base_url,
            self.config.tenant,
            self.config.database,
            self.collection_id,
            suffix
        )
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<reqwest::Response, MemoryError> {
        debug!(endpoint = suffix, "chroma request");
        let response = self
            .http
            .post(self.collection_url(suffix))
            .header("x-chroma-token", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MemoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MemoryError::api(status.as_u16(), body))
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn add(
        &self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<Value>,
    ) -> Result<(), MemoryError> {
        self.post(
            "add",
            json!({ "ids": ids, "documents": documents, "metadatas": metadatas }),
        )
        .await
        .map(|_| ())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredMatch>, MemoryError> {
        let response: QueryResponse = self
            .post(
                "query",
                json!({
                    "query_texts": [text],
                    "n_results": top_k,
                    "include": ["metadatas", "distances"],
                }),
            )
            .await?
            .json()
            .await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let distances = response.distances.into_iter().next().unwrap_or_default();
        let metadatas = response.metadatas.into_iter().next().unwrap_or_default();
        if ids.len() != distances.len() {
            return Err(MemoryError::payload(
                "query response ids/distances length mismatch",
            ));
        }

        let mut metadatas = metadatas.into_iter();
        Ok(ids
            .into_iter()
            .zip(distances)
            .map(|(id, distance)| ScoredMatch {
                id,
                distance,
                metadata: metadatas.next().unwrap_or(Value::Null),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        let response = self
            .http
            .get(self.collection_url("count"))
            .header("x-chroma-token", &self.config.api_key)
            .send()
            .await?;
        let count: usize = Self::check(response).await?.json().await?;
        Ok(count)
    }

    async fn delete(&self, ids: Vec<String>) -> Result<(), MemoryError> {
        self.post("delete", json!({ "ids": ids })).await.map(|_| ())
    }

    async fn all_ids(&self) -> Result<Vec<String>, MemoryError> {
        let response: GetResponse = self.post("get", json!({})).await?.json().await?;
        Ok(response.ids)
    }
}
