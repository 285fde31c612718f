//! Vector-store seam and the deterministic in-memory implementation.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::MemoryError;

/// One ranked match from a similarity query. Lower distance is closer.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub id: String,
    pub distance: f32,
    pub metadata: Value,
}

/// The vector-database collaborator contract.
///
/// Query is read-only; `delete` + `add` together implement the ingestor's
/// clear-then-rewrite resync. Callers serialize ingestion runs themselves.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(
        &self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<Value>,
    ) -> Result<(), MemoryError>;

    /// Nearest `top_k` records for `text`, closest first.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredMatch>, MemoryError>;

    async fn count(&self) -> Result<usize, MemoryError>;

    async fn delete(&self, ids: Vec<String>) -> Result<(), MemoryError>;

    async fn all_ids(&self) -> Result<Vec<String>, MemoryError>;
}

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    document: String,
    metadata: Value,
    tokens: HashSet<String>,
}

/// Deterministic [`VectorStore`] for tests and offline development.
///
/// Similarity is token overlap (Jaccard), so distance is 0 for identical
/// documents and 1 for disjoint ones; no model, no network, stable
/// ordering.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    docs: Mutex<Vec<StoredDoc>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn jaccard_distance(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    1.0 - intersection / union
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add(
        &self,
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<Value>,
    ) -> Result<(), MemoryError> {
        if ids.len() != documents.len() || ids.len() != metadatas.len() {
            return Err(MemoryError::payload(
                "ids, documents and metadatas must be the same length",
            ));
        }
        let mut docs = self.docs.lock().unwrap();
        for ((id, document), metadata) in ids.into_iter().zip(documents).zip(metadatas) {
            let tokens = tokenize(&document);
            docs.push(StoredDoc {
                id,
                document,
                metadata,
                tokens,
            });
        }
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredMatch>, MemoryError> {
        let query_tokens = tokenize(text);
        let docs = self.docs.lock().unwrap();
        let mut scored: Vec<ScoredMatch> = docs
            .iter()
            .map(|doc| ScoredMatch {
                id: doc.id.clone(),
                distance: jaccard_distance(&query_tokens, &doc.tokens),
                metadata: doc.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.docs.lock().unwrap().len())
    }

    async fn delete(&self, ids: Vec<String>) -> Result<(), MemoryError> {
        let remove: HashSet<String> = ids.into_iter().collect();
        self.docs
            .lock()
            .unwrap()
            .retain(|doc| !remove.contains(&doc.id));
        Ok(())
    }

    async fn all_ids(&self) -> Result<Vec<String>, MemoryError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .map(|doc| doc.id.clone())
            .collect())
    }
}
