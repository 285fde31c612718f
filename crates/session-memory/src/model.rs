//! Cache data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A completed session distilled into what matters for caching.
///
/// Created once per session during ingestion; immutable thereafter.
/// Superseded (not merged) by the next full re-ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMemory {
    pub session_id: String,
    /// Site host with any `www.` prefix stripped.
    pub domain: String,
    pub original_goal: String,
    pub refined_goal: String,
    pub final_url: String,
    /// Best adaptable intermediate URL (e.g. a search/filter page).
    pub jump_point_url: String,
    /// Step at which the jump point was observed.
    pub jump_point_step: u32,
    /// All unique URLs visited, in order.
    pub url_chain: Vec<String>,
    pub step_count: u32,
    /// True iff the loop terminated via `finished`, not budget exhaustion.
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl SessionMemory {
    /// The embedded document: domain and goals carry the semantics, the
    /// URLs anchor the record to its outcome.
    pub fn document(&self) -> String {
        format!(
            "domain: {} | goal: {} | refined: {} | result_url: {} | jump_point: {}",
            self.domain, self.original_goal, self.refined_goal, self.final_url, self.jump_point_url
        )
    }

    /// Flat metadata stored alongside the embedding.
    pub fn metadata(&self) -> StoredMeta {
        StoredMeta {
            domain: self.domain.clone(),
            original_goal: self.original_goal.clone(),
            refined_goal: self.refined_goal.clone(),
            final_url: self.final_url.clone(),
            jump_point_url: self.jump_point_url.clone(),
            jump_point_step: self.jump_point_step,
            step_count: self.step_count,
            timestamp: self.timestamp.to_rfc3339(),
        }
    }
}

/// The flat, primitive-valued record metadata the vector store holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeta {
    pub domain: String,
    pub original_goal: String,
    pub refined_goal: String,
    pub final_url: String,
    pub jump_point_url: String,
    pub jump_point_step: u32,
    pub step_count: u32,
    pub timestamp: String,
}

/// Which cached URL a hit resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    Final,
    JumpPoint,
}

/// A usable cache hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHit {
    pub url: String,
    pub url_kind: UrlKind,
    /// Agent steps this hit nominally saves.
    pub steps_skipped: u32,
    /// In `[0, 1]`; jump-point hits are penalized.
    pub confidence: f32,
    pub source_session_id: String,
}

/// The query subsystem's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheResult {
    /// No usable match; run the live loop.
    Fallback,
    Hit(CacheHit),
}

impl CacheResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheResult::Hit(_))
    }
}

/// Host of `url` with any `www.` prefix stripped; `None` when `url` does
/// not parse as an absolute URL.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}
