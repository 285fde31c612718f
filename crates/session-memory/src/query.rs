//! Cache query engine: retrieval, gating, URL adaptation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use llm_gateway::InferenceClient;

use crate::errors::MemoryError;
use crate::model::{domain_of, CacheHit, CacheResult, StoredMeta, UrlKind};
use crate::store::VectorStore;

static GOAL_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("goal url regex"));

/// Tunables for query gating.
///
/// The threshold and penalty are empirical knobs, not load-bearing
/// invariants; defaults keep the values the system shipped with.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum similarity distance for a usable match.
    /// Default: 1.2
    pub distance_threshold: f32,
    /// Confidence multiplier for jump-point hits, reflecting that they
    /// resume the session earlier. Default: 0.8
    pub jump_point_penalty: f32,
    /// How many neighbours to retrieve. Default: 3
    pub top_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 1.2,
            jump_point_penalty: 0.8,
            top_k: 3,
        }
    }
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the distance threshold.
    pub fn distance_threshold(mut self, threshold: f32) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Builder: set the jump-point penalty.
    pub fn jump_point_penalty(mut self, penalty: f32) -> Self {
        self.jump_point_penalty = penalty;
        self
    }
}

/// Look up a cached URL for `goal`.
///
/// Returns `Fallback` whenever anything short of a confident, adaptable
/// match happens: empty store, distance above threshold, domain mismatch,
/// or both adaptation attempts failing. Only store transport trouble is an
/// error.
pub async fn query_cache(
    goal: &str,
    store: &dyn VectorStore,
    llm: &dyn InferenceClient,
    config: &MemoryConfig,
) -> Result<CacheResult, MemoryError> {
    let goal_domain = GOAL_URL_RE
        .find(goal)
        .and_then(|m| domain_of(m.as_str()));

    if store.count().await? == 0 {
        info!("memory store is empty — fallback to live loop");
        return Ok(CacheResult::Fallback);
    }

    let query_text = format!(
        "domain: {} | goal: {goal}",
        goal_domain.as_deref().unwrap_or("")
    );
    let matches = store.query(&query_text, config.top_k).await?;
    let Some(top) = matches.first() else {
        info!("no similar sessions found — fallback");
        return Ok(CacheResult::Fallback);
    };

    let meta: StoredMeta = match serde_json::from_value(top.metadata.clone()) {
        Ok(meta) => meta,
        Err(err) => {
            warn!(id = %top.id, error = %err, "top match metadata unreadable — fallback");
            return Ok(CacheResult::Fallback);
        }
    };
    info!(
        distance = top.distance,
        domain = %meta.domain,
        cached_goal = %meta.original_goal,
        "top cache match"
    );

    // Gate 1: similarity distance.
    if top.distance > config.distance_threshold {
        info!(
            distance = top.distance,
            threshold = config.distance_threshold,
            "distance above threshold — fallback"
        );
        return Ok(CacheResult::Fallback);
    }

    // Gate 2: exact domain agreement when the goal names a site.
    if let Some(ref wanted) = goal_domain {
        if *wanted != meta.domain {
            info!(goal_domain = %wanted, cached_domain = %meta.domain, "domain mismatch — fallback");
            return Ok(CacheResult::Fallback);
        }
    }

    let base_confidence = (1.0 - top.distance / config.distance_threshold).clamp(0.0, 1.0);

    // Adapt the final URL first; it matches the successful outcome best.
    if let Some(url) = adapt_url(llm, goal, &meta.original_goal, &meta.final_url).await {
        return Ok(CacheResult::Hit(CacheHit {
            url,
            url_kind: UrlKind::Final,
            steps_skipped: meta.step_count,
            confidence: base_confidence,
            source_session_id: top.id.clone(),
        }));
    }

    // The final URL was not adaptable; try the jump point when distinct.
    if !meta.jump_point_url.is_empty() && meta.jump_point_url != meta.final_url {
        debug!("final URL not adaptable, trying jump point");
        if let Some(url) = adapt_url(llm, goal, &meta.original_goal, &meta.jump_point_url).await {
            return Ok(CacheResult::Hit(CacheHit {
                url,
                url_kind: UrlKind::JumpPoint,
                steps_skipped: meta.jump_point_step,
                confidence: (base_confidence * config.jump_point_penalty).clamp(0.0, 1.0),
                source_session_id: top.id.clone(),
            }));
        }
    }

    info!("no cached URL adaptable to the new goal — fallback");
    Ok(CacheResult::Fallback)
}

#[derive(Deserialize)]
struct AdaptResponse {
    status: Option<String>,
    url: Option<String>,
    #[allow(dead_code)]
    reasoning: Option<String>,
}

fn adapt_prompt(new_goal: &str, cached_goal: &str, cached_url: &str) -> String {
    format!(
        r#"You are a URL pattern adapter. You have a cached successful URL from a previous browser session.

Previous goal: "{cached_goal}"
Previous result URL: "{cached_url}"

New goal: "{new_goal}"

Analyze the URL structure from the previous session and adapt it for the new goal.
- Identify the pattern (path segments, query params like ?q=, ?search=, ?make=, etc.)
- Apply the new goal's parameters to the same pattern
- URL-encode special characters in query params where needed
- If the new goal is too different to adapt (different site feature, different intent), return status "fallback"

Return ONLY JSON:
{{
    "status": "success" | "fallback",
    "url": "https://...",
    "reasoning": "brief explanation"
}}"#
    )
}

/// Adapt one cached URL to the new goal. `None` is the normal negative
/// result; returned for an explicit `fallback` judgment and for every
/// transport or parsing failure.
async fn adapt_url(
    llm: &dyn InferenceClient,
    new_goal: &str,
    cached_goal: &str,
    cached_url: &str,
) -> Option<String> {
    let raw = match llm
        .complete_json(&adapt_prompt(new_goal, cached_goal, cached_url))
        .await
    {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "URL adaptation request failed");
            return None;
        }
    };
    let response: AdaptResponse = match serde_json::from_str(&raw) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "URL adaptation response unparseable");
            return None;
        }
    };

    match (response.status.as_deref(), response.url) {
        (Some("success"), Some(url)) if !url.trim().is_empty() => {
            debug!(url = %url, "cached URL adapted");
            Some(url)
        }
        _ => {
            debug!(cached_url, "cached URL judged not adaptable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_keeps_shipped_constants() {
        let config = MemoryConfig::default();
        assert!((config.distance_threshold - 1.2).abs() < f32::EPSILON);
        assert!((config.jump_point_penalty - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.top_k, 3);
    }

    #[test]
    fn goal_url_regex_finds_embedded_urls() {
        let m = GOAL_URL_RE
            .find("on https://www.clutch.ca/ - find CRVs")
            .unwrap();
        assert_eq!(m.as_str(), "https://www.clutch.ca/");
    }
}
