//! Session ingestion: recorded artifacts → memory records.
//!
//! Scans the artifact root for `session-*` directories, reconstructs each
//! session's URL chain, asks the inference collaborator for the best jump
//! point, and resyncs the vector store. Unusable sessions (no goal record,
//! no steps, no final URL) are skipped, never errors. Ingestion is a
//! complete clear-then-rewrite; idempotent in effect, and callers must not
//! run two ingestions (or a query mid-ingestion) concurrently.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::to_value;
use tracing::{debug, info, warn};
use url::Url;

use llm_gateway::InferenceClient;
use wayfinder_core_types::{AgentDecision, GoalRecord};

use crate::errors::MemoryError;
use crate::model::{domain_of, SessionMemory};
use crate::store::VectorStore;

static STEP_DECISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^step-(\d+)-decision\.json$").expect("step decision regex"));

/// One URL observed at one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlStep {
    pub step: u32,
    pub url: String,
}

/// What an ingestion run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Session directories found under the root.
    pub sessions_found: usize,
    /// Successful sessions written to the store.
    pub ingested: usize,
    /// Prior records cleared before the rewrite.
    pub cleared: usize,
}

/// Ingest every recorded session under `root` into `store`.
pub async fn ingest_sessions(
    root: &Path,
    store: &dyn VectorStore,
    llm: &dyn InferenceClient,
) -> Result<IngestReport, MemoryError> {
    let sessions = discover_sessions(root)?;
    info!(sessions = sessions.len(), root = %root.display(), "ingestion scan");

    let mut memories: Vec<SessionMemory> = Vec::new();
    for dir in &sessions {
        if let Some(memory) = parse_session(dir, llm).await {
            if memory.success {
                memories.push(memory);
            } else {
                debug!(session = %memory.session_id, "skipping unsuccessful session");
            }
        }
    }

    let mut report = IngestReport {
        sessions_found: sessions.len(),
        ..Default::default()
    };
    if memories.is_empty() {
        info!("no successful sessions to ingest");
        return Ok(report);
    }

    // Full resync: clear everything, then write the new record set.
    let existing = store.all_ids().await?;
    if !existing.is_empty() {
        report.cleared = existing.len();
        store.delete(existing).await?;
        info!(cleared = report.cleared, "cleared prior memory records");
    }

    let ids = memories.iter().map(|m| m.session_id.clone()).collect();
    let documents = memories.iter().map(SessionMemory::document).collect();
    let metadatas = memories
        .iter()
        .map(|m| to_value(m.metadata()).map_err(|err| MemoryError::payload(err.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    store.add(ids, documents, metadatas).await?;
    report.ingested = memories.len();
    info!(ingested = report.ingested, "ingestion complete");
    Ok(report)
}

fn discover_sessions(root: &Path) -> Result<Vec<PathBuf>, MemoryError> {
    if !root.exists() {
        warn!(root = %root.display(), "artifact root does not exist");
        return Ok(Vec::new());
    }
    let mut sessions: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("session-"))
                    .unwrap_or(false)
        })
        .collect();
    sessions.sort();
    Ok(sessions)
}

/// Parse one session directory; `None` means "skip", never an error.
async fn parse_session(dir: &Path, llm: &dyn InferenceClient) -> Option<SessionMemory> {
    let session_id = dir.file_name()?.to_str()?.to_string();

    let goal_raw = fs::read_to_string(dir.join("refined-goal.json")).ok().or_else(|| {
        debug!(session = %session_id, "skipping — no refined-goal.json");
        None
    })?;
    let goal: GoalRecord = match serde_json::from_str(&goal_raw) {
        Ok(goal) => goal,
        Err(err) => {
            debug!(session = %session_id, error = %err, "skipping — goal record unparseable");
            return None;
        }
    };

    let max_step = max_recorded_step(dir)?;
    let final_decision_raw =
        fs::read_to_string(dir.join(format!("step-{max_step}-decision.json"))).ok()?;
    let success = serde_json::from_str::<AgentDecision>(&final_decision_raw)
        .map(|decision| decision.is_finished())
        .unwrap_or(false);

    let final_url = fs::read_to_string(dir.join(format!("step-{max_step}-url.txt")))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| {
            debug!(session = %session_id, "skipping — no final URL");
            None
        })?;
    let domain = domain_of(&final_url).or_else(|| {
        debug!(session = %session_id, "skipping — final URL does not parse");
        None
    })?;

    let chain = collect_url_chain(dir, max_step);
    debug!(
        session = %session_id,
        urls = chain.len(),
        steps = max_step,
        "session URL chain reconstructed"
    );

    let jump_point = choose_jump_point(llm, goal.cache_goal(), &chain).await;

    Some(SessionMemory {
        session_id,
        domain,
        original_goal: goal.original_goal.clone(),
        refined_goal: goal.refined_goal.clone(),
        final_url,
        jump_point_url: jump_point.url,
        jump_point_step: jump_point.step,
        url_chain: chain.into_iter().map(|entry| entry.url).collect(),
        step_count: max_step,
        success,
        timestamp: goal.timestamp,
    })
}

/// Highest step number with a recorded decision, `None` when the session
/// has no steps at all.
fn max_recorded_step(dir: &Path) -> Option<u32> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let captures = STEP_DECISION_RE.captures(name)?;
            captures.get(1)?.as_str().parse::<u32>().ok()
        })
        .max()
}

/// Ordered, deduplicated URL chain; steps without a recorded URL are
/// skipped.
pub fn collect_url_chain(dir: &Path, max_step: u32) -> Vec<UrlStep> {
    let mut chain: Vec<UrlStep> = Vec::new();
    for step in 1..=max_step {
        let Ok(raw) = fs::read_to_string(dir.join(format!("step-{step}-url.txt"))) else {
            continue;
        };
        let url = raw.trim().to_string();
        if url.is_empty() || chain.iter().any(|entry| entry.url == url) {
            continue;
        }
        chain.push(UrlStep { step, url });
    }
    chain
}

#[derive(Deserialize)]
struct JumpPointResponse {
    #[serde(alias = "jumpPointUrl")]
    jump_point_url: Option<String>,
    #[serde(alias = "jumpPointStep")]
    jump_point_step: Option<u32>,
    #[serde(alias = "reasoning")]
    #[allow(dead_code)]
    reasoning: Option<String>,
}

fn jump_point_prompt(goal: &str, chain: &[UrlStep]) -> String {
    let url_list = chain
        .iter()
        .map(|entry| format!("Step {}: {}", entry.step, entry.url))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"You are analyzing a browser automation session's URL history to find the best "jump point" — an intermediate URL that could be adapted for similar future goals.

Goal that was accomplished: "{goal}"

URLs visited (in order):
{url_list}

Pick the BEST jump point URL. A good jump point:
- Has query parameters or path segments that map to the goal's keywords (like ?q=SearchTerm, ?make=Honda, /search?query=...)
- Is adaptable — you could swap the search term or parameters for a different query
- Is as DEEP into the flow as possible while still being adaptable
- Is NOT just the homepage or a bare domain
- Is NOT a URL with opaque IDs that can't be derived from the goal (like /id/9253)

If the FINAL URL is adaptable (has meaningful query params or path segments), prefer it.
If the final URL has opaque IDs, look for an earlier search/filter URL.
If no URL is adaptable, return the final URL anyway.

Return ONLY JSON:
{{
    "jump_point_url": "the best adaptable URL",
    "jump_point_step": number,
    "reasoning": "why this URL is the best jump point"
}}"#
    )
}

/// Pick the jump point for one session.
///
/// The model's choice must be a member of the chain; an opaque-id choice is
/// overridden when an adaptable alternative exists. Inference failure falls
/// back to the same deterministic heuristic.
pub async fn choose_jump_point(
    llm: &dyn InferenceClient,
    goal: &str,
    chain: &[UrlStep],
) -> UrlStep {
    let fallback = heuristic_jump_point(chain);
    if chain.len() <= 1 {
        return fallback;
    }

    let raw = match llm.complete_json(&jump_point_prompt(goal, chain)).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "jump-point analysis failed, using heuristic");
            return fallback;
        }
    };
    let response: JumpPointResponse = match serde_json::from_str(&raw) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "jump-point response unparseable, using heuristic");
            return fallback;
        }
    };

    let Some(chosen_url) = response.jump_point_url else {
        return fallback;
    };
    let Some(chosen) = chain.iter().find(|entry| entry.url == chosen_url) else {
        warn!(url = %chosen_url, "jump-point choice is not in the chain, using heuristic");
        return fallback;
    };

    // Never accept an opaque-id URL while an adaptable alternative exists.
    if looks_opaque(&chosen.url) && chain.iter().any(|entry| has_query_params(&entry.url)) {
        warn!(url = %chosen.url, "jump-point choice has an opaque id, using heuristic");
        return fallback;
    }

    debug!(step = response.jump_point_step.unwrap_or(chosen.step), url = %chosen.url, "jump point chosen");
    chosen.clone()
}

/// Deepest URL with query parameters, else the final URL.
pub fn heuristic_jump_point(chain: &[UrlStep]) -> UrlStep {
    chain
        .iter()
        .rev()
        .find(|entry| has_query_params(&entry.url))
        .or_else(|| chain.last())
        .cloned()
        .unwrap_or(UrlStep {
            step: 1,
            url: String::new(),
        })
}

fn has_query_params(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| parsed.query().map(|q| !q.is_empty()).unwrap_or(false))
        .unwrap_or(false)
}

/// A URL whose identifying part is an opaque numeric segment (like
/// `/id/9253`) cannot be derived from goal text.
pub fn looks_opaque(url: &str) -> bool {
    if has_query_params(url) {
        return false;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .any(|segment| segment.chars().all(|c| c.is_ascii_digit()))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_gateway::ScriptedInference;

    fn chain() -> Vec<UrlStep> {
        vec![
            UrlStep {
                step: 1,
                url: "https://cars.example".to_string(),
            },
            UrlStep {
                step: 3,
                url: "https://cars.example/search?make=Honda&model=CRV".to_string(),
            },
            UrlStep {
                step: 6,
                url: "https://cars.example/listing/9253".to_string(),
            },
        ]
    }

    #[test]
    fn opaque_detection() {
        assert!(looks_opaque("https://cars.example/listing/9253"));
        assert!(looks_opaque("https://cars.example/id/9253"));
        assert!(!looks_opaque("https://cars.example/search?make=Honda"));
        assert!(!looks_opaque("https://cars.example/search/honda-crv"));
    }

    #[test]
    fn heuristic_prefers_deepest_parameterized_url() {
        let jump = heuristic_jump_point(&chain());
        assert_eq!(jump.step, 3);
        assert!(jump.url.contains("make=Honda"));
    }

    #[tokio::test]
    async fn opaque_model_choice_is_overridden() {
        let llm = ScriptedInference::new();
        llm.push_response(
            r#"{"jump_point_url":"https://cars.example/listing/9253","jump_point_step":6,"reasoning":"deepest"}"#,
        );
        let jump = choose_jump_point(&llm, "find 2021 CRVs", &chain()).await;
        assert_eq!(jump.step, 3, "opaque id must lose to the search URL");
    }

    #[tokio::test]
    async fn model_choice_outside_chain_is_rejected() {
        let llm = ScriptedInference::new();
        llm.push_response(
            r#"{"jump_point_url":"https://elsewhere.example/x","jump_point_step":2,"reasoning":"made up"}"#,
        );
        let jump = choose_jump_point(&llm, "goal", &chain()).await;
        assert_eq!(jump.step, 3);
    }

    #[tokio::test]
    async fn valid_model_choice_is_kept() {
        let llm = ScriptedInference::new();
        llm.push_response(
            r#"{"jump_point_url":"https://cars.example/search?make=Honda&model=CRV","jump_point_step":3,"reasoning":"adaptable"}"#,
        );
        let jump = choose_jump_point(&llm, "goal", &chain()).await;
        assert_eq!(
            jump.url,
            "https://cars.example/search?make=Honda&model=CRV"
        );
    }

    #[tokio::test]
    async fn single_url_chain_skips_the_model() {
        let llm = ScriptedInference::new(); // would error if called
        let single = vec![UrlStep {
            step: 1,
            url: "https://cars.example".to_string(),
        }];
        let jump = choose_jump_point(&llm, "goal", &single).await;
        assert_eq!(jump.url, "https://cars.example");
        assert!(llm.seen_prompts().is_empty());
    }
}
