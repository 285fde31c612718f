//! End-to-end cache behavior over the deterministic in-memory store.

use std::fs;
use std::path::Path;

use serde_json::json;

use llm_gateway::ScriptedInference;
use session_memory::{
    ingest_sessions, query_cache, CacheResult, InMemoryStore, MemoryConfig, SessionMemory,
    UrlKind, VectorStore,
};

fn stored_session(domain: &str, goal: &str, final_url: &str, jump_url: &str) -> SessionMemory {
    SessionMemory {
        session_id: format!("session-{domain}"),
        domain: domain.to_string(),
        original_goal: goal.to_string(),
        refined_goal: goal.to_string(),
        final_url: final_url.to_string(),
        jump_point_url: jump_url.to_string(),
        jump_point_step: 3,
        url_chain: vec![jump_url.to_string(), final_url.to_string()],
        step_count: 9,
        success: true,
        timestamp: chrono::Utc::now(),
    }
}

async fn seed(store: &InMemoryStore, memories: &[SessionMemory]) {
    store
        .add(
            memories.iter().map(|m| m.session_id.clone()).collect(),
            memories.iter().map(SessionMemory::document).collect(),
            memories
                .iter()
                .map(|m| serde_json::to_value(m.metadata()).unwrap())
                .collect(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_store_always_falls_back() {
    let store = InMemoryStore::new();
    let llm = ScriptedInference::new(); // would error if consulted
    let result = query_cache("any goal at all", &store, &llm, &MemoryConfig::default())
        .await
        .unwrap();
    assert_eq!(result, CacheResult::Fallback);
    assert!(llm.seen_prompts().is_empty());
}

#[tokio::test]
async fn domain_mismatch_falls_back_even_when_similar() {
    let store = InMemoryStore::new();
    seed(
        &store,
        &[stored_session(
            "clutch.ca",
            "find 2021 Honda CRV under 50000 km",
            "https://clutch.ca/search?make=Honda&model=CRV",
            "https://clutch.ca/search?make=Honda",
        )],
    )
    .await;

    // Same wording, different site: the embedded URL resolves to another
    // domain, so the gate must reject regardless of textual similarity.
    let llm = ScriptedInference::new();
    let result = query_cache(
        "on https://carfax.ca find 2021 Honda CRV under 50000 km",
        &store,
        &llm,
        &MemoryConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(result, CacheResult::Fallback);
    assert!(llm.seen_prompts().is_empty(), "adaptation must not be attempted");
}

#[tokio::test]
async fn distance_above_threshold_falls_back() {
    let store = InMemoryStore::new();
    seed(
        &store,
        &[stored_session(
            "last.fm",
            "find the top song of all time for a user",
            "https://last.fm/user/x/library",
            "https://last.fm/user/x",
        )],
    )
    .await;

    let llm = ScriptedInference::new();
    let config = MemoryConfig::new().distance_threshold(0.05);
    let result = query_cache(
        "buy groceries for a chili recipe",
        &store,
        &llm,
        &config,
    )
    .await
    .unwrap();
    assert_eq!(result, CacheResult::Fallback);
}

#[tokio::test]
async fn final_url_adaptation_yields_full_confidence_hit() {
    let store = InMemoryStore::new();
    seed(
        &store,
        &[stored_session(
            "clutch.ca",
            "find 2019-2023 Honda CRV",
            "https://clutch.ca/search?make=Honda&model=CRV&year=2019-2023",
            "https://clutch.ca/search?make=Honda",
        )],
    )
    .await;

    let llm = ScriptedInference::new();
    llm.push_response(
        r#"{"status":"success","url":"https://clutch.ca/search?make=Toyota&model=RAV4&year=2019-2023","reasoning":"swapped make/model, kept the year range"}"#,
    );

    let result = query_cache(
        "on https://clutch.ca find 2019-2023 Toyota RAV4",
        &store,
        &llm,
        &MemoryConfig::default(),
    )
    .await
    .unwrap();

    let CacheResult::Hit(hit) = result else {
        panic!("expected a hit");
    };
    assert_eq!(hit.url_kind, UrlKind::Final);
    assert_eq!(
        hit.url,
        "https://clutch.ca/search?make=Toyota&model=RAV4&year=2019-2023"
    );
    assert_eq!(hit.steps_skipped, 9);
    assert!(hit.confidence > 0.0 && hit.confidence <= 1.0);
    assert_eq!(hit.source_session_id, "session-clutch.ca");
}

#[tokio::test]
async fn jump_point_hit_is_penalized() {
    let store = InMemoryStore::new();
    let session = stored_session(
        "clutch.ca",
        "find 2019-2023 Honda CRV",
        "https://clutch.ca/listing/9253",
        "https://clutch.ca/search?make=Honda",
    );
    seed(&store, &[session]).await;

    let llm = ScriptedInference::new();
    // Final URL has an opaque id: not adaptable. Jump point adapts.
    llm.push_response(r#"{"status":"fallback","reasoning":"opaque listing id"}"#);
    llm.push_response(
        r#"{"status":"success","url":"https://clutch.ca/search?make=Toyota","reasoning":"swapped make"}"#,
    );

    let config = MemoryConfig::default();
    let result = query_cache(
        "on https://clutch.ca find Toyota RAV4",
        &store,
        &llm,
        &config,
    )
    .await
    .unwrap();

    let CacheResult::Hit(hit) = result else {
        panic!("expected a jump-point hit");
    };
    assert_eq!(hit.url_kind, UrlKind::JumpPoint);
    assert_eq!(hit.steps_skipped, 3);
    assert!(hit.confidence < config.jump_point_penalty + f32::EPSILON);
}

#[tokio::test]
async fn both_adaptations_failing_falls_back() {
    let store = InMemoryStore::new();
    seed(
        &store,
        &[stored_session(
            "clutch.ca",
            "find Honda CRV",
            "https://clutch.ca/search?make=Honda&model=CRV",
            "https://clutch.ca/search?make=Honda",
        )],
    )
    .await;

    let llm = ScriptedInference::new();
    llm.push_response(r#"{"status":"fallback","reasoning":"different intent"}"#);
    llm.push_response(r#"{"status":"fallback","reasoning":"different intent"}"#);

    let result = query_cache(
        "on https://clutch.ca sell my car",
        &store,
        &llm,
        &MemoryConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(result, CacheResult::Fallback);
}

// --- ingestion ---------------------------------------------------------

fn write_session(root: &Path, name: &str, finished: bool) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("refined-goal.json"),
        serde_json::to_string_pretty(&json!({
            "original_goal": "find 2021 Honda CRV",
            "refined_goal": "list 2021 Honda CR-V",
            "starting_url": "https://cars.example",
            "timestamp": "2026-08-01T10:00:00Z",
        }))
        .unwrap(),
    )
    .unwrap();

    fs::write(
        dir.join("step-1-decision.json"),
        r#"{"thought":"open search","action":"click","element_id":2}"#,
    )
    .unwrap();
    fs::write(dir.join("step-1-url.txt"), "https://cars.example").unwrap();

    let last = if finished {
        r#"{"thought":"list on screen","action":"finished"}"#
    } else {
        r#"{"thought":"still looking","action":"scroll","direction":"down"}"#
    };
    fs::write(dir.join("step-2-decision.json"), last).unwrap();
    fs::write(
        dir.join("step-2-url.txt"),
        "https://cars.example/search?make=Honda&model=CRV",
    )
    .unwrap();
}

#[tokio::test]
async fn ingestion_is_idempotent_in_effect() {
    let root = tempfile::tempdir().unwrap();
    write_session(root.path(), "session-one", true);
    write_session(root.path(), "session-two", true);

    let store = InMemoryStore::new();
    // Jump-point analysis answers for two sessions, twice over.
    let llm = ScriptedInference::new().with_default(
        r#"{"jump_point_url":"https://cars.example/search?make=Honda&model=CRV","jump_point_step":2,"reasoning":"parameterized"}"#,
    );

    let first = ingest_sessions(root.path(), &store, &llm).await.unwrap();
    assert_eq!(first.sessions_found, 2);
    assert_eq!(first.ingested, 2);
    assert_eq!(first.cleared, 0);
    assert_eq!(store.count().await.unwrap(), 2);

    let mut ids_after_first = store.all_ids().await.unwrap();
    ids_after_first.sort();

    let second = ingest_sessions(root.path(), &store, &llm).await.unwrap();
    assert_eq!(second.ingested, 2);
    assert_eq!(second.cleared, 2, "prior records are fully cleared");
    assert_eq!(store.count().await.unwrap(), 2);

    let mut ids_after_second = store.all_ids().await.unwrap();
    ids_after_second.sort();
    assert_eq!(ids_after_first, ids_after_second);
}

#[tokio::test]
async fn unsuccessful_and_unusable_sessions_are_skipped() {
    let root = tempfile::tempdir().unwrap();
    write_session(root.path(), "session-good", true);
    write_session(root.path(), "session-budget-exhausted", false);

    // A directory with no goal record must be skipped, not an error.
    fs::create_dir_all(root.path().join("session-empty")).unwrap();

    let store = InMemoryStore::new();
    let llm = ScriptedInference::new().with_default(
        r#"{"jump_point_url":"https://cars.example/search?make=Honda&model=CRV","jump_point_step":2,"reasoning":"parameterized"}"#,
    );

    let report = ingest_sessions(root.path(), &store, &llm).await.unwrap();
    assert_eq!(report.sessions_found, 3);
    assert_eq!(report.ingested, 1);
    assert_eq!(
        store.all_ids().await.unwrap(),
        vec!["session-good".to_string()]
    );
}

#[tokio::test]
async fn ingested_records_are_queryable() {
    let root = tempfile::tempdir().unwrap();
    write_session(root.path(), "session-one", true);

    let store = InMemoryStore::new();
    let llm = ScriptedInference::new().with_default(
        r#"{"jump_point_url":"https://cars.example/search?make=Honda&model=CRV","jump_point_step":2,"reasoning":"parameterized"}"#,
    );
    ingest_sessions(root.path(), &store, &llm).await.unwrap();

    let query_llm = ScriptedInference::new();
    query_llm.push_response(
        r#"{"status":"success","url":"https://cars.example/search?make=Honda&model=Pilot","reasoning":"swapped model"}"#,
    );
    let result = query_cache(
        "on https://cars.example find 2021 Honda Pilot",
        &store,
        &query_llm,
        &MemoryConfig::default(),
    )
    .await
    .unwrap();
    assert!(result.is_hit());
}
