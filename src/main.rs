//! wayfinder: goal-driven browser agent with a semantic session cache.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agent_runtime::{AgentConfig, AgentRunner, SessionRecorder, StartPoint};
use cdp_driver::{CdpDriver, DriverConfig};
use llm_gateway::GroqClient;
use session_memory::{
    ingest_sessions, query_cache, CacheResult, ChromaStore, MemoryConfig,
};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "wayfinder",
    version,
    about = "Drive a browser toward a natural-language goal; memoize successful sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent toward a goal (queries the session cache first).
    Run {
        /// The natural-language goal.
        #[arg(long)]
        goal: String,
        /// Step ceiling for the control loop.
        #[arg(long)]
        max_steps: Option<u32>,
        /// Decide from element summaries only, without screenshots.
        #[arg(long)]
        no_vision: bool,
        /// Run the browser without a visible window.
        #[arg(long)]
        headless: bool,
        /// Skip the session-cache lookup and always run the live loop.
        #[arg(long)]
        no_cache: bool,
        /// Where session artifacts are written.
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },
    /// Re-ingest all recorded sessions into the vector store.
    Ingest {
        /// Where session artifacts were written.
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },
    /// Query the session cache for a goal without running the agent.
    Query {
        /// The natural-language goal.
        #[arg(long)]
        goal: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let app = AppConfig::load()?;

    match cli.command {
        Command::Run {
            goal,
            max_steps,
            no_vision,
            headless,
            no_cache,
            artifacts_dir,
        } => {
            run_agent(
                &app,
                &goal,
                max_steps,
                no_vision,
                headless,
                no_cache,
                artifacts_dir,
            )
            .await
        }
        Command::Ingest { artifacts_dir } => ingest(&app, artifacts_dir).await,
        Command::Query { goal } => query(&app, &goal).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_agent(
    app: &AppConfig,
    goal: &str,
    max_steps: Option<u32>,
    no_vision: bool,
    headless: bool,
    no_cache: bool,
    artifacts_dir: Option<PathBuf>,
) -> Result<()> {
    let llm = Arc::new(GroqClient::new(app.inference()?)?);
    let artifacts_dir = artifacts_dir.unwrap_or_else(|| app.artifacts_dir.clone());

    // The cache is consulted once, before the loop; a hit short-circuits
    // planning and lands the run on a known-good URL.
    let start = if no_cache {
        None
    } else {
        resolve_cached_start(app, goal, llm.as_ref()).await
    };

    let driver = Arc::new(
        CdpDriver::launch(DriverConfig::default().headless(headless))
            .await
            .context("launching browser")?,
    );
    let recorder =
        SessionRecorder::create(&artifacts_dir).context("creating session directory")?;

    let mut agent_config = AgentConfig::new().vision(!no_vision);
    if let Some(steps) = max_steps {
        agent_config = agent_config.max_steps(steps);
    }

    let runner = AgentRunner::new(driver.clone(), llm, agent_config);
    let report = runner.run(goal, start, &recorder).await;
    driver.shutdown().await;

    println!();
    println!(
        "{} after {} step(s)",
        if report.is_success() {
            "Goal achieved"
        } else {
            "Step budget exhausted"
        },
        report.steps_taken
    );
    if let Some(url) = &report.final_url {
        println!("Final URL: {url}");
    }
    println!("Session:   {}", report.session_id);
    for entry in &report.history {
        println!("  - {entry}");
    }
    Ok(())
}

/// Query the cache for a starting point; any cache trouble degrades to a
/// live run.
async fn resolve_cached_start(
    app: &AppConfig,
    goal: &str,
    llm: &GroqClient,
) -> Option<StartPoint> {
    let chroma_config = match app.chroma() {
        Ok(config) => config,
        Err(err) => {
            info!(reason = %err, "session cache not configured, running live");
            return None;
        }
    };
    let store = match ChromaStore::connect(chroma_config).await {
        Ok(store) => store,
        Err(err) => {
            warn!(error = %err, "vector store unavailable, running live");
            return None;
        }
    };
    match query_cache(goal, &store, llm, &MemoryConfig::default()).await {
        Ok(CacheResult::Hit(hit)) => {
            info!(
                url = %hit.url,
                kind = ?hit.url_kind,
                confidence = hit.confidence,
                steps_skipped = hit.steps_skipped,
                source = %hit.source_session_id,
                "session cache hit"
            );
            println!(
                "Cache hit ({:?}, confidence {:.2}): skipping ~{} steps",
                hit.url_kind, hit.confidence, hit.steps_skipped
            );
            Some(StartPoint {
                url: hit.url,
                refined_goal: goal.to_string(),
                from_cache: true,
            })
        }
        Ok(CacheResult::Fallback) => {
            info!("session cache fallback, running live");
            None
        }
        Err(err) => {
            warn!(error = %err, "session cache query failed, running live");
            None
        }
    }
}

async fn ingest(app: &AppConfig, artifacts_dir: Option<PathBuf>) -> Result<()> {
    let llm = GroqClient::new(app.inference()?)?;
    let store = ChromaStore::connect(app.chroma()?)
        .await
        .context("connecting to vector store")?;
    let root = artifacts_dir.unwrap_or_else(|| app.artifacts_dir.clone());

    let report = ingest_sessions(&root, &store, &llm)
        .await
        .context("ingesting sessions")?;
    println!(
        "Scanned {} session(s); ingested {} (cleared {} prior record(s))",
        report.sessions_found, report.ingested, report.cleared
    );
    Ok(())
}

async fn query(app: &AppConfig, goal: &str) -> Result<()> {
    let llm = GroqClient::new(app.inference()?)?;
    let store = ChromaStore::connect(app.chroma()?)
        .await
        .context("connecting to vector store")?;

    let result = query_cache(goal, &store, &llm, &MemoryConfig::default())
        .await
        .context("querying session cache")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
