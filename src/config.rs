//! Environment-layered application configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use llm_gateway::GroqConfig;
use session_memory::ChromaConfig;

/// Settings resolved from the environment.
///
/// Keys map 1:1 to environment variables (`GROQ_API_KEY`,
/// `CHROMA_API_KEY`, `CHROMA_TENANT`, `CHROMA_DATABASE`, `ARTIFACTS_DIR`).
/// Credentials are validated per command, not at load time; `run` without
/// cache credentials still works, it just skips the cache.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub groq_api_key: Option<String>,
    pub chroma_api_key: Option<String>,
    pub chroma_tenant: Option<String>,
    pub chroma_database: Option<String>,
    pub artifacts_dir: PathBuf,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .set_default("artifacts_dir", "debug-output")?
            .add_source(config::Environment::default())
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("reading configuration from environment")
    }

    /// Inference-service settings; `GROQ_API_KEY` is required.
    pub fn inference(&self) -> Result<GroqConfig> {
        let Some(ref key) = self.groq_api_key else {
            bail!("GROQ_API_KEY is not set");
        };
        Ok(GroqConfig::new(key.clone()))
    }

    /// Vector-store settings; all three `CHROMA_*` variables are required.
    pub fn chroma(&self) -> Result<ChromaConfig> {
        match (
            &self.chroma_api_key,
            &self.chroma_tenant,
            &self.chroma_database,
        ) {
            (Some(key), Some(tenant), Some(database)) => {
                Ok(ChromaConfig::new(key.clone(), tenant.clone(), database.clone()))
            }
            _ => bail!("CHROMA_API_KEY, CHROMA_TENANT and CHROMA_DATABASE must all be set"),
        }
    }
}
