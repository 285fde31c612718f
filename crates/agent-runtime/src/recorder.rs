//! Session recorder.
//!
//! One directory per run, one artifact bundle per step. The recorder is an
//! explicit value created at run start and threaded through the loop; no
//! ambient current-session global. The live loop only writes; the memory
//! ingestor is the reader.
//!
//! Write failures are logged and absorbed: recording must never kill a run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use wayfinder_core_types::{AgentDecision, ElementRecord, GoalRecord};

/// Directory-name prefix the ingestor scans for.
pub const SESSION_DIR_PREFIX: &str = "session-";

/// Everything one step leaves behind.
#[derive(Debug, Clone, Copy)]
pub struct StepArtifacts<'a> {
    pub screenshot: Option<&'a [u8]>,
    pub elements: &'a [ElementRecord],
    pub decision: &'a AgentDecision,
    pub url: &'a str,
    pub prompt: &'a str,
    pub response: &'a str,
}

/// Per-run artifact writer.
#[derive(Debug)]
pub struct SessionRecorder {
    session_id: String,
    dir: PathBuf,
}

impl SessionRecorder {
    /// Create the session directory under `root`.
    pub fn create(root: &Path) -> io::Result<Self> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
        let session_id = format!("{SESSION_DIR_PREFIX}{timestamp}");
        let dir = root.join(&session_id);
        fs::create_dir_all(&dir)?;
        info!(session = %session_id, dir = %dir.display(), "session directory created");
        Ok(Self { session_id, dir })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist the goal-refinement record (`refined-goal.json`).
    pub fn record_goal(&self, record: &GoalRecord) {
        self.write_json("refined-goal.json", record);
    }

    /// Persist one step's artifact bundle.
    pub fn record_step(&self, step: u32, artifacts: &StepArtifacts<'_>) {
        if let Some(screenshot) = artifacts.screenshot {
            self.write_bytes(&format!("step-{step}-screenshot.jpg"), screenshot);
        }
        self.write_json(&format!("step-{step}-elements.json"), &artifacts.elements);
        self.write_json(&format!("step-{step}-decision.json"), artifacts.decision);
        self.write_bytes(&format!("step-{step}-url.txt"), artifacts.url.as_bytes());
        self.write_bytes(&format!("step-{step}-prompt.txt"), artifacts.prompt.as_bytes());
        self.write_bytes(
            &format!("step-{step}-response.json"),
            artifacts.response.as_bytes(),
        );
        debug!(step, session = %self.session_id, "step artifacts recorded");
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) {
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => self.write_bytes(name, &bytes),
            Err(err) => warn!(file = name, error = %err, "artifact serialization failed"),
        }
    }

    fn write_bytes(&self, name: &str, bytes: &[u8]) {
        if let Err(err) = fs::write(self.dir.join(name), bytes) {
            warn!(file = name, error = %err, "artifact write failed");
        }
    }
}
