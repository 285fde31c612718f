//! The agent control loop and its parts.
//!
//! Each step of a run flows through this crate: the tagger discovers and
//! labels what is on the page, the decision requestor asks the inference
//! service for one atomic action, the correction policy reconciles that
//! action with what the element actually is, and the dispatcher executes it.
//! The runner owns step counting and termination; the recorder persists the
//! artifacts the session cache is later built from.

pub mod config;
pub mod correction;
pub mod decision;
pub mod dispatch;
pub mod history;
pub mod planner;
pub mod recorder;
pub mod runner;
pub mod tagger;

pub use config::AgentConfig;
pub use history::ActionHistory;
pub use recorder::{SessionRecorder, StepArtifacts};
pub use runner::{AgentRunner, RunOutcome, RunReport, StartPoint};
