//! Shared primitives for the wayfinder agent and its session cache.
//!
//! This crate carries the types that cross crate seams: the element records
//! produced by the tagger, the decision contract spoken with the inference
//! service, and the goal record the session recorder persists for the memory
//! ingestor.

pub mod decision;
pub mod element;
pub mod record;

pub use decision::{
    AgentAction, AgentDecision, DecisionConvertError, RawDecision, ScrollDirection,
};
pub use element::{persist_selector, ElementCapability, ElementKind, ElementRecord, PERSIST_ATTR};
pub use record::GoalRecord;
