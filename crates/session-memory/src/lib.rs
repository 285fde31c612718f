//! Semantic session cache.
//!
//! Completed agent runs are distilled into retrievable memory records; a
//! new goal on a known site can then skip straight to a known-good URL
//! instead of re-running the full perceive-decide-act loop.
//!
//! Two operations, both offline relative to the live loop:
//! - **Ingestion** ([`ingest::ingest_sessions`]) reads recorded session
//!   directories, picks a jump point per session, and resyncs the vector
//!   store (full clear-then-rewrite; never an incremental merge).
//! - **Query** ([`query::query_cache`]) retrieves the nearest past session,
//!   gates on distance and domain, and adapts a cached URL to the new goal.

pub mod chroma;
pub mod errors;
pub mod ingest;
pub mod model;
pub mod query;
pub mod store;

pub use chroma::{ChromaConfig, ChromaStore};
pub use errors::MemoryError;
pub use ingest::{ingest_sessions, IngestReport, UrlStep};
pub use model::{domain_of, CacheHit, CacheResult, SessionMemory, StoredMeta, UrlKind};
pub use query::{query_cache, MemoryConfig};
pub use store::{InMemoryStore, ScoredMatch, VectorStore};
