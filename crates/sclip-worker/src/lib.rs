//! Story clip worker.
//!
//! This crate provides:
//! - Idempotent job submission and status polling
//! - Background execution of planned clips through an injected renderer
//! - Status notifications per job transition
//! - In-memory job storage with explicit eviction

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestrator;
pub mod store;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use events::{ChannelSink, StatusSink, TracingSink};
pub use logging::JobLogger;
pub use orchestrator::Orchestrator;
pub use store::{spawn_sweeper, Admission, EvictionPolicy, InMemoryJobStore, JobStore};
