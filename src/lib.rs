//! glaura - Port-call task tracking library
//!
//! This library provides the core functionality for the glaura CLI tool:
//! driving the task, header and service records of the port-call API and
//! keeping parent completion in line with child completion.
//!
//! # Core Concepts
//!
//! - **Tasks**: Checklist items under a header; complete once, never reopened
//! - **Headers**: Named groups of tasks under a port call service
//! - **Services**: Port call service engagements, complete when every header is
//! - **Roll-up**: Fetch children, evaluate, write the parent only on change
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `glaura.toml`
//! - `error`: Error types and result aliases
//! - `model`: Task, header and service records as the API exchanges them
//! - `store`: Store traits plus the HTTP and in-memory implementations
//! - `rollup`: Completion rules and the roll-up orchestrator
//! - `session`: Bearer token resolution and the cached session file
//! - `lock`: Per-key async locks and atomic file writes
//! - `events`: JSONL event output
//! - `output`: Human and JSON command output

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod model;
pub mod output;
pub mod rollup;
pub mod session;
pub mod store;

pub use error::{Error, Result};
