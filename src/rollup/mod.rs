//! Completion roll-up: Task → Header → Service.
//!
//! - `evaluate`: pure completion rules and transition planning
//! - `orchestrator`: runs the fetch/evaluate/write chain against the stores
//! - `report`: what a roll-up evaluated, wrote, and failed to do

pub mod evaluate;
pub mod orchestrator;
pub mod report;

pub use evaluate::{is_header_complete, is_service_complete, normalized_truthy, Transition};
pub use orchestrator::{Orchestrator, RollUpPolicy};
pub use report::{PortCallRollUp, RollUpReport, RollUpStep, RollUpWarning, TaskOutcome};
