//! Outcomes of roll-up runs.
//!
//! A report always describes what was evaluated and written. Failures in
//! roll-up steps are kept as warnings here instead of errors, because the
//! task mutation that triggered the roll-up has already succeeded.

use serde::Serialize;

use crate::error::Error;
use crate::model::{CompletionStamp, Task, TaskHeader};
use crate::rollup::evaluate::Transition;

/// Step of the roll-up chain a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollUpStep {
    ListTasks,
    GetHeader,
    WriteHeader,
    ListHeaders,
    HydrateHeader,
    ListServices,
    WriteService,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollUpWarning {
    pub step: RollUpStep,
    pub entity_id: String,
    pub kind: &'static str,
    pub message: String,
}

impl RollUpWarning {
    pub fn new(step: RollUpStep, entity_id: &str, err: &Error) -> Self {
        Self {
            step,
            entity_id: entity_id.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind == "auth"
    }
}

impl std::fmt::Display for RollUpWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = serde_json::to_value(self.step)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "roll-up {step} for {} failed: {}", self.entity_id, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderRollUp {
    pub header_id: String,
    pub task_count: usize,
    pub previous_complete: bool,
    pub target_complete: bool,
    pub transition: Transition,
    pub written: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRollUp {
    pub service_id: String,
    pub job_id: String,
    pub header_count: usize,
    pub previous_complete: bool,
    pub target_complete: bool,
    pub transition: Transition,
    pub written: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollUpReport {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderRollUp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRollUp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RollUpWarning>,
}

impl RollUpReport {
    pub(crate) fn warn(&mut self, step: RollUpStep, entity_id: &str, err: &Error) {
        let warning = RollUpWarning::new(step, entity_id, err);
        tracing::warn!(
            step = ?warning.step,
            entity_id,
            kind = warning.kind,
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    /// The header roll-up for `header_id`, if it got far enough to evaluate.
    pub fn header(&self, header_id: &str) -> Option<&HeaderRollUp> {
        self.headers.iter().find(|h| h.header_id == header_id)
    }

    /// Number of parent status writes issued.
    pub fn writes(&self) -> usize {
        self.headers.iter().filter(|h| h.written).count()
            + self.service.iter().filter(|s| s.written).count()
    }

    /// A roll-up step was rejected for invalid credentials; the caller
    /// should discard its session.
    pub fn requires_reauth(&self) -> bool {
        self.warnings.iter().any(RollUpWarning::is_auth)
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A primary task mutation together with the roll-up it triggered.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome<T> {
    #[serde(flatten)]
    pub result: T,
    pub rollup: RollUpReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedTask {
    pub task_id: String,
    pub stamp: CompletionStamp,
    /// The task as re-read after completion, when the re-read succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedTask {
    pub task: Task,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedTask {
    pub task_id: String,
    /// The task was already gone upstream.
    pub already_absent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedHeader {
    pub header: TaskHeader,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedHeader {
    pub header_id: String,
    pub already_absent: bool,
}

/// Result of reconciling every service of a port call.
#[derive(Debug, Clone, Serialize)]
pub struct PortCallRollUp {
    pub job_id: String,
    pub services: Vec<RollUpReport>,
    /// Every service of the port call is complete after reconciliation.
    pub all_services_complete: bool,
}

impl PortCallRollUp {
    pub fn writes(&self) -> usize {
        self.services.iter().map(RollUpReport::writes).sum()
    }

    pub fn requires_reauth(&self) -> bool {
        self.services.iter().any(RollUpReport::requires_reauth)
    }
}
