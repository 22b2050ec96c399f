//! Port-call records as exchanged with the REST API.
//!
//! Field names follow the wire format, including the historical
//! `compleated_*` spelling. Status fields are kept as raw JSON because the
//! upstream store mixes booleans with stringified booleans; use
//! [`crate::rollup::evaluate::normalized_truthy`] to read them.

use serde::{Deserialize, Serialize};

/// A status value exactly as the upstream store returned it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusValue(pub serde_json::Value);

impl StatusValue {
    pub fn flag(value: bool) -> Self {
        Self(serde_json::Value::Bool(value))
    }

    pub fn missing() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<bool> for StatusValue {
    fn from(value: bool) -> Self {
        StatusValue::flag(value)
    }
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        Self(serde_json::Value::String(value.to_string()))
    }
}

/// Completion date and time as stamped on tasks and headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStamp {
    #[serde(rename = "compleated_date")]
    pub date: String,
    #[serde(rename = "compleated_time")]
    pub time: String,
}

impl CompletionStamp {
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
        }
    }

    /// Stamp from the local wall clock.
    pub fn now() -> Self {
        let now = chrono::Local::now();
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "task_id")]
    pub id: String,
    #[serde(default)]
    pub header_id: String,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub status: StatusValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compleated_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compleated_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHeader {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub header_name: String,
    #[serde(default)]
    pub status: StatusValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compleated_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compleated_time: Option<String>,
    /// Embedded task list, when the endpoint includes one. `None` means the
    /// tasks were not loaded, not that the header has no tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

/// A port call service (PCS) engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub id: String,
    pub job_id: String,
    pub service_id: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub status: StatusValue,
}

impl Service {
    /// Record id for a service under a port call: `{job_id}-{service_id}`.
    pub fn derive_id(job_id: &str, service_id: &str) -> String {
        format!("{job_id}-{service_id}")
    }

    /// The record id, derived when the upstream omitted it.
    pub fn record_id(&self) -> String {
        if self.id.trim().is_empty() {
            Self::derive_id(&self.job_id, &self.service_id)
        } else {
            self.id.clone()
        }
    }
}

/// Identifies the service a header belongs to, for service-level roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceScope {
    pub job_id: String,
    pub service_id: String,
}

impl ServiceScope {
    pub fn new(job_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            service_id: service_id.into(),
        }
    }

    pub fn record_id(&self) -> String {
        Service::derive_id(&self.job_id, &self.service_id)
    }
}

/// Task definition used when creating a header with initial tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_name: String,
    pub created_by: String,
}

/// Fields for creating a service under a port call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewService {
    pub job_id: String,
    pub service_id: String,
    pub service_name: String,
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
}
