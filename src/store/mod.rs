//! Store clients for tasks, task headers and port-call services.
//!
//! The roll-up engine only talks to these traits. [`http::HttpStore`] backs
//! them with the port-call REST API; [`memory::MemoryStore`] keeps records in
//! process and records every status write.
//!
//! Status booleans crossing these traits always mean `true = complete`.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{CompletionStamp, NewService, NewTask, Service, Task, TaskHeader};

pub mod http;
pub mod memory;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks under a header; empty when it has none.
    async fn list_tasks_for_header(&self, header_id: &str) -> Result<Vec<Task>>;

    /// Create an incomplete task. Empty names are a validation error.
    async fn create_task(&self, header_id: &str, task_name: &str, created_by: &str)
        -> Result<Task>;

    /// Mark a task complete and stamp it. Completing twice re-stamps.
    async fn complete_task(&self, task_id: &str, stamp: &CompletionStamp) -> Result<()>;

    /// Remove a task. Returns `NotFound` when it is already gone.
    async fn delete_task(&self, task_id: &str) -> Result<()>;
}

#[async_trait]
pub trait HeaderStore: Send + Sync {
    async fn list_headers_for_service(&self, job_id: &str, service_id: &str)
        -> Result<Vec<TaskHeader>>;

    async fn get_header(&self, header_id: &str) -> Result<TaskHeader>;

    /// Unconditional write; callers check the current status first.
    async fn set_header_status(&self, header_id: &str, complete: bool) -> Result<()>;

    async fn create_header(
        &self,
        job_id: &str,
        service_id: &str,
        header_name: &str,
        created_by: &str,
        initial_tasks: &[NewTask],
    ) -> Result<TaskHeader>;

    /// Removes the header; the store deletes its tasks with it.
    async fn delete_header(&self, header_id: &str) -> Result<()>;
}

#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn list_services_for_port_call(&self, job_id: &str) -> Result<Vec<Service>>;

    /// `service_id` is the service record id (`{job_id}-{service_id}`).
    async fn set_service_status(&self, service_id: &str, complete: bool) -> Result<()>;

    async fn create_service(&self, service: &NewService) -> Result<Service>;

    async fn delete_service(&self, service_id: &str) -> Result<()>;
}

/// Reject blank names before any request is made.
pub(crate) fn require_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::error::Error::Validation(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(())
}
