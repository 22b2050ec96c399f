//! Fetch → evaluate → conditional write across the store clients.
//!
//! Every task mutation runs the same chain: re-read the header's tasks,
//! decide header completion, write the header only when it differs, and
//! with a service scope repeat one level up. Roll-up writes are best-effort;
//! their failures land in the [`RollUpReport`] and never fail the mutation
//! that triggered them.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RollupConfig;
use crate::error::{Error, Result};
use crate::lock::{KeyGuard, KeyLocks};
use crate::model::{CompletionStamp, NewTask, ServiceScope, Task};
use crate::rollup::evaluate::{
    is_header_complete, is_service_complete, normalized_truthy, plan_transition, Transition,
};
use crate::rollup::report::{
    CompletedTask, CreatedHeader, CreatedTask, DeletedHeader, DeletedTask, HeaderRollUp,
    PortCallRollUp, RollUpReport, RollUpStep, ServiceRollUp, TaskOutcome,
};
use crate::store::{require_name, HeaderStore, ServiceStore, TaskStore};

/// Roll-up behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollUpPolicy {
    /// Write `false` to a complete parent that no longer qualifies.
    pub auto_reopen: bool,
    /// Retry a failed transient write once.
    pub retry_transient_writes: bool,
    /// Serialize roll-ups per header and per service.
    pub serialize: bool,
}

impl Default for RollUpPolicy {
    fn default() -> Self {
        Self {
            auto_reopen: true,
            retry_transient_writes: true,
            serialize: true,
        }
    }
}

impl From<&RollupConfig> for RollUpPolicy {
    fn from(config: &RollupConfig) -> Self {
        Self {
            auto_reopen: config.auto_reopen,
            retry_transient_writes: config.retry_transient_writes,
            serialize: config.serialize,
        }
    }
}

pub struct Orchestrator {
    tasks: Arc<dyn TaskStore>,
    headers: Arc<dyn HeaderStore>,
    services: Arc<dyn ServiceStore>,
    policy: RollUpPolicy,
    locks: KeyLocks,
}

impl Orchestrator {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        headers: Arc<dyn HeaderStore>,
        services: Arc<dyn ServiceStore>,
        policy: RollUpPolicy,
    ) -> Self {
        Self {
            tasks,
            headers,
            services,
            policy,
            locks: KeyLocks::new(),
        }
    }

    /// Build from one value implementing all three stores.
    pub fn from_store<S>(store: Arc<S>, policy: RollUpPolicy) -> Self
    where
        S: TaskStore + HeaderStore + ServiceStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, policy)
    }

    // ------------------------------------------------------------------
    // Task mutations
    // ------------------------------------------------------------------

    /// Complete a task stamped with the local clock, then roll up.
    pub async fn complete_task(
        &self,
        header_id: &str,
        task_id: &str,
        scope: Option<&ServiceScope>,
    ) -> Result<TaskOutcome<CompletedTask>> {
        self.complete_task_at(header_id, task_id, CompletionStamp::now(), scope)
            .await
    }

    pub async fn complete_task_at(
        &self,
        header_id: &str,
        task_id: &str,
        stamp: CompletionStamp,
        scope: Option<&ServiceScope>,
    ) -> Result<TaskOutcome<CompletedTask>> {
        self.tasks.complete_task(task_id, &stamp).await?;
        info!(task_id, header_id, date = %stamp.date, time = %stamp.time, "task completed");

        let mut rollup = RollUpReport::default();
        let tasks = self.roll_up_header_into(header_id, &mut rollup).await;
        if let Some(scope) = scope {
            self.roll_up_service_into(scope, &mut rollup).await;
        }

        let task = tasks.and_then(|tasks| tasks.into_iter().find(|t| t.id == task_id));
        Ok(TaskOutcome {
            result: CompletedTask {
                task_id: task_id.to_string(),
                stamp,
                task,
            },
            rollup,
        })
    }

    /// Add an incomplete task; a complete header may reopen.
    pub async fn create_task(
        &self,
        header_id: &str,
        task_name: &str,
        created_by: &str,
        scope: Option<&ServiceScope>,
    ) -> Result<TaskOutcome<CreatedTask>> {
        require_name("task_name", task_name)?;
        let task = self
            .tasks
            .create_task(header_id, task_name, created_by)
            .await?;
        info!(task_id = %task.id, header_id, "task created");

        let rollup = self.roll_up_header(header_id, scope).await;
        Ok(TaskOutcome {
            result: CreatedTask { task },
            rollup,
        })
    }

    /// Delete a task. A task that is already gone counts as deleted.
    pub async fn delete_task(
        &self,
        header_id: &str,
        task_id: &str,
        scope: Option<&ServiceScope>,
    ) -> Result<TaskOutcome<DeletedTask>> {
        let already_absent = match self.tasks.delete_task(task_id).await {
            Ok(()) => false,
            Err(err) if err.is_not_found() => {
                info!(task_id, header_id, "task already deleted");
                true
            }
            Err(err) => return Err(err),
        };

        let rollup = self.roll_up_header(header_id, scope).await;
        Ok(TaskOutcome {
            result: DeletedTask {
                task_id: task_id.to_string(),
                already_absent,
            },
            rollup,
        })
    }

    /// Tasks only move from incomplete to complete.
    pub fn reopen_task(task_id: &str) -> Result<()> {
        Err(Error::UnsupportedOperation(format!(
            "task {task_id} is complete; reopening tasks is not supported"
        )))
    }

    // ------------------------------------------------------------------
    // Header mutations (structural changes under a service)
    // ------------------------------------------------------------------

    pub async fn create_header(
        &self,
        scope: &ServiceScope,
        header_name: &str,
        created_by: &str,
        initial_tasks: &[NewTask],
    ) -> Result<TaskOutcome<CreatedHeader>> {
        require_name("header_name", header_name)?;
        let header = self
            .headers
            .create_header(
                &scope.job_id,
                &scope.service_id,
                header_name,
                created_by,
                initial_tasks,
            )
            .await?;
        info!(
            header_id = %header.id,
            job_id = %scope.job_id,
            service_id = %scope.service_id,
            "header created"
        );

        let mut rollup = RollUpReport::default();
        self.roll_up_service_into(scope, &mut rollup).await;
        Ok(TaskOutcome {
            result: CreatedHeader { header },
            rollup,
        })
    }

    pub async fn delete_header(
        &self,
        scope: &ServiceScope,
        header_id: &str,
    ) -> Result<TaskOutcome<DeletedHeader>> {
        let already_absent = match self.headers.delete_header(header_id).await {
            Ok(()) => false,
            Err(err) if err.is_not_found() => {
                info!(header_id, "header already deleted");
                true
            }
            Err(err) => return Err(err),
        };

        let mut rollup = RollUpReport::default();
        self.roll_up_service_into(scope, &mut rollup).await;
        Ok(TaskOutcome {
            result: DeletedHeader {
                header_id: header_id.to_string(),
                already_absent,
            },
            rollup,
        })
    }

    // ------------------------------------------------------------------
    // Roll-up entry points (also the manual reconcile path)
    // ------------------------------------------------------------------

    /// Bring one header, and its service when scoped, in line.
    pub async fn roll_up_header(
        &self,
        header_id: &str,
        scope: Option<&ServiceScope>,
    ) -> RollUpReport {
        let mut report = RollUpReport::default();
        self.roll_up_header_into(header_id, &mut report).await;
        if let Some(scope) = scope {
            self.roll_up_service_into(scope, &mut report).await;
        }
        report
    }

    /// Re-evaluate one service from its headers.
    pub async fn roll_up_service(&self, scope: &ServiceScope) -> RollUpReport {
        let mut report = RollUpReport::default();
        self.roll_up_service_into(scope, &mut report).await;
        report
    }

    /// Reconcile every header and service of a port call.
    ///
    /// Listing the port call's services is the primary action here and its
    /// failure is returned; everything after it is best-effort.
    pub async fn reconcile_port_call(&self, job_id: &str) -> Result<PortCallRollUp> {
        let services = self.services.list_services_for_port_call(job_id).await?;
        debug!(job_id, count = services.len(), "reconciling port call");

        let mut reports = Vec::with_capacity(services.len());
        for service in &services {
            let scope = ServiceScope::new(service.job_id.clone(), service.service_id.clone());
            let mut report = RollUpReport::default();
            match self
                .headers
                .list_headers_for_service(&scope.job_id, &scope.service_id)
                .await
            {
                Ok(headers) => {
                    for header in &headers {
                        self.roll_up_header_into(&header.id, &mut report).await;
                    }
                }
                Err(err) => report.warn(RollUpStep::ListHeaders, &scope.record_id(), &err),
            }
            self.roll_up_service_into(&scope, &mut report).await;
            reports.push(report);
        }

        let all_services_complete = !reports.is_empty()
            && reports.iter().all(|report| {
                report
                    .service
                    .as_ref()
                    .map(|service| service.target_complete)
                    .unwrap_or(false)
            });

        Ok(PortCallRollUp {
            job_id: job_id.to_string(),
            services: reports,
            all_services_complete,
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn lock(&self, key: String) -> Option<KeyGuard> {
        if self.policy.serialize {
            Some(self.locks.acquire(&key).await)
        } else {
            None
        }
    }

    /// Header stage. Returns the tasks it evaluated, if it got that far.
    async fn roll_up_header_into(
        &self,
        header_id: &str,
        report: &mut RollUpReport,
    ) -> Option<Vec<Task>> {
        let _guard = self.lock(format!("header:{header_id}")).await;

        let tasks = match self.tasks.list_tasks_for_header(header_id).await {
            Ok(tasks) => tasks,
            Err(err) => {
                report.warn(RollUpStep::ListTasks, header_id, &err);
                return None;
            }
        };
        let target = is_header_complete(&tasks);

        let header = match self.headers.get_header(header_id).await {
            Ok(header) => header,
            Err(err) => {
                report.warn(RollUpStep::GetHeader, header_id, &err);
                return Some(tasks);
            }
        };
        let current = normalized_truthy(&header.status);
        let transition = plan_transition(current, target, self.policy.auto_reopen);
        debug!(header_id, tasks = tasks.len(), current, target, ?transition, "header evaluated");

        let written = match transition.write_value() {
            Some(value) => {
                let ok = self
                    .write_with_retry(RollUpStep::WriteHeader, header_id, report, || {
                        self.headers.set_header_status(header_id, value)
                    })
                    .await;
                if ok {
                    info!(header_id, complete = value, "header status updated");
                }
                ok
            }
            None => {
                if transition == Transition::Suppressed {
                    debug!(header_id, "header no longer complete; auto-reopen disabled");
                }
                false
            }
        };

        report.headers.push(HeaderRollUp {
            header_id: header_id.to_string(),
            task_count: tasks.len(),
            previous_complete: current,
            target_complete: target,
            transition,
            written,
        });
        Some(tasks)
    }

    /// Service stage: list, hydrate, evaluate, compare, write.
    async fn roll_up_service_into(&self, scope: &ServiceScope, report: &mut RollUpReport) {
        let record_id = scope.record_id();
        let _guard = self.lock(format!("service:{record_id}")).await;

        let mut headers = match self
            .headers
            .list_headers_for_service(&scope.job_id, &scope.service_id)
            .await
        {
            Ok(headers) => headers,
            Err(err) => {
                report.warn(RollUpStep::ListHeaders, &record_id, &err);
                return;
            }
        };

        for header in headers.iter_mut().filter(|h| h.tasks.is_none()) {
            match self.tasks.list_tasks_for_header(&header.id).await {
                Ok(tasks) => header.tasks = Some(tasks),
                Err(err) => {
                    // Without every header's tasks the service cannot be judged.
                    report.warn(RollUpStep::HydrateHeader, &header.id, &err);
                    return;
                }
            }
        }
        let target = is_service_complete(&headers);

        let services = match self
            .services
            .list_services_for_port_call(&scope.job_id)
            .await
        {
            Ok(services) => services,
            Err(err) => {
                report.warn(RollUpStep::ListServices, &record_id, &err);
                return;
            }
        };
        let Some(service) = services.iter().find(|s| s.record_id() == record_id) else {
            report.warn(
                RollUpStep::ListServices,
                &record_id,
                &Error::not_found("service", record_id.clone()),
            );
            return;
        };

        let current = normalized_truthy(&service.status);
        let transition = plan_transition(current, target, self.policy.auto_reopen);
        debug!(
            service_id = %record_id,
            headers = headers.len(),
            current,
            target,
            ?transition,
            "service evaluated"
        );

        let written = match transition.write_value() {
            Some(value) => {
                let ok = self
                    .write_with_retry(RollUpStep::WriteService, &record_id, report, || {
                        self.services.set_service_status(&record_id, value)
                    })
                    .await;
                if ok {
                    info!(service_id = %record_id, complete = value, "service status updated");
                }
                ok
            }
            None => false,
        };

        report.service = Some(ServiceRollUp {
            service_id: record_id.clone(),
            job_id: scope.job_id.clone(),
            header_count: headers.len(),
            previous_complete: current,
            target_complete: target,
            transition,
            written,
        });
    }

    /// Run a status write, retrying once on a transient failure when the
    /// policy allows. Returns whether the write landed.
    async fn write_with_retry<F, Fut>(
        &self,
        step: RollUpStep,
        entity_id: &str,
        report: &mut RollUpReport,
        mut write: F,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let err = match write().await {
            Ok(()) => return true,
            Err(err) => err,
        };

        if err.is_retryable() && self.policy.retry_transient_writes {
            warn!(entity_id, error = %err, "status write failed; retrying once");
            match write().await {
                Ok(()) => return true,
                Err(retry_err) => {
                    report.warn(step, entity_id, &retry_err);
                    return false;
                }
            }
        }

        report.warn(step, entity_id, &err);
        false
    }
}
