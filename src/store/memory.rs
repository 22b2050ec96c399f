//! In-process store clients.
//!
//! Keeps tasks, headers and services in memory, records every status write,
//! and can be told to fail specific calls. Backs the roll-up test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{CompletionStamp, NewService, NewTask, Service, StatusValue, Task, TaskHeader};
use crate::store::{require_name, HeaderStore, ServiceStore, TaskStore};

/// Store calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListTasks,
    CompleteTask,
    GetHeader,
    SetHeaderStatus,
    ListHeaders,
    SetServiceStatus,
}

/// Error class an injected failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Transient,
    Auth,
    NotFound,
}

impl Fault {
    fn into_error(self, entity: &'static str, id: &str) -> Error {
        match self {
            Fault::Transient => Error::Transient(format!("injected failure for {entity} {id}")),
            Fault::Auth => Error::Auth("injected: token expired".to_string()),
            Fault::NotFound => Error::not_found(entity, id),
        }
    }
}

/// Which parent a recorded status write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteTarget {
    Header,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusWrite {
    pub target: WriteTarget,
    pub id: String,
    pub complete: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    tasks: BTreeMap<String, Task>,
    headers: BTreeMap<String, TaskHeader>,
    services: BTreeMap<String, Service>,
    writes: Vec<StatusWrite>,
    faults: HashMap<FailPoint, (Fault, usize)>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn take_fault(&mut self, point: FailPoint) -> Option<Fault> {
        let (fault, remaining) = self.faults.get_mut(&point)?;
        let fault = *fault;
        *remaining -= 1;
        if *remaining == 0 {
            self.faults.remove(&point);
        }
        Some(fault)
    }

    fn tasks_for(&self, header_id: &str) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|task| task.header_id == header_id)
            .cloned()
            .collect()
    }
}

/// In-memory implementation of all three store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    embed_tasks: bool,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include each header's tasks when listing headers for a service.
    pub fn with_embedded_tasks(mut self) -> Self {
        self.embed_tasks = true;
        self
    }

    /// Delay every read, widening the window between read and write.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(&self, point: FailPoint, entity: &'static str, id: &str) -> Result<()> {
        match self.state().take_fault(point) {
            Some(fault) => Err(fault.into_error(entity, id)),
            None => Ok(()),
        }
    }

    /// Fail the next `times` calls at `point`.
    pub fn fail(&self, point: FailPoint, fault: Fault, times: usize) {
        if times == 0 {
            return;
        }
        self.state().faults.insert(point, (fault, times));
    }

    pub fn seed_service(&self, job_id: &str, service_id: &str, complete: bool) -> String {
        let id = Service::derive_id(job_id, service_id);
        let service = Service {
            id: id.clone(),
            job_id: job_id.to_string(),
            service_id: service_id.to_string(),
            service_name: service_id.to_string(),
            vendor_id: None,
            vendor_name: None,
            status: StatusValue::flag(complete),
        };
        self.state().services.insert(id.clone(), service);
        id
    }

    pub fn seed_header(
        &self,
        job_id: &str,
        service_id: &str,
        header_name: &str,
        status: impl Into<StatusValue>,
    ) -> String {
        let mut state = self.state();
        let id = state.next_id("hdr");
        state.headers.insert(
            id.clone(),
            TaskHeader {
                id: id.clone(),
                job_id: job_id.to_string(),
                service_id: service_id.to_string(),
                header_name: header_name.to_string(),
                status: status.into(),
                created_by: None,
                compleated_date: None,
                compleated_time: None,
                tasks: None,
            },
        );
        id
    }

    pub fn seed_task(
        &self,
        header_id: &str,
        task_name: &str,
        status: impl Into<StatusValue>,
    ) -> String {
        let mut state = self.state();
        let id = state.next_id("task");
        state.tasks.insert(
            id.clone(),
            Task {
                id: id.clone(),
                header_id: header_id.to_string(),
                task_name: task_name.to_string(),
                status: status.into(),
                created_by: None,
                compleated_date: None,
                compleated_time: None,
            },
        );
        id
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.state().tasks.get(task_id).cloned()
    }

    pub fn header(&self, header_id: &str) -> Option<TaskHeader> {
        self.state().headers.get(header_id).cloned()
    }

    pub fn service(&self, service_id: &str) -> Option<Service> {
        self.state().services.get(service_id).cloned()
    }

    /// Every status write issued so far, in order.
    pub fn status_writes(&self) -> Vec<StatusWrite> {
        self.state().writes.clone()
    }

    pub fn writes_to(&self, target: WriteTarget, id: &str) -> Vec<bool> {
        self.state()
            .writes
            .iter()
            .filter(|write| write.target == target && write.id == id)
            .map(|write| write.complete)
            .collect()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list_tasks_for_header(&self, header_id: &str) -> Result<Vec<Task>> {
        self.pause().await;
        self.check(FailPoint::ListTasks, "header", header_id)?;
        Ok(self.state().tasks_for(header_id))
    }

    async fn create_task(
        &self,
        header_id: &str,
        task_name: &str,
        created_by: &str,
    ) -> Result<Task> {
        require_name("task_name", task_name)?;
        let mut state = self.state();
        if !state.headers.contains_key(header_id) {
            return Err(Error::not_found("header", header_id));
        }
        let id = state.next_id("task");
        let task = Task {
            id: id.clone(),
            header_id: header_id.to_string(),
            task_name: task_name.trim().to_string(),
            status: StatusValue::flag(false),
            created_by: Some(created_by.to_string()),
            compleated_date: None,
            compleated_time: None,
        };
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn complete_task(&self, task_id: &str, stamp: &CompletionStamp) -> Result<()> {
        self.check(FailPoint::CompleteTask, "task", task_id)?;
        let mut state = self.state();
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::not_found("task", task_id))?;
        task.status = StatusValue::flag(true);
        task.compleated_date = Some(stamp.date.clone());
        task.compleated_time = Some(stamp.time.clone());
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<()> {
        self.state()
            .tasks
            .remove(task_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("task", task_id))
    }
}

#[async_trait]
impl HeaderStore for MemoryStore {
    async fn list_headers_for_service(
        &self,
        job_id: &str,
        service_id: &str,
    ) -> Result<Vec<TaskHeader>> {
        self.pause().await;
        self.check(FailPoint::ListHeaders, "service", service_id)?;
        let state = self.state();
        Ok(state
            .headers
            .values()
            .filter(|header| header.job_id == job_id && header.service_id == service_id)
            .map(|header| {
                let mut header = header.clone();
                if self.embed_tasks {
                    header.tasks = Some(state.tasks_for(&header.id));
                }
                header
            })
            .collect())
    }

    async fn get_header(&self, header_id: &str) -> Result<TaskHeader> {
        self.pause().await;
        self.check(FailPoint::GetHeader, "header", header_id)?;
        self.header(header_id)
            .ok_or_else(|| Error::not_found("header", header_id))
    }

    async fn set_header_status(&self, header_id: &str, complete: bool) -> Result<()> {
        self.check(FailPoint::SetHeaderStatus, "header", header_id)?;
        let mut state = self.state();
        let header = state
            .headers
            .get_mut(header_id)
            .ok_or_else(|| Error::not_found("header", header_id))?;
        header.status = StatusValue::flag(complete);
        state.writes.push(StatusWrite {
            target: WriteTarget::Header,
            id: header_id.to_string(),
            complete,
        });
        Ok(())
    }

    async fn create_header(
        &self,
        job_id: &str,
        service_id: &str,
        header_name: &str,
        created_by: &str,
        initial_tasks: &[NewTask],
    ) -> Result<TaskHeader> {
        require_name("header_name", header_name)?;
        for task in initial_tasks {
            require_name("task_name", &task.task_name)?;
        }
        let mut state = self.state();
        let id = state.next_id("hdr");
        let mut tasks = Vec::with_capacity(initial_tasks.len());
        for new_task in initial_tasks {
            let task_id = state.next_id("task");
            let task = Task {
                id: task_id.clone(),
                header_id: id.clone(),
                task_name: new_task.task_name.trim().to_string(),
                status: StatusValue::flag(false),
                created_by: Some(new_task.created_by.clone()),
                compleated_date: None,
                compleated_time: None,
            };
            state.tasks.insert(task_id, task.clone());
            tasks.push(task);
        }
        let header = TaskHeader {
            id: id.clone(),
            job_id: job_id.to_string(),
            service_id: service_id.to_string(),
            header_name: header_name.trim().to_string(),
            status: StatusValue::flag(false),
            created_by: Some(created_by.to_string()),
            compleated_date: None,
            compleated_time: None,
            tasks: None,
        };
        state.headers.insert(id, header.clone());
        Ok(TaskHeader {
            tasks: Some(tasks),
            ..header
        })
    }

    async fn delete_header(&self, header_id: &str) -> Result<()> {
        let mut state = self.state();
        if state.headers.remove(header_id).is_none() {
            return Err(Error::not_found("header", header_id));
        }
        state.tasks.retain(|_, task| task.header_id != header_id);
        Ok(())
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn list_services_for_port_call(&self, job_id: &str) -> Result<Vec<Service>> {
        self.pause().await;
        Ok(self
            .state()
            .services
            .values()
            .filter(|service| service.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn set_service_status(&self, service_id: &str, complete: bool) -> Result<()> {
        self.check(FailPoint::SetServiceStatus, "service", service_id)?;
        let mut state = self.state();
        let service = state
            .services
            .get_mut(service_id)
            .ok_or_else(|| Error::not_found("service", service_id))?;
        service.status = StatusValue::flag(complete);
        state.writes.push(StatusWrite {
            target: WriteTarget::Service,
            id: service_id.to_string(),
            complete,
        });
        Ok(())
    }

    async fn create_service(&self, service: &NewService) -> Result<Service> {
        require_name("job_id", &service.job_id)?;
        require_name("service_id", &service.service_id)?;
        require_name("service_name", &service.service_name)?;
        let id = Service::derive_id(&service.job_id, &service.service_id);
        let mut state = self.state();
        if state.services.contains_key(&id) {
            return Err(Error::Validation(format!("service {id} already exists")));
        }
        let created = Service {
            id: id.clone(),
            job_id: service.job_id.clone(),
            service_id: service.service_id.clone(),
            service_name: service.service_name.trim().to_string(),
            vendor_id: service.vendor_id.clone(),
            vendor_name: service.vendor_name.clone(),
            status: StatusValue::flag(false),
        };
        state.services.insert(id, created.clone());
        Ok(created)
    }

    async fn delete_service(&self, service_id: &str) -> Result<()> {
        self.state()
            .services
            .remove(service_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("service", service_id))
    }
}
