//! HTTP store clients for the port-call REST API.
//!
//! Every request carries `Authorization: Bearer <token>` from the session.
//! Non-success statuses are classified by [`Error::from_status`] so a 401
//! stays distinguishable from everything else.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{Config, Conventions, StatusConvention};
use crate::error::{Error, Result};
use crate::model::{CompletionStamp, NewService, NewTask, Service, StatusValue, Task, TaskHeader};
use crate::session::Session;
use crate::store::{require_name, HeaderStore, ServiceStore, TaskStore};

/// `{ success, data }` response body used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: Option<bool>,
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn check(self, action: &str) -> Result<Self> {
        if self.success == Some(false) {
            let message = self
                .message
                .unwrap_or_else(|| "upstream reported failure".to_string());
            return Err(Error::Transient(format!("{action}: {message}")));
        }
        Ok(self)
    }
}

/// Store client backed by the REST API; implements all three store traits.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: Url,
    http: Client,
    session: Session,
    conventions: Conventions,
}

impl HttpStore {
    pub fn new(base_url: &str, session: Session) -> Result<Self> {
        Self::with_client(base_url, session, Client::new(), Conventions::default())
    }

    /// Build from configuration: base URL, timeout and status conventions.
    pub fn from_config(config: &Config, session: Session) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.api.timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        let conventions = config.conventions.resolve();
        Self::with_client(&config.api.base_url, session, http, conventions)
    }

    pub fn with_client(
        base_url: &str,
        session: Session,
        http: Client,
        conventions: Conventions,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| Error::InvalidConfig(format!("api.base_url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "api.base_url '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            base_url,
            http,
            session,
            conventions,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig("api.base_url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        entity: &'static str,
        id: &str,
    ) -> Result<Response> {
        let response = request
            .header(AUTHORIZATION, self.session.bearer())
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = Error::from_status(status.as_u16(), entity, id, &body);
        if err.is_auth() {
            warn!(entity, id, "request rejected: credentials invalid or expired");
        } else {
            debug!(entity, id, status = status.as_u16(), "request failed");
        }
        Err(err)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        entity: &'static str,
        id: &str,
        action: &str,
    ) -> Result<Envelope<T>> {
        let response = self.send(request, entity, id).await?;
        let envelope = response.json::<Envelope<T>>().await?;
        envelope.check(action)
    }

    /// For endpoints answering `{ success }` only.
    async fn acknowledge(
        &self,
        request: RequestBuilder,
        entity: &'static str,
        id: &str,
        action: &str,
    ) -> Result<()> {
        self.fetch::<serde_json::Value>(request, entity, id, action)
            .await
            .map(|_| ())
    }

    fn task_from_wire(&self, mut task: Task) -> Task {
        task.status = from_wire(self.conventions.task, &task.status);
        task
    }

    fn header_from_wire(&self, mut header: TaskHeader) -> TaskHeader {
        header.status = from_wire(self.conventions.header, &header.status);
        header.tasks = header
            .tasks
            .map(|tasks| tasks.into_iter().map(|t| self.task_from_wire(t)).collect());
        header
    }

    fn service_from_wire(&self, mut service: Service) -> Service {
        service.status = from_wire(self.conventions.service, &service.status);
        if service.id.trim().is_empty() {
            service.id = service.record_id();
        }
        service
    }
}

/// Rewrite an upstream status into `true = complete`. Values under the
/// default convention pass through untouched so the evaluator still sees
/// the raw shape. Only real flags are inverted: a missing or malformed
/// status stays as it is and therefore reads as incomplete.
fn from_wire(convention: StatusConvention, status: &StatusValue) -> StatusValue {
    match (convention, wire_flag(status)) {
        (StatusConvention::PendingIsTrue, Some(flag)) => {
            StatusValue::flag(convention.translate(flag))
        }
        _ => status.clone(),
    }
}

fn wire_flag(status: &StatusValue) -> Option<bool> {
    match status.raw() {
        serde_json::Value::Bool(flag) => Some(*flag),
        serde_json::Value::String(text) if text == "true" => Some(true),
        serde_json::Value::String(text) if text == "false" => Some(false),
        _ => None,
    }
}

fn require_data<T>(data: Option<T>, entity: &'static str, id: &str) -> Result<T> {
    data.ok_or_else(|| Error::not_found(entity, id))
}

#[async_trait]
impl TaskStore for HttpStore {
    async fn list_tasks_for_header(&self, header_id: &str) -> Result<Vec<Task>> {
        let url = self.endpoint(&["servicetask", "tasks", "header", header_id])?;
        let envelope: Envelope<Vec<Task>> = self
            .fetch(self.http.get(url), "header", header_id, "list tasks")
            .await?;
        let tasks: Vec<Task> = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|task| self.task_from_wire(task))
            .collect();
        debug!(header_id, count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    async fn create_task(
        &self,
        header_id: &str,
        task_name: &str,
        created_by: &str,
    ) -> Result<Task> {
        require_name("task_name", task_name)?;
        let url = self.endpoint(&["servicetask", "tasks"])?;
        let body = json!({
            "header_id": header_id,
            "task_name": task_name.trim(),
            "created_by": created_by,
            "status": self.conventions.task.translate(false),
        });
        let envelope: Envelope<Task> = self
            .fetch(self.http.post(url).json(&body), "header", header_id, "create task")
            .await?;
        let task = envelope.data.ok_or_else(|| {
            Error::OperationFailed("create task: response had no data".to_string())
        })?;
        Ok(self.task_from_wire(task))
    }

    async fn complete_task(&self, task_id: &str, stamp: &CompletionStamp) -> Result<()> {
        let url = self.endpoint(&["servicetask", "tasks", "complete"])?;
        let body = json!({
            "task_id": task_id,
            "compleated_date": stamp.date,
            "compleated_time": stamp.time,
        });
        self.acknowledge(self.http.post(url).json(&body), "task", task_id, "complete task")
            .await
    }

    async fn delete_task(&self, task_id: &str) -> Result<()> {
        let url = self.endpoint(&["servicetask", "tasks", task_id])?;
        self.acknowledge(self.http.delete(url), "task", task_id, "delete task")
            .await
    }
}

#[async_trait]
impl HeaderStore for HttpStore {
    async fn list_headers_for_service(
        &self,
        job_id: &str,
        service_id: &str,
    ) -> Result<Vec<TaskHeader>> {
        let url = self.endpoint(&["servicetask", "headers"])?;
        let request = self
            .http
            .get(url)
            .query(&[("job_id", job_id), ("service_id", service_id)]);
        let scope = format!("{job_id}/{service_id}");
        let envelope: Envelope<Vec<TaskHeader>> =
            self.fetch(request, "service", &scope, "list headers").await?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|header| self.header_from_wire(header))
            .collect())
    }

    async fn get_header(&self, header_id: &str) -> Result<TaskHeader> {
        let url = self.endpoint(&["servicetask", "headers", header_id])?;
        let envelope: Envelope<TaskHeader> = self
            .fetch(self.http.get(url), "header", header_id, "get header")
            .await?;
        let header = require_data(envelope.data, "header", header_id)?;
        Ok(self.header_from_wire(header))
    }

    async fn set_header_status(&self, header_id: &str, complete: bool) -> Result<()> {
        let url = self.endpoint(&["servicetask", "headers", header_id])?;
        let body = json!({ "status": self.conventions.header.translate(complete) });
        self.acknowledge(
            self.http.patch(url).json(&body),
            "header",
            header_id,
            "set header status",
        )
        .await
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
        let url = self.endpoint(&["servicetask", "headers"])?;
        let incomplete_task = self.conventions.task.translate(false);
        let tasks: Vec<serde_json::Value> = initial_tasks
            .iter()
            .map(|task| {
                json!({
                    "task_name": task.task_name.trim(),
                    "created_by": task.created_by,
                    "status": incomplete_task,
                })
            })
            .collect();
        let body = json!({
            "job_id": job_id,
            "service_id": service_id,
            "header_name": header_name.trim(),
            "created_by": created_by,
            "status": self.conventions.header.translate(false),
            "tasks": tasks,
        });
        let scope = format!("{job_id}/{service_id}");
        let envelope: Envelope<TaskHeader> = self
            .fetch(self.http.post(url).json(&body), "service", &scope, "create header")
            .await?;
        let header = envelope.data.ok_or_else(|| {
            Error::OperationFailed("create header: response had no data".to_string())
        })?;
        Ok(self.header_from_wire(header))
    }

    async fn delete_header(&self, header_id: &str) -> Result<()> {
        let url = self.endpoint(&["servicetask", "headers", header_id])?;
        self.acknowledge(self.http.delete(url), "header", header_id, "delete header")
            .await
    }
}

#[async_trait]
impl ServiceStore for HttpStore {
    async fn list_services_for_port_call(&self, job_id: &str) -> Result<Vec<Service>> {
        let url = self.endpoint(&["pcs", "job", job_id])?;
        let envelope: Envelope<Vec<Service>> = self
            .fetch(self.http.get(url), "port call", job_id, "list services")
            .await?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|service| self.service_from_wire(service))
            .collect())
    }

    async fn set_service_status(&self, service_id: &str, complete: bool) -> Result<()> {
        let url = self.endpoint(&["pcs", service_id])?;
        let body = json!({ "status": self.conventions.service.translate(complete) });
        self.acknowledge(
            self.http.patch(url).json(&body),
            "service",
            service_id,
            "set service status",
        )
        .await
    }

    async fn create_service(&self, service: &NewService) -> Result<Service> {
        require_name("job_id", &service.job_id)?;
        require_name("service_id", &service.service_id)?;
        require_name("service_name", &service.service_name)?;
        let url = self.endpoint(&["pcs"])?;
        let body = json!({
            "job_id": service.job_id,
            "service_id": service.service_id,
            "service_name": service.service_name.trim(),
            "vendor_id": service.vendor_id,
            "vendor_name": service.vendor_name,
            "status": self.conventions.service.translate(false),
        });
        let envelope: Envelope<Service> = self
            .fetch(
                self.http.post(url).json(&body),
                "port call",
                &service.job_id,
                "create service",
            )
            .await?;
        let created = envelope.data.ok_or_else(|| {
            Error::OperationFailed("create service: response had no data".to_string())
        })?;
        Ok(self.service_from_wire(created))
    }

    async fn delete_service(&self, service_id: &str) -> Result<()> {
        let url = self.endpoint(&["pcs", service_id])?;
        self.acknowledge(self.http.delete(url), "service", service_id, "delete service")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::evaluate::normalized_truthy;

    fn store(base: &str) -> HttpStore {
        HttpStore::new(base, Session::new("tok", "ops").expect("session")).expect("store")
    }

    #[test]
    fn endpoint_appends_encoded_segments() {
        let store = store("http://localhost:8080/api/");
        let url = store
            .endpoint(&["servicetask", "tasks", "header", "h 1/x"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/servicetask/tasks/header/h%201%2Fx"
        );
    }

    #[test]
    fn invalid_base_url_rejected() {
        let session = Session::new("tok", "ops").expect("session");
        assert!(matches!(
            HttpStore::new("not a url", session.clone()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            HttpStore::new("mailto:ops@example.com", session),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn pending_convention_inverts_on_read() {
        let status = from_wire(StatusConvention::PendingIsTrue, &StatusValue::from("true"));
        assert_eq!(status, StatusValue::flag(false));
        let raw = StatusValue::from("true");
        assert_eq!(from_wire(StatusConvention::CompleteIsTrue, &raw), raw);
    }

    #[test]
    fn pending_convention_keeps_missing_status_incomplete() {
        for raw in [StatusValue::missing(), StatusValue::from("yes"), StatusValue::from("")] {
            let status = from_wire(StatusConvention::PendingIsTrue, &raw);
            assert_eq!(status, raw);
            assert!(!normalized_truthy(&status));
        }
    }
}
