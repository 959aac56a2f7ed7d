//! reqwest-backed implementation of every flow service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use focusflow_core::breakdown::{BreakdownProposal, ComplexityLevel};
use focusflow_core::context_switch::ContextSwitchDecision;
use focusflow_core::draft::NewTask;
use focusflow_core::environment::EnvironmentCheckRecord;
use focusflow_core::error::ServiceError;
use focusflow_core::services::{
    Ack, BreakdownService, ContextSwitchEvaluator, EnvironmentCheckService, SessionLauncher,
    TaskCreationService,
};
use focusflow_core::session::{SessionHandle, SessionRequest};
use focusflow_core::task::{CreatedTask, Subtask, SubtaskInput, TaskId};

use crate::api::{
    ApiResponse, BreakdownData, BreakdownRequest, NewSubtasks, SwitchCheck, SwitchConfirm,
    classify_status,
};

pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.api_token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ServiceError::Validation(format!("api token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::Network(format!("build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<Uuid>,
    ) -> Result<ApiResponse<T>, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body), idempotency_key).await
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse<serde_json::Value>, ServiceError> {
        self.send::<(), _>(Method::DELETE, path, None, None).await
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        idempotency_key: Option<Uuid>,
    ) -> Result<ApiResponse<T>, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, %method, "request");

        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(key) = idempotency_key {
            req = req.header(IDEMPOTENCY_KEY, key.to_string());
        }

        let resp = req.send().await.map_err(|e| self.transport(e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport(e))?;
        debug!(%url, status = status.as_u16(), "response");

        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
                .ok()
                .and_then(|env| env.reason())
                .unwrap_or_else(|| text.trim().to_string());
            return Err(classify_status(status.as_u16(), message));
        }

        let env: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|e| ServiceError::Decode(format!("{path}: {e}")))?;
        if !env.success {
            return Err(ServiceError::Rejected {
                status: status.as_u16(),
                message: env.reason().unwrap_or_else(|| "request failed".to_string()),
            });
        }
        Ok(env)
    }

    fn transport(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout.as_secs())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

fn require<T>(env: ApiResponse<T>, what: &str) -> Result<T, ServiceError> {
    env.data
        .ok_or_else(|| ServiceError::Decode(format!("{what} response has no data")))
}

fn ack<T>(env: ApiResponse<T>) -> Ack {
    Ack {
        message: env.message,
    }
}

#[async_trait]
impl TaskCreationService for HttpBackend {
    async fn create_task(&self, task: &NewTask, request_token: Uuid) -> Result<CreatedTask, ServiceError> {
        let env = self.post("tasks", task, Some(request_token)).await?;
        require(env, "task")
    }

    async fn create_subtasks(
        &self,
        task_id: TaskId,
        subtasks: &[SubtaskInput],
    ) -> Result<Vec<Subtask>, ServiceError> {
        let body = NewSubtasks::from_inputs(subtasks);
        let env = self
            .post(&format!("tasks/{task_id}/subtasks"), &body, None)
            .await?;
        require(env, "subtasks")
    }

    /// The backend only appends, so the old rows are deleted first.
    async fn replace_subtasks(
        &self,
        task_id: TaskId,
        existing: &[Subtask],
        subtasks: &[SubtaskInput],
    ) -> Result<Vec<Subtask>, ServiceError> {
        for old in existing {
            self.delete(&format!("subtasks/{}", old.id)).await?;
        }
        debug!(%task_id, removed = existing.len(), "old subtasks removed");
        if subtasks.is_empty() {
            return Ok(Vec::new());
        }
        self.create_subtasks(task_id, subtasks).await
    }
}

#[async_trait]
impl BreakdownService for HttpBackend {
    async fn request_breakdown(
        &self,
        task_id: TaskId,
        complexity: ComplexityLevel,
    ) -> Result<BreakdownProposal, ServiceError> {
        let env = self
            .post::<_, BreakdownData>(
                &format!("tasks/{task_id}/breakdown"),
                &BreakdownRequest { complexity },
                None,
            )
            .await?;
        let data = require(env, "breakdown")?;
        Ok(BreakdownProposal {
            task_id,
            complexity,
            subtasks: data.subtasks,
        })
    }
}

#[async_trait]
impl EnvironmentCheckService for HttpBackend {
    async fn save_check(&self, record: &EnvironmentCheckRecord) -> Result<Ack, ServiceError> {
        let env = self
            .post::<_, serde_json::Value>(
                &format!("tasks/{}/environment-check", record.task_id),
                record,
                None,
            )
            .await?;
        Ok(ack(env))
    }
}

#[async_trait]
impl ContextSwitchEvaluator for HttpBackend {
    async fn evaluate(
        &self,
        task_id: TaskId,
        previous_task_id: Option<TaskId>,
    ) -> Result<Option<ContextSwitchDecision>, ServiceError> {
        let body = SwitchCheck {
            to_task_id: task_id,
            from_task_id: previous_task_id,
        };
        let env = self
            .post::<_, ContextSwitchDecision>("context-switch", &body, None)
            .await?;
        Ok(env.data)
    }

    async fn confirm_switch(&self, switch_id: i64, note: Option<&str>) -> Result<Ack, ServiceError> {
        let body = SwitchConfirm {
            user_proceeded: true,
            note,
        };
        let env = self
            .post::<_, serde_json::Value>(&format!("context-switch/{switch_id}/confirm"), &body, None)
            .await?;
        Ok(ack(env))
    }
}

#[async_trait]
impl SessionLauncher for HttpBackend {
    async fn launch(&self, request: &SessionRequest) -> Result<SessionHandle, ServiceError> {
        let env = self.post("sessions", request, None).await?;
        require(env, "session")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str, token: Option<&str>) -> Result<HttpBackend, ServiceError> {
        HttpBackend::new(BackendConfig {
            base_url: base_url.to_string(),
            api_token: token.map(str::to_string),
            request_timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let b = backend("http://localhost:8000/api/", None).unwrap();
        assert_eq!(b.url("/tasks"), "http://localhost:8000/api/tasks");
        assert_eq!(b.url("tasks/42/breakdown"), "http://localhost:8000/api/tasks/42/breakdown");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        assert!(matches!(
            backend("http://localhost", Some("abc\ndef")),
            Err(ServiceError::Validation(_))
        ));
        assert!(backend("http://localhost", Some("")).is_ok());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        // port 9 (discard) is closed on test hosts
        let b = backend("http://127.0.0.1:9", None).unwrap();
        let err = b.launch(&SessionRequest::work(TaskId(1), "x", None, 25)).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn missing_data_is_a_decode_error() {
        let env: ApiResponse<CreatedTask> = ApiResponse {
            success: true,
            data: None,
            message: None,
            error: None,
        };
        assert!(matches!(require(env, "task"), Err(ServiceError::Decode(_))));
    }
}
