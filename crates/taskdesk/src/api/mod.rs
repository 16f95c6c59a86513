use std::time::{Duration, Instant};

use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::editors::RemoteControl;
use crate::error::{Error, Result};
use crate::model::{Project, ProjectId, TaskDetail, TaskId};
use crate::text_sanitize::sanitize_line;
use crate::workflow::ActionRequest;

#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub status: u16,
    pub body: Option<Value>,
}

/// Sends task-action writes. Implementations must treat non-2xx answers
/// as errors.
pub trait ActionTransport: Send + Sync {
    fn post_action(&self, req: &ActionRequest) -> Result<ActionResponse>;
}

/// Read side used by the sidebar (project summary, history, mentions).
pub trait TaskReader: Send + Sync {
    fn project(&self, project_id: ProjectId) -> Result<Project>;
    fn task_detail(&self, project_id: ProjectId, task_id: TaskId) -> Result<TaskDetail>;
    fn search_users(&self, prefix: &str, project_id: ProjectId) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct UserFilterResponse {
    #[serde(default)]
    usernames: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
    locale: String,
}

impl HttpClient {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self> {
        let base = base_url.trim();
        Url::parse(base)
            .map_err(|e| Error::config(format!("invalid API base URL '{base}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base.trim_end_matches('/').to_string(),
            token,
            locale: "en".into(),
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        Self::new(&cfg.base_url, cfg.resolve_token()?, cfg.timeout())
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        if !locale.trim().is_empty() {
            self.locale = locale.trim().to_string();
        }
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT_LANGUAGE, self.locale.as_str())
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_json_url(self.url(path), path)
    }

    fn get_json_url<T: DeserializeOwned>(&self, url: String, path: &str) -> Result<T> {
        let res = self
            .authed(self.client.get(&url))
            .send()
            .map_err(|e| Error::network(format!("GET {url} failed: {e}")))?;
        let res = check_status(res, "GET", path)?;
        res.json::<T>()
            .map_err(|e| Error::with_kind(crate::error::ErrorKind::Decode, format!("GET {path}: {e}")))
    }
}

fn check_status(res: Response, method: &str, path: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    Err(Error::status(
        status.as_u16(),
        format!(
            "{method} {path} failed with status {status}{}",
            error_detail(&body)
                .map(|d| format!(": {d}"))
                .unwrap_or_default()
        ),
    ))
}

/// The backend reports failures as `{"Error": "...", "SubCode": "..."}`.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let detail = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => v
            .get("Error")
            .or_else(|| v.get("error"))
            .or_else(|| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        Err(_) => trimmed.to_string(),
    };
    Some(sanitize_line(&detail))
}

impl ActionTransport for HttpClient {
    fn post_action(&self, req: &ActionRequest) -> Result<ActionResponse> {
        let url = self.url(&req.path);
        let started = Instant::now();
        let mut builder = self.authed(self.client.post(&url));
        builder = match req.body.as_ref() {
            Some(body) => builder.json(body),
            None => builder,
        };
        tracing::info!(action = %req.kind, %url, "dispatching task action");
        let res = builder.send().map_err(|e| {
            tracing::warn!(action = %req.kind, error = %e, "task action transport failure");
            Error::network(format!("POST {url} failed: {e}"))
        })?;
        let res = check_status(res, "POST", &req.path).inspect_err(|e| {
            tracing::warn!(action = %req.kind, error = %e, "task action rejected");
        })?;
        let status = res.status().as_u16();
        let text = res.text().unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).ok();
        tracing::info!(
            action = %req.kind,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "task action accepted"
        );
        Ok(ActionResponse { status, body })
    }
}

impl TaskReader for HttpClient {
    fn project(&self, project_id: ProjectId) -> Result<Project> {
        self.get_json(&format!("projects/{project_id}/?abbreviated=true"))
    }

    fn task_detail(&self, project_id: ProjectId, task_id: TaskId) -> Result<TaskDetail> {
        self.get_json(&format!("projects/{project_id}/tasks/{task_id}/"))
    }

    fn search_users(&self, prefix: &str, project_id: ProjectId) -> Result<Vec<String>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let mut url = Url::parse(&self.url("users/queries/filter/"))
            .map_err(|e| Error::config(format!("invalid user filter URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::config("API base URL cannot carry path segments"))?
            .pop_if_empty()
            .push(prefix)
            .push("");
        url.query_pairs_mut()
            .append_pair("projectId", &project_id.to_string());
        let res: UserFilterResponse = self.get_json_url(url.to_string(), "users/queries/filter/")?;
        Ok(res.usernames)
    }
}

impl RemoteControl for HttpClient {
    fn remote_get(&self, url: &Url) -> Result<()> {
        // Local editor endpoint: no bearer token.
        let res = self
            .client
            .get(url.clone())
            .timeout(Duration::from_secs(5))
            .send()
            .map_err(|e| Error::network(format!("editor remote control unreachable: {e}")))?;
        check_status(res, "GET", url.path()).map(|_| ())
    }
}
