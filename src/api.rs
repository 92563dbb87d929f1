// API client module: a small blocking HTTP client for the execution
// service. Every call goes through `ApiClient::request`, which attaches the
// auth headers and turns failures into an `ApiError`.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, ConfigStore};

/// Header carrying the optional session id.
pub const SESSION_HEADER: &str = "x-session-id";

const API_PREFIX: &str = "/api/v1";

/// Errors returned by [`ApiClient`].
///
/// `Http` and `Transport` are the two ways a request can fail. The other
/// variants cover building the client and mapping a successful response
/// onto a typed result.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("API error: {message}")]
    Http { status: StatusCode, message: String },

    /// The request never completed (DNS, refused connection, timeout, bad body).
    #[error("request failed: {message}")]
    Transport { message: String },

    #[error("unexpected response from server: {message}")]
    UnexpectedResponse { message: String },

    #[error("could not set up HTTP client: {message}")]
    Setup { message: String },
}

impl ApiError {
    /// The human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Http { message, .. }
            | ApiError::Transport { message }
            | ApiError::UnexpectedResponse { message }
            | ApiError::Setup { message } => message,
        }
    }

    /// HTTP status, for errors the server reported.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}

/// Outcome of running code in the sandbox.
///
/// `error` may be set even when `success` is true (diagnostics on a
/// passing run), so the two must not be treated as exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time: Option<f64>,
    pub language: String,
}

/// Run quota as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub runs_used: i64,
    pub runs_limit: i64,
    pub tier: String,
    pub is_authenticated: bool,
}

impl UsageInfo {
    /// Runs left in the current period. Negative when the server reports
    /// more runs used than allowed.
    pub fn remaining(&self) -> i64 {
        self.runs_limit - self.runs_used
    }
}

/// Untyped profile returned by `/auth/me`.
pub type Profile = serde_json::Map<String, Value>;

#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
}

/// Blocking client bound to one service URL.
///
/// The bearer token and session id are fixed when the client is built.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    authenticated: bool,
}

impl ApiClient {
    /// Build a client for `config`, authenticating with `token` if given.
    pub fn new(config: &Config, token: Option<&str>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = header_value(&format!("Bearer {token}"), "token")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(session_id) = config.session_id() {
            headers.insert(
                HeaderName::from_static(SESSION_HEADER),
                header_value(session_id, "session id")?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout()))
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Setup {
                message: e.to_string(),
            })?;

        Ok(ApiClient {
            client,
            base_url: config.api_url().trim_end_matches('/').to_string(),
            authenticated: token.is_some(),
        })
    }

    /// Build a client using whatever token `store` holds. A missing or
    /// unreadable token leaves the client unauthenticated.
    pub fn from_store(config: &Config, store: &ConfigStore) -> Result<Self, ApiError> {
        let token = store.get_token();
        ApiClient::new(config, token.as_deref())
    }

    /// Whether requests carry a bearer token.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Send one request to `<api_url>/api/v1<endpoint>` and return the JSON body.
    pub fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, endpoint);
        debug!(%method, %url, "sending request");

        let mut req = self.client.request(method, &url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().map_err(|e| ApiError::Transport {
            message: e.to_string(),
        })?;

        let status = res.status();
        debug!(%status, "received response");
        if !status.is_success() {
            let txt = res.text().unwrap_or_default();
            return Err(ApiError::Http {
                status,
                message: error_detail(status, &txt),
            });
        }

        res.json::<Value>().map_err(|e| ApiError::Transport {
            message: format!("invalid response body: {e}"),
        })
    }

    /// Run `code` in the sandbox. `timeout` is only sent when given, so the
    /// server applies its own default otherwise.
    pub fn execute_code(
        &self,
        code: &str,
        language: &str,
        timeout: Option<u64>,
    ) -> Result<ExecutionResult, ApiError> {
        let body = execute_body(code, language, timeout);
        let res = self.request(Method::POST, "/code/execute", Some(&body), &[])?;
        decode(res)
    }

    pub fn get_usage(&self) -> Result<UsageInfo, ApiError> {
        let res = self.request(Method::GET, "/code/usage", None, &[])?;
        decode(res)
    }

    /// Sign in and return the access token. Persisting it is up to the caller.
    pub fn signin(&self, email: &str, password: &str) -> Result<String, ApiError> {
        self.authenticate("/auth/signin", email, password)
    }

    /// Create an account and return the access token.
    pub fn signup(&self, email: &str, password: &str) -> Result<String, ApiError> {
        self.authenticate("/auth/signup", email, password)
    }

    pub fn get_profile(&self) -> Result<Profile, ApiError> {
        match self.request(Method::GET, "/auth/me", None, &[])? {
            Value::Object(map) => Ok(map),
            other => Err(ApiError::UnexpectedResponse {
                message: format!("expected a JSON object for the profile, got {other}"),
            }),
        }
    }

    fn authenticate(&self, endpoint: &str, email: &str, password: &str) -> Result<String, ApiError> {
        let body = json!({ "email": email, "password": password });
        let res = self.request(Method::POST, endpoint, Some(&body), &[])?;
        let auth: AuthResponse = decode(res)?;
        Ok(auth.access_token)
    }
}

fn execute_body(code: &str, language: &str, timeout: Option<u64>) -> Value {
    let mut body = json!({ "code": code, "language": language });
    if let Some(timeout) = timeout {
        body["timeout"] = json!(timeout);
    }
    body
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::UnexpectedResponse {
        message: e.to_string(),
    })
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::Setup {
        message: format!("{what} contains characters not allowed in an HTTP header"),
    })
}

/// Message for a failed response: the body's `detail` field when there is
/// one, otherwise the status line.
fn error_detail(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());
    match detail {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => format!("HTTP {status}"),
        Some(other) => other.to_string(),
    }
}
