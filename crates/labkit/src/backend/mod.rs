//! Transport backends for the GitLab REST API.
//!
//! A [`Backend`] sends one [`ApiRequest`] and returns the raw [`ApiResponse`]:
//! status, JSON body and pagination cursor. Turning a non-2xx status into an
//! error is left to [`crate::Client`], so every backend reports failures the
//! same way.
//!
//! The primary implementation is [`http::HttpBackend`].
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use labkit::backend::{ApiRequest, ApiResponse, Backend, Method, MockBackend};
//! use reconcile::Context;
//! use serde_json::json;
//!
//! let mock = MockBackend::new();
//! mock.respond(Method::Get, "groups/42", ApiResponse::ok(json!({"id": 42})));
//!
//! let response = mock.send(&Context::new(), &ApiRequest::get("groups/42")).unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(mock.requests().len(), 1);
//! ```

pub mod http;

use reconcile::{Context, NextPage, RemoteError};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request against the API, relative to the `/api/v4/` base.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API base, e.g. `groups/42/members`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw answer from the API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when the body was empty.
    pub body: serde_json::Value,
    /// Cursor from the `X-Next-Page` header.
    pub next: NextPage,
}

impl ApiResponse {
    /// A response with the given status and body, without a cursor.
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body,
            next: NextPage::Unknown,
        }
    }

    /// A `200 OK` response.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(200, body)
    }

    /// A `204 No Content` response.
    pub fn no_content() -> Self {
        Self::new(204, serde_json::Value::Null)
    }

    /// An error response carrying GitLab's usual `{"message": ...}` body.
    pub fn error(status: u16, message: &str) -> Self {
        Self::new(status, serde_json::json!({ "message": message }))
    }

    /// Attach a pagination cursor.
    pub fn with_next(mut self, next: NextPage) -> Self {
        self.next = next;
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Backend trait for sending API requests.
///
/// Only failures that never produced a response are errors here; those carry
/// no status.
pub trait Backend: Send + Sync {
    fn send(&self, ctx: &Context, request: &ApiRequest) -> Result<ApiResponse, RemoteError>;
}

/// Mock backend for testing without network access.
///
/// Responses are scripted per `(method, path)` and served in order; the last
/// one keeps being served once the queue is down to it. Unscripted requests
/// get a `404`. Every request is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<HashMap<(Method, String), VecDeque<Result<ApiResponse, RemoteError>>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a request.
    pub fn respond(&self, method: Method, path: &str, response: ApiResponse) {
        self.push(method, path, Ok(response));
    }

    /// Queue a transport failure for a request.
    pub fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(method, path, Err(RemoteError::transport(message)));
    }

    fn push(&self, method: Method, path: &str, outcome: Result<ApiResponse, RemoteError>) {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        responses
            .entry((method, path.to_string()))
            .or_default()
            .push_back(outcome);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received so far with the given method.
    pub fn requests_with(&self, method: Method) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

impl Backend for MockBackend {
    fn send(&self, _ctx: &Context, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = responses.get_mut(&(request.method, request.path.clone())) else {
            return Ok(ApiResponse::error(404, "404 Not Found"));
        };
        let outcome = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        outcome.unwrap_or_else(|| Ok(ApiResponse::error(404, "404 Not Found")))
    }
}
