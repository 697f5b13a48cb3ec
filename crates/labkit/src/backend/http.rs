//! Blocking HTTP backend.
//!
//! This module provides the [`HttpBackend`] implementation, which talks to a
//! GitLab instance over `ureq`. The agent is expected to be built with
//! `http_status_as_error(false)` (see [`crate::Config::agent`]) so that error
//! statuses come back as responses and keep their body.

use crate::backend::{ApiRequest, ApiResponse, Backend, Method};
use crate::error::transport;
use reconcile::{Context, NextPage, RemoteError};
use std::time::Duration;

/// Header carrying the personal access token.
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Pagination cursor header.
const NEXT_PAGE_HEADER: &str = "x-next-page";

const USER_AGENT: &str = concat!("glrecon/", env!("CARGO_PKG_VERSION"));

/// HTTP backend.
///
/// # Example
///
/// ```no_run
/// use labkit::backend::http::HttpBackend;
/// use labkit::backend::{ApiRequest, Backend};
/// use reconcile::Context;
///
/// let backend = HttpBackend::new(
///     ureq::Agent::new_with_defaults(),
///     "https://gitlab.com/api/v4/",
///     "glpat-...",
/// );
/// let response = backend.send(&Context::new(), &ApiRequest::get("user")).unwrap();
/// println!("HTTP {}", response.status);
/// ```
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API base URL, ending in `/`.
    base_url: String,
    token: String,
}

impl HttpBackend {
    /// Create a backend for an API base URL.
    #[must_use]
    pub fn new(agent: ureq::Agent, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            agent,
            base_url,
            token: token.into(),
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Apply headers, query and the per-request timeout.
    fn prepare<B>(
        &self,
        builder: ureq::RequestBuilder<B>,
        request: &ApiRequest,
        timeout: Option<Duration>,
    ) -> ureq::RequestBuilder<B> {
        let mut builder = builder
            .header(TOKEN_HEADER, &self.token)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        for (key, value) in &request.query {
            builder = builder.query(key, value);
        }
        match timeout {
            Some(remaining) => builder.config().timeout_global(Some(remaining)).build(),
            None => builder,
        }
    }
}

impl Backend for HttpBackend {
    fn send(&self, ctx: &Context, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        let url = self.url(&request.path);
        let timeout = ctx.remaining();
        if timeout == Some(Duration::ZERO) {
            return Err(RemoteError::transport(format!(
                "deadline passed before {} {}",
                request.method, request.path
            )));
        }

        log::trace!("{} {url}", request.method);

        let body = request.body.clone().unwrap_or(serde_json::Value::Null);
        let result = match request.method {
            Method::Get => self.prepare(self.agent.get(&url), request, timeout).call(),
            Method::Delete => self.prepare(self.agent.delete(&url), request, timeout).call(),
            Method::Post => self
                .prepare(self.agent.post(&url), request, timeout)
                .send_json(&body),
            Method::Put => self
                .prepare(self.agent.put(&url), request, timeout)
                .send_json(&body),
        };
        let mut response = result.map_err(transport)?;

        let status = response.status().as_u16();
        let next = NextPage::from_header(
            response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        let text = response.body_mut().read_to_string().map_err(transport)?;

        log::trace!("{} {url} -> {status} ({} bytes)", request.method, text.len());

        Ok(ApiResponse {
            status,
            body: parse_body(&text),
            next,
        })
    }
}

/// Parse a response body; non-JSON text is kept as a string.
fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
