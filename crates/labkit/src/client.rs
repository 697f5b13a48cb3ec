//! GitLab API client.
//!
//! [`Client`] is the handle every resource receives. It wraps a
//! [`Backend`], turns non-2xx answers into [`RemoteError`]s that keep the
//! status code, and drains paginated listings through the engine's collector.

use crate::backend::{ApiRequest, ApiResponse, Backend};
use reconcile::pagination::{self, DEFAULT_PER_PAGE};
use reconcile::{Context, Document, Error, Page, PageRequest, RemoteError, Result};
use std::borrow::Cow;

/// Read-only GitLab client shared by all cycles.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client over a backend.
    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Send a request and return the body of a successful response.
    ///
    /// Non-2xx statuses become [`RemoteError`]s carrying the status and
    /// GitLab's error message.
    pub fn request(&self, ctx: &Context, request: &ApiRequest) -> Result<serde_json::Value> {
        Ok(self.exchange(ctx, request)?.body)
    }

    fn exchange(&self, ctx: &Context, request: &ApiRequest) -> Result<ApiResponse> {
        ctx.check(&request.path)?;
        log::debug!("{} {}", request.method, request.path);

        let response = self.backend.send(ctx, request)?;
        if response.is_success() {
            return Ok(response);
        }

        let message = error_message(&response.body);
        log::debug!(
            "{} {} failed: HTTP {} {message}",
            request.method,
            request.path,
            response.status
        );
        Err(RemoteError::status(
            response.status,
            format!("{} {}: {message}", request.method, request.path),
        )
        .into())
    }

    /// Fetch a single object.
    pub fn get(&self, ctx: &Context, path: &str) -> Result<Document> {
        let body = self.request(ctx, &ApiRequest::get(path))?;
        object(body, path)
    }

    /// Create an object and return the server's representation.
    pub fn post(&self, ctx: &Context, path: &str, body: Document) -> Result<Document> {
        let answer = self.request(ctx, &ApiRequest::post(path, body.into()))?;
        object(answer, path)
    }

    /// Update an object and return the server's representation.
    pub fn put(&self, ctx: &Context, path: &str, body: Document) -> Result<Document> {
        let answer = self.request(ctx, &ApiRequest::put(path, body.into()))?;
        object(answer, path)
    }

    /// Delete an object. Any 2xx answer counts as done.
    pub fn delete(&self, ctx: &Context, path: &str) -> Result<()> {
        self.request(ctx, &ApiRequest::delete(path)).map(|_| ())
    }

    /// Fetch one page of a listing.
    pub fn list(&self, ctx: &Context, path: &str, page: PageRequest) -> Result<Page<Document>> {
        let request = ApiRequest::get(path)
            .query("page", page.page)
            .query("per_page", page.per_page);
        let response = self.exchange(ctx, &request)?;

        let serde_json::Value::Array(values) = response.body else {
            return Err(Error::inconsistent(
                path,
                format!("expected a JSON array, got {}", kind_of(&response.body)),
            ));
        };
        let items = values
            .into_iter()
            .map(|value| object(value, path))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, response.next))
    }

    /// Fetch every item of a listing.
    pub fn list_all(&self, ctx: &Context, path: &str) -> Result<Vec<Document>> {
        pagination::collect(ctx, DEFAULT_PER_PAGE, |page| self.list(ctx, path, page))
    }

    /// Return the first listed item matching `predicate`, stopping as soon as
    /// it is found.
    pub fn find<P>(&self, ctx: &Context, path: &str, per_page: u32, predicate: P) -> Result<Option<Document>>
    where
        P: FnMut(&Document) -> bool,
    {
        pagination::find_first(ctx, per_page, |page| self.list(ctx, path, page), predicate)
    }

    /// The user the token belongs to.
    pub fn current_user(&self, ctx: &Context) -> Result<Document> {
        self.get(ctx, "user")
    }
}

/// Percent-encode one path segment, e.g. a `group/project` path or a
/// variable key.
pub fn segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

fn object(value: serde_json::Value, path: &str) -> Result<Document> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::inconsistent(
            path,
            format!("expected a JSON object, got {}", kind_of(&other)),
        )),
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "nothing",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// GitLab reports errors as `{"message": ...}` or `{"error": ...}`, where the
/// message may itself be an object of per-field lists.
fn error_message(body: &serde_json::Value) -> String {
    let render = |value: &serde_json::Value| match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match body {
        serde_json::Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .map_or_else(|| body.to_string(), render),
        serde_json::Value::Null => "no response body".to_string(),
        other => render(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Method, MockBackend};
    use reconcile::{Classification, NextPage, classify};
    use serde_json::json;

    fn client() -> (Client, MockBackend) {
        let mock = MockBackend::new();
        (Client::with_backend(mock.clone()), mock)
    }

    fn items(range: std::ops::Range<i64>) -> serde_json::Value {
        serde_json::Value::Array(range.map(|id| json!({ "id": id })).collect())
    }

    #[test]
    fn test_get_object() {
        let (client, mock) = client();
        mock.respond(Method::Get, "groups/42", ApiResponse::ok(json!({"id": 42})));
        let group = client.get(&Context::new(), "groups/42").unwrap();
        assert_eq!(group["id"], json!(42));
    }

    #[test]
    fn test_status_error_keeps_status_and_message() {
        let (client, mock) = client();
        mock.respond(
            Method::Get,
            "groups/42",
            ApiResponse::error(403, "403 Forbidden"),
        );
        let err = client.get(&Context::new(), "groups/42").unwrap_err();
        assert_eq!(err.remote_status(), Some(403));
        assert!(err.to_string().contains("403 Forbidden"));
        assert_eq!(classify(&err), Classification::Fatal);
    }

    #[test]
    fn test_not_found_classification() {
        let (client, _mock) = client();
        let err = client.get(&Context::new(), "groups/7").unwrap_err();
        assert_eq!(classify(&err), Classification::NotFound);
    }

    #[test]
    fn test_transport_failure_has_no_status() {
        let (client, mock) = client();
        mock.fail(Method::Get, "user", "connection refused");
        let err = client.current_user(&Context::new()).unwrap_err();
        assert_eq!(err.remote_status(), None);
        assert_eq!(classify(&err), Classification::Fatal);
    }

    #[test]
    fn test_non_object_response_is_inconsistent() {
        let (client, mock) = client();
        mock.respond(Method::Get, "groups/1", ApiResponse::ok(json!([1, 2])));
        let err = client.get(&Context::new(), "groups/1").unwrap_err();
        assert!(matches!(err, Error::Inconsistent { .. }));
    }

    #[test]
    fn test_delete_no_content() {
        let (client, mock) = client();
        mock.respond(Method::Delete, "groups/1", ApiResponse::no_content());
        client.delete(&Context::new(), "groups/1").unwrap();
    }

    #[test]
    fn test_list_all_follows_cursor() {
        let (client, mock) = client();
        let path = "projects/1/access_tokens";
        mock.respond(
            Method::Get,
            path,
            ApiResponse::ok(items(0..20)).with_next(NextPage::Page(2)),
        );
        mock.respond(
            Method::Get,
            path,
            ApiResponse::ok(items(20..25)).with_next(NextPage::Done),
        );

        let all = client.list_all(&Context::new(), path).unwrap();
        assert_eq!(all.len(), 25);

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].query_value("page"), Some("1"));
        assert_eq!(requests[1].query_value("page"), Some("2"));
        assert_eq!(requests[1].query_value("per_page"), Some("20"));
    }

    #[test]
    fn test_list_all_fails_as_a_whole() {
        let (client, mock) = client();
        let path = "projects/1/variables";
        mock.respond(
            Method::Get,
            path,
            ApiResponse::ok(items(0..20)).with_next(NextPage::Page(2)),
        );
        mock.respond(Method::Get, path, ApiResponse::error(500, "boom"));

        let err = client.list_all(&Context::new(), path).unwrap_err();
        assert_eq!(err.remote_status(), Some(500));
    }

    #[test]
    fn test_find_stops_at_match() {
        let (client, mock) = client();
        let path = "projects/1/access_tokens";
        mock.respond(
            Method::Get,
            path,
            ApiResponse::ok(items(0..100)).with_next(NextPage::Page(2)),
        );
        mock.respond(
            Method::Get,
            path,
            ApiResponse::ok(items(100..150)).with_next(NextPage::Done),
        );

        let found = client
            .find(&Context::new(), path, 100, |doc| doc["id"] == json!(42))
            .unwrap();
        assert!(found.is_some());
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_list_rejects_non_array() {
        let (client, mock) = client();
        mock.respond(Method::Get, "groups", ApiResponse::ok(json!({"id": 1})));
        let err = client
            .list(&Context::new(), "groups", PageRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::Inconsistent { .. }));
    }

    #[test]
    fn test_cancelled_context_sends_nothing() {
        let (client, mock) = client();
        let ctx = Context::new();
        ctx.cancel_token().cancel();
        let err = client.get(&ctx, "groups/1").unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("group/project"), "group%2Fproject");
        assert_eq!(segment("42"), "42");
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(&json!({"message": "gone"})), "gone");
        assert_eq!(error_message(&json!({"error": "invalid_token"})), "invalid_token");
        assert_eq!(
            error_message(&json!({"message": {"name": ["is too long"]}})),
            "{\"name\":[\"is too long\"]}"
        );
        assert_eq!(error_message(&serde_json::Value::Null), "no response body");
        assert_eq!(error_message(&json!("Bad Gateway")), "Bad Gateway");
    }
}
