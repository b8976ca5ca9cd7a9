//! Stateless HTTP request builder and response checker.
//!
//! # Design
//! `ApiClient` holds only a `BaseUrlResolver` and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `check_response` / `parse_query` method
//! that consumes an `HttpResponse`. The transport in between is someone
//! else's job: `Api` uses reqwest, a native host uses its own stack through
//! the FFI crate.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::base_url::BaseUrlResolver;
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::{Credentials, HttpMethod, HttpRequest, HttpResponse};
use crate::query::{QueryKey, UnauthorizedBehavior};

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

/// Synchronous, stateless request builder for the application API.
#[derive(Debug, Clone, Default)]
pub struct ApiClient {
    resolver: BaseUrlResolver,
}

impl ApiClient {
    pub fn new(resolver: BaseUrlResolver) -> Self {
        Self { resolver }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.resolver())
    }

    pub fn resolver(&self) -> &BaseUrlResolver {
        &self.resolver
    }

    /// Current base URL. Recomputed on every call.
    pub fn base_url(&self) -> String {
        self.resolver.resolve()
    }

    /// Absolute URL for `route`. One leading `/` is dropped so `"/foo"` and
    /// `"foo"` land on the same URL under the base path.
    pub fn url_for(&self, route: &str) -> ApiResult<String> {
        let path = route.strip_prefix('/').unwrap_or(route);
        join(&self.base_url(), path)
    }

    /// Build a credentialed request.
    ///
    /// With a payload the body is JSON and `Content-Type: application/json`
    /// is set first; `headers` are applied after it, and a header with the
    /// same name (any case) replaces the earlier value.
    pub fn build_request<P, I, K, V>(
        &self,
        method: HttpMethod,
        route: &str,
        payload: Option<&P>,
        headers: I,
    ) -> ApiResult<HttpRequest>
    where
        P: Serialize + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let url = self.url_for(route)?;

        let mut merged: Vec<(String, String)> = Vec::new();
        let body = match payload {
            Some(p) => {
                let body = serde_json::to_string(p).map_err(|e| ApiError::Serialization(e.to_string()))?;
                merged.push((CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string()));
                Some(body)
            }
            None => None,
        };
        for (name, value) in headers {
            set_header(&mut merged, name.into(), value.into());
        }

        Ok(HttpRequest {
            method,
            url,
            headers: merged,
            body,
            credentials: Credentials::Include,
        })
    }

    /// Build the credentialed `GET` the default query function sends for `key`.
    /// Only the first key element reaches the URL.
    pub fn build_query(&self, key: &QueryKey) -> ApiResult<HttpRequest> {
        let url = join(&self.base_url(), key.path()?)?;
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
            credentials: Credentials::Include,
        })
    }

    /// Pass a 2xx response through; turn anything else into `ApiError::Http`.
    pub fn check_response(&self, response: HttpResponse) -> ApiResult<HttpResponse> {
        check_status(response)
    }

    /// Interpret a response to a query request.
    ///
    /// `Ok(None)` only for a 401 under `UnauthorizedBehavior::ReturnNull`.
    pub fn parse_query<T: DeserializeOwned>(
        &self,
        response: HttpResponse,
        on401: UnauthorizedBehavior,
    ) -> ApiResult<Option<T>> {
        if on401 == UnauthorizedBehavior::ReturnNull && response.status == 401 {
            debug!("401 treated as empty query result");
            return Ok(None);
        }
        let response = check_status(response)?;
        response.json().map(Some)
    }
}

/// Map non-success status codes to `ApiError::Http`, using the reason phrase
/// when the body is empty.
pub fn check_status(response: HttpResponse) -> ApiResult<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let message = if response.body.is_empty() {
        response.status_text().to_string()
    } else {
        response.body
    };
    debug!(status = response.status, %message, "request failed");
    Err(ApiError::Http {
        status: response.status,
        message,
    })
}

fn join(base: &str, path: &str) -> ApiResult<String> {
    let base = Url::parse(base)?;
    Ok(base.join(path)?.to_string())
}

fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
        Some(slot) => *slot = (name, value),
        None => headers.push((name, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_url::{DomainSource, HostContext};
    use serde_json::{json, Value};

    const NO_HEADERS: [(&str, &str); 0] = [];

    fn client() -> ApiClient {
        ApiClient::new(BaseUrlResolver::new(
            DomainSource::Fixed(Some("api.example.com".to_string())),
            HostContext::Native,
        ))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn leading_slash_does_not_change_url() {
        let c = client();
        let with = c.build_request(HttpMethod::Get, "/foo", None::<&()>, NO_HEADERS).unwrap();
        let without = c.build_request(HttpMethod::Get, "foo", None::<&()>, NO_HEADERS).unwrap();
        assert_eq!(with.url, "https://api.example.com/foo");
        assert_eq!(with.url, without.url);
    }

    #[test]
    fn route_keeps_nested_path_and_query() {
        let req = client()
            .build_request(HttpMethod::Get, "/api/items?page=2", None::<&()>, NO_HEADERS)
            .unwrap();
        assert_eq!(req.url, "https://api.example.com/api/items?page=2");
    }

    #[test]
    fn request_without_payload_has_no_body_or_content_type() {
        let req = client()
            .build_request(HttpMethod::Delete, "/items/1", None::<&()>, NO_HEADERS)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
        assert_eq!(req.credentials, Credentials::Include);
    }

    #[test]
    fn payload_is_json_with_content_type() {
        let payload = json!({"title": "Buy milk", "done": false});
        let req = client()
            .build_request(HttpMethod::Post, "/items", Some(&payload), NO_HEADERS)
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, payload);
    }

    #[test]
    fn caller_headers_follow_content_type() {
        let req = client()
            .build_request(
                HttpMethod::Post,
                "/items",
                Some(&json!({})),
                [("X-Trace", "abc")],
            )
            .unwrap();
        assert_eq!(
            req.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Trace".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn caller_content_type_replaces_default() {
        let req = client()
            .build_request(
                HttpMethod::Put,
                "/items/1",
                Some(&json!({"a": 1})),
                [("content-type", "application/merge-patch+json")],
            )
            .unwrap();
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("Content-Type"), Some("application/merge-patch+json"));
    }

    #[test]
    fn check_response_passes_success_through() {
        let ok = response(201, r#"{"id":1}"#);
        assert_eq!(client().check_response(ok.clone()).unwrap(), ok);
    }

    #[test]
    fn check_response_formats_body() {
        let err = client().check_response(response(404, "not found")).unwrap_err();
        assert_eq!(err.to_string(), "404: not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn check_response_falls_back_to_reason_phrase() {
        let err = client().check_response(response(500, "")).unwrap_err();
        assert_eq!(err.to_string(), "500: Internal Server Error");
    }

    #[test]
    fn build_query_uses_only_first_key_element() {
        let key = QueryKey::new("/users").with(json!({"id": 5}));
        let req = client().build_query(&key).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://api.example.com/users");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn parse_query_success() {
        let value: Option<Value> = client()
            .parse_query(response(200, r#"{"a":1}"#), UnauthorizedBehavior::Throw)
            .unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[test]
    fn parse_query_401_return_null() {
        let value: Option<Value> = client()
            .parse_query(response(401, "Unauthorized"), UnauthorizedBehavior::ReturnNull)
            .unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn parse_query_401_throw_matches_check_response() {
        let c = client();
        let err = c
            .parse_query::<Value>(response(401, "Unauthorized"), UnauthorizedBehavior::Throw)
            .unwrap_err();
        let expected = c.check_response(response(401, "Unauthorized")).unwrap_err();
        assert_eq!(err, expected);
        assert_eq!(err.to_string(), "401: Unauthorized");
    }

    #[test]
    fn parse_query_other_failures_ignore_401_policy() {
        let err = client()
            .parse_query::<Value>(response(403, "forbidden"), UnauthorizedBehavior::ReturnNull)
            .unwrap_err();
        assert_eq!(err.to_string(), "403: forbidden");
    }

    #[test]
    fn parse_query_bad_json() {
        let err = client()
            .parse_query::<Value>(response(200, "not json"), UnauthorizedBehavior::Throw)
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
