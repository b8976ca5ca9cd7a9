//! Async facade: `ApiClient` plus a `Transport`.
//!
//! This is the surface application code calls. `api_request` is the generic
//! request executor; `query_fn` is the factory for the query cache's fetch
//! function.

use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::http::{HttpMethod, HttpResponse};
use crate::query::{QueryFn, QueryKey, UnauthorizedBehavior};
use crate::transport::Transport;

/// Request builder bound to a transport. Cheap to clone.
#[derive(Clone)]
pub struct Api {
    client: ApiClient,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api").field("client", &self.client).finish_non_exhaustive()
    }
}

impl Api {
    pub fn with_transport(client: ApiClient, transport: Arc<dyn Transport>) -> Self {
        Self { client, transport }
    }

    /// Build from configuration with the reqwest transport.
    #[cfg(feature = "transport")]
    pub fn new(config: &crate::config::ClientConfig) -> ApiResult<Self> {
        config.validate()?;
        let transport = crate::transport::ReqwestTransport::new(config)?;
        Ok(Self::with_transport(
            ApiClient::from_config(config),
            Arc::new(transport),
        ))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn base_url(&self) -> String {
        self.client.base_url()
    }

    /// Send one credentialed request and return the raw response.
    ///
    /// Fails with `ApiError::Http` for any status outside 200..=299; the
    /// caller parses successful bodies itself.
    #[instrument(skip(self, payload, headers))]
    pub async fn api_request<P, I, K, V>(
        &self,
        method: HttpMethod,
        route: &str,
        payload: Option<&P>,
        headers: I,
    ) -> ApiResult<HttpResponse>
    where
        P: Serialize + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = self.client.build_request(method, route, payload, headers)?;
        let response = self.transport.execute(request).await?;
        self.client.check_response(response)
    }

    /// Run the default query fetch for `key` once, outside any cache.
    pub async fn fetch_query(
        &self,
        key: &QueryKey,
        on401: UnauthorizedBehavior,
    ) -> ApiResult<Option<Value>> {
        let request = self.client.build_query(key)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_query(response, on401)
    }

    /// Fetch function for the query cache.
    ///
    /// Issues a credentialed `GET` to the first key element and parses the
    /// JSON body. Trailing key elements are ignored.
    pub fn query_fn(&self, on401: UnauthorizedBehavior) -> QueryFn {
        let api = self.clone();
        Arc::new(move |key: QueryKey| {
            let api = api.clone();
            async move { api.fetch_query(&key, on401).await }.boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_url::{BaseUrlResolver, DomainSource, HostContext};
    use crate::error::ApiError;
    use crate::http::HttpRequest;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every request with a canned response and records what it saw.
    struct CannedTransport {
        status: u16,
        body: String,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl CannedTransport {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl Transport for CannedTransport {
        fn execute(&self, request: HttpRequest) -> BoxFuture<'_, ApiResult<HttpResponse>> {
            self.seen.lock().unwrap().push(request);
            let response = HttpResponse {
                status: self.status,
                headers: Vec::new(),
                body: self.body.clone(),
            };
            async move { Ok(response) }.boxed()
        }
    }

    /// Fails every request as if the connection was refused.
    struct RefusingTransport;

    impl Transport for RefusingTransport {
        fn execute(&self, _request: HttpRequest) -> BoxFuture<'_, ApiResult<HttpResponse>> {
            async { Err(ApiError::Transport("connection refused".to_string())) }.boxed()
        }
    }

    fn api(transport: Arc<dyn Transport>) -> Api {
        let resolver = BaseUrlResolver::new(DomainSource::Fixed(None), HostContext::Native);
        Api::with_transport(ApiClient::new(resolver), transport)
    }

    #[tokio::test]
    async fn api_request_returns_success_response_unchanged() {
        let transport = CannedTransport::new(200, r#"{"ok":true}"#);
        let response = api(transport.clone())
            .api_request(HttpMethod::Post, "/login", Some(&json!({"u": "ada"})), [("X-A", "1")])
            .await
            .unwrap();
        assert_eq!(response.body, r#"{"ok":true}"#);
        assert_eq!(transport.urls(), vec!["http://localhost:5000/login"]);
    }

    #[tokio::test]
    async fn api_request_404_message() {
        let transport = CannedTransport::new(404, "not found");
        let err = api(transport)
            .api_request(HttpMethod::Get, "/nope", None::<&()>, [("X-A", "1")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "404: not found");
    }

    #[tokio::test]
    async fn query_fn_ignores_trailing_key_elements() {
        let transport = CannedTransport::new(200, "[]");
        let fetch = api(transport.clone()).query_fn(UnauthorizedBehavior::Throw);
        let value = fetch(QueryKey::new("/users").with(json!({"id": 5}))).await.unwrap();
        assert_eq!(value, Some(json!([])));
        assert_eq!(transport.urls(), vec!["http://localhost:5000/users"]);
    }

    #[tokio::test]
    async fn query_fn_401_policies() {
        let transport = CannedTransport::new(401, "Unauthorized");
        let lenient = api(transport.clone()).query_fn(UnauthorizedBehavior::ReturnNull);
        assert_eq!(lenient(QueryKey::new("/me")).await.unwrap(), None);

        let strict = api(transport).query_fn(UnauthorizedBehavior::Throw);
        let err = strict(QueryKey::new("/me")).await.unwrap_err();
        assert_eq!(err.to_string(), "401: Unauthorized");
    }

    #[tokio::test]
    async fn api_request_passes_transport_errors_through() {
        let err = api(Arc::new(RefusingTransport))
            .api_request(HttpMethod::Get, "/users", None::<&()>, [("X-A", "1")])
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Transport("connection refused".to_string()));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn query_fn_passes_transport_errors_through_both_policies() {
        let api = api(Arc::new(RefusingTransport));
        for on401 in [UnauthorizedBehavior::ReturnNull, UnauthorizedBehavior::Throw] {
            let err = api.query_fn(on401)(QueryKey::new("/me")).await.unwrap_err();
            assert_eq!(err, ApiError::Transport("connection refused".to_string()));
        }
    }
}
