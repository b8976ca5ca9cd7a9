//! Executes `HttpRequest` values.
//!
//! `Transport` is the seam between the sans-IO client and the network. The
//! bundled implementation uses reqwest with a cookie store so that session
//! cookies set by the backend are sent back on later requests.

use futures::future::BoxFuture;

use crate::error::ApiResult;
use crate::http::{HttpRequest, HttpResponse};

/// Performs one HTTP round-trip.
///
/// Implementations return non-2xx responses as `Ok`; status interpretation
/// belongs to `ApiClient`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, ApiResult<HttpResponse>>;
}

#[cfg(feature = "transport")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "transport")]
mod reqwest_transport {
    use std::sync::{Arc, OnceLock};
    use std::time::Instant;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use reqwest::{Client, Method};
    use tracing::{debug, warn};
    use uuid::Uuid;

    use super::Transport;
    use crate::config::ClientConfig;
    use crate::error::{ApiError, ApiResult};
    use crate::http::{Credentials, HttpRequest, HttpResponse};

    /// reqwest-backed transport.
    ///
    /// The cookie jar client serves `Credentials::Include`. A client without
    /// cookies is built on the first `Credentials::Omit` request.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        config: ClientConfig,
        with_cookies: Client,
        without_cookies: Arc<OnceLock<Client>>,
    }

    impl ReqwestTransport {
        pub fn new(config: &ClientConfig) -> ApiResult<Self> {
            Ok(Self {
                config: config.clone(),
                with_cookies: build_client(config, true)?,
                without_cookies: Arc::new(OnceLock::new()),
            })
        }

        fn cookieless(&self) -> ApiResult<&Client> {
            if let Some(client) = self.without_cookies.get() {
                return Ok(client);
            }
            let client = build_client(&self.config, false)?;
            Ok(self.without_cookies.get_or_init(|| client))
        }

        async fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
            let request_id = Uuid::new_v4();
            let client = match request.credentials {
                Credentials::Include => &self.with_cookies,
                Credentials::Omit => self.cookieless()?,
            };
            let method = Method::from_bytes(request.method.as_str().as_bytes())
                .map_err(|e| ApiError::InvalidMethod(e.to_string()))?;

            let mut builder = client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let start = Instant::now();
            let response = builder.send().await.map_err(|e| {
                warn!(%request_id, url = %request.url, error = %e, "request failed to send");
                ApiError::Transport(e.to_string())
            })?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();
            let body = response
                .text()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?;

            debug!(
                %request_id,
                method = %request.method,
                url = %request.url,
                status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "request completed"
            );

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

    impl Transport for ReqwestTransport {
        fn execute(&self, request: HttpRequest) -> BoxFuture<'_, ApiResult<HttpResponse>> {
            self.send(request).boxed()
        }
    }

    fn build_client(config: &ClientConfig, cookies: bool) -> ApiResult<Client> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(cookies);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|e| ApiError::Transport(e.to_string()))
    }

}
