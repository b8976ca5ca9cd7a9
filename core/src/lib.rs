//! API client core for the application backend.
//!
//! # Overview
//! Resolves the base API URL, builds credentialed JSON requests, turns
//! non-2xx responses into one uniform error, and provides the query cache the
//! UI layer reads through.
//!
//! # Design
//! - `ApiClient` is sans-IO: `build_*` produces an `HttpRequest`,
//!   `check_response` / `parse_query` consume an `HttpResponse`. Native hosts
//!   drive it through the FFI crate and do their own networking.
//! - `Api` pairs the client with a `Transport`; with the default `transport`
//!   feature that is reqwest with a cookie jar.
//! - `QueryClient` is constructed once at the application root and passed
//!   down by clone. It is not a global.
//! - The base URL is recomputed per request from `BaseUrlResolver`, whose
//!   strategies run in a fixed order: configured domain, browser origin,
//!   local fallback.

pub mod api;
pub mod base_url;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod transport;

pub use api::Api;
pub use base_url::{resolve_base_url, BaseUrlResolver, DomainSource, HostContext, Strategy};
pub use cache::{DefaultOptions, MutationOptions, QueryClient, QueryOptions, StaleTime};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use http::{Credentials, HttpMethod, HttpRequest, HttpResponse};
pub use query::{QueryFn, QueryKey, UnauthorizedBehavior};
pub use transport::Transport;
#[cfg(feature = "transport")]
pub use transport::ReqwestTransport;
