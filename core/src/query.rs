//! Query keys and the 401 policy used by the default fetch function.
//!
//! A query key identifies a cached query. Only its first element carries
//! routing meaning: it is the request path. Every further element (filters,
//! ids, pagination) is part of the cache identity but is never appended to the
//! URL; queries that need those values in the request supply their own fetch
//! function through `QueryClient::fetch_query_with`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Fetch function the query cache calls with a key.
///
/// `Ok(None)` is a successful empty result (the 401-tolerant case).
pub type QueryFn =
    Arc<dyn Fn(QueryKey) -> BoxFuture<'static, ApiResult<Option<Value>>> + Send + Sync>;

/// What the default fetch function does with a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnauthorizedBehavior {
    /// Resolve to no data instead of failing.
    ReturnNull,
    /// Fail like any other non-success status.
    #[default]
    Throw,
}

impl FromStr for UnauthorizedBehavior {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "returnNull" => Ok(Self::ReturnNull),
            "throw" => Ok(Self::Throw),
            other => Err(ApiError::Config(format!(
                "unknown 401 behavior {other:?}, expected \"returnNull\" or \"throw\""
            ))),
        }
    }
}

/// Ordered sequence of JSON values identifying a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    /// Key with just a path element.
    pub fn new(path: impl Into<String>) -> Self {
        Self(vec![Value::String(path.into())])
    }

    /// Append a trailing element.
    #[must_use]
    pub fn with(mut self, part: impl Into<Value>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Request path: the first element with one leading `/` removed.
    pub fn path(&self) -> ApiResult<&str> {
        match self.0.first() {
            Some(Value::String(path)) => Ok(path.strip_prefix('/').unwrap_or(path.as_str())),
            Some(other) => Err(ApiError::InvalidQueryKey(format!(
                "first element must be a string, got {other}"
            ))),
            None => Err(ApiError::InvalidQueryKey("key is empty".to_string())),
        }
    }

    /// Whether `prefix` matches this key element by element.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Stable string form used as the cache map key.
    pub fn hash_key(&self) -> String {
        Value::Array(self.0.clone()).to_string()
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(parts: Vec<Value>) -> Self {
        Self(parts)
    }
}

impl From<&str> for QueryKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_key())
    }
}
