//! Client-side query cache.
//!
//! # Design
//! `QueryClient` is built once at the application root and handed to
//! consumers by clone; clones share one cache. Entries are keyed by the JSON
//! form of their `QueryKey`. A fetch for a key that already has a request in
//! flight joins that request instead of issuing a second one.
//!
//! Both maps live behind `std::sync::Mutex` and the guards are never held
//! across an `.await`. When both are needed, `entries` is locked first.
//!
//! Invalidating or removing a key while its fetch is in flight marks the
//! pending fetch. The fetch still answers its callers, but its result is
//! stored as stale (invalidated) or not stored at all (removed).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::Api;
use crate::error::ApiResult;
use crate::query::{QueryFn, QueryKey, UnauthorizedBehavior};

/// How long cached data counts as fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleTime {
    /// Stale as soon as it is older than the duration. `ZERO` means always.
    After(Duration),
    /// Never stale on its own; only invalidation forces a refetch.
    Infinite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Poll interval used by `refetch_due`; `None` disables polling.
    pub refetch_interval: Option<Duration>,
    /// Whether `on_window_focus` refetches stale queries.
    pub refetch_on_window_focus: bool,
    pub stale_time: StaleTime,
    /// Extra attempts after a failed fetch.
    pub retry: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            refetch_interval: None,
            refetch_on_window_focus: false,
            stale_time: StaleTime::Infinite,
            retry: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOptions {
    /// Extra attempts after a failed mutation.
    pub retry: u32,
}

/// Options applied to every query and mutation run through the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultOptions {
    pub queries: QueryOptions,
    pub mutations: MutationOptions,
}

type SharedFetch = Shared<BoxFuture<'static, ApiResult<Option<Value>>>>;

struct Entry {
    key: QueryKey,
    data: Option<Value>,
    updated_at: Instant,
    invalidated: bool,
    /// Fetch function that produced `data`; refetches reuse it.
    query_fn: Option<QueryFn>,
}

/// A fetch that has started but not yet written its result.
struct Pending {
    key: QueryKey,
    fetch: SharedFetch,
    invalidated: bool,
    removed: bool,
}

struct Inner {
    default_fn: QueryFn,
    options: DefaultOptions,
    entries: Mutex<HashMap<String, Entry>>,
    in_flight: Mutex<HashMap<String, Pending>>,
}

/// Shared query cache handle.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("options", &self.inner.options)
            .field("entries", &lock(&self.inner.entries).len())
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    pub fn new(default_fn: QueryFn, options: DefaultOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                default_fn,
                options,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The application-wide configuration: 401s propagate, no polling, no
    /// refetch on focus, data never goes stale on its own, no retries.
    pub fn with_defaults(api: &Api) -> Self {
        Self::new(api.query_fn(UnauthorizedBehavior::Throw), DefaultOptions::default())
    }

    pub fn options(&self) -> &DefaultOptions {
        &self.inner.options
    }

    /// Cached data if fresh, otherwise fetch with the default fetch function.
    pub async fn fetch_query(&self, key: &QueryKey) -> ApiResult<Option<Value>> {
        let query_fn = self.inner.default_fn.clone();
        self.fetch_query_with(key, query_fn).await
    }

    /// Like `fetch_query`, with a per-query fetch function. This is how a
    /// query uses the trailing key elements the default function ignores.
    pub async fn fetch_query_with(&self, key: &QueryKey, query_fn: QueryFn) -> ApiResult<Option<Value>> {
        if let Some(data) = self.fresh_data(key) {
            debug!(%key, "query cache hit");
            return Ok(data);
        }
        self.fetch_fresh(key, query_fn).await
    }

    /// Cached data regardless of freshness. `None` for a missing entry and
    /// for an entry holding an empty result.
    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        lock(&self.inner.entries)
            .get(&key.hash_key())
            .and_then(|e| e.data.clone())
    }

    /// Store `data` as a fresh result for `key`.
    pub fn set_query_data(&self, key: &QueryKey, data: Value) {
        let mut entries = lock(&self.inner.entries);
        let query_fn = entries.get(&key.hash_key()).and_then(|e| e.query_fn.clone());
        entries.insert(
            key.hash_key(),
            Entry {
                key: key.clone(),
                data: Some(data),
                updated_at: Instant::now(),
                invalidated: false,
                query_fn,
            },
        );
    }

    /// Mark every entry whose key starts with `prefix` as stale. Returns how
    /// many entries matched.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = lock(&self.inner.entries);
        let mut count = 0;
        for entry in entries.values_mut().filter(|e| e.key.starts_with(prefix)) {
            entry.invalidated = true;
            count += 1;
        }
        self.mark_pending(prefix, |p| p.invalidated = true);
        drop(entries);
        debug!(%prefix, count, "invalidated queries");
        count
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = lock(&self.inner.entries);
        let before = entries.len();
        entries.retain(|_, e| !e.key.starts_with(prefix));
        self.mark_pending(prefix, |p| p.removed = true);
        before - entries.len()
    }

    pub fn clear(&self) {
        let mut entries = lock(&self.inner.entries);
        entries.clear();
        for pending in lock(&self.inner.in_flight).values_mut() {
            pending.removed = true;
        }
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.fresh_data(key).is_none()
    }

    /// Run a mutation under the mutation retry policy. The cache is not
    /// touched; callers invalidate what the mutation changed.
    pub async fn mutate<F, Fut, T>(&self, mut mutation: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let retry = self.inner.options.mutations.retry;
        let mut attempt = 0;
        loop {
            match mutation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < retry => {
                    attempt += 1;
                    warn!(error = %e, attempt, "mutation failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Window regained focus. Refetches stale entries when
    /// `refetch_on_window_focus` is set; returns how many refetches succeeded.
    pub async fn on_window_focus(&self) -> usize {
        if !self.inner.options.queries.refetch_on_window_focus {
            return 0;
        }
        let stale = self.collect(|client, entry| !client.is_fresh(entry));
        self.refetch_all(stale).await
    }

    /// Refetch entries older than `refetch_interval`. No-op when polling is
    /// disabled. Returns how many refetches succeeded.
    pub async fn refetch_due(&self) -> usize {
        let Some(interval) = self.inner.options.queries.refetch_interval else {
            return 0;
        };
        let due = self.collect(|_, entry| entry.updated_at.elapsed() >= interval);
        self.refetch_all(due).await
    }

    /// Apply `mark` to in-flight fetches under `prefix`. Callers hold the
    /// `entries` lock.
    fn mark_pending(&self, prefix: &QueryKey, mark: impl Fn(&mut Pending)) {
        lock(&self.inner.in_flight)
            .values_mut()
            .filter(|p| p.key.starts_with(prefix))
            .for_each(mark);
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        if entry.invalidated {
            return false;
        }
        match self.inner.options.queries.stale_time {
            StaleTime::Infinite => true,
            StaleTime::After(d) => entry.updated_at.elapsed() < d,
        }
    }

    fn fresh_data(&self, key: &QueryKey) -> Option<Option<Value>> {
        let entries = lock(&self.inner.entries);
        entries
            .get(&key.hash_key())
            .filter(|e| self.is_fresh(e))
            .map(|e| e.data.clone())
    }

    fn collect(&self, pred: impl Fn(&Self, &Entry) -> bool) -> Vec<(QueryKey, QueryFn)> {
        lock(&self.inner.entries)
            .values()
            .filter(|e| pred(self, *e))
            .map(|e| {
                let query_fn = e.query_fn.clone().unwrap_or_else(|| self.inner.default_fn.clone());
                (e.key.clone(), query_fn)
            })
            .collect()
    }

    async fn refetch_all(&self, queries: Vec<(QueryKey, QueryFn)>) -> usize {
        let results = join_all(
            queries
                .iter()
                .map(|(key, query_fn)| self.fetch_fresh(key, query_fn.clone())),
        )
        .await;
        results.iter().filter(|r| r.is_ok()).count()
    }

    /// Fetch bypassing freshness, joining any in-flight fetch for the key.
    async fn fetch_fresh(&self, key: &QueryKey, query_fn: QueryFn) -> ApiResult<Option<Value>> {
        let hash = key.hash_key();
        let fetch = {
            let mut in_flight = lock(&self.inner.in_flight);
            match in_flight.get(&hash) {
                Some(existing) => {
                    debug!(%key, "joining in-flight query");
                    existing.fetch.clone()
                }
                None => {
                    let fetch = self.run(key.clone(), hash.clone(), query_fn).boxed().shared();
                    in_flight.insert(
                        hash,
                        Pending {
                            key: key.clone(),
                            fetch: fetch.clone(),
                            invalidated: false,
                            removed: false,
                        },
                    );
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Attempts the fetch under the query retry policy, stores a success, and
    /// unregisters itself from the in-flight map.
    fn run(
        &self,
        key: QueryKey,
        hash: String,
        query_fn: QueryFn,
    ) -> impl Future<Output = ApiResult<Option<Value>>> + Send + 'static {
        let client = self.clone();
        let retry = self.inner.options.queries.retry;
        async move {
            let mut attempt = 0;
            let result = loop {
                match query_fn(key.clone()).await {
                    Ok(data) => break Ok(data),
                    Err(e) if attempt < retry => {
                        attempt += 1;
                        warn!(%key, error = %e, attempt, "query failed, retrying");
                    }
                    Err(e) => break Err(e),
                }
            };

            let mut entries = lock(&client.inner.entries);
            let pending = lock(&client.inner.in_flight).remove(&hash);
            let (invalidated, removed) = pending
                .map(|p| (p.invalidated, p.removed))
                .unwrap_or((false, false));
            match &result {
                Ok(_) if removed => debug!(%key, "query removed while in flight, result dropped"),
                Ok(data) => {
                    if invalidated {
                        debug!(%key, "query invalidated while in flight, stored as stale");
                    }
                    entries.insert(
                        hash,
                        Entry {
                            key,
                            data: data.clone(),
                            updated_at: Instant::now(),
                            invalidated,
                            query_fn: Some(query_fn),
                        },
                    );
                }
                Err(_) => {}
            }
            drop(entries);
            result
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
