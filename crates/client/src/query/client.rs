//! The cache manager behind every hook.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use campus_shared::ApiError;
use chrono::{DateTime, Utc};
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tokio::sync::broadcast;

use super::clock::{Clock, SystemClock};
use super::key::QueryKey;
use super::state::{QueryState, QueryStatus};

type CacheValue = Arc<dyn Any + Send + Sync>;
type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;
type Refetch = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A query descriptor: key, staleness window, enabled guard and the fetch
/// to run on a miss.
pub struct Query<T> {
    key: QueryKey,
    stale_time: Duration,
    enabled: bool,
    fetcher: Fetcher<T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            stale_time: self.stale_time,
            enabled: self.enabled,
            fetcher: self.fetcher.clone(),
        }
    }
}

impl<T: Send + 'static> Query<T> {
    pub fn new<F, Fut>(key: QueryKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        Self {
            key,
            stale_time: Duration::ZERO,
            enabled: true,
            fetcher: Arc::new(move || fetch().boxed()),
        }
    }

    /// How long a fetched value counts as fresh.
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// A disabled query never issues a request.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<T> Query<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn staleness(&self) -> Duration {
        self.stale_time
    }
}

/// Change notifications published by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A fetch for this key settled (success or failure).
    Updated(QueryKey),
    Invalidated(QueryKey),
    Removed(QueryKey),
    Cleared,
}

struct CacheEntry {
    data: Option<CacheValue>,
    updated_at: Option<DateTime<Utc>>,
    stale_time: Duration,
    invalidated: bool,
    error: Option<ApiError>,
    failure_count: u32,
    is_fetching: bool,
}

impl CacheEntry {
    fn new(stale_time: Duration) -> Self {
        Self {
            data: None,
            updated_at: None,
            stale_time,
            invalidated: false,
            error: None,
            failure_count: 0,
            is_fetching: false,
        }
    }

    fn data_as<T: Clone + 'static>(&self) -> Option<T> {
        self.data.as_ref()?.downcast_ref::<T>().cloned()
    }

    fn has_data_of<T: 'static>(&self) -> bool {
        self.data.as_ref().is_some_and(|d| d.is::<T>())
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if self.invalidated {
            return true;
        }
        match self.updated_at {
            None => true,
            // A clock that moved backwards keeps the entry fresh.
            Some(at) => (now - at)
                .to_std()
                .map(|elapsed| elapsed >= self.stale_time)
                .unwrap_or(false),
        }
    }

    fn state<T: Clone + 'static>(&self, now: DateTime<Utc>) -> QueryState<T> {
        let data = self.data_as::<T>();
        let status = if self.error.is_some() {
            QueryStatus::Error
        } else if data.is_some() {
            QueryStatus::Success
        } else if self.is_fetching {
            QueryStatus::Loading
        } else {
            QueryStatus::Idle
        };
        QueryState {
            status,
            is_stale: data.is_none() || self.is_stale(now),
            data,
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
            failure_count: self.failure_count,
        }
    }
}

struct Observer {
    id: u64,
    refetch: Refetch,
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    observers: Mutex<HashMap<QueryKey, Vec<Observer>>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<CacheEvent>,
    next_observer: AtomicU64,
}

/// In-memory query cache with stale-while-revalidate reads and prefix
/// invalidation.
///
/// One instance is one cache namespace. Clones share it.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                observers: Mutex::new(HashMap::new()),
                clock,
                events,
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> MutexGuard<'_, HashMap<QueryKey, Vec<Observer>>> {
        self.inner.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Current state of a key without fetching.
    pub fn state<T: Clone + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let now = self.inner.clock.now();
        self.entries()
            .get(key)
            .map(|entry| entry.state(now))
            .unwrap_or_else(QueryState::idle)
    }

    /// Stale-while-revalidate read.
    ///
    /// Fresh data is served without a request. Stale data is served
    /// immediately while one background refetch runs. A miss waits for the
    /// fetch. Disabled queries never fetch.
    pub async fn fetch<T>(&self, query: &Query<T>) -> QueryState<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !query.enabled {
            return self.state(&query.key);
        }

        enum Plan {
            Serve,
            Revalidate,
            Load,
        }

        let now = self.inner.clock.now();
        let plan = {
            let mut entries = self.entries();
            let entry = entries
                .entry(query.key.clone())
                .or_insert_with(|| CacheEntry::new(query.stale_time));
            entry.stale_time = query.stale_time;
            if entry.has_data_of::<T>() {
                if !entry.is_stale(now) || entry.is_fetching {
                    Plan::Serve
                } else {
                    entry.is_fetching = true;
                    Plan::Revalidate
                }
            } else {
                entry.is_fetching = true;
                Plan::Load
            }
        };

        match plan {
            Plan::Serve => {}
            Plan::Revalidate => {
                crate::log_debug!("revalidating {}", query.key);
                let client = self.clone();
                let query = query.clone();
                tokio::spawn(async move {
                    let _ = client.run_fetch(&query).await;
                });
            }
            Plan::Load => {
                let _ = self.run_fetch(query).await;
            }
        }
        self.state(&query.key)
    }

    /// Fetch regardless of freshness, e.g. from a retry action.
    pub async fn refetch<T>(&self, query: &Query<T>) -> QueryState<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if query.enabled {
            let _ = self.run_fetch(query).await;
        }
        self.state(&query.key)
    }

    async fn run_fetch<T>(&self, query: &Query<T>) -> Result<T, ApiError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entries()
            .entry(query.key.clone())
            .or_insert_with(|| CacheEntry::new(query.stale_time))
            .is_fetching = true;

        let result = (query.fetcher)().await;
        let now = self.inner.clock.now();

        {
            let mut entries = self.entries();
            // Re-inserted if the entry was removed while the request was out.
            let entry = entries
                .entry(query.key.clone())
                .or_insert_with(|| CacheEntry::new(query.stale_time));
            entry.is_fetching = false;
            entry.stale_time = query.stale_time;
            match &result {
                Ok(value) => {
                    entry.data = Some(Arc::new(value.clone()));
                    entry.updated_at = Some(now);
                    entry.invalidated = false;
                    entry.error = None;
                    entry.failure_count = 0;
                }
                Err(err) => {
                    crate::log_warn!("query {} failed: {}", query.key, err);
                    entry.error = Some(err.clone());
                    entry.failure_count += 1;
                }
            }
        }

        self.emit(CacheEvent::Updated(query.key.clone()));
        result
    }

    /// Mount a subscriber. While the returned watcher lives, invalidating a
    /// prefix of its key refetches it.
    pub fn watch<T>(&self, query: Query<T>) -> QueryWatcher<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let mounted = query.clone();
        let refetch: Refetch = Arc::new(move || {
            let weak = weak.clone();
            let query = mounted.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if query.enabled {
                    let _ = QueryClient { inner }.run_fetch(&query).await;
                }
            }
            .boxed()
        });

        self.observers()
            .entry(query.key.clone())
            .or_default()
            .push(Observer { id, refetch });

        QueryWatcher {
            client: self.clone(),
            events: self.subscribe(),
            query,
            id,
            _marker: PhantomData,
        }
    }

    fn unmount(&self, key: &QueryKey, id: u64) {
        let mut observers = self.observers();
        if let Some(list) = observers.get_mut(key) {
            list.retain(|o| o.id != id);
            if list.is_empty() {
                observers.remove(key);
            }
        }
    }

    /// Mark every entry under `prefix` stale and refetch mounted subscribers
    /// of matching keys. Returns once those refetches settled.
    pub async fn invalidate(&self, prefix: &QueryKey) {
        let invalidated: Vec<QueryKey> = {
            let mut entries = self.entries();
            entries
                .iter_mut()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, entry)| {
                    entry.invalidated = true;
                    key.clone()
                })
                .collect()
        };
        for key in &invalidated {
            self.emit(CacheEvent::Invalidated(key.clone()));
        }

        // One refetch per mounted key, however many watchers share it.
        let refetches: Vec<Refetch> = self
            .observers()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter_map(|(_, list)| list.first().map(|o| o.refetch.clone()))
            .collect();

        crate::log_debug!(
            "invalidated {} entries under {}, refetching {} mounted",
            invalidated.len(),
            prefix,
            refetches.len()
        );
        join_all(refetches.iter().map(|refetch| refetch())).await;
    }

    /// Run a mutation; on success invalidate every listed prefix.
    /// No optimistic writes: the cache only changes after the server confirmed.
    pub async fn mutate<T, Fut>(&self, invalidates: &[QueryKey], mutation: Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let value = mutation.await?;
        for prefix in invalidates {
            self.invalidate(prefix).await;
        }
        Ok(value)
    }

    /// Like [`QueryClient::mutate`], with prefixes computed from the result.
    pub async fn mutate_with<T, Fut, K>(&self, mutation: Fut, invalidates: K) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
        K: FnOnce(&T) -> Vec<QueryKey>,
    {
        let value = mutation.await?;
        for prefix in invalidates(&value) {
            self.invalidate(&prefix).await;
        }
        Ok(value)
    }

    pub fn get_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.entries().get(key).and_then(|entry| entry.data_as())
    }

    /// Write a value as if it had just been fetched.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let now = self.inner.clock.now();
        {
            let mut entries = self.entries();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(Duration::ZERO));
            entry.data = Some(Arc::new(value));
            entry.updated_at = Some(now);
            entry.invalidated = false;
            entry.error = None;
            entry.failure_count = 0;
        }
        self.emit(CacheEvent::Updated(key));
    }

    /// Drop every entry under `prefix`. Returns how many were removed.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let removed: Vec<QueryKey> = {
            let mut entries = self.entries();
            let keys: Vec<QueryKey> = entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };
        let count = removed.len();
        for key in removed {
            self.emit(CacheEvent::Removed(key));
        }
        count
    }

    /// Drop everything, e.g. on sign-out.
    pub fn clear(&self) {
        self.entries().clear();
        self.emit(CacheEvent::Cleared);
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.entries().keys().cloned().collect()
    }
}

/// A mounted query. Dropping it unmounts.
pub struct QueryWatcher<T> {
    client: QueryClient,
    events: broadcast::Receiver<CacheEvent>,
    query: Query<T>,
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QueryWatcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn key(&self) -> &QueryKey {
        &self.query.key
    }

    pub fn state(&self) -> QueryState<T> {
        self.client.state(&self.query.key)
    }

    /// The mount-time read: same rules as [`QueryClient::fetch`].
    pub async fn fetch(&self) -> QueryState<T> {
        self.client.fetch(&self.query).await
    }

    pub async fn refetch(&self) -> QueryState<T> {
        self.client.refetch(&self.query).await
    }

    /// Wait until this key's entry settles a fetch or is dropped. Returns
    /// `false` once the cache is gone.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.events.recv().await {
                Ok(CacheEvent::Updated(key)) | Ok(CacheEvent::Removed(key))
                    if key == self.query.key =>
                {
                    return true
                }
                Ok(CacheEvent::Cleared) => return true,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return true,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}

impl<T> Drop for QueryWatcher<T> {
    fn drop(&mut self) {
        self.client.unmount(&self.query.key, self.id);
    }
}
