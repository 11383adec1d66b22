//! Resilience layer: every outbound network or chain call passes through
//! cache → rate gate → timeout + retry → offline queue, in that order, so
//! call sites never reimplement their own timers.
//!
//! The cache and the rate gate are the only state shared between concurrent
//! pair scans. A call that fails with a connectivity error flips the layer
//! offline and surfaces the failure to its caller, so the cycle can abort
//! and reschedule. Calls submitted while already offline are buffered and
//! replayed in submission order once connectivity returns; each caller's
//! original future is fulfilled by its buffered call's eventual result.

pub mod cache;
pub mod retry;

pub use retry::RetryPolicy;

use crate::errors::{AppError, Result};
use cache::TtlCache;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Minimum spacing between request releases, shared by all callers.
    pub rate_interval: Duration,
    /// Per-attempt deadline for any single outbound call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            rate_interval: Duration::from_secs(1),
            call_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

type Thunk = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct Inner {
    cfg: ResilienceConfig,
    cache: TtlCache,
    last_release: tokio::sync::Mutex<Option<Instant>>,
    online: AtomicBool,
    queue: Mutex<VecDeque<Thunk>>,
    drain_signal: Notify,
}

#[derive(Clone)]
pub struct Resilience {
    inner: Arc<Inner>,
}

impl Resilience {
    pub fn new(cfg: ResilienceConfig) -> Self {
        let inner = Arc::new(Inner {
            cfg,
            cache: TtlCache::new(),
            last_release: tokio::sync::Mutex::new(None),
            online: AtomicBool::new(true),
            queue: Mutex::new(VecDeque::new()),
            drain_signal: Notify::new(),
        });
        tokio::spawn(drain_loop(inner.clone()));
        Self { inner }
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Connectivity flag. Flipping back online wakes the drainer, which
    /// replays buffered calls in the order they were submitted.
    pub fn set_online(&self, online: bool) {
        let was = self.inner.online.swap(online, Ordering::SeqCst);
        if online && !was {
            info!("connectivity restored, draining offline queue");
            self.inner.drain_signal.notify_one();
        } else if !online && was {
            warn!("connectivity lost, buffering outbound calls");
        }
    }

    /// Wraps one outbound call. `key` scopes the cache entry; `ttl` should
    /// match the volatility of the data being fetched.
    pub async fn call<T, F, Fut>(&self, key: &str, ttl: Duration, op: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let op = Arc::new(op);
        if let Some(value) = self.inner.cache.get(key) {
            debug!(key, "cache hit");
            return Ok(serde_json::from_value(value)?);
        }
        if !self.is_online() {
            return self.buffer(key.to_string(), ttl, op).await;
        }
        match run_guarded(&self.inner, key, ttl, op).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_connectivity() => {
                // Surface the failure so the caller can abort its cycle and
                // reschedule; only calls submitted from here on are buffered.
                self.set_online(false);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn buffer<T, F, Fut>(&self, key: String, ttl: Duration, op: Arc<F>) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<T>>();
        let inner = self.inner.clone();
        let thunk: Thunk = Box::new(move || {
            Box::pin(async move {
                let result = run_guarded(&inner, &key, ttl, op).await;
                let _ = tx.send(result);
            })
        });
        {
            let mut queue = self.inner.queue.lock().expect("offline queue lock poisoned");
            queue.push_back(thunk);
            debug!(depth = queue.len(), "call buffered while offline");
        }
        // Connectivity may have returned between the offline check and the
        // push, with the drainer already gone back to sleep. Re-check and
        // wake it so the freshly queued call cannot be stranded.
        if self.is_online() {
            self.inner.drain_signal.notify_one();
        }
        rx.await
            .map_err(|_| AppError::Other("offline queue dropped the call".into()))?
    }
}

/// Rate gate → timeout → retry → cache write, for one call.
async fn run_guarded<T, F, Fut>(inner: &Inner, key: &str, ttl: Duration, op: Arc<F>) -> Result<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
{
    // A queued duplicate may find the key already refreshed.
    if let Some(value) = inner.cache.get(key) {
        return Ok(serde_json::from_value(value)?);
    }
    pace(inner).await;
    let timeout = inner.cfg.call_timeout;
    let value = inner
        .cfg
        .retry
        .execute(|| {
            let op = op.clone();
            async move {
                match tokio::time::timeout(timeout, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::Timeout(timeout)),
                }
            }
        })
        .await?;
    inner.cache.put(key, serde_json::to_value(&value)?, ttl);
    Ok(value)
}

/// Global release gate: at most one request per `rate_interval`, whoever
/// the caller is. Holding the lock across the sleep is what serializes
/// release times.
async fn pace(inner: &Inner) {
    let mut last = inner.last_release.lock().await;
    if let Some(prev) = *last {
        let due = prev + inner.cfg.rate_interval;
        let now = Instant::now();
        if due > now {
            tokio::time::sleep(due - now).await;
        }
    }
    *last = Some(Instant::now());
}

async fn drain_loop(inner: Arc<Inner>) {
    loop {
        inner.drain_signal.notified().await;
        while inner.online.load(Ordering::SeqCst) {
            let next = inner
                .queue
                .lock()
                .expect("offline queue lock poisoned")
                .pop_front();
            match next {
                Some(thunk) => thunk().await,
                None => break,
            }
        }
    }
}
