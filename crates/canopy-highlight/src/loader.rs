//! A deduplicating, memoizing async loader.
//!
//! [`Loader::load`] resolves a key at most once at a time: concurrent callers
//! for the same key share one in-flight future and all observe its outcome.
//! Successful values are cached; failures are not, so a later call retries.
//!
//! The loader's state is behind a `std::sync::Mutex` that is only held for
//! map lookups and never across an await point.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

type Resolve<V, E> =
    Arc<dyn Fn(Loader<V, E>, String) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

type Pending<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct State<V, E> {
    cache: HashMap<String, V>,
    pending: HashMap<String, Pending<V, E>>,
}

struct Inner<V, E> {
    resolve: Resolve<V, E>,
    state: Mutex<State<V, E>>,
}

/// Keyed async cache. Cloning shares the same cache.
pub struct Loader<V, E> {
    inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for Loader<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V, E> Loader<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a loader that resolves missing keys with `resolve`.
    ///
    /// The resolver receives a handle to this loader, so it can fill the
    /// cache for other keys (or for the requested one) while resolving.
    pub fn new<F, Fut>(resolve: F) -> Self
    where
        F: Fn(Loader<V, E>, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                resolve: Arc::new(move |loader, key| resolve(loader, key).boxed()),
                state: Mutex::new(State {
                    cache: HashMap::new(),
                    pending: HashMap::new(),
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<V, E>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value, join an in-flight resolution, or start one.
    pub async fn load(&self, key: &str) -> Result<V, E> {
        if let Some(ready) = self.lookup(key) {
            return ready.await;
        }

        // The resolver runs inside the task, so only the caller whose task
        // wins the pending slot ever invokes it.
        let resolve = self.inner.resolve.clone();
        let loader = self.clone();
        let owned = key.to_string();
        let task = async move {
            let result = resolve(loader.clone(), owned.clone()).await;
            let mut state = loader.lock();
            state.pending.remove(&owned);
            if let Ok(value) = &result {
                state.cache.insert(owned, value.clone());
            }
            result
        }
        .boxed()
        .shared();

        let task = {
            let mut state = self.lock();
            if let Some(value) = state.cache.get(key) {
                return Ok(value.clone());
            }
            // Another caller may have claimed the slot since `lookup`.
            match state.pending.get(key) {
                Some(pending) => pending.clone(),
                None => {
                    state.pending.insert(key.to_string(), task.clone());
                    task
                }
            }
        };
        task.await
    }

    fn lookup(&self, key: &str) -> Option<BoxFuture<'static, Result<V, E>>> {
        let state = self.lock();
        if let Some(value) = state.cache.get(key) {
            let value = value.clone();
            return Some(async move { Ok(value) }.boxed());
        }
        state.pending.get(key).map(|pending| pending.clone().boxed())
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().cache.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().cache.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: V) -> V {
        self.lock().cache.insert(key.into(), value.clone());
        value
    }

    /// True while a resolution for `key` is in flight.
    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().pending.contains_key(key)
    }

    /// Forget every cached value and in-flight resolution.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.cache.clear();
        state.pending.clear();
    }

    /// Keys of all cached values.
    pub fn keys(&self) -> Vec<String> {
        self.lock().cache.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use std::thread;
    use std::time::Duration;

    /// Suspends exactly once.
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    fn counting(calls: Arc<AtomicUsize>) -> Loader<String, String> {
        Loader::new(move |_, key: String| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                YieldOnce(false).await;
                Ok(key.to_uppercase())
            }
        })
    }

    #[test]
    fn test_concurrent_loads_share_one_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = counting(calls.clone());

        let (a, b) = block_on(async { futures::join!(loader.load("rust"), loader.load("rust")) });
        assert_eq!(a.unwrap(), "RUST");
        assert_eq!(b.unwrap(), "RUST");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Cached from now on.
        assert_eq!(block_on(loader.load("rust")).unwrap(), "RUST");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(loader.has("rust"));
        assert!(!loader.is_pending("rust"));
    }

    #[test]
    fn test_loads_from_two_threads_resolve_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader: Loader<String, String> = Loader::new(move |_, key: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(200));
                Ok(key.to_uppercase())
            }
        });

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let loader = loader.clone();
                thread::spawn(move || block_on(loader.load("x")))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "X");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader: Loader<u32, String> = Loader::new(move |_, key: String| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(format!("{key} unavailable"))
                } else {
                    Ok(7)
                }
            }
        });

        assert_eq!(block_on(loader.load("x")).unwrap_err(), "x unavailable");
        assert!(!loader.has("x"));
        assert!(!loader.is_pending("x"));
        assert_eq!(block_on(loader.load("x")).unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolver_can_fill_other_keys() {
        let loader: Loader<&'static str, String> = Loader::new(|loader: Loader<_, _>, key: String| async move {
            loader.set("alias", "value");
            loader.get("alias").ok_or(key)
        });
        assert_eq!(block_on(loader.load("module")).unwrap(), "value");
        assert!(loader.has("alias"));
        assert!(loader.has("module"));
        let mut keys = loader.keys();
        keys.sort();
        assert_eq!(keys, ["alias", "module"]);
    }

    #[test]
    fn test_set_get_clear() {
        let loader = counting(Arc::new(AtomicUsize::new(0)));
        assert_eq!(loader.set("k", "v".to_string()), "v");
        assert_eq!(loader.get("k").as_deref(), Some("v"));
        assert_eq!(block_on(loader.load("k")).unwrap(), "v");
        loader.clear();
        assert!(loader.get("k").is_none());
    }
}
