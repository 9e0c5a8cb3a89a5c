//! Lazy singleton loader for the search index.
//!
//! [`IndexLoader::acquire_index`] may be called any number of times, from
//! any number of tasks, before or after the index is ready. At most one
//! fetch-and-init sequence is ever in flight:
//!
//! | State | `acquire_index` |
//! |-------|-----------------|
//! | `NotStarted` | starts a load, moves to `Loading` |
//! | `Loading` | awaits the same in-flight load |
//! | `Ready` | returns the stored handle immediately |
//!
//! A failed load is reported to every caller awaiting it and returns the
//! loader to `NotStarted`. Nothing retries automatically; the next call
//! starts a fresh attempt.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::index::{IndexFetcher, IndexHandle, ModuleLocation};

/// Observable loader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotStarted,
    Loading,
    Ready,
}

/// Why the index could not be acquired.
///
/// Cloneable so that one failure can be delivered to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch search index from {location}: {message}")]
    Fetch { location: String, message: String },
    #[error("search index at {location} failed to initialize: {message}")]
    Init { location: String, message: String },
}

type PendingLoad = Shared<BoxFuture<'static, Result<IndexHandle, LoadError>>>;

enum Slot {
    NotStarted,
    Loading { attempt: u64, pending: PendingLoad },
    Ready(IndexHandle),
}

/// Owns the single index handle of a page session.
pub struct IndexLoader {
    fetcher: Arc<dyn IndexFetcher>,
    location: ModuleLocation,
    slot: Mutex<Slot>,
    attempts: Mutex<u64>,
}

impl IndexLoader {
    pub fn new(fetcher: Arc<dyn IndexFetcher>, location: ModuleLocation) -> Self {
        Self {
            fetcher,
            location,
            slot: Mutex::new(Slot::NotStarted),
            attempts: Mutex::new(0),
        }
    }

    pub fn location(&self) -> &ModuleLocation {
        &self.location
    }

    pub fn state(&self) -> LoadState {
        match &*self.slot() {
            Slot::NotStarted => LoadState::NotStarted,
            Slot::Loading { .. } => LoadState::Loading,
            Slot::Ready(_) => LoadState::Ready,
        }
    }

    /// The handle, if the index is already ready.
    pub fn peek(&self) -> Option<IndexHandle> {
        match &*self.slot() {
            Slot::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Number of fetch-and-init sequences started so far.
    pub fn attempts(&self) -> u64 {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the shared index handle, loading it on first use.
    pub async fn acquire_index(&self) -> Result<IndexHandle, LoadError> {
        let (attempt, pending) = {
            let mut slot = self.slot();
            let in_flight = match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Loading { attempt, pending } => Some((*attempt, pending.clone())),
                Slot::NotStarted => None,
            };
            match in_flight {
                Some(in_flight) => in_flight,
                None => {
                    let attempt = self.next_attempt();
                    let pending = self.start_load(attempt);
                    *slot = Slot::Loading {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let result = pending.await;
        self.settle(attempt, &result);
        result
    }

    fn start_load(&self, attempt: u64) -> PendingLoad {
        let fetcher = Arc::clone(&self.fetcher);
        let location = self.location.clone();
        debug!(%location, attempt, "loading search index");

        async move {
            let module = fetcher
                .fetch(&location)
                .await
                .map_err(|e| LoadError::Fetch {
                    location: location.to_string(),
                    message: format!("{:#}", e),
                })?;
            module.init().await.map_err(|e| LoadError::Init {
                location: location.to_string(),
                message: format!("{:#}", e),
            })?;
            if !module.is_ready() {
                return Err(LoadError::Init {
                    location: location.to_string(),
                    message: "module not ready after init".to_string(),
                });
            }
            Ok(IndexHandle::new(module))
        }
        .boxed()
        .shared()
    }

    /// Records the outcome of `attempt`, unless a newer attempt has
    /// replaced it in the meantime.
    fn settle(&self, attempt: u64, result: &Result<IndexHandle, LoadError>) {
        let mut slot = self.slot();
        let current = matches!(&*slot, Slot::Loading { attempt: a, .. } if *a == attempt);
        if !current {
            return;
        }
        match result {
            Ok(handle) => {
                info!(location = %self.location, "search index ready");
                *slot = Slot::Ready(handle.clone());
            }
            Err(e) => {
                warn!(error = %e, "search index load failed");
                *slot = Slot::NotStarted;
            }
        }
    }

    fn next_attempt(&self) -> u64 {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        *attempts += 1;
        *attempts
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexModule;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use content_discovery_core::search::SearchHit;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct StubModule {
        inits: Arc<AtomicUsize>,
        fail_init: bool,
        stays_unready: bool,
        ready: AtomicBool,
    }

    #[async_trait]
    impl IndexModule for StubModule {
        async fn init(&self) -> Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                bail!("corrupt index");
            }
            if !self.stays_unready {
                self.ready.store(true, Ordering::SeqCst);
            }
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }
    }

    /// Fetcher that waits on `gate` and fails its first `failures` fetches.
    struct CountingFetcher {
        fetches: AtomicUsize,
        inits: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
        failures: usize,
        fail_init: bool,
        stays_unready: bool,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                inits: Arc::new(AtomicUsize::new(0)),
                gate: None,
                failures: 0,
                fail_init: false,
                stays_unready: false,
            }
        }
    }

    #[async_trait]
    impl IndexFetcher for CountingFetcher {
        async fn fetch(&self, _location: &ModuleLocation) -> Result<Arc<dyn IndexModule>> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            if n < self.failures {
                bail!("404 Not Found");
            }
            Ok(Arc::new(StubModule {
                inits: Arc::clone(&self.inits),
                fail_init: self.fail_init,
                stays_unready: self.stays_unready,
                ready: AtomicBool::new(false),
            }))
        }
    }

    fn location() -> ModuleLocation {
        ModuleLocation::File(PathBuf::from("dist/pagefind/index.json"))
    }

    #[tokio::test]
    async fn test_concurrent_first_access_fetches_once() {
        let fetcher = Arc::new(CountingFetcher::new());
        let loader = IndexLoader::new(fetcher.clone(), location());

        let results =
            futures::future::join_all((0..8).map(|_| loader.acquire_index())).await;

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.inits.load(Ordering::SeqCst), 1);
        let handles: Vec<IndexHandle> = results.into_iter().map(|r| r.unwrap()).collect();
        for h in &handles {
            assert!(h.ready());
            assert!(h.ptr_eq(&handles[0]));
        }
        assert_eq!(loader.state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn test_callers_arriving_while_loading_share_the_load() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(CountingFetcher {
            gate: Some(Arc::clone(&gate)),
            ..CountingFetcher::new()
        });
        let loader = Arc::new(IndexLoader::new(fetcher.clone(), location()));

        let first = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.acquire_index().await }
        });
        while loader.state() != LoadState::Loading {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.acquire_index().await }
        });
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(loader.state(), LoadState::Loading);

        gate.notify_one();
        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(loader.attempts(), 1);
    }

    #[tokio::test]
    async fn test_ready_handle_returned_without_refetch() {
        let fetcher = Arc::new(CountingFetcher::new());
        let loader = IndexLoader::new(fetcher.clone(), location());
        let first = loader.acquire_index().await.unwrap();
        for _ in 0..5 {
            let again = loader.acquire_index().await.unwrap();
            assert!(again.ptr_eq(&first));
        }
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert!(loader.peek().is_some());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_retried() {
        let fetcher = Arc::new(CountingFetcher {
            failures: 1,
            ..CountingFetcher::new()
        });
        let loader = IndexLoader::new(fetcher.clone(), location());

        let (a, b) = futures::join!(loader.acquire_index(), loader.acquire_index());
        let (a, b) = (a.unwrap_err(), b.unwrap_err());
        assert_eq!(a, b);
        assert!(matches!(a, LoadError::Fetch { .. }));
        assert!(a.to_string().contains("404"));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(loader.state(), LoadState::NotStarted);

        // Nothing retried on its own.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);

        // The next explicit call may try again.
        let handle = loader.acquire_index().await.unwrap();
        assert!(handle.ready());
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(loader.state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn test_init_failure_reported() {
        let fetcher = Arc::new(CountingFetcher {
            fail_init: true,
            ..CountingFetcher::new()
        });
        let loader = IndexLoader::new(fetcher.clone(), location());
        let err = loader.acquire_index().await.unwrap_err();
        assert!(matches!(err, LoadError::Init { .. }));
        assert!(err.to_string().contains("corrupt index"));
        assert_eq!(loader.state(), LoadState::NotStarted);
        assert!(loader.peek().is_none());
    }

    #[tokio::test]
    async fn test_module_unready_after_init_is_not_handed_out() {
        let fetcher = Arc::new(CountingFetcher {
            stays_unready: true,
            ..CountingFetcher::new()
        });
        let loader = IndexLoader::new(fetcher.clone(), location());
        let err = loader.acquire_index().await.unwrap_err();
        assert!(matches!(err, LoadError::Init { .. }));
        assert!(err.to_string().contains("not ready"));
        assert_eq!(loader.state(), LoadState::NotStarted);
        assert!(loader.peek().is_none());
    }
}
