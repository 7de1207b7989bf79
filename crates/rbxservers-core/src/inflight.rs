//! Registry of outstanding upstream fetches.
//!
//! At most one fetch per [`CursorKey`] is outstanding at any instant. The
//! check for an existing fetch and the registration of a new one happen in
//! one critical section ([`InFlightRegistry::start`]), so two callers can
//! never both observe absence and both start a fetch.
//!
//! A registered fetch runs as its own tokio task and completes even when all
//! waiters stop polling. Its handle is removed by a drop guard inside the
//! task, so removal also happens on failure or panic, and it happens before
//! any waiter observes the result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::cursor::CursorKey;
use crate::error::UpstreamError;
use crate::page::Page;

pub type PageResult = Result<Page, UpstreamError>;

/// Completion signal of an outstanding fetch. Every clone resolves to the
/// same result.
pub type PendingPage = Shared<BoxFuture<'static, PageResult>>;

/// Outcome of [`InFlightRegistry::start`].
pub enum Flight {
    /// The caller registered a new fetch and owns it.
    Started(PendingPage),
    /// A fetch for the key was already outstanding.
    Joined(PendingPage),
}

impl Flight {
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    pub fn into_pending(self) -> PendingPage {
        match self {
            Self::Started(pending) | Self::Joined(pending) => pending,
        }
    }
}

/// Shared in-flight registry. Clones are handles to the same map.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    pending: Arc<Mutex<HashMap<CursorKey, PendingPage>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outstanding fetch for `key`, if any.
    pub fn join(&self, key: &CursorKey) -> Option<PendingPage> {
        self.pending.lock().get(key).cloned()
    }

    /// Join the outstanding fetch for `key`, or spawn the task built by
    /// `make_task` and register it.
    ///
    /// `make_task` is only called when no fetch is outstanding, and it runs
    /// while the registry lock is held: it must only build the future, not
    /// touch the registry. Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, key: CursorKey, make_task: F) -> Flight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PageResult> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.get(&key) {
            return Flight::Joined(existing.clone());
        }

        let task = make_task();
        let registry = self.clone();
        let guard_key = key.clone();
        let handle = tokio::spawn(async move {
            let _guard = FinishGuard {
                registry,
                key: guard_key,
            };
            task.await
        });

        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(UpstreamError::TaskAborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        pending.insert(key, shared.clone());
        Flight::Started(shared)
    }

    /// Remove the handle for `key`. Returns `true` if one was registered.
    pub fn finish(&self, key: &CursorKey) -> bool {
        self.pending.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Removes the registry handle when the fetch task ends, however it ends.
struct FinishGuard {
    registry: InFlightRegistry,
    key: CursorKey,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.registry.finish(&self.key);
    }
}
