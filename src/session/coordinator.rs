//! Single-flight refresh coordination.
//!
//! When several requests fail authorization at once, only the first caller
//! (the leader) runs the refresh. Everyone arriving while it is in flight is
//! queued as a waiter and receives the leader's outcome, success or failure.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::SessionError;

type Outcome = Result<String, SessionError>;

/// How a caller obtained its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRole {
    /// Ran the refresh call itself.
    Leader,
    /// Waited for someone else's refresh.
    Waiter,
    /// A refresh had already replaced the token it was holding.
    Reused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTicket {
    pub outcome: Outcome,
    pub role: RefreshRole,
}

#[derive(Default)]
struct Inner {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Holds the `refreshing` flag and the waiter list.
///
/// The mutex is only taken for synchronous bookkeeping and is never held
/// across an await.
#[derive(Default)]
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
    refresh_calls: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Callers currently queued behind the in-flight refresh.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// How many refreshes have been started by leaders so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Obtain a fresh token, running `refresh` only if no other refresh is
    /// in flight.
    ///
    /// `stale` is the token the caller's failed request carried. If no
    /// refresh is running and `current()` already returns a different token,
    /// a refresh has completed since that request was stamped and the
    /// current token is handed back without another call. `current` runs
    /// under the coordinator lock so this check cannot interleave with a
    /// leader finishing.
    pub async fn run<C, F, Fut>(&self, stale: Option<&str>, current: C, refresh: F) -> RefreshTicket
    where
        C: FnOnce() -> Option<String>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let waiter = {
            let mut inner = self.lock();
            if inner.refreshing {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push(tx);
                debug!(waiting = inner.waiters.len(), "Refresh in flight; queueing waiter");
                Some(rx)
            } else {
                if let (Some(stale), Some(current)) = (stale, current()) {
                    if current != stale {
                        debug!("Token already refreshed since request was sent; reusing it");
                        return RefreshTicket {
                            outcome: Ok(current),
                            role: RefreshRole::Reused,
                        };
                    }
                }
                inner.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            let outcome = rx.await.unwrap_or_else(|_| {
                Err(SessionError::AuthInvalid(
                    "token refresh was abandoned".to_string(),
                ))
            });
            return RefreshTicket {
                outcome,
                role: RefreshRole::Waiter,
            };
        }

        let mut lease = Lease {
            coordinator: self,
            armed: true,
        };
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        debug!("Starting token refresh");
        let outcome = refresh().await;

        let waiters = lease.release();
        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "Token refresh finished; resuming waiters"
        );
        for waiter in waiters {
            // a waiter whose caller went away is simply skipped
            let _ = waiter.send(outcome.clone());
        }

        RefreshTicket {
            outcome,
            role: RefreshRole::Leader,
        }
    }
}

/// Leader's hold on the `refreshing` flag. Dropping it without `release`
/// (the leader's future was cancelled) clears the flag and rejects waiters.
struct Lease<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl Lease<'_> {
    fn release(&mut self) -> Vec<oneshot::Sender<Outcome>> {
        self.armed = false;
        let mut inner = self.coordinator.lock();
        inner.refreshing = false;
        std::mem::take(&mut inner.waiters)
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if self.armed {
            let abandoned = self.release();
            warn!(
                waiters = abandoned.len(),
                "Token refresh dropped before completion"
            );
        }
    }
}
