//! Single-flight coordination of token refreshes.
//!
//! The first request that sees a 401 becomes the leader and performs the
//! refresh. Every request that sees a 401 while the leader is working parks
//! on a oneshot channel and is released, in arrival order, with the leader's
//! outcome.

use crate::errors::ApiError;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Result a parked request receives when the refresh settles.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed(ApiError),
}

#[derive(Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

pub enum Acquire<'a> {
    Leader(RefreshGuard<'a>),
    Waiter(RefreshWaiter),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Becomes the refresh leader, or joins the queue when a refresh is
    /// already in flight. `trigger` is the 401 that started the refresh and
    /// is what every queued request receives if the leader is dropped
    /// without settling.
    pub fn acquire(&self, trigger: ApiError) -> Acquire<'_> {
        let mut state = self.lock();
        if let RefreshState::Refreshing { ref mut waiters } = *state {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            return Acquire::Waiter(RefreshWaiter { rx, trigger });
        }

        *state = RefreshState::Refreshing {
            waiters: Vec::new(),
        };
        Acquire::Leader(RefreshGuard {
            coordinator: self,
            trigger,
            settled: false,
        })
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of requests currently parked behind the refresh.
    pub fn waiting(&self) -> usize {
        match *self.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { ref waiters } => waiters.len(),
        }
    }

    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let waiters = match mem::take(&mut *self.lock()) {
            RefreshState::Idle => Vec::new(),
            RefreshState::Refreshing { waiters } => waiters,
        };

        let count = waiters.len();
        for waiter in waiters {
            // A waiter whose caller went away has nothing to release.
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

/// Held by the request performing the refresh.
///
/// Dropping it unsettled fails every queued request with the trigger error,
/// so the coordinator always returns to idle.
pub struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    trigger: ApiError,
    settled: bool,
}

impl RefreshGuard<'_> {
    pub fn trigger(&self) -> &ApiError {
        &self.trigger
    }

    /// Releases the queue for replay. Returns how many requests were waiting.
    pub fn resolve(mut self) -> usize {
        self.settled = true;
        self.coordinator.settle(RefreshOutcome::Refreshed)
    }

    /// Fails every queued request with `error`.
    pub fn reject(mut self, error: ApiError) -> usize {
        self.settled = true;
        self.coordinator.settle(RefreshOutcome::Failed(error))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let released = self
                .coordinator
                .settle(RefreshOutcome::Failed(self.trigger.clone()));
            tracing::debug!(
                "Refresh abandoned, failed {} queued request(s)",
                released
            );
        }
    }
}

/// A request parked until the in-flight refresh settles.
pub struct RefreshWaiter {
    rx: oneshot::Receiver<RefreshOutcome>,
    trigger: ApiError,
}

impl RefreshWaiter {
    pub async fn wait(self) -> RefreshOutcome {
        self.rx
            .await
            .unwrap_or(RefreshOutcome::Failed(self.trigger))
    }
}
