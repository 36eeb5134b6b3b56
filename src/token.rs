//! Single-flight token refresh.
//!
//! When several requests discover a stale credential at the same time, only
//! the first caller (the leader) runs the refresh callback. Everybody else is
//! parked in a FIFO queue and released with the leader's outcome.

use std::{
    collections::VecDeque,
    future::Future,
    sync::{Mutex, MutexGuard},
};

use tokio::sync::oneshot;

use crate::RefreshError;

type Waiter = oneshot::Sender<Result<(), RefreshError>>;

#[derive(Default)]
struct TokenState {
    refreshing: bool,
    waiters: VecDeque<Waiter>,
}

/// Coordinates token refreshes for one [`Api`](crate::Api) instance.
#[derive(Default)]
pub struct TokenManager {
    state: Mutex<TokenState>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TokenManager")
            .field("refreshing", &state.refreshing)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<Result<(), RefreshError>>),
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `refresh` unless a refresh is already in flight, in which case
    /// the caller waits for that refresh and shares its outcome.
    ///
    /// `on_failed` is invoked exactly once per failed refresh, by the leader.
    pub async fn handle_refresh<F, Fut>(
        &self,
        refresh: F,
        on_failed: Option<&(dyn Fn() + Send + Sync)>,
    ) -> Result<(), RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), RefreshError>>,
    {
        let receiver = match self.enter() {
            Role::Leader => return self.lead(refresh, on_failed).await,
            Role::Waiter(receiver) => receiver,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!("token refresh in progress, waiting for leader");

        match receiver.await {
            Ok(outcome) => outcome,
            // The sender is only dropped without a value if the state was torn
            // down under us.
            Err(_) => Err(RefreshError::new("token refresh was abandoned")),
        }
    }

    /// Returns `true` while a leader is running the refresh callback.
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of callers parked behind the in-flight refresh.
    pub fn waiter_count(&self) -> usize {
        self.lock().waiters.len()
    }

    fn enter(&self) -> Role {
        let mut state = self.lock();
        if state.refreshing {
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            Role::Waiter(receiver)
        } else {
            state.refreshing = true;
            Role::Leader
        }
    }

    async fn lead<F, Fut>(
        &self,
        refresh: F,
        on_failed: Option<&(dyn Fn() + Send + Sync)>,
    ) -> Result<(), RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), RefreshError>>,
    {
        #[cfg(feature = "tracing")]
        tracing::debug!("starting token refresh");

        let mut guard = LeaderGuard {
            manager: self,
            settled: false,
        };
        let outcome = refresh().await;

        if outcome.is_err() {
            if let Some(on_failed) = on_failed {
                on_failed();
            }
        }

        guard.settle(outcome.clone());
        outcome
    }

    /// Clears the flag and drains the queue under one lock, then releases
    /// waiters in enqueue order.
    fn settle(&self, outcome: Result<(), RefreshError>) {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "token refresh settled"
        );

        for waiter in waiters {
            // A waiter whose request was dropped is simply skipped.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the refresh window even if the leader future is dropped before
/// the refresh callback completes.
struct LeaderGuard<'a> {
    manager: &'a TokenManager,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: Result<(), RefreshError>) {
        self.settled = true;
        self.manager.settle(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.manager
                .settle(Err(RefreshError::new("token refresh was cancelled")));
        }
    }
}
