//! First-success-or-all-failed race coordination.
//!
//! A [`RaceCoordinator`] hands out one [`ParticipantLock`] per competing task.
//! Awaiting [`RaceCoordinator::wait_for_success`] returns `true` as soon as any
//! lock is released with success, or `false` once every lock has been released
//! or dropped without one.
//!
//! ```rust,ignore
//! use racenet::sync::RaceCoordinator;
//!
//! let race = RaceCoordinator::new();
//! for addr in candidates {
//!     let lock = race.acquire_lock();
//!     tokio::spawn(async move {
//!         if try_connect(addr).await.is_ok() {
//!             lock.release(true);
//!         }
//!         // dropping the lock counts as a failure
//!     });
//! }
//! let any_succeeded = race.wait_for_success().await;
//! ```

use super::waitslot::WaitSlot;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Counters {
    acquired: usize,
    remaining: usize,
    succeeded: bool,
}

impl Counters {
    fn blocked(&self) -> bool {
        self.remaining > 0 && !self.succeeded
    }
}

/// State shared between a coordinator and its outstanding locks.
#[derive(Debug, Default)]
struct WaitState {
    counters: Mutex<Counters>,
    slot: WaitSlot,
}

impl WaitState {
    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks a set of competing participants and resolves to "some participant
/// succeeded" or "all participants failed".
///
/// The coordinator only records that a success happened, not which
/// participant produced it.
#[derive(Default)]
pub struct RaceCoordinator {
    state: Arc<WaitState>,
}

impl RaceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more in-flight participant.
    pub fn acquire_lock(&self) -> ParticipantLock {
        {
            let mut counters = self.state.counters();
            counters.acquired += 1;
            counters.remaining += 1;
            // Every earlier participant may already have failed and opened
            // the gate; the new one keeps the race undecided.
            if counters.blocked() {
                self.state.slot.reset();
            }
        }
        ParticipantLock {
            state: Some(self.state.clone()),
        }
    }

    /// Wait until some participant reports success or every participant has
    /// finished. Returns whether any participant succeeded.
    ///
    /// A race with no participants has failed and returns `false` at once.
    pub async fn wait_for_success(self) -> bool {
        loop {
            let blocked = self.state.counters().blocked();
            if !blocked {
                break;
            }
            self.state.slot.wait().await;
        }
        let counters = self.state.counters();
        tracing::trace!(
            participants = counters.acquired,
            remaining = counters.remaining,
            succeeded = counters.succeeded,
            "race resolved"
        );
        counters.succeeded
    }

    /// Total number of locks handed out so far.
    pub fn participants(&self) -> usize {
        self.state.counters().acquired
    }

    /// Number of locks not yet released.
    pub fn remaining(&self) -> usize {
        self.state.counters().remaining
    }

    pub fn succeeded(&self) -> bool {
        self.state.counters().succeeded
    }
}

impl fmt::Debug for RaceCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counters = self.state.counters();
        f.debug_struct("RaceCoordinator")
            .field("participants", &counters.acquired)
            .field("remaining", &counters.remaining)
            .field("succeeded", &counters.succeeded)
            .finish()
    }
}

/// Credential for one in-flight participant of a race.
///
/// Consumed exactly once: by [`release`](ParticipantLock::release), or on drop,
/// which counts as a failed participant.
#[must_use = "dropping a ParticipantLock reports the participant as failed"]
pub struct ParticipantLock {
    state: Option<Arc<WaitState>>,
}

impl ParticipantLock {
    /// Report this participant's outcome.
    pub fn release(mut self, success: bool) {
        self.finish(success);
    }

    fn finish(&mut self, success: bool) {
        let Some(state) = self.state.take() else {
            return;
        };
        let mut counters = state.counters();
        counters.remaining -= 1;
        if success {
            counters.succeeded = true;
        }
        // Notify under the lock so a concurrent acquire_lock cannot re-arm
        // the gate between the check and the notify.
        if !counters.blocked() {
            state.slot.notify();
        }
    }
}

impl Drop for ParticipantLock {
    fn drop(&mut self) {
        self.finish(false);
    }
}

impl fmt::Debug for ParticipantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantLock")
            .field("pending", &self.state.is_some())
            .finish()
    }
}
