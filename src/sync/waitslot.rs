//! Wakeable gate.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A gate that tasks can suspend on until it is notified.
///
/// Once notified, every current and future [`wait`](WaitSlot::wait) returns
/// immediately until [`reset`](WaitSlot::reset). Notifying an open gate has no
/// effect.
#[derive(Debug, Default)]
pub struct WaitSlot {
    waiters: Notify,
    fired: AtomicBool,
}

impl WaitSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend until [`notify`](WaitSlot::notify) has been called.
    pub async fn wait(&self) {
        let notified = self.waiters.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent notify cannot slip
        // between the check and the await.
        notified.as_mut().enable();
        if self.fired.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Wake all current waiters and open the gate for future ones.
    pub fn notify(&self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            tracing::trace!("wait slot notified");
            self.waiters.notify_waiters();
        }
    }

    pub fn is_notified(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Close the gate again so later waiters suspend until the next notify.
    ///
    /// Tasks already woken by an earlier notify are unaffected.
    pub fn reset(&self) {
        if self.fired.swap(false, Ordering::AcqRel) {
            tracing::trace!("wait slot re-armed");
        }
    }
}
