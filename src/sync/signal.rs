//! Broadcast cancellation signal.
//!
//! A [`CancelSignal`] holds a set of zero-argument callbacks. Firing the signal
//! runs every registered callback once; subscribing after the signal fired runs
//! the callback immediately. Suspended operations use it to abort themselves
//! cooperatively, either by subscribing a callback or by awaiting
//! [`CancelSignal::cancelled`].

use super::waitslot::WaitSlot;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

type Callback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct SignalState {
    fired: bool,
    next_id: u64,
    callbacks: HashMap<u64, Callback>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<SignalState>,
    /// Link to the parent signal for signals created with [`CancelSignal::child`].
    parent: Mutex<Option<Subscription>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) -> Option<Callback> {
        self.state().callbacks.remove(&id)
    }
}

/// Cooperative cancellation broadcast shared between an operation and
/// everything it spawned.
///
/// Cloning is cheap and yields a handle to the same signal.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` to run when the signal fires.
    ///
    /// If the signal already fired, the callback runs before this returns and
    /// the returned subscription is inert.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.inner.state();
            if !state.fired {
                let id = state.next_id;
                state.next_id += 1;
                state.callbacks.insert(id, Box::new(callback));
                return Subscription {
                    signal: Arc::downgrade(&self.inner),
                    id: Some(id),
                };
            }
        }
        // Run outside the lock: the callback may touch this signal again.
        callback();
        Subscription {
            signal: Weak::new(),
            id: None,
        }
    }

    /// Remove a still-pending callback. Does nothing once the signal fired or
    /// the subscription was already removed.
    ///
    /// A subscription registered on a different signal is handed back
    /// untouched.
    pub fn unsubscribe(&self, mut subscription: Subscription) -> Result<(), Subscription> {
        let foreign = subscription.id.is_some()
            && !std::ptr::eq(subscription.signal.as_ptr(), Arc::as_ptr(&self.inner));
        if foreign {
            return Err(subscription);
        }
        subscription.detach();
        Ok(())
    }

    /// Run every registered callback once and mark the signal fired.
    ///
    /// Later calls do nothing.
    pub fn fire(&self) {
        let callbacks = {
            let mut state = self.inner.state();
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.callbacks)
        };
        tracing::trace!(callbacks = callbacks.len(), "cancel signal fired");
        for (_, callback) in callbacks {
            callback();
        }
    }

    pub fn is_fired(&self) -> bool {
        self.inner.state().fired
    }

    /// Number of callbacks still waiting for the signal.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state().callbacks.len()
    }

    /// A future that completes once the signal fires.
    ///
    /// The subscription is registered when this is called, not when the
    /// future is first polled, so a fire in between is never missed.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let slot = Arc::new(WaitSlot::new());
        let subscription = {
            let slot = slot.clone();
            self.subscribe(move || slot.notify())
        };
        async move {
            let _subscription = subscription;
            slot.wait().await;
        }
    }

    /// Create a signal that fires whenever this one fires.
    ///
    /// Firing the child leaves the parent untouched. Dropping every handle to
    /// the child detaches it from the parent.
    pub fn child(&self) -> CancelSignal {
        let child = CancelSignal::new();
        let weak = Arc::downgrade(&child.inner);
        let link = self.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                CancelSignal { inner }.fire();
            }
        });
        *child.inner.parent.lock().unwrap_or_else(PoisonError::into_inner) = Some(link);
        child
    }

    /// Fire the signal after `delay`, unless the returned guard is dropped
    /// first. Must be called from within a tokio runtime.
    pub fn fire_after(&self, delay: Duration) -> FireTimer {
        let signal = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(?delay, "cancel timer elapsed");
            signal.fire();
        });
        FireTimer { task: Some(task) }
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("CancelSignal")
            .field("fired", &state.fired)
            .field("subscribers", &state.callbacks.len())
            .finish()
    }
}

/// Handle to one registered callback.
///
/// Dropping it unsubscribes the callback if it has not run yet.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    signal: Weak<Inner>,
    id: Option<u64>,
}

impl Subscription {
    /// True while the callback is registered and has not run.
    pub fn is_pending(&self) -> bool {
        match (self.id, self.signal.upgrade()) {
            (Some(id), Some(inner)) => inner.state().callbacks.contains_key(&id),
            _ => false,
        }
    }

    fn detach(&mut self) {
        let Some(id) = self.id.take() else { return };
        if let Some(inner) = self.signal.upgrade() {
            // Drop the callback outside the signal lock.
            let removed = inner.remove(id);
            drop(removed);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Guard returned by [`CancelSignal::fire_after`]; dropping it disarms the
/// timer.
#[derive(Debug)]
pub struct FireTimer {
    task: Option<JoinHandle<()>>,
}

impl FireTimer {
    /// Keep the timer running even after the guard is dropped.
    pub fn detach(mut self) {
        self.task.take();
    }
}

impl Drop for FireTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
