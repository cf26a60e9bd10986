//! Typed broadcast channels
//!
//! A [`Channel`] keeps a list of listeners and pushes every emitted value to
//! all of them. Replaying channels also remember the last value and hand it
//! to each new subscriber right away; forward-only channels do not.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    last: Mutex<Option<T>>,
    replay: bool,
    next_id: AtomicU64,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
}

impl<T: Send + 'static> Detach for Inner<T> {
    fn detach(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }
}

pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Channel<T>
where
    T: Clone + Send + 'static,
{
    /// A channel that replays `initial` (and later the latest value) to new subscribers.
    pub fn replay(initial: T) -> Self {
        Self::build(Some(initial), true)
    }

    pub fn forward_only() -> Self {
        Self::build(None, false)
    }

    fn build(last: Option<T>, replay: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(Vec::new()),
                last: Mutex::new(last),
                replay,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `listener`. On a replaying channel it is called with the
    /// current value before this returns.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener<T> = Arc::new(listener);

        self.inner.listeners.lock().push((id, listener.clone()));

        if self.inner.replay {
            let current = self.inner.last.lock().clone();
            if let Some(value) = current {
                listener(&value);
            }
        }

        let inner: Arc<dyn Detach> = self.inner.clone();
        Subscription {
            id,
            channel: Arc::downgrade(&inner),
        }
    }

    pub(crate) fn emit(&self, value: T) {
        if self.inner.replay {
            *self.inner.last.lock() = Some(value.clone());
        }

        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        tracing::trace!("Emitting to {} listeners", listeners.len());
        for listener in listeners {
            listener(&value);
        }
    }

    /// Last emitted value of a replaying channel.
    pub fn current(&self) -> Option<T> {
        self.inner.last.lock().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("replay", &self.inner.replay)
            .field("subscribers", &self.inner.listeners.lock().len())
            .finish()
    }
}

/// Handle returned by [`Channel::subscribe`]. Dropping it keeps the listener
/// attached; call [`Subscription::unsubscribe`] to detach.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    channel: Weak<dyn Detach>,
}

impl Subscription {
    /// Returns false when the listener was already detached or the channel is gone.
    pub fn unsubscribe(&self) -> bool {
        match self.channel.upgrade() {
            Some(channel) => channel.detach(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
