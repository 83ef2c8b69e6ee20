//! Observer registry for conversation store notifications

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

/// Callback invoked with a snapshot of the observed state
pub type Listener<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

struct Inner<T> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
}

/// Set of listeners keyed by subscription id
///
/// Listeners are notified in subscription order. Notification clones the
/// listener handles out of the lock first, so a callback may subscribe or
/// unsubscribe without deadlocking.
pub struct ListenerRegistry<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: 'static> ListenerRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Register `listener` and return its handle
    pub fn register(&self, listener: Listener<T>) -> Subscription {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, listener);

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            remove: Box::new(move |id| match weak.upgrade() {
                Some(inner) => inner
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .listeners
                    .remove(&id)
                    .is_some(),
                None => false,
            }),
        }
    }

    /// Invoke every registered listener with `items`
    pub fn notify(&self, items: &[T]) {
        let listeners: Vec<Listener<T>> = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.listeners.values().cloned().collect()
        };

        for listener in listeners {
            listener(items);
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .listeners
            .len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `subscribe`
///
/// The listener stays registered until [`Subscription::unsubscribe`] is
/// called; dropping the handle keeps it registered. Unsubscribing after the
/// store was dropped is a harmless no-op.
pub struct Subscription {
    id: u64,
    remove: Box<dyn Fn(u64) -> bool + Send + Sync>,
}

impl Subscription {
    /// Identifier of this subscription within its registry
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deregister the listener
    ///
    /// Returns `true` the first time and `false` on every later call.
    pub fn unsubscribe(&self) -> bool {
        (self.remove)(self.id)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener<u32> {
        let counter = Arc::clone(counter);
        Arc::new(move |_items: &[u32]| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(counting_listener(&counter));
        registry.register(counting_listener(&counter));

        registry.notify(&[1, 2, 3]);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let subscription = registry.register(counting_listener(&counter));

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(registry.is_empty());

        registry.notify(&[1]);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let subscription = registry.register(Arc::new(|_: &[u32]| {}));
        drop(registry);
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn test_subscription_ids_are_distinct() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::new();
        let a = registry.register(Arc::new(|_: &[u32]| {}));
        let b = registry.register(Arc::new(|_: &[u32]| {}));
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
    }
}
