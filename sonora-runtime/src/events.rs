//! # Typed Event Bus
//!
//! A small publish-subscribe table for fire-and-forget notifications.
//!
//! Unlike `tokio::sync::broadcast`, listeners are not separate receivers
//! polling a channel — they are callbacks invoked synchronously, in
//! registration order, from inside `emit`. This matches a single-threaded
//! cooperative host (the browser event loop) where "the event fired" and
//! "every listener observed it" happen in the same turn, with no possibility
//! of a listener missing an event because it subscribed a moment too late.
//!
//! `add_listener` returns a [`Subscription`]; dropping it deregisters the
//! listener. The subscription, not the bus, owns the removal right.

use std::sync::{Arc, Mutex};

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

struct Slot<E> {
    id: u64,
    listener: Listener<E>,
}

struct Inner<E> {
    slots: Mutex<Vec<Slot<E>>>,
    next_id: Mutex<u64>,
}

/// A typed, synchronous publish-subscribe table.
///
/// `E` is usually a closed enum of event kinds (see `sonora_core::events::
/// SoundEvent`); the bus does not interpret the payload, it only dispatches
/// it.
pub struct EventBus<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(Vec::new()),
                next_id: Mutex::new(0),
            }),
        }
    }

    /// Register a listener, returning a [`Subscription`] that owns its
    /// removal right. Dropping the subscription unregisters the listener.
    pub fn add_listener<F>(&self, handler: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut next_id = self.inner.next_id.lock().unwrap();
            let id = *next_id;
            *next_id += 1;
            id
        };
        self.inner.slots.lock().unwrap().push(Slot {
            id,
            listener: Box::new(handler),
        });
        Subscription {
            id,
            inner: self.inner.clone(),
        }
    }

    /// Dispatch `event` to every currently-registered listener, in
    /// registration order. Listeners are invoked inline — there is no
    /// suspension point here, per the single-threaded ordering guarantees
    /// the host application must preserve.
    pub fn emit(&self, event: E) {
        let slots = self.inner.slots.lock().unwrap();
        for slot in slots.iter() {
            (slot.listener)(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.slots.lock().unwrap().len()
    }
}

/// Owns the removal right for a listener registered with [`EventBus::
/// add_listener`]. Dropping it removes the listener; it can also be removed
/// early with [`Subscription::unsubscribe`].
#[must_use = "dropping this immediately unsubscribes the listener"]
pub struct Subscription<E> {
    id: u64,
    inner: Arc<Inner<E>>,
}

impl<E> Subscription<E> {
    pub fn unsubscribe(self) {
        // Drop does the work; this just makes the intent explicit at the
        // call site instead of relying on an implicit end-of-scope drop.
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        let mut slots = self.inner.slots.lock().unwrap();
        slots.retain(|slot| slot.id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    enum TestEvent {
        Ping,
        Named(String),
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        let _s1 = bus.add_listener(move |_| o1.lock().unwrap().push(1));
        let o2 = order.clone();
        let _s2 = bus.add_listener(move |_| o2.lock().unwrap().push(2));

        bus.emit(TestEvent::Ping);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let sub = bus.add_listener(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(TestEvent::Ping);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(sub);
        bus.emit(TestEvent::Ping);
        assert_eq!(count.load(Ordering::SeqCst), 1, "listener must not fire after drop");
    }

    #[test]
    fn payload_is_delivered() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let _sub = bus.add_listener(move |e| *s.lock().unwrap() = Some(e.clone()));

        bus.emit(TestEvent::Named("hello".into()));
        assert_eq!(*seen.lock().unwrap(), Some(TestEvent::Named("hello".into())));
    }

    #[test]
    fn listener_count_reflects_active_subscriptions() {
        let bus: EventBus<TestEvent> = EventBus::new();
        assert_eq!(bus.listener_count(), 0);
        let s1 = bus.add_listener(|_| {});
        let s2 = bus.add_listener(|_| {});
        assert_eq!(bus.listener_count(), 2);
        drop(s1);
        assert_eq!(bus.listener_count(), 1);
        drop(s2);
        assert_eq!(bus.listener_count(), 0);
    }
}
