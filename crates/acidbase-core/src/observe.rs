//! Change listeners.
//!
//! A [`Listeners`] registry is owned by whatever emits changes (the beaker,
//! the lesson session). `subscribe` hands back a [`Subscription`] that can
//! remove the listener later, even from inside a notification.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Box<dyn FnMut(&T)>;

struct Registry<T: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
    notifying: bool,
    removed_while_notifying: Vec<u64>,
}

/// Registry of change listeners receiving `&T`.
pub struct Listeners<T: ?Sized> {
    inner: Rc<RefCell<Registry<T>>>,
}

impl<T: ?Sized + 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
                notifying: false,
                removed_while_notifying: Vec::new(),
            })),
        }
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, Box::new(listener)));

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            remove: Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    let mut inner = registry.borrow_mut();
                    let before = inner.entries.len();
                    inner.entries.retain(|(entry_id, _)| *entry_id != id);
                    if inner.entries.len() == before && inner.notifying {
                        inner.removed_while_notifying.push(id);
                    }
                }
            }),
        }
    }

    /// Call every listener once with `value`.
    pub fn notify(&self, value: &T) {
        let mut active = {
            let mut inner = self.inner.borrow_mut();
            inner.notifying = true;
            std::mem::take(&mut inner.entries)
        };

        for (_, listener) in active.iter_mut() {
            listener(value);
        }

        let mut inner = self.inner.borrow_mut();
        let removed = std::mem::take(&mut inner.removed_while_notifying);
        active.retain(|(id, _)| !removed.contains(id));
        // Listeners subscribed during the notification go after the existing ones.
        active.append(&mut inner.entries);
        inner.entries = active;
        inner.notifying = false;
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Listeners::subscribe`].
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    remove: Box<dyn FnOnce()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        (self.remove)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_notify_reaches_every_listener_once() {
        let listeners: Listeners<u32> = Listeners::new();
        let total = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let total = total.clone();
            let _ = listeners.subscribe(move |v| total.set(total.get() + *v));
        }
        listeners.notify(&2);
        assert_eq!(total.get(), 6);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let listeners: Listeners<u32> = Listeners::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let sub = listeners.subscribe(move |_| c.set(c.get() + 1));
        listeners.notify(&0);
        sub.unsubscribe();
        listeners.notify(&0);
        assert_eq!(calls.get(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_unsubscribe_from_inside_notification() {
        let listeners: Listeners<u32> = Listeners::new();
        let calls = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let c = calls.clone();
        let s = slot.clone();
        let sub = listeners.subscribe(move |_| {
            c.set(c.get() + 1);
            if let Some(sub) = s.borrow_mut().take() {
                sub.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);

        listeners.notify(&0);
        listeners.notify(&0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped_is_noop() {
        let listeners: Listeners<u32> = Listeners::new();
        let sub = listeners.subscribe(|_| {});
        drop(listeners);
        sub.unsubscribe();
    }

    #[test]
    fn test_slice_payloads() {
        let listeners: Listeners<[u8]> = Listeners::new();
        let seen = Rc::new(Cell::new(0usize));
        let s = seen.clone();
        let _ = listeners.subscribe(move |bytes: &[u8]| s.set(bytes.len()));
        listeners.notify(&[1, 2, 3][..]);
        assert_eq!(seen.get(), 3);
    }
}
