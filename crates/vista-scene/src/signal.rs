//! Reactive building blocks shared by every scene component.
//!
//! [`Observable`] is a value cell that notifies subscribers only when the
//! value actually changes; subscriptions detach when their handle drops.
//! [`destroy_channel`] creates the one-shot destruction signal that marks the
//! end of a mounted scene.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Cell<T> {
    value: T,
    next_id: u64,
    subscribers: Vec<(u64, Callback<T>)>,
}

/// Observable value cell.
///
/// Writers call [`set`](Self::set) or [`update`](Self::update); readers
/// either poll with [`get`](Self::get) or register a callback. Callbacks run
/// on the writer's thread after the internal lock is released, so they may
/// freely read or write the cell themselves.
pub struct Observable<T> {
    inner: Arc<Mutex<Cell<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = lock(&self.inner);
        f.debug_struct("Observable")
            .field("value", &cell.value)
            .field("subscribers", &cell.subscribers.len())
            .finish()
    }
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Cell {
                value,
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        lock(&self.inner).value.clone()
    }

    /// Store `value`, notifying subscribers if it differs from the current one.
    ///
    /// Returns whether a change happened.
    pub fn set(&self, value: T) -> bool {
        self.update(|_| value)
    }

    /// Read-modify-write under the cell lock, then notify on change.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let (value, subscribers) = {
            let mut cell = lock(&self.inner);
            let next = f(&cell.value);
            if next == cell.value {
                return false;
            }
            cell.value = next.clone();
            let subscribers: Vec<Callback<T>> = cell
                .subscribers
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            (next, subscribers)
        };
        for callback in subscribers {
            callback(&value);
        }
        true
    }

    /// Subscribe to future changes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut cell = lock(&self.inner);
            let id = cell.next_id;
            cell.next_id += 1;
            cell.subscribers.push((id, Arc::new(callback)));
            id
        };
        let weak: Weak<Mutex<Cell<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).subscribers.retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Subscribe and immediately receive the current value, then future changes.
    pub fn subscribe_current<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let replay = Arc::clone(&callback);
        let subscription = self.subscribe(move |value| callback(value));
        replay(&self.get());
        subscription
    }

    /// Bridge into async code: a `watch` receiver that follows this cell.
    ///
    /// The receiver only stays live while the returned subscription is held.
    pub fn watch(&self) -> (watch::Receiver<T>, Subscription)
    where
        T: Sync,
    {
        let (tx, rx) = watch::channel(self.get());
        let subscription = self.subscribe(move |value| {
            tx.send_replace(value.clone());
        });
        (rx, subscription)
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

/// Handle returned by [`Observable::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Detach now. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Destruction signal
// ---------------------------------------------------------------------------

type Hook = Box<dyn FnOnce() + Send>;

struct DestroyState {
    fired: bool,
    hooks: Vec<Hook>,
}

struct DestroyShared {
    state: Mutex<DestroyState>,
    tx: watch::Sender<bool>,
}

/// Owning half of the destruction signal. Only the viewport host holds one.
pub struct DestroyTrigger {
    shared: Arc<DestroyShared>,
}

/// Listening half of the destruction signal; cheap to clone.
#[derive(Clone)]
pub struct DestroySignal {
    shared: Arc<DestroyShared>,
}

/// Create a linked trigger/signal pair.
pub fn destroy_channel() -> (DestroyTrigger, DestroySignal) {
    let (tx, _rx) = watch::channel(false);
    let shared = Arc::new(DestroyShared {
        state: Mutex::new(DestroyState {
            fired: false,
            hooks: Vec::new(),
        }),
        tx,
    });
    (
        DestroyTrigger {
            shared: Arc::clone(&shared),
        },
        DestroySignal { shared },
    )
}

impl DestroyTrigger {
    /// Fire the signal. Hooks run once, in registration order, on the first
    /// call only. Returns `false` if the signal had already fired.
    pub fn fire(&self) -> bool {
        let hooks = {
            let mut state = lock(&self.shared.state);
            if state.fired {
                return false;
            }
            state.fired = true;
            mem::take(&mut state.hooks)
        };
        for hook in hooks {
            hook();
        }
        self.shared.tx.send_replace(true);
        true
    }

    pub fn signal(&self) -> DestroySignal {
        DestroySignal {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_fired(&self) -> bool {
        lock(&self.shared.state).fired
    }
}

impl DestroySignal {
    pub fn is_fired(&self) -> bool {
        lock(&self.shared.state).fired
    }

    /// Run `hook` when the signal fires, or right away if it already has.
    pub fn on_destroy(&self, hook: impl FnOnce() + Send + 'static) {
        let mut state = lock(&self.shared.state);
        if state.fired {
            drop(state);
            hook();
        } else {
            state.hooks.push(Box::new(hook));
        }
    }

    /// Resolves once the signal has fired. Intended for `tokio::select!`.
    pub async fn fired(&self) {
        let mut rx = self.shared.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on `true`.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl std::fmt::Debug for DestroySignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestroySignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_set_notifies_only_on_change() {
        let cell = Observable::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = cell.subscribe(move |v| sink.lock().unwrap().push(*v));

        assert!(cell.set(2));
        assert!(!cell.set(2));
        assert!(cell.set(3));
        assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_subscribe_current_replays_value() {
        let cell = Observable::new("seed".to_string());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = cell.subscribe_current(move |v: &String| sink.lock().unwrap().push(v.clone()));
        cell.set("next".to_string());
        assert_eq!(*seen.lock().unwrap(), vec!["seed", "next"]);
    }

    #[test]
    fn test_dropping_subscription_detaches() {
        let cell = Observable::new(0);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = cell.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cell.set(1);
        drop(sub);
        cell.set(2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_may_write_the_cell() {
        let cell = Observable::new(0);
        let writer = cell.clone();
        let _sub = cell.subscribe(move |v| {
            if *v == 1 {
                writer.set(2);
            }
        });
        cell.set(1);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_destroy_fires_hooks_once_in_order() {
        let (trigger, signal) = destroy_channel();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            signal.on_destroy(move || order.lock().unwrap().push(i));
        }
        assert!(trigger.fire());
        assert!(!trigger.fire());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert!(signal.is_fired());
    }

    #[test]
    fn test_late_hook_runs_immediately() {
        let (trigger, signal) = destroy_channel();
        trigger.fire();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        signal.on_destroy(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_future_resolves() {
        let (trigger, signal) = destroy_channel();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.fired().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());
        trigger.fire();
        waiter.await.unwrap();
        // Already fired: resolves immediately.
        signal.fired().await;
    }

    #[tokio::test]
    async fn test_watch_bridge_follows_cell() {
        let cell = Observable::new(false);
        let (mut rx, _sub) = cell.watch();
        cell.set(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
