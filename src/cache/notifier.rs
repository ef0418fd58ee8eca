use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, Weak,
    },
};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "notifier";

use crate::log_error;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct NotifierInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Callback)>>,
}

/// Synchronous fan-out of "something changed" to registered callbacks.
///
/// Each callback runs on the notifying thread. A panicking callback is logged
/// and does not stop the remaining ones from running.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. Registering the same closure twice yields two
    /// independent registrations.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            notifier: Arc::downgrade(&self.inner),
        }
    }

    pub fn notify(&self) {
        // Callbacks may subscribe or unsubscribe, so run them off a snapshot.
        let listeners: Vec<Callback> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
                log_error!("listener panicked: {}", panic_message(payload.as_ref()));
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Registration handle. Dropping it (or calling [`Subscription::unsubscribe`])
/// removes the callback; doing so after the notifier is gone is a no-op.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    id: u64,
    notifier: Weak<NotifierInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn panicking_listener_does_not_starve_the_others() {
        let notifier = ChangeNotifier::new();
        let (before, first) = counter();
        let (after, second) = counter();

        let _a = notifier.subscribe(first);
        let _b = notifier.subscribe(|| panic!("listener blew up"));
        let _c = notifier.subscribe(second);

        notifier.notify();

        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let notifier = ChangeNotifier::new();
        let (count, callback) = counter();
        let subscription = notifier.subscribe(callback);

        notifier.notify();
        subscription.unsubscribe();
        notifier.notify();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn unsubscribing_one_listener_keeps_the_rest() {
        let notifier = ChangeNotifier::new();
        let (a_count, a) = counter();
        let (b_count, b) = counter();
        let sub_a = notifier.subscribe(a);
        let _sub_b = notifier.subscribe(b);

        notifier.notify();
        sub_a.unsubscribe();
        notifier.notify();

        assert_eq!(a_count.load(Ordering::SeqCst), 1);
        assert_eq!(b_count.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn double_registration_is_called_twice() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicUsize::new(0));
        let shared: Arc<dyn Fn() + Send + Sync> = {
            let count = Arc::clone(&count);
            Arc::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        let first = Arc::clone(&shared);
        let second = Arc::clone(&shared);
        let _a = notifier.subscribe(move || first());
        let _b = notifier.subscribe(move || second());
        notifier.notify();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_after_notifier_is_harmless() {
        let notifier = ChangeNotifier::new();
        let subscription = notifier.subscribe(|| {});
        drop(notifier);
        drop(subscription);
    }
}
