//! Reactive notification seams.
//!
//! The notification infrastructure itself lives outside this crate; queries
//! only consume it. The single invariant upheld here is that a fresh
//! subscription gets its initial results by re-running the query on the
//! store's shared worker pool, never on the subscribing thread.

use parking_lot::Mutex;
use std::sync::Arc;

///
/// DataObserver
///
/// Receives query results when they (potentially) changed. Callbacks for a
/// single subscription are serialized by the publisher; distinct observers
/// may run concurrently on the pool.
///

pub trait DataObserver<T>: Send + Sync {
    fn on_data(&self, data: &T);
}

///
/// Publisher
///
/// Out-of-core broadcast capability bound to one query. `publish` re-runs
/// the query on the shared worker pool and re-broadcasts the results to
/// every registered observer.
///

pub trait Publisher<E>: Send + Sync {
    fn subscribe(&self, observer: Arc<dyn DataObserver<Vec<E>>>) -> Subscription;

    fn publish(&self);
}

///
/// WorkerPool
///
/// Shared executor supplied by the store. Observer notification and initial
/// subscription delivery run here.
///

pub trait WorkerPool: Send + Sync {
    fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

///
/// Subscription
///
/// Cancellation token for one observer registration. `cancel` is idempotent
/// and may be called from any thread.
///

#[derive(Clone)]
pub struct Subscription {
    on_cancel: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Subscription {
    #[must_use]
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_cancel: Arc::new(Mutex::new(Some(Box::new(on_cancel)))),
        }
    }

    pub fn cancel(&self) {
        if let Some(cancel) = self.on_cancel.lock().take() {
            cancel();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.on_cancel.lock().is_none()
    }
}

///
/// SubscriptionList
///
/// Bulk-cancel container for subscriptions that share a lifetime, e.g. one
/// screen's worth of observers.
///

#[derive(Default)]
pub struct SubscriptionList {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscription: Subscription) {
        self.subscriptions.lock().push(subscription);
    }

    pub fn cancel_all(&self) {
        let drained = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in drained {
            subscription.cancel();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }
}

///
/// SubscriptionBuilder
///
/// Returned by `Query::subscribe`. Concluding with `observer` registers the
/// observer and schedules the initial delivery on the worker pool.
///

pub struct SubscriptionBuilder<E> {
    publisher: Arc<dyn Publisher<E>>,
    pool: Arc<dyn WorkerPool>,
    list: Option<Arc<SubscriptionList>>,
}

impl<E: 'static> SubscriptionBuilder<E> {
    pub(crate) fn new(publisher: Arc<dyn Publisher<E>>, pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            publisher,
            pool,
            list: None,
        }
    }

    /// Also register the resulting subscription with `list` for bulk cancel.
    #[must_use]
    pub fn subscription_list(mut self, list: &Arc<SubscriptionList>) -> Self {
        self.list = Some(Arc::clone(list));
        self
    }

    /// Conclude the subscription. The observer immediately gets current
    /// results: the query is re-run for it on the worker pool.
    pub fn observer(self, observer: Arc<dyn DataObserver<Vec<E>>>) -> Subscription {
        let subscription = self.publisher.subscribe(observer);

        let publisher = Arc::clone(&self.publisher);
        self.pool.execute(Box::new(move || publisher.publish()));

        if let Some(list) = self.list {
            list.add(subscription.clone());
        }
        subscription
    }
}
