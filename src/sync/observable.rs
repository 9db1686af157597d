//! Watchable values for the map surface
//!
//! Subscribers get the current value first, then every later `set`.

use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

struct Shared<T> {
    value: RwLock<T>,
    subscribers: Mutex<Vec<UnboundedSender<T>>>,
}

/// A value that can be read now or watched for changes
///
/// Clones share the same value.
pub struct Observable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observable")
            .field(&*self.shared.value.read())
            .finish()
    }
}

impl<T: Default + Clone + Send + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                value: RwLock::new(value),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.shared.value.read().clone()
    }

    /// Replace the value and notify watchers
    pub fn set(&self, value: T) {
        let mut subscribers = self.shared.subscribers.lock();
        *self.shared.value.write() = value.clone();
        subscribers.retain(|tx| tx.unbounded_send(value.clone()).is_ok());
    }

    /// Stream of values, starting with the current one
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let (tx, rx) = mpsc::unbounded();
        let mut subscribers = self.shared.subscribers.lock();
        if tx.unbounded_send(self.get()).is_ok() {
            subscribers.push(tx);
        }
        rx.boxed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }
}
