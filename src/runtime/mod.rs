//! Async runtime abstraction
//!
//! Collection attempts run as independent background tasks, and store
//! retries wait between attempts. Both go through [`AsyncSpawner`] so the
//! engine works on any executor; a Tokio implementation sits behind the
//! `runtime-tokio` feature.

pub mod mock;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed future that can be sent across threads
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased handle to a spawned task
///
/// Downcast to the runtime's own handle type to await the task.
#[derive(Debug)]
pub struct JoinHandle {
    inner: Box<dyn std::any::Any + Send>,
}

impl JoinHandle {
    pub fn new<T: Send + 'static>(handle: T) -> Self {
        Self {
            inner: Box::new(handle),
        }
    }

    /// Recover the runtime-specific handle
    pub fn downcast<T: 'static>(self) -> Option<T> {
        self.inner.downcast::<T>().ok().map(|b| *b)
    }
}

/// Task spawning and timers
pub trait AsyncSpawner: Send + Sync + Clone + Debug + 'static {
    /// Run a task in the background
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Wait for `duration` without blocking the executor
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Name of the runtime, for logs
    fn runtime_name(&self) -> &'static str;

    /// Drive a future to completion, if the runtime supports blocking
    fn block_on<F, T>(&self, _future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        None
    }
}

pub use mock::MockSpawner;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioSpawner;
