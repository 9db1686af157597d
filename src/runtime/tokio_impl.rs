//! Tokio-backed spawner

use super::{AsyncSpawner, BoxFuture, JoinHandle};
use std::future::Future;
use std::time::Duration;

/// Spawns onto the ambient Tokio runtime
///
/// Handles returned by [`AsyncSpawner::spawn`] downcast to
/// `tokio::task::JoinHandle<()>`.
#[derive(Clone, Debug, Default, Copy)]
pub struct TokioSpawner;

impl TokioSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        JoinHandle::new(tokio::spawn(task))
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            Some(tokio::task::block_in_place(|| handle.block_on(future)))
        } else {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .ok()?;
            Some(rt.block_on(future))
        }
    }
}
