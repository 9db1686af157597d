//! Executor-free spawner for tests and single-threaded hosts
//!
//! Tasks are dropped, driven to completion inline, or queued until the test
//! runs them; sleeps finish immediately so retry loops never stall a test.

use super::{AsyncSpawner, BoxFuture, JoinHandle};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What [`MockSpawner`] does with spawned tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Discard the task without running it
    Drop,
    /// Run the task to completion before `spawn` returns
    BlockSync,
    /// Hold the task until [`MockSpawner::run_queued`]; use this when the
    /// spawning code itself runs inside `block_on`
    Queue,
}

/// Spawner that needs no executor
#[derive(Clone)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
    spawned: Arc<AtomicUsize>,
    slept: Arc<AtomicUsize>,
    queue: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl std::fmt::Debug for MockSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSpawner")
            .field("behavior", &self.behavior)
            .field("spawned", &self.spawned_count())
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// A spawner that drops tasks
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self {
            behavior,
            spawned: Arc::new(AtomicUsize::new(0)),
            slept: Arc::new(AtomicUsize::new(0)),
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A spawner that runs tasks inline
    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    /// A spawner that queues tasks for [`MockSpawner::run_queued`]
    pub fn queued() -> Self {
        Self::with_behavior(MockSpawnBehavior::Queue)
    }

    /// Run queued tasks, including any they queue in turn, and return how
    /// many ran
    pub fn run_queued(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch: Vec<_> = std::mem::take(&mut *self.queue.lock());
            if batch.is_empty() {
                return ran;
            }
            for task in batch {
                futures::executor::block_on(task);
                ran += 1;
            }
        }
    }

    /// Tasks handed to `spawn` so far, run or not
    pub fn spawned_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Calls to `sleep` so far
    pub fn sleep_count(&self) -> usize {
        self.slept.load(Ordering::SeqCst)
    }
}

impl AsyncSpawner for MockSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockSpawnBehavior::Drop => drop(task),
            MockSpawnBehavior::BlockSync => futures::executor::block_on(task),
            MockSpawnBehavior::Queue => self.queue.lock().push(Box::pin(task)),
        }
        JoinHandle::new(())
    }

    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        self.slept.fetch_add(1, Ordering::SeqCst);
        Box::pin(futures::future::ready(()))
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => None,
            MockSpawnBehavior::BlockSync | MockSpawnBehavior::Queue => {
                Some(futures::executor::block_on(future))
            }
        }
    }
}
