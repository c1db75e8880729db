//! Async Worker Pool
//!
//! A bounded task queue drained by a fixed number of workers. The queued and
//! callback call variants of the client run here. Individual tasks cannot be
//! cancelled: a task that was accepted runs to completion, and shutdown waits
//! for the queue to drain.

use super::error::{DatahubError, Result};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default number of workers
pub const DEFAULT_WORKERS: usize = 5;

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

type Task = BoxFuture<'static, ()>;

enum PoolState {
    /// Workers start on the first submitted task
    Idle,
    Running {
        sender: mpsc::Sender<Task>,
        workers: Vec<JoinHandle<()>>,
    },
    Closed,
}

/// Bounded worker pool shared by every clone of a client
pub struct WorkerPool {
    workers: usize,
    capacity: usize,
    state: Mutex<PoolState>,
}

impl WorkerPool {
    pub fn new(workers: usize, capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            capacity: capacity.max(1),
            state: Mutex::new(PoolState::Idle),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue a task
    ///
    /// Fails immediately when the queue is full, the pool was shut down, or
    /// no Tokio runtime is available to run the workers.
    pub fn add_task<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DatahubError::PoolClosed("pool state poisoned".to_string()))?;

        if matches!(*state, PoolState::Idle) {
            *state = self.start()?;
        }

        match &*state {
            PoolState::Running { sender, .. } => {
                sender.try_send(Box::pin(task)).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => DatahubError::QueueFull {
                        capacity: self.capacity,
                    },
                    mpsc::error::TrySendError::Closed(_) => {
                        DatahubError::PoolClosed("task queue closed".to_string())
                    }
                })
            }
            _ => Err(DatahubError::PoolClosed("pool was shut down".to_string())),
        }
    }

    fn start(&self) -> Result<PoolState> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| DatahubError::PoolClosed(format!("no async runtime: {}", e)))?;

        let (sender, receiver) = mpsc::channel::<Task>(self.capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..self.workers)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                handle.spawn(async move {
                    loop {
                        let task = { receiver.lock().await.recv().await };
                        match task {
                            Some(task) => task.await,
                            None => break,
                        }
                    }
                    tracing::trace!("worker {} stopped", id);
                })
            })
            .collect();

        tracing::debug!(
            "started async worker pool: {} workers, queue capacity {}",
            self.workers,
            self.capacity
        );

        Ok(PoolState::Running { sender, workers })
    }

    /// Stop accepting tasks and wait for queued ones to finish
    pub async fn shutdown(&self) {
        let previous = match self.state.lock() {
            Ok(mut state) => std::mem::replace(&mut *state, PoolState::Closed),
            Err(_) => return,
        };

        if let PoolState::Running { sender, workers } = previous {
            drop(sender);
            for worker in workers {
                let _ = worker.await;
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .map(|state| matches!(*state, PoolState::Closed))
            .unwrap_or(true)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_QUEUE_CAPACITY)
    }
}
