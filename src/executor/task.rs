//! Worker-thread tasks with cooperative cancellation.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::debug;

use crate::core::errors::{Result, UadError};

/// Shared stop flag, checked between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The raw flag, for registering with a signal handler.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Handle to one background operation.
///
/// The result is delivered exactly once, through either [`Self::try_result`]
/// or [`Self::wait`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    name: String,
    cancel: CancelToken,
    result_rx: Receiver<Result<T>>,
    join: Option<JoinHandle<()>>,
}

impl<T> TaskHandle<T> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the task to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// The result if it is ready; `None` while the task is still running.
    pub fn try_result(&mut self) -> Option<Result<T>> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.lost_result())),
        }
    }

    /// Block until the task finishes.
    pub fn wait(mut self) -> Result<T> {
        match self.result_rx.recv() {
            Ok(result) => {
                if let Some(join) = self.join.take() {
                    let _ = join.join();
                }
                result
            }
            Err(_) => Err(self.lost_result()),
        }
    }

    fn lost_result(&mut self) -> UadError {
        let panicked = self
            .join
            .take()
            .is_some_and(|join| join.join().is_err());
        if panicked {
            UadError::Runtime {
                details: format!("task {} panicked", self.name),
            }
        } else {
            UadError::ChannelClosed {
                component: "task result",
            }
        }
    }
}

/// Run `work` on a named worker thread.
pub fn spawn_task<T, F>(name: &str, cancel: CancelToken, work: F) -> Result<TaskHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
{
    let (result_tx, result_rx) = crossbeam_channel::bounded(1);
    let token = cancel.clone();
    let task_name = name.to_string();
    let join = thread::Builder::new()
        .name(format!("uad-{name}"))
        .spawn(move || {
            debug!(task = %task_name, "task started");
            let result = work(&token);
            debug!(task = %task_name, ok = result.is_ok(), "task finished");
            let _ = result_tx.send(result);
        })
        .map_err(|err| UadError::Runtime {
            details: format!("failed to spawn {name} worker: {err}"),
        })?;

    Ok(TaskHandle {
        name: name.to_string(),
        cancel,
        result_rx,
        join: Some(join),
    })
}
