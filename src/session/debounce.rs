//! Last-write-wins debounce on a generation counter.
//!
//! Every submission takes a new token. The delayed apply runs only if its
//! token is still the newest when the delay elapses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::core::errors::Result;
use crate::executor::task::{CancelToken, TaskHandle, spawn_task};

/// Monotonic request counter.
#[derive(Debug, Default)]
pub struct RequestGate {
    generation: AtomicU64,
}

impl RequestGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede every earlier token and return the new one.
    pub fn next(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_current(&self, token: u64) -> bool {
        self.current() == token
    }
}

/// Delays an action and drops it if a newer one arrives first.
#[derive(Debug, Clone)]
pub struct Debouncer {
    gate: Arc<RequestGate>,
    delay: Duration,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            gate: Arc::new(RequestGate::new()),
            delay,
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `apply`. The handle resolves to whether it actually ran.
    pub fn submit<F>(&self, apply: F) -> Result<TaskHandle<bool>>
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.gate.next();
        let gate = Arc::clone(&self.gate);
        let delay = self.delay;
        spawn_task("debounce", CancelToken::new(), move |cancel| {
            thread::sleep(delay);
            if cancel.is_cancelled() || !gate.is_current(token) {
                return Ok(false);
            }
            apply();
            Ok(true)
        })
    }

    /// Drop whatever is pending without scheduling anything new.
    pub fn cancel_pending(&self) {
        self.gate.next();
    }
}
