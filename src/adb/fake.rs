//! Scripted [`CommandExecutor`] for tests and offline embedding.
//!
//! Responses are matched on the exact argv; unmatched commands fall back to a
//! configurable default (exit 1 with a short message unless overridden).

#![allow(missing_docs)]

use std::collections::HashMap;

use parking_lot::Mutex;

use super::runner::{CommandExecutor, CommandOutput};
use crate::core::errors::{Result, UadError};

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    LaunchFailure(String),
}

/// In-memory executor returning canned results and recording every call.
#[derive(Debug)]
pub struct FakeExecutor {
    responses: Mutex<HashMap<Vec<String>, Scripted>>,
    fallback: Mutex<Scripted>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            fallback: Mutex::new(Scripted::Output(CommandOutput::new(
                1,
                "fake: no scripted response",
            ))),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result of one exact command line.
    pub fn respond(&self, args: &[&str], exit_code: i32, output: &str) -> &Self {
        self.responses.lock().insert(
            key(args),
            Scripted::Output(CommandOutput::new(exit_code, output)),
        );
        self
    }

    /// Script a command that cannot be launched.
    pub fn fail_launch(&self, args: &[&str], details: &str) -> &Self {
        self.responses
            .lock()
            .insert(key(args), Scripted::LaunchFailure(details.to_string()));
        self
    }

    /// Result for any command without a scripted response.
    pub fn respond_by_default(&self, exit_code: i32, output: &str) -> &Self {
        *self.fallback.lock() = Scripted::Output(CommandOutput::new(exit_code, output));
        self
    }

    /// Make every unscripted command a launch failure.
    pub fn fail_launch_by_default(&self, details: &str) -> &Self {
        *self.fallback.lock() = Scripted::LaunchFailure(details.to_string());
        self
    }

    /// Every argv seen so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

fn key(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_string()).collect()
}

impl CommandExecutor for FakeExecutor {
    fn run(&self, args: &[String]) -> Result<CommandOutput> {
        self.calls.lock().push(args.to_vec());
        let scripted = self
            .responses
            .lock()
            .get(args)
            .cloned()
            .unwrap_or_else(|| self.fallback.lock().clone());
        match scripted {
            Scripted::Output(output) => Ok(output),
            Scripted::LaunchFailure(details) => Err(UadError::LaunchFailure {
                program: "fake-adb".to_string(),
                details,
            }),
        }
    }
}
