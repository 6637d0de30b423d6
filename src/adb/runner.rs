//! Command execution seam: one trait, one process-backed implementation.

#![allow(missing_docs)]

use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::core::errors::{Result, UadError};

/// Longest output excerpt copied into diagnostics.
const OUTPUT_EXCERPT_CHARS: usize = 500;

/// Exit status and combined stdout+stderr of one device-management command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
    /// Set only when the command never ran.
    pub diagnostic: Option<String>,
}

impl CommandOutput {
    #[must_use]
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
            diagnostic: None,
        }
    }

    /// The `-1` / empty-output view of a command that never started.
    #[must_use]
    pub fn from_launch_failure(err: &UadError) -> Self {
        Self {
            exit_code: -1,
            output: String::new(),
            diagnostic: Some(err.to_string()),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// First `OUTPUT_EXCERPT_CHARS` characters of the output, trimmed.
    #[must_use]
    pub fn excerpt(&self) -> String {
        excerpt(&self.output)
    }
}

pub(crate) fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(OUTPUT_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Runs a device-management command line.
///
/// A non-zero exit is a normal `Ok` result. `Err` is reserved for commands
/// that could not be launched at all and is always
/// [`UadError::LaunchFailure`].
pub trait CommandExecutor: Send + Sync {
    fn run(&self, args: &[String]) -> Result<CommandOutput>;
}

/// Build an owned argv from string slices.
#[must_use]
pub fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_string()).collect()
}

/// [`CommandExecutor`] backed by a local `adb` binary.
#[derive(Debug, Clone)]
pub struct AdbRunner {
    executable: String,
}

impl Default for AdbRunner {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl AdbRunner {
    #[must_use]
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    #[must_use]
    pub fn executable(&self) -> &str {
        &self.executable
    }
}

impl CommandExecutor for AdbRunner {
    fn run(&self, args: &[String]) -> Result<CommandOutput> {
        debug!(program = %self.executable, args = %args.join(" "), "executing");

        // `output()` drains both pipes concurrently, so large listings cannot
        // wedge the child on a full stderr buffer.
        let output = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| UadError::LaunchFailure {
                program: self.executable.clone(),
                details: err.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }

        let result = CommandOutput::new(output.status.code().unwrap_or(-1), combined);
        if !result.is_success() {
            warn!(
                program = %self.executable,
                args = %args.join(" "),
                exit_code = result.exit_code,
                output = %result.excerpt(),
                "command failed"
            );
        }
        Ok(result)
    }
}
