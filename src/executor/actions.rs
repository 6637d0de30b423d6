//! Sequential batch application of one lifecycle operation.
//!
//! Every target yields exactly one [`ActionOutcome`], in input order. A failing
//! target never stops the batch; only cancellation does, and cancelled targets
//! still get an outcome.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::task::CancelToken;
use crate::adb::runner::{CommandExecutor, CommandOutput, argv};
use crate::logger::{ActionHistory, HistoryEntry};

/// Device-side lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Disable,
    Uninstall,
    Enable,
    /// Kept verbatim so the failing outcome can name what was asked for.
    Unrecognized(String),
}

impl Operation {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "disable" => Self::Disable,
            "uninstall" => Self::Uninstall,
            "enable" => Self::Enable,
            _ => Self::Unrecognized(raw.trim().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Disable => "disable",
            Self::Uninstall => "uninstall",
            Self::Enable => "enable",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Whether the operation takes a package away from the user.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::Disable | Self::Uninstall)
    }

    /// Command line for one target; `None` for an unrecognized operation.
    #[must_use]
    pub fn command(&self, serial: &str, identifier: &str) -> Option<Vec<String>> {
        let args = match self {
            Self::Disable => argv(&[
                "-s",
                serial,
                "shell",
                "pm",
                "disable-user",
                "--user",
                "0",
                identifier,
            ]),
            Self::Uninstall => argv(&[
                "-s",
                serial,
                "shell",
                "pm",
                "uninstall",
                "--user",
                "0",
                identifier,
            ]),
            Self::Enable => argv(&["-s", serial, "shell", "pm", "enable", identifier]),
            Self::Unrecognized(_) => return None,
        };
        Some(args)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One batch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub operation: Operation,
    pub device: String,
    pub targets: Vec<String>,
}

impl ActionRequest {
    #[must_use]
    pub fn new(operation: Operation, device: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            operation,
            device: device.into(),
            targets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub package_identifier: String,
    pub operation: Operation,
    pub succeeded: bool,
    /// Trimmed command output, or the launch diagnostic.
    pub raw_result: String,
    /// Not dispatched because the batch was cancelled first.
    pub cancelled: bool,
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// About to run the command for `identifier` (`index` is 1-based).
    Progress {
        index: usize,
        total: usize,
        identifier: String,
    },
    /// Command finished; `history` is the entry appended for it, if any.
    Outcome {
        index: usize,
        outcome: ActionOutcome,
        history: Option<HistoryEntry>,
    },
}

/// Outcomes of one batch plus aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub operation: Operation,
    pub device: String,
    pub outcomes: Vec<ActionOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    /// Dispatched targets that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded && !o.cancelled)
            .count()
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.outcomes.iter().filter(|o| o.cancelled).count()
    }

    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled() > 0
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded)
    }
}

/// Older `pm` builds exit 0 and print `Failure [...]`.
fn reports_failure(output: &str) -> bool {
    output
        .lines()
        .any(|line| line.trim_start().starts_with("Failure"))
}

/// Runs batches against one command layer and records them in one history.
#[derive(Clone)]
pub struct ActionExecutor {
    executor: Arc<dyn CommandExecutor>,
    history: Arc<ActionHistory>,
}

impl ActionExecutor {
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>, history: Arc<ActionHistory>) -> Self {
        Self { executor, history }
    }

    #[must_use]
    pub fn history(&self) -> &Arc<ActionHistory> {
        &self.history
    }

    /// Apply without observing progress.
    pub fn apply(&self, request: &ActionRequest, cancel: &CancelToken) -> BatchReport {
        self.apply_with(request, cancel, &mut |_| {})
    }

    /// Apply, reporting each step to `observer` as it happens.
    ///
    /// Cancellation is checked before each target; a command already running
    /// is never interrupted. History receives every dispatched outcome before
    /// its `Outcome` event is emitted.
    pub fn apply_with(
        &self,
        request: &ActionRequest,
        cancel: &CancelToken,
        observer: &mut dyn FnMut(BatchEvent),
    ) -> BatchReport {
        let total = request.targets.len();
        let mut outcomes = Vec::with_capacity(total);
        info!(
            operation = %request.operation,
            device = %request.device,
            total,
            "batch started"
        );

        for (position, identifier) in request.targets.iter().enumerate() {
            let index = position + 1;

            if cancel.is_cancelled() {
                let outcome = ActionOutcome {
                    package_identifier: identifier.clone(),
                    operation: request.operation.clone(),
                    succeeded: false,
                    raw_result: "cancelled before dispatch".to_string(),
                    cancelled: true,
                };
                observer(BatchEvent::Outcome {
                    index,
                    outcome: outcome.clone(),
                    history: None,
                });
                outcomes.push(outcome);
                continue;
            }

            observer(BatchEvent::Progress {
                index,
                total,
                identifier: identifier.clone(),
            });

            let outcome = self.run_one(&request.operation, &request.device, identifier);
            let entry = self.history.log(
                &request.operation.as_str().to_uppercase(),
                identifier,
                outcome.succeeded,
            );
            observer(BatchEvent::Outcome {
                index,
                outcome: outcome.clone(),
                history: Some(entry),
            });
            outcomes.push(outcome);
        }

        let report = BatchReport {
            operation: request.operation.clone(),
            device: request.device.clone(),
            outcomes,
        };
        info!(
            operation = %report.operation,
            device = %report.device,
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            "batch finished"
        );
        report
    }

    fn run_one(&self, operation: &Operation, serial: &str, identifier: &str) -> ActionOutcome {
        let outcome = |succeeded: bool, raw_result: String| ActionOutcome {
            package_identifier: identifier.to_string(),
            operation: operation.clone(),
            succeeded,
            raw_result,
            cancelled: false,
        };

        let Some(args) = operation.command(serial, identifier) else {
            warn!(operation = %operation, identifier, "unrecognized operation");
            return outcome(false, format!("unrecognized operation {:?}", operation.as_str()));
        };

        let result = match self.executor.run(&args) {
            Ok(result) => result,
            Err(err) => {
                warn!(identifier, error = %err, "command could not be launched");
                CommandOutput::from_launch_failure(&err)
            }
        };
        let succeeded = result.is_success() && !reports_failure(&result.output);
        let raw_result = result.diagnostic.clone().unwrap_or_else(|| result.excerpt());
        debug!(identifier, succeeded, exit_code = result.exit_code, "target processed");
        outcome(succeeded, raw_result)
    }
}
