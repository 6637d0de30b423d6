//! UAD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, UadError>;

/// Top-level error type for the debloater engine.
#[derive(Debug, Error)]
pub enum UadError {
    #[error("[UAD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[UAD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[UAD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[UAD-2001] could not launch {program}: {details}")]
    LaunchFailure { program: String, details: String },

    #[error("[UAD-2002] device {serial} unreachable: {details}")]
    Connectivity { serial: String, details: String },

    #[error("[UAD-2003] {what} returned no data for {serial}")]
    EmptyResult { serial: String, what: &'static str },

    #[error("[UAD-2004] invalid identifier {identifier:?}: {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: &'static str,
    },

    #[error("[UAD-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[UAD-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[UAD-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[UAD-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl UadError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "UAD-1001",
            Self::MissingConfig { .. } => "UAD-1002",
            Self::ConfigParse { .. } => "UAD-1003",
            Self::LaunchFailure { .. } => "UAD-2001",
            Self::Connectivity { .. } => "UAD-2002",
            Self::EmptyResult { .. } => "UAD-2003",
            Self::InvalidIdentifier { .. } => "UAD-2004",
            Self::Serialization { .. } => "UAD-2101",
            Self::Io { .. } => "UAD-3002",
            Self::ChannelClosed { .. } => "UAD-3003",
            Self::Runtime { .. } => "UAD-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// A lost or unauthorized device usually recovers after the user
    /// reconnects or accepts the prompt; a missing executable does not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connectivity { .. }
                | Self::EmptyResult { .. }
                | Self::Io { .. }
                | Self::ChannelClosed { .. }
        )
    }

    /// Human hint listing the usual causes, for conditions the user can act on.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LaunchFailure { .. } => Some(
                "check that adb is installed and that [adb].executable or UAD_ADB points at it",
            ),
            Self::Connectivity { .. } | Self::EmptyResult { .. } => Some(
                "device may be unauthorized (accept the prompt on its screen), \
                 USB debugging may be off, or the connection was lost",
            ),
            _ => None,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for UadError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for UadError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
