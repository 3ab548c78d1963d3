//! CLI command implementations for Gridrace.

pub(crate) mod bridge;
pub(crate) mod judge;

use std::error::Error;
use std::fmt;

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<gridrace::TrackError> for CliError {
    fn from(e: gridrace::TrackError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<gridrace::CircuitFull> for CliError {
    fn from(e: gridrace::CircuitFull) -> Self {
        Self::new(e.to_string())
    }
}

impl From<gridrace::StartupError> for CliError {
    fn from(e: gridrace::StartupError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<gridrace::replay::ReplayError> for CliError {
    fn from(e: gridrace::replay::ReplayError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<gridrace::bridge::BridgeError> for CliError {
    fn from(e: gridrace::bridge::BridgeError) -> Self {
        Self::new(e.to_string())
    }
}
