//! CLI support for rhythmix
//!
//! Provides programmatic access to the `rhythmix check` command so that
//! other tools can validate rules and replay event logs without spawning
//! the binary.

mod check;
mod convert;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use convert::{event_to_json, json_to_event, json_to_value, parse_define, parse_events, value_to_json};

use std::io;

use crate::{CompileError, RuntimeError};

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Rule failed to compile; `source` is kept to point at the offending token
    Compile { error: CompileError, source: String },
    /// Rule failed while processing an event
    Runtime(RuntimeError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No events provided
    NoInput,
    /// JSON that does not describe an event
    InvalidEvent(String),
    /// `--define` argument not of the form NAME=VALUE
    InvalidDefine(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Compile { error, source } => write!(f, "{}", error.render(source)),
            CliError::Runtime(e) => write!(f, "Runtime error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(
                f,
                "No events provided. Use --events or pipe JSON to stdin."
            ),
            CliError::InvalidEvent(msg) => write!(f, "Invalid event: {}", msg),
            CliError::InvalidDefine(arg) => {
                write!(f, "Invalid definition '{}': expected NAME=VALUE", arg)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Compile { error, .. } => Some(error),
            CliError::Runtime(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        CliError::Runtime(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
