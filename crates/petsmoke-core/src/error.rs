//! Error types for petsmoke-core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using petsmoke-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for petsmoke operations
#[derive(Error, Debug)]
pub enum Error {
    // Tooling errors
    #[error("{tool} not found in PATH")]
    PrerequisiteMissing { tool: String },

    // Readiness errors
    #[error("Timed out after {}s waiting for {url}", .waited.as_secs())]
    ReadinessTimeout { url: String, waited: Duration },

    // Smoke check errors
    #[error("{step}: {message}")]
    Assertion { step: String, message: String },

    // External command errors
    #[error(
        "Command failed ({}): {command}\n{output}",
        .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into())
    )]
    ExternalProcess {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Build artifact not found at {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Interrupted, shutting down")]
    Interrupted,

    // Supervisor errors
    #[error("A supervised process is already running (pid {0})")]
    AlreadyRunning(u32),

    // Transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an assertion failure for a smoke-check step
    pub fn assertion(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Assertion {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create an error from a non-zero exit of an external command
    pub fn external_process(
        command: impl Into<String>,
        code: Option<i32>,
        output: impl Into<String>,
    ) -> Self {
        Self::ExternalProcess {
            command: command.into(),
            code,
            output: output.into(),
        }
    }

    /// Classify this error for exit-code reporting.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Error::PrerequisiteMissing { .. } => FailureClass::PrerequisiteMissing,
            Error::ReadinessTimeout { .. } => FailureClass::ReadinessTimeout,
            Error::Assertion { .. } => FailureClass::Assertion,
            Error::ExternalProcess { .. } | Error::MissingArtifact(_) => {
                FailureClass::ExternalProcess
            }
            Error::Interrupted => FailureClass::Interrupted,
            _ => FailureClass::Runtime,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Why a run ended in the failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    PrerequisiteMissing,
    ReadinessTimeout,
    Assertion,
    ExternalProcess,
    Interrupted,
    Runtime,
}

impl FailureClass {
    /// Process exit code reported for this failure.
    pub fn exit_code(self) -> i32 {
        match self {
            FailureClass::PrerequisiteMissing => 10,
            FailureClass::ReadinessTimeout => 2,
            FailureClass::Interrupted => 1,
            FailureClass::Assertion | FailureClass::ExternalProcess | FailureClass::Runtime => 3,
        }
    }
}
