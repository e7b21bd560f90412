//! Error types for tool invocations and story planning.

use thiserror::Error;

/// Failure of an external tool invocation.
#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("Failed to start command: {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed with {}: {command}", describe_exit(*.exit_code))]
    NonZeroExit {
        command: String,
        exit_code: Option<i32>,
        stdout: Option<String>,
        stderr: Option<String>,
    },

    #[error("Failed to prepare redirect {path} for: {command}")]
    Redirect {
        command: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

impl ToolFailure {
    /// The rendered command line that failed.
    pub fn command(&self) -> &str {
        match self {
            Self::Spawn { command, .. }
            | Self::NonZeroExit { command, .. }
            | Self::Redirect { command, .. } => command,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Captured stdout, only present when the tool ran with suppressed output.
    pub fn captured_stdout(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stdout, .. } => stdout.as_deref(),
            _ => None,
        }
    }

    /// Captured stderr, only present when the tool ran with suppressed output.
    pub fn captured_stderr(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

/// Errors the story planner cannot recover from by falling back.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("GOOGLE_API_KEY not found in environment or {0}")]
    MissingCredential(String),
}
