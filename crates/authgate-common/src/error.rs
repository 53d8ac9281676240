//! Unified error types for the authgate workspace.
//!
//! Infrastructure failures (provisioning, launch, spawn) and the one
//! meaningful assertion failure, [`HarnessError::UnexpectedExit`], share a
//! single enum so every step of a scenario propagates with `?`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::Expectation;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A scratch file or directory could not be created or removed.
    #[error("provisioning failed at {path}: {source}")]
    Provision {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Provisioning input was empty or malformed.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected input.
        message: String,
    },

    /// The registry could not be brought up.
    #[error("registry launch failed: {message}")]
    Launch {
        /// Description of the launch failure.
        message: String,
    },

    /// The subject binary could not be started at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The subject exited with a status outside the expected class.
    #[error(
        "`{args}` exited with {status}, expected {expected}\n\
         --- stdout ---\n{stdout}\n--- stderr ---\n{stderr}",
        status = describe_exit(.actual)
    )]
    UnexpectedExit {
        /// Command line that was invoked.
        args: String,
        /// Exit class the step required.
        expected: Expectation,
        /// Observed exit code, `None` when terminated by a signal.
        actual: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The subject did not finish within its wall-clock bound.
    #[error("`{args}` timed out after {}s", whole_secs(.after))]
    Timeout {
        /// Command line that was invoked.
        args: String,
        /// Bound that was exceeded.
        after: Duration,
    },

    /// The invocation was aborted by an interrupt request.
    #[error("`{args}` was interrupted")]
    Interrupted {
        /// Command line that was invoked.
        args: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A scenario step failed while in the given phase.
    #[error("scenario failed in phase {phase}: {source}")]
    Phase {
        /// Phase the scenario had reached.
        phase: String,
        /// Error raised by the step.
        source: Box<HarnessError>,
    },

    /// One or more teardown actions failed.
    #[error("cleanup failed: {}", join_failures(.failures))]
    Cleanup {
        /// Every failure reported by the teardown stack.
        failures: Vec<HarnessError>,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl HarnessError {
    /// Returns the innermost error, unwrapping any [`HarnessError::Phase`] layers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Phase { source, .. } => source.root(),
            other => other,
        }
    }
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "no exit code (killed by signal)".to_owned(), |c| format!("exit code {c}"))
}

const fn whole_secs(after: &Duration) -> u64 {
    after.as_secs()
}

fn join_failures(failures: &[HarnessError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_exit_names_both_classes() {
        let err = HarnessError::UnexpectedExit {
            args: "finch push localhost:1/test-login:tag".into(),
            expected: Expectation::Failure,
            actual: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exited with exit code 0"));
        assert!(msg.contains("expected nonzero exit"));
    }

    #[test]
    fn signal_termination_is_described() {
        let err = HarnessError::UnexpectedExit {
            args: "finch login".into(),
            expected: Expectation::Success,
            actual: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(err.to_string().contains("killed by signal"));
    }

    #[test]
    fn root_unwraps_nested_phases() {
        let inner = HarnessError::Launch {
            message: "port busy".into(),
        };
        let err = HarnessError::Phase {
            phase: "init".into(),
            source: Box::new(HarnessError::Phase {
                phase: "registry-up".into(),
                source: Box::new(inner),
            }),
        };
        assert!(matches!(err.root(), HarnessError::Launch { .. }));
    }

    #[test]
    fn cleanup_lists_every_failure() {
        let err = HarnessError::Cleanup {
            failures: vec![
                HarnessError::Config {
                    message: "first".into(),
                },
                HarnessError::Config {
                    message: "second".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));
    }
}
