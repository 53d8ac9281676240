//! Configuration model for a scenario run.
//!
//! Every field has a default, so a JSON config file only needs to name the
//! values it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_IMAGE, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_REGISTRY_IMAGE,
    DEFAULT_REGISTRY_READY_TIMEOUT_SECS, DEFAULT_SUBJECT,
};
use crate::error::{HarnessError, Result};
use crate::types::CredentialFixture;

/// How to invoke the CLI under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectConfig {
    /// Program name or path.
    pub program: String,
    /// Arguments inserted before every subcommand, for wrapped subjects.
    pub prefix_args: Vec<String>,
    /// Extra environment variables set on every invocation.
    pub env: Vec<(String, String)>,
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_SUBJECT.into(),
            prefix_args: Vec::new(),
            env: Vec::new(),
        }
    }
}

/// Root configuration for a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// CLI under test.
    pub subject: SubjectConfig,
    /// Wall-clock bound for each subject invocation, in seconds.
    pub command_timeout_secs: u64,
    /// Bound on waiting for the registry's HTTP API, in seconds. Zero disables the wait.
    pub registry_ready_timeout_secs: u64,
    /// Registry image started by the launcher.
    pub registry_image: String,
    /// Base image of the build context.
    pub base_image: String,
    /// Credentials baked into the htpasswd fixture.
    pub credentials: CredentialFixture,
    /// Remove every subject-managed container and image before the scenario.
    pub purge_before: bool,
    /// Remove every subject-managed container and image after the scenario.
    pub purge_after: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            subject: SubjectConfig::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            registry_ready_timeout_secs: DEFAULT_REGISTRY_READY_TIMEOUT_SECS,
            registry_image: DEFAULT_REGISTRY_IMAGE.into(),
            base_image: DEFAULT_BASE_IMAGE.into(),
            credentials: CredentialFixture::default(),
            purge_before: false,
            purge_after: false,
        }
    }
}

impl HarnessConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| HarnessError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is empty or a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.subject.program.trim().is_empty() {
            return Err(HarnessError::Config {
                message: "subject program is empty".into(),
            });
        }
        if self.command_timeout_secs == 0 {
            return Err(HarnessError::Config {
                message: "command timeout must be at least one second".into(),
            });
        }
        if self.registry_image.is_empty() || self.base_image.is_empty() {
            return Err(HarnessError::Config {
                message: "registry and base images must be set".into(),
            });
        }
        Ok(())
    }

    /// Per-invocation timeout.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Registry readiness bound, `None` when disabled.
    #[must_use]
    pub const fn registry_ready_timeout(&self) -> Option<Duration> {
        if self.registry_ready_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.registry_ready_timeout_secs))
        }
    }
}

/// Parses a `KEY=VALUE` pair as given on the command line.
///
/// # Errors
///
/// Returns an error if there is no `=` or the key is empty.
pub fn parse_env_pair(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(HarnessError::Config {
            message: format!("expected KEY=VALUE, got `{raw}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.command_timeout(), Duration::from_secs(300));
        assert_eq!(config.subject.program, "finch");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authgate.json");
        std::fs::write(
            &path,
            r#"{ "subject": { "program": "nerdctl" }, "command_timeout_secs": 60 }"#,
        )
        .unwrap();

        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.subject.program, "nerdctl");
        assert!(config.subject.prefix_args.is_empty());
        assert_eq!(config.command_timeout_secs, 60);
        assert_eq!(config.registry_image, DEFAULT_REGISTRY_IMAGE);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = HarnessConfig {
            command_timeout_secs: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::Config { .. })));
    }

    #[test]
    fn zero_ready_timeout_disables_probe() {
        let config = HarnessConfig {
            registry_ready_timeout_secs: 0,
            ..HarnessConfig::default()
        };
        assert_eq!(config.registry_ready_timeout(), None);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = HarnessConfig::from_file(Path::new("/nonexistent/authgate.json")).unwrap_err();
        assert!(matches!(err, HarnessError::Config { .. }));
    }

    #[test]
    fn env_pairs() {
        assert_eq!(
            parse_env_pair("DOCKER_CONFIG=/tmp/x=y").unwrap(),
            ("DOCKER_CONFIG".to_owned(), "/tmp/x=y".to_owned())
        );
        assert!(parse_env_pair("NOVALUE").is_err());
        assert!(parse_env_pair("=value").is_err());
    }
}
