//! Domain primitive types used across the authgate workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{HTPASSWD_FILE_NAME, REGISTRY_CONTAINER_PREFIX, REGISTRY_HOST};

/// Unique identifier for one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioId(String);

impl ScenarioId {
    /// Creates a scenario ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random scenario ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first eight characters, enough to keep names readable.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }

    /// Name of the registry container owned by this scenario.
    #[must_use]
    pub fn registry_container_name(&self) -> String {
        format!("{REGISTRY_CONTAINER_PREFIX}{}", self.short())
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of an ephemeral registry published on the local host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryEndpoint {
    host: String,
    port: u16,
}

impl RegistryEndpoint {
    /// Creates an endpoint for the given host and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Creates an endpoint on `localhost`.
    #[must_use]
    pub fn localhost(port: u16) -> Self {
        Self::new(REGISTRY_HOST, port)
    }

    /// Host name part.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Published host port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, the form passed to `login` and `logout`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL of the registry's HTTP API.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/v2/", self.address())
    }

    /// Builds a reference to `repo:tag` hosted on this registry.
    #[must_use]
    pub fn image(&self, repo: impl Into<String>, tag: impl Into<String>) -> ImageReference {
        ImageReference {
            host: self.host.clone(),
            port: self.port,
            repo: repo.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Image reference qualified by a registry endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    host: String,
    port: u16,
    repo: String,
    tag: String,
}

impl ImageReference {
    /// Repository path.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Endpoint hosting this image.
    #[must_use]
    pub fn endpoint(&self) -> RegistryEndpoint {
        RegistryEndpoint::new(self.host.clone(), self.port)
    }

    /// `host:port/repo:tag`.
    #[must_use]
    pub fn fully_qualified(&self) -> String {
        format!("{}:{}/{}:{}", self.host, self.port, self.repo, self.tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified())
    }
}

/// Static basic-auth credentials baked into an htpasswd fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFixture {
    /// User name accepted by the registry.
    pub username: String,
    /// Clear-text password matching the hash.
    pub password: String,
    /// `username:bcrypt-hash` line consumed by the registry.
    pub htpasswd_line: String,
}

impl CredentialFixture {
    /// The pre-generated `testUser` / `testPassword` fixture.
    ///
    /// The hash was produced once with
    /// `htpasswd -Bbn testUser testPassword` and is never regenerated.
    #[must_use]
    pub fn default_test_user() -> Self {
        Self {
            username: "testUser".into(),
            password: "testPassword".into(),
            htpasswd_line: "testUser:$2y$05$wE0sj3r9O9K9q7R0MXcfPuIerl/06L1IsxXkCuUr3QZ8lHWwicIdS"
                .into(),
        }
    }

    /// File name the fixture is written under.
    #[must_use]
    pub const fn file_name() -> &'static str {
        HTPASSWD_FILE_NAME
    }

    /// File content, newline-terminated.
    #[must_use]
    pub fn contents(&self) -> String {
        format!("{}\n", self.htpasswd_line)
    }
}

impl Default for CredentialFixture {
    fn default() -> Self {
        Self::default_test_user()
    }
}

/// Exit-status class a subject invocation must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    /// Exit code zero.
    Success,
    /// Any nonzero exit code, or termination without one.
    Failure,
}

impl Expectation {
    /// Returns whether `exit_code` satisfies this expectation.
    ///
    /// `None` means the process ended without an exit code (signal or kill)
    /// and only ever counts as a failure.
    #[must_use]
    pub const fn accepts(self, exit_code: Option<i32>) -> bool {
        match (self, exit_code) {
            (Self::Success, Some(0)) => true,
            (Self::Success, _) | (Self::Failure, Some(0)) => false,
            (Self::Failure, _) => true,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "zero exit"),
            Self::Failure => write!(f, "nonzero exit"),
        }
    }
}
