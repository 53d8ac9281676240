//! Ephemeral, htpasswd-protected registry run through the subject itself.

use std::path::Path;
use std::time::{Duration, Instant};

use authgate_common::constants::{
    AUTH_MOUNT_POINT, AUTH_REALM, HTPASSWD_FILE_NAME, REGISTRY_CONTAINER_PORT,
};
use authgate_common::error::{HarnessError, Result};
use authgate_common::types::RegistryEndpoint;

use crate::port::PortLease;
use crate::subject::Subject;

const READY_POLL_INTERVAL_MS: u64 = 100;
const READY_REQUEST_TIMEOUT_MS: u64 = 1000;

/// Starts registry containers for one subject.
#[derive(Debug, Clone)]
pub struct RegistryLauncher<'a> {
    subject: &'a Subject,
    image: String,
    ready_timeout: Option<Duration>,
}

/// A registry container that is running until [`RunningRegistry::remove`].
#[derive(Debug)]
pub struct RunningRegistry {
    name: String,
    endpoint: RegistryEndpoint,
    lease: PortLease,
}

impl RunningRegistry {
    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `localhost:<port>` endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    /// Force-removes the container, then releases its port lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject fails to remove the container.
    pub fn remove(self, subject: &Subject) -> Result<()> {
        let _ = subject.run_expect_success(&["rm", "-f", self.name.as_str()])?;
        tracing::info!(name = %self.name, port = self.lease.port(), "registry removed");
        Ok(())
    }
}

impl<'a> RegistryLauncher<'a> {
    /// Creates a launcher that starts `image` through `subject`.
    #[must_use]
    pub fn new(subject: &'a Subject, image: impl Into<String>) -> Self {
        Self {
            subject,
            image: image.into(),
            ready_timeout: None,
        }
    }

    /// Waits up to `timeout` for the registry to answer HTTP after starting.
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Arguments of the detached `run` invocation.
    #[must_use]
    pub fn run_args(&self, name: &str, port: u16, fixture_dir: &Path) -> Vec<String> {
        vec![
            "run".into(),
            "-dp".into(),
            format!("{port}:{REGISTRY_CONTAINER_PORT}"),
            "--name".into(),
            name.into(),
            "-v".into(),
            format!("{}:{AUTH_MOUNT_POINT}:ro", fixture_dir.display()),
            "-e".into(),
            "REGISTRY_AUTH=htpasswd".into(),
            "-e".into(),
            format!("REGISTRY_AUTH_HTPASSWD_REALM={AUTH_REALM}"),
            "-e".into(),
            format!("REGISTRY_AUTH_HTPASSWD_PATH={AUTH_MOUNT_POINT}/{HTPASSWD_FILE_NAME}"),
            self.image.clone(),
        ]
    }

    /// Starts the registry on the leased port with the fixture directory
    /// mounted read-only.
    ///
    /// If the start fails, a best-effort removal of `name` is attempted
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not start or, when a ready
    /// timeout is set, never answers HTTP.
    pub fn launch(
        &self,
        name: &str,
        lease: PortLease,
        fixture_dir: &Path,
    ) -> Result<RunningRegistry> {
        let port = lease.port();
        let args = self.run_args(name, port, fixture_dir);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        if let Err(e) = self.subject.run_expect_success(&args) {
            let _ = self.subject.without_interrupt().execute(&["rm", "-f", name]);
            return Err(e);
        }

        let registry = RunningRegistry {
            name: name.to_owned(),
            endpoint: RegistryEndpoint::localhost(port),
            lease,
        };
        tracing::info!(name, endpoint = %registry.endpoint, "registry started");

        if let Some(timeout) = self.ready_timeout {
            if let Err(e) = wait_until_ready(&registry.endpoint, timeout) {
                let _ = registry.remove(&self.subject.without_interrupt());
                return Err(e);
            }
        }
        Ok(registry)
    }
}

/// Polls the registry API until it answers any HTTP response.
///
/// An auth-enabled registry answers `401 Unauthorized`, which counts as ready.
///
/// # Errors
///
/// Returns [`HarnessError::Launch`] if nothing answers within `timeout`.
pub fn wait_until_ready(endpoint: &RegistryEndpoint, timeout: Duration) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .no_proxy()
        .timeout(Duration::from_millis(READY_REQUEST_TIMEOUT_MS))
        .build()
        .map_err(|e| HarnessError::Launch {
            message: format!("cannot build HTTP client: {e}"),
        })?;

    let url = endpoint.api_url();
    let start = Instant::now();
    loop {
        match client.get(&url).send() {
            Ok(response) => {
                tracing::debug!(url = %url, status = %response.status(), "registry is answering");
                return Ok(());
            }
            Err(e) if start.elapsed() >= timeout => {
                return Err(HarnessError::Launch {
                    message: format!("registry at {url} not ready after {timeout:?}: {e}"),
                });
            }
            Err(_) => std::thread::sleep(Duration::from_millis(READY_POLL_INTERVAL_MS)),
        }
    }
}
