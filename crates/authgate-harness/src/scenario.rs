//! The logout scenario: build, login, push, logout, push again.
//!
//! The second push must be rejected. Every resource acquired along the way
//! is registered on a [`Teardown`] stack that runs whether the body
//! succeeds, fails, or panics.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use authgate_common::config::HarnessConfig;
use authgate_common::constants::{SCENARIO_REPOSITORY, SCENARIO_TAG};
use authgate_common::error::{HarnessError, Result};
use authgate_common::types::{CredentialFixture, ImageReference, RegistryEndpoint, ScenarioId};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::RegistryLauncher;
use crate::subject::{CommandOutput, Subject};
use crate::teardown::Teardown;
use crate::{port, scratch};

/// States of the scenario, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Nothing provisioned yet.
    Init,
    /// Fixture written and registry running.
    RegistryUp,
    /// Test image built and tagged against the registry.
    ImageBuilt,
    /// Subject logged in to the registry.
    LoggedIn,
    /// Authenticated push accepted.
    Pushed,
    /// Subject logged out.
    LoggedOut,
    /// Unauthenticated push rejected.
    PushRejected,
    /// All assertions passed.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::RegistryUp => "registry-up",
            Self::ImageBuilt => "image-built",
            Self::LoggedIn => "logged-in",
            Self::Pushed => "pushed",
            Self::LoggedOut => "logged-out",
            Self::PushRejected => "push-rejected",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One subject invocation as seen by the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Phase reached by this step.
    pub phase: Phase,
    /// Command line that was run.
    pub command: String,
    /// Observed exit code.
    pub exit_code: Option<i32>,
    /// Duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Outcome of a passing scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario identifier.
    pub id: ScenarioId,
    /// Registry the scenario pushed to.
    pub endpoint: RegistryEndpoint,
    /// Image reference that was pushed.
    pub image: ImageReference,
    /// Steps in execution order.
    pub steps: Vec<StepRecord>,
    /// When provisioning started.
    pub started_at: DateTime<Utc>,
    /// When teardown finished.
    pub finished_at: DateTime<Utc>,
}

impl ScenarioReport {
    /// `(phase, exit code)` pairs, stable across runs of a healthy subject.
    #[must_use]
    pub fn outcomes(&self) -> Vec<(Phase, Option<i32>)> {
        self.steps.iter().map(|s| (s.phase, s.exit_code)).collect()
    }
}

/// One run of the logout scenario against a subject.
#[derive(Debug)]
pub struct Scenario {
    id: ScenarioId,
    subject: Subject,
    config: HarnessConfig,
    phase: Phase,
    steps: Vec<StepRecord>,
}

impl Scenario {
    /// Prepares a scenario; nothing is provisioned until [`Scenario::run`].
    #[must_use]
    pub fn new(subject: Subject, config: HarnessConfig) -> Self {
        Self {
            id: ScenarioId::generate(),
            subject,
            config,
            phase: Phase::Init,
            steps: Vec::new(),
        }
    }

    /// Scenario identifier.
    #[must_use]
    pub const fn id(&self) -> &ScenarioId {
        &self.id
    }

    /// Phase reached so far.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the scenario to completion and releases everything it created.
    ///
    /// # Errors
    ///
    /// Returns the first failing step wrapped in [`HarnessError::Phase`].
    /// If the body passed but teardown did not, returns
    /// [`HarnessError::Cleanup`].
    pub fn run(mut self) -> Result<ScenarioReport> {
        let started_at = Utc::now();
        tracing::info!(
            id = %self.id,
            subject = %self.subject.program().display(),
            "scenario starting"
        );

        if self.config.purge_before {
            self.subject.remove_all().map_err(|e| self.fail(e))?;
        }

        let mut teardown = Teardown::new();
        let body = self.execute(&mut teardown);
        let cleanup = teardown.run();

        let purge = if self.config.purge_after {
            self.subject.without_interrupt().remove_all()
        } else {
            Ok(())
        };

        let (endpoint, image) = match (body, cleanup.and(purge)) {
            (Ok(resources), Ok(())) => resources,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), cleanup) => {
                if let Err(c) = cleanup {
                    tracing::warn!(id = %self.id, error = %c, "cleanup after failure also failed");
                }
                tracing::error!(id = %self.id, phase = %self.phase, error = %e, "scenario failed");
                return Err(e);
            }
        };

        tracing::info!(id = %self.id, endpoint = %endpoint, "scenario passed");
        Ok(ScenarioReport {
            id: self.id,
            endpoint,
            image,
            steps: self.steps,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn execute(&mut self, teardown: &mut Teardown) -> Result<(RegistryEndpoint, ImageReference)> {
        let endpoint = self.start_registry(teardown).map_err(|e| self.fail(e))?;
        self.phase = Phase::RegistryUp;

        let image = self.build_image(&endpoint, teardown).map_err(|e| self.fail(e))?;
        self.phase = Phase::ImageBuilt;

        let address = endpoint.address();
        let reference = image.fully_qualified();
        let credentials = self.config.credentials.clone();

        let logged_in = Arc::new(AtomicBool::new(false));
        let login = [
            "login",
            address.as_str(),
            "-u",
            credentials.username.as_str(),
            "-p",
            credentials.password.as_str(),
        ];
        self.step(Phase::LoggedIn, Subject::run_expect_success, &login)?;
        logged_in.store(true, Ordering::SeqCst);
        {
            let subject = self.subject.without_interrupt();
            let address = address.clone();
            let logged_in = Arc::clone(&logged_in);
            teardown.defer(format!("logout {address}"), move || {
                if logged_in.load(Ordering::SeqCst) {
                    let _ = subject.run_expect_success(&["logout", address.as_str()])?;
                }
                Ok(())
            });
        }

        let push = ["push", reference.as_str()];
        self.step(Phase::Pushed, Subject::run_expect_success, &push)?;

        self.step(
            Phase::LoggedOut,
            Subject::run_expect_success,
            &["logout", address.as_str()],
        )?;
        logged_in.store(false, Ordering::SeqCst);

        self.step(Phase::PushRejected, Subject::run_expect_failure, &push)?;

        self.phase = Phase::Done;
        Ok((endpoint, image))
    }

    fn start_registry(&self, teardown: &mut Teardown) -> Result<RegistryEndpoint> {
        let fixture = &self.config.credentials;
        let fixture_path = scratch::create_temp_file(
            CredentialFixture::file_name(),
            &fixture.contents(),
        )?;
        let fixture_dir = fixture_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| HarnessError::InvalidInput {
                message: format!("fixture {} has no parent", fixture_path.display()),
            })?;
        defer_remove_dir(teardown, "remove credential fixture", fixture_dir.clone());

        let lease = port::allocate()?;
        let name = self.id.registry_container_name();
        let registry = RegistryLauncher::new(&self.subject, self.config.registry_image.clone())
            .with_ready_timeout(self.config.registry_ready_timeout())
            .launch(&name, lease, &fixture_dir)?;

        let endpoint = registry.endpoint().clone();
        let subject = self.subject.without_interrupt();
        teardown.defer(format!("remove registry {name}"), move || {
            registry.remove(&subject)
        });
        Ok(endpoint)
    }

    fn build_image(
        &mut self,
        endpoint: &RegistryEndpoint,
        teardown: &mut Teardown,
    ) -> Result<ImageReference> {
        let recipe = build_recipe(&self.config.base_image);
        let context = scratch::create_build_context(&recipe)?;
        defer_remove_dir(teardown, "remove build context", context.clone());

        let image = endpoint.image(SCENARIO_REPOSITORY, SCENARIO_TAG);
        let reference = image.fully_qualified();
        let context_arg = context.display().to_string();
        let output = self
            .subject
            .run_expect_success(&["build", "-t", reference.as_str(), context_arg.as_str()])?;
        self.record(Phase::ImageBuilt, &output);

        let subject = self.subject.without_interrupt();
        teardown.defer(format!("remove image {reference}"), move || {
            let _ = subject.run_expect_success(&["rmi", "-f", reference.as_str()])?;
            Ok(())
        });
        Ok(image)
    }

    fn step(
        &mut self,
        next: Phase,
        invoke: fn(&Subject, &[&str]) -> Result<CommandOutput>,
        args: &[&str],
    ) -> Result<()> {
        let output = invoke(&self.subject, args).map_err(|e| self.fail(e))?;
        self.record(next, &output);
        self.phase = next;
        Ok(())
    }

    fn record(&mut self, phase: Phase, output: &CommandOutput) {
        self.steps.push(StepRecord {
            phase,
            command: output.command_line(),
            exit_code: output.exit_code,
            elapsed_ms: u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    fn fail(&self, source: HarnessError) -> HarnessError {
        HarnessError::Phase {
            phase: self.phase.to_string(),
            source: Box::new(source),
        }
    }
}

/// Two-line recipe: the base image and a trivial command.
#[must_use]
pub fn build_recipe(base_image: &str) -> String {
    format!("FROM {base_image}\nCMD [\"echo\", \"bar\"]\n")
}

fn defer_remove_dir(teardown: &mut Teardown, label: &str, dir: PathBuf) {
    teardown.defer(format!("{label} {}", dir.display()), move || {
        scratch::remove_scratch_dir(&dir)
    });
}
