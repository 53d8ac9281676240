//! Invocation of the CLI under test.
//!
//! [`Subject::execute`] is the single execution primitive: it runs one
//! command to completion (or to its timeout) and reports what happened.
//! The assertion policy lives in [`authgate_common::types::Expectation`]
//! and is applied by [`Subject::run`]. Nothing here retries.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use authgate_common::config::HarnessConfig;
use authgate_common::error::{HarnessError, Result};
use authgate_common::types::Expectation;
use serde::Serialize;

const POLL_INTERVAL_MS: u64 = 25;

/// Result of one finished subject invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    /// Full command line, program first.
    pub args: Vec<String>,
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration of the invocation.
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Whether the process exited with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Command line joined with spaces, for diagnostics.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

/// The CLI under test and how to invoke it.
#[derive(Debug, Clone)]
pub struct Subject {
    program: PathBuf,
    prefix_args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Duration,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Subject {
    /// Creates a subject invoking `program` directly.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            env: Vec::new(),
            timeout,
            interrupt: None,
        }
    }

    /// Builds a subject from configuration, resolving the program on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be found or is not executable.
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let program =
            which::which(&config.subject.program).map_err(|e| HarnessError::Config {
                message: format!("subject `{}` not found: {e}", config.subject.program),
            })?;
        Ok(Self::new(program, config.command_timeout())
            .with_prefix_args(config.subject.prefix_args.clone())
            .with_env(config.subject.env.clone()))
    }

    /// Arguments placed before every subcommand.
    #[must_use]
    pub fn with_prefix_args(mut self, prefix_args: Vec<String>) -> Self {
        self.prefix_args = prefix_args;
        self
    }

    /// Extra environment variables for every invocation.
    #[must_use]
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Flag that, once raised, kills the running invocation.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Copy of this subject that ignores the interrupt flag.
    ///
    /// Teardown runs through this so an interrupted scenario still releases
    /// its resources; each call stays bounded by the timeout.
    #[must_use]
    pub fn without_interrupt(&self) -> Self {
        Self {
            interrupt: None,
            ..self.clone()
        }
    }

    /// Resolved program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Per-invocation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the subject once and waits for it, bounded by the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Spawn`] if the process cannot start,
    /// [`HarnessError::Timeout`] if it, or anything still holding its
    /// output pipes, outlives the bound, and
    /// [`HarnessError::Interrupted`] if the interrupt flag is raised.
    pub fn execute(&self, args: &[&str]) -> Result<CommandOutput> {
        let command_line = self.command_line(args);
        tracing::info!(cmd = %command_line.join(" "), "running subject");

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.prefix_args)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HarnessError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    kill(&mut child);
                    return Err(HarnessError::Spawn {
                        program: self.program.display().to_string(),
                        source: e,
                    });
                }
            }
            if self.interrupted() {
                kill(&mut child);
                tracing::warn!(cmd = %command_line.join(" "), "subject interrupted");
                return Err(HarnessError::Interrupted {
                    args: command_line.join(" "),
                });
            }
            if start.elapsed() >= self.timeout {
                kill(&mut child);
                tracing::warn!(
                    cmd = %command_line.join(" "),
                    timeout = ?self.timeout,
                    "subject timed out"
                );
                return Err(HarnessError::Timeout {
                    args: command_line.join(" "),
                    after: self.timeout,
                });
            }
            std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        };

        let deadline = start + self.timeout;
        let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
        else {
            tracing::warn!(
                cmd = %command_line.join(" "),
                timeout = ?self.timeout,
                "subject exited but its output pipes stayed open"
            );
            return Err(HarnessError::Timeout {
                args: command_line.join(" "),
                after: self.timeout,
            });
        };

        let output = CommandOutput {
            args: command_line,
            exit_code: status.code(),
            stdout,
            stderr,
            elapsed: start.elapsed(),
        };
        tracing::debug!(
            cmd = %output.command_line(),
            exit_code = ?output.exit_code,
            elapsed_ms = output.elapsed.as_millis(),
            "subject finished"
        );
        Ok(output)
    }

    /// Runs the subject and checks its exit status against `expectation`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnexpectedExit`] when the status falls in the
    /// wrong class, or any error from [`Subject::execute`].
    pub fn run(&self, expectation: Expectation, args: &[&str]) -> Result<CommandOutput> {
        let output = self.execute(args)?;
        if expectation.accepts(output.exit_code) {
            return Ok(output);
        }
        Err(HarnessError::UnexpectedExit {
            args: output.command_line(),
            expected: expectation,
            actual: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Runs the subject and requires a zero exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject exits nonzero or cannot be run.
    pub fn run_expect_success(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run(Expectation::Success, args)
    }

    /// Runs the subject and requires a nonzero exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject exits zero or cannot be run.
    pub fn run_expect_failure(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run(Expectation::Failure, args)
    }

    /// Force-removes every container and image the subject manages.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or removal fails.
    pub fn remove_all(&self) -> Result<()> {
        let containers = ids(&self.run_expect_success(&["ps", "-aq"])?.stdout);
        if !containers.is_empty() {
            let mut args = vec!["rm", "-f"];
            args.extend(containers.iter().map(String::as_str));
            let _ = self.run_expect_success(&args)?;
        }

        let images = ids(&self.run_expect_success(&["images", "-q"])?.stdout);
        if !images.is_empty() {
            let mut args = vec!["rmi", "-f"];
            args.extend(images.iter().map(String::as_str));
            let _ = self.run_expect_success(&args)?;
        }

        tracing::info!(
            containers = containers.len(),
            images = images.len(),
            "removed all subject-managed resources"
        );
        Ok(())
    }

    fn command_line(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.prefix_args.iter().cloned())
            .chain(args.iter().map(|a| (*a).to_owned()))
            .collect()
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Unique, non-empty lines of a `-q` listing, in first-seen order.
fn ids(listing: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for id in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !seen.iter().any(|s: &String| s == id) {
            seen.push(id.to_owned());
        }
    }
    seen
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let _ = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Waits for a drained stream until `deadline`; `None` means it is still open.
fn collect(rx: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
