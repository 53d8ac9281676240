//! CLI command definitions and dispatch.

pub mod logout;
pub mod purge;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use authgate_common::config::{HarnessConfig, parse_env_pair};
use authgate_common::constants::SUBJECT_ENV_VAR;
use authgate_harness::Subject;
use clap::{Args, Parser, Subcommand};

/// authgate — registry logout conformance check for container CLIs.
#[derive(Parser, Debug)]
#[command(name = "authgate", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file; flags override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the logout scenario against the subject.
    Logout(logout::LogoutArgs),
    /// Remove every container and image the subject manages.
    Purge(purge::PurgeArgs),
}

/// How to reach the CLI under test.
#[derive(Args, Debug, Clone, Default)]
pub struct SubjectArgs {
    /// Subject binary (name on PATH or path).
    #[arg(long, env = SUBJECT_ENV_VAR)]
    pub subject: Option<String>,

    /// Argument placed before every subcommand (repeatable).
    #[arg(long = "prefix", value_name = "ARG", allow_hyphen_values = true)]
    pub prefix_args: Vec<String>,

    /// Extra environment for the subject, as KEY=VALUE (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Timeout for each subject invocation, in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl SubjectArgs {
    /// Applies the flags on top of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an `--env` value is not `KEY=VALUE`.
    pub fn apply(&self, config: &mut HarnessConfig) -> anyhow::Result<()> {
        if let Some(subject) = &self.subject {
            config.subject.program.clone_from(subject);
        }
        if !self.prefix_args.is_empty() {
            config.subject.prefix_args.clone_from(&self.prefix_args);
        }
        for raw in &self.env {
            config.subject.env.push(parse_env_pair(raw)?);
        }
        if let Some(secs) = self.timeout_secs {
            config.command_timeout_secs = secs;
        }
        Ok(())
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let base = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    match cli.command {
        Command::Logout(args) => logout::execute(args, base, cli.json),
        Command::Purge(args) => purge::execute(&args, base, cli.json),
    }
}

/// Resolves the subject and wires Ctrl+C to abort its running invocation.
fn interruptible_subject(config: &HarnessConfig) -> anyhow::Result<Subject> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })?;
    Ok(Subject::from_config(config)?.with_interrupt(interrupted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "authgate",
            "logout",
            "--subject",
            "nerdctl",
            "--prefix",
            "--namespace=test",
            "--env",
            "DOCKER_CONFIG=/tmp/cfg",
            "--timeout-secs",
            "45",
        ])
        .unwrap();
        let Command::Logout(args) = cli.command else {
            panic!("expected logout");
        };

        let mut config = HarnessConfig::default();
        args.subject.apply(&mut config).unwrap();
        assert_eq!(config.subject.program, "nerdctl");
        assert_eq!(config.subject.prefix_args, vec!["--namespace=test"]);
        assert_eq!(
            config.subject.env,
            vec![("DOCKER_CONFIG".to_owned(), "/tmp/cfg".to_owned())]
        );
        assert_eq!(config.command_timeout_secs, 45);
    }

    #[test]
    fn malformed_env_is_rejected() {
        let args = SubjectArgs {
            env: vec!["NOEQUALS".into()],
            ..SubjectArgs::default()
        };
        assert!(args.apply(&mut HarnessConfig::default()).is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["authgate", "purge", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Purge(_)));
    }
}
