//! `authgate logout` — push must fail once the subject logs out.

use anyhow::{Context as _, bail};
use authgate_common::config::HarnessConfig;
use authgate_harness::{Scenario, ScenarioReport};
use clap::Args;

use super::SubjectArgs;
use crate::output;

/// Arguments for the `logout` command.
#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// How to invoke the subject.
    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Registry image to run.
    #[arg(long)]
    pub registry_image: Option<String>,

    /// Base image of the test build context.
    #[arg(long)]
    pub base_image: Option<String>,

    /// Seconds to wait for the registry's HTTP API (0 disables the wait).
    #[arg(long)]
    pub ready_timeout_secs: Option<u64>,

    /// Run the scenario this many times, each against a fresh registry.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub iterations: u32,

    /// Remove every subject-managed container and image before and after.
    #[arg(long)]
    pub purge: bool,
}

impl LogoutArgs {
    fn apply(&self, config: &mut HarnessConfig) -> anyhow::Result<()> {
        self.subject.apply(config)?;
        if let Some(image) = &self.registry_image {
            config.registry_image.clone_from(image);
        }
        if let Some(image) = &self.base_image {
            config.base_image.clone_from(image);
        }
        if let Some(secs) = self.ready_timeout_secs {
            config.registry_ready_timeout_secs = secs;
        }
        if self.purge {
            config.purge_before = true;
            config.purge_after = true;
        }
        config.validate()?;
        Ok(())
    }
}

/// Executes the `logout` command.
///
/// # Errors
///
/// Returns an error if any run fails, or if runs disagree on step outcomes.
pub fn execute(args: LogoutArgs, mut config: HarnessConfig, json: bool) -> anyhow::Result<()> {
    args.apply(&mut config)?;
    let subject = super::interruptible_subject(&config)?;

    let mut reports: Vec<ScenarioReport> = Vec::new();
    for iteration in 1..=args.iterations {
        tracing::info!(iteration, total = args.iterations, "starting logout scenario");
        let report = Scenario::new(subject.clone(), config.clone())
            .run()
            .with_context(|| format!("logout scenario failed on run {iteration}"))?;
        if !json {
            output::print_report(&report);
        }
        reports.push(report);
    }

    if let Some(first) = reports.first() {
        if let Some(diverging) = reports.iter().position(|r| r.outcomes() != first.outcomes()) {
            bail!("run {} produced different step outcomes than run 1", diverging + 1);
        }
    }

    if json {
        output::print_json(&reports)?;
    }
    Ok(())
}
