//! `authgate purge` — remove every container and image the subject manages.

use authgate_common::config::HarnessConfig;
use clap::Args;

use super::SubjectArgs;

/// Arguments for the `purge` command.
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// How to invoke the subject.
    #[command(flatten)]
    pub subject: SubjectArgs,
}

/// Executes the `purge` command.
///
/// # Errors
///
/// Returns an error if the subject cannot list or remove its resources.
pub fn execute(args: &PurgeArgs, mut config: HarnessConfig, json: bool) -> anyhow::Result<()> {
    args.subject.apply(&mut config)?;
    config.validate()?;
    let subject = super::interruptible_subject(&config)?;
    subject.remove_all()?;
    if json {
        crate::output::print_json(&serde_json::json!({ "purged": true }))?;
    } else {
        crate::output::print_purged(&config.subject.program);
    }
    Ok(())
}
