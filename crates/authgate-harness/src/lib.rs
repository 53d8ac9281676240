//! Orchestration harness for the registry logout scenario.
//!
//! The subject CLI is driven as a black box: every assertion is made on
//! process exit status, and every resource a scenario creates is released
//! through a [`teardown::Teardown`] stack.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod port;
pub mod registry;
pub mod scenario;
pub mod scratch;
pub mod subject;
pub mod teardown;

pub use scenario::{Phase, Scenario, ScenarioReport, StepRecord};
pub use subject::{CommandOutput, Subject};
pub use teardown::Teardown;
