//! Failed-test reporter
//!
//! Wires the `triage` reconciler to git and JIRA:
//! - [`config`]: typed configuration from flags, environment and TOML
//! - [`jira`]: JIRA REST client implementing `IssueTracker`
//! - [`dry_run`]: tracker wrapper that never writes

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod dry_run;
pub mod jira;

use anyhow::Result;
use config::ReporterConfig;
use dry_run::DryRunTracker;
use jira::JiraClient;
use tracing::info;
use triage::{GitManager, Reconciler, RunSummary, TriageError};

/// Process exit code when every case was reconciled (or nothing had to be)
pub const EXIT_OK: i32 = 0;
/// Process exit code when at least one case ended in an error
pub const EXIT_CASE_FAILED: i32 = 1;
/// Process exit code for invalid configuration
pub const EXIT_CONFIG: i32 = 2;

/// Run one reconciliation with the configured collaborators.
///
/// Errors only when a collaborator cannot be built; per-case failures are
/// reported in the summary.
pub async fn run(config: &ReporterConfig) -> Result<RunSummary> {
    let git = GitManager::new(&config.repo_dir).with_timeout(config.timeout);
    let jira = JiraClient::new(&config.jira)?;

    info!(
        target_branch = %config.target_branch,
        report = %config.report_path.display(),
        server = %config.jira.server,
        dry_run = config.dry_run,
        "reporting failed tests"
    );

    let summary = if config.dry_run {
        let tracker = DryRunTracker::new(jira);
        Reconciler::new(&git, &tracker, config.reconcile_config())
            .run(&config.report_path)
            .await
    } else {
        Reconciler::new(&git, &jira, config.reconcile_config())
            .run(&config.report_path)
            .await
    };
    Ok(summary)
}

/// Exit code for a finished run
pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.failed > 0 {
        EXIT_CASE_FAILED
    } else {
        EXIT_OK
    }
}

/// Exit code for a run that could not start
pub fn error_exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TriageError>() {
        Some(TriageError::ConfigError { .. }) => EXIT_CONFIG,
        _ => EXIT_CASE_FAILED,
    }
}

/// Error text with the recovery hint when one is known
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TriageError>() {
        Some(e) => e.with_suggestion(),
        None => format!("{err:#}"),
    }
}
