use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use triage::reconcile::{DEFAULT_DESCRIPTION, DEFAULT_OPERATION_TIMEOUT};
use triage::{ReconcileConfig, TriageError, DEFAULT_REPORT_FILE};

/// Default JIRA issue type for new issues
pub const DEFAULT_ISSUE_TYPE: &str = "Bug";

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(
    name = "report-failed-tests",
    version,
    about = "Creates JIRA issues for every failed test case on the target branch"
)]
pub struct Args {
    /// Affected branches, comma separated
    #[arg(short = 'b', long, value_delimiter = ',')]
    pub branches: Vec<String>,

    /// Target branch; must be checked out and listed in --branches
    #[arg(short = 't', long)]
    pub target_branch: Option<String>,

    /// Test report path (default: nosetests.xml)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Repository to blame in (default: current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// JIRA project key (overrides JIRA_PROJECT)
    #[arg(long)]
    pub project: Option<String>,

    /// Issue type for new issues (overrides JIRA_ISSUE_TYPE)
    #[arg(long)]
    pub issue_type: Option<String>,

    /// Deadline in seconds for each git or JIRA call (overrides REPORTER_TIMEOUT_SECS)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Search the tracker but do not create or update issues
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// `[jira]` table of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraSection {
    pub server: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub project: Option<String>,
    pub issue_type: Option<String>,
}

/// On-disk configuration; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub branches: Vec<String>,
    pub target_branch: Option<String>,
    pub report: Option<PathBuf>,
    pub repo: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub description: Option<String>,
    pub jira: JiraSection,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// JIRA connection settings
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub server: String,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

/// Fully resolved run configuration
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub jira: JiraConfig,
    pub affected_branches: Vec<String>,
    pub target_branch: String,
    pub report_path: PathBuf,
    pub repo_dir: PathBuf,
    pub project_key: String,
    pub issue_type: String,
    pub description: String,
    pub timeout: Duration,
    pub dry_run: bool,
}

impl ReporterConfig {
    /// Resolve from process environment and arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file, |key| std::env::var(key).ok())
    }

    /// Layer file < environment < flags, then validate
    pub fn resolve(
        args: &Args,
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let branches = if args.branches.is_empty() {
            file.branches
        } else {
            args.branches.clone()
        };
        let affected_branches: Vec<String> = branches
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if affected_branches.is_empty() {
            bail!(TriageError::config(
                "No affected branches configured (use --branches or `branches` in the config file)"
            ));
        }

        let Some(target_branch) = args
            .target_branch
            .clone()
            .or(file.target_branch)
            .filter(|b| !b.trim().is_empty())
        else {
            bail!(TriageError::config("No target branch configured (use --target-branch)"));
        };

        let timeout_secs = match (args.timeout, env("REPORTER_TIMEOUT_SECS")) {
            (Some(secs), _) => secs,
            (None, Some(raw)) => raw
                .parse()
                .with_context(|| format!("REPORTER_TIMEOUT_SECS is not a number: {raw}"))?,
            (None, None) => file
                .timeout_secs
                .unwrap_or(DEFAULT_OPERATION_TIMEOUT.as_secs()),
        };
        if timeout_secs == 0 {
            bail!(TriageError::config("Timeout must be at least one second"));
        }
        let timeout = Duration::from_secs(timeout_secs);

        let server = env("JIRA_SERVER").or(file.jira.server);
        let Some(server) = server else {
            bail!(TriageError::config("No JIRA server configured (set JIRA_SERVER)"));
        };
        let username = env("JIRA_USERNAME").or(file.jira.username);
        let api_token = env("JIRA_API_TOKEN").or(file.jira.api_token);
        if !args.dry_run && (username.is_none() || api_token.is_none()) {
            bail!(TriageError::config(
                "JIRA credentials missing (set JIRA_USERNAME and JIRA_API_TOKEN, or use --dry-run)"
            ));
        }

        let project_key = args
            .project
            .clone()
            .or_else(|| env("JIRA_PROJECT"))
            .or(file.jira.project);
        let Some(project_key) = project_key else {
            bail!(TriageError::config(
                "No JIRA project configured (use --project or JIRA_PROJECT)"
            ));
        };

        let issue_type = args
            .issue_type
            .clone()
            .or_else(|| env("JIRA_ISSUE_TYPE"))
            .or(file.jira.issue_type)
            .unwrap_or_else(|| DEFAULT_ISSUE_TYPE.to_string());

        Ok(Self {
            jira: JiraConfig {
                server: server.trim_end_matches('/').to_string(),
                username,
                api_token,
                timeout,
            },
            affected_branches,
            target_branch,
            report_path: args
                .report
                .clone()
                .or(file.report)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE)),
            repo_dir: args
                .repo
                .clone()
                .or(file.repo)
                .unwrap_or_else(|| PathBuf::from(".")),
            project_key,
            issue_type,
            description: file
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            timeout,
            dry_run: args.dry_run,
        })
    }

    /// Parameters for the reconciler
    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig::new(
            self.target_branch.clone(),
            self.affected_branches.clone(),
            self.project_key.clone(),
            self.issue_type.clone(),
        )
        .with_description(self.description.clone())
        .with_timeout(self.timeout)
    }
}
