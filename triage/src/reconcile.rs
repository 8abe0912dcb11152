//! Failure reconciler
//!
//! For each failing test case in a report: resolve the test's source path,
//! blame the `def` line and the failing line, then either escalate the open
//! issue carrying the same summary signature or create a new one assigned
//! to the author of the test.
//!
//! ```text
//! run(report)
//!   ├─ branch guard fails      → one explanatory message
//!   ├─ report missing/invalid  → one explanatory message
//!   ├─ errors == 0             → "No errors in tests"
//!   └─ per failing test case (document order, sequential)
//!        ├─ no traceback line in the test module → no message
//!        ├─ open issue found → priority one step more urgent (floor 1)
//!        └─ none found       → new issue, least urgent priority
//! ```
//!
//! Any blame or tracker error is turned into an `Error: ` message for that
//! case; the remaining cases are still processed.

use crate::attribution::{BlameAttribution, BlameRole};
use crate::blame::BlameSource;
use crate::error::{TriageError, TriageResult};
use crate::report::{TestCase, TestReport};
use crate::test_path::{matching_location, parse_test_path, FailureLocation, TestPath};
use crate::tracker::{least_urgent, IssueSignature, IssueTracker, NewIssue, Priority};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Message produced when the report has no errors
pub const NO_ERRORS_MESSAGE: &str = "No errors in tests";

/// Prefix marking a per-case failure
pub const ERROR_MARKER: &str = "Error: ";

/// Default description for new issues
pub const DEFAULT_DESCRIPTION: &str = "Automatically reported failing test.";

/// Default deadline for a single blame or tracker call
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run parameters, already validated by the caller
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub target_branch: String,
    pub affected_branches: Vec<String>,
    pub project_key: String,
    pub issue_type: String,
    pub description: String,
    pub operation_timeout: Duration,
}

impl ReconcileConfig {
    pub fn new(
        target_branch: impl Into<String>,
        affected_branches: Vec<String>,
        project_key: impl Into<String>,
        issue_type: impl Into<String>,
    ) -> Self {
        Self {
            target_branch: target_branch.into(),
            affected_branches,
            project_key: project_key.into(),
            issue_type: issue_type.into(),
            description: DEFAULT_DESCRIPTION.to_string(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Result of the branch guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchGuard {
    Proceed,
    /// Reconciliation must not run; the message says why
    Skip(String),
}

/// What happened to one failing test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    /// An open issue was found and its priority raised
    Escalated {
        test: String,
        key: String,
        priority_id: String,
    },
    /// A new issue was filed
    Created {
        test: String,
        key: String,
        assignee: Option<String>,
    },
    /// Blame or tracker interaction failed for this case
    Failed { test: String, error: String },
}

impl CaseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Escalated {
                test,
                key,
                priority_id,
            } => write!(f, "Issue {} for {}: priority raised to {}", key, test, priority_id),
            Self::Created {
                test,
                key,
                assignee: Some(assignee),
            } => write!(f, "Created issue {} for {} (assigned to {})", key, test, assignee),
            Self::Created {
                test,
                key,
                assignee: None,
            } => write!(f, "Created issue {} for {}", key, test),
            Self::Failed { test, error } => write!(f, "{}{}: {}", ERROR_MARKER, test, error),
        }
    }
}

/// Messages produced by one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub messages: Vec<String>,
    /// Number of cases that ended in an error
    pub failed: usize,
}

impl RunSummary {
    fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            failed: 0,
        }
    }

    fn push(&mut self, outcome: &CaseOutcome) {
        if outcome.is_failure() {
            self.failed += 1;
        }
        self.messages.push(outcome.to_string());
    }

    /// Newline-joined messages
    pub fn render(&self) -> String {
        self.messages.join("\n")
    }
}

/// Reconciles failing tests against the tracker
pub struct Reconciler<'a> {
    blame: &'a dyn BlameSource,
    tracker: &'a dyn IssueTracker,
    config: ReconcileConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        blame: &'a dyn BlameSource,
        tracker: &'a dyn IssueTracker,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            blame,
            tracker,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Guard, load the report, reconcile
    pub async fn run(&self, report_path: &Path) -> RunSummary {
        if let BranchGuard::Skip(message) = self.check_branches().await {
            info!(%message, "skipping reconciliation");
            return RunSummary::single(message);
        }

        let report = match TestReport::load(report_path) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    error = %e,
                    recovery = e.recovery_suggestion().unwrap_or_default(),
                    "cannot read test report"
                );
                return RunSummary::single(e.to_string());
            }
        };

        self.reconcile(&report).await
    }

    /// Target branch must exist, be checked out and be one of the affected branches.
    pub async fn check_branches(&self) -> BranchGuard {
        match self.branch_guard().await {
            Ok(guard) => guard,
            Err(e) => BranchGuard::Skip(format!("Cannot find branch with error \"{}\"", e)),
        }
    }

    async fn branch_guard(&self) -> TriageResult<BranchGuard> {
        let target = &self.config.target_branch;
        for name in self.config.affected_branches.iter().chain(Some(target)) {
            if !self.bounded("branch lookup", self.blame.has_branch(name)).await? {
                return Err(TriageError::git("branch lookup", format!("no branch named {}", name)));
            }
        }

        let current = self
            .bounded("branch lookup", self.blame.current_branch())
            .await?;
        if &current != target {
            return Ok(BranchGuard::Skip(format!(
                "Current branch \"{}\" does not match target branch \"{}\"",
                current, target
            )));
        }
        if !self.config.affected_branches.contains(target) {
            return Ok(BranchGuard::Skip(format!(
                "Skipping check for branch \"{}\"",
                current
            )));
        }
        Ok(BranchGuard::Proceed)
    }

    /// Reconcile every failing case of an already-loaded report
    pub async fn reconcile(&self, report: &TestReport) -> RunSummary {
        if !report.has_errors() {
            return RunSummary::single(NO_ERRORS_MESSAGE);
        }

        let mut summary = RunSummary::default();
        for case in report.failing_cases() {
            if let Some(outcome) = self.reconcile_case(case).await {
                info!(test = %case.qualified_name(), outcome = %outcome, "reconciled");
                summary.push(&outcome);
            }
        }

        info!(
            messages = summary.messages.len(),
            failed = summary.failed,
            "reconciliation finished"
        );
        summary
    }

    /// Reconcile one test case. `None` when the case has no failure or its
    /// traceback never enters the test module.
    pub async fn reconcile_case(&self, case: &TestCase) -> Option<CaseOutcome> {
        let failure = case.first_failure()?;
        let test_path = parse_test_path(&case.classname);
        let Some(location) = matching_location(&failure.text, &test_path.module_path) else {
            debug!(test = %case.qualified_name(), module = %test_path.module_path, "no traceback line in test module");
            return None;
        };
        let test = case.qualified_name();
        info!(test = %test, file = %location.file_path, line = location.line, "failure");

        let attribution = match self.attribute(case, &test_path, &location).await {
            Ok(attribution) => attribution,
            Err(e) => {
                warn!(
                    test = %test,
                    error = %e,
                    recovery = e.recovery_suggestion().unwrap_or_default(),
                    "blame lookup failed"
                );
                return Some(CaseOutcome::Failed {
                    test,
                    error: e.to_string(),
                });
            }
        };

        let signature = IssueSignature::new(
            test_path.module_path.as_str(),
            test_path.class_name.as_str(),
            case.name.as_str(),
            self.config.target_branch.as_str(),
        );
        let description = self.description(&location, &attribution);

        let outcome = match self.file_issue(&test, &signature, &attribution, description).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    test = %test,
                    error = %e,
                    recovery = e.recovery_suggestion().unwrap_or_default(),
                    "tracker interaction failed"
                );
                CaseOutcome::Failed {
                    test,
                    error: e.to_string(),
                }
            }
        };
        Some(outcome)
    }

    /// Blame the `def` line and the failing line
    async fn attribute(
        &self,
        case: &TestCase,
        test_path: &TestPath,
        location: &FailureLocation,
    ) -> TriageResult<BlameAttribution> {
        let file = location.blame_path(self.blame.repo_root(), &test_path.module_path);
        let file = file.as_str();
        let mut attribution = BlameAttribution::new();

        let definition = format!("def {}(", case.name);
        let lines = self
            .bounded("git blame", self.blame.blame_matching(file, &definition))
            .await?;
        for line in lines {
            attribution.record(BlameRole::Function, line.author);
        }

        let lines = self
            .bounded(
                "git blame",
                self.blame.blame_lines(file, location.line, location.line),
            )
            .await?;
        for line in lines {
            attribution.record(BlameRole::Failure, line.author);
        }

        for (role, author) in attribution.iter() {
            debug!(%role, name = %author.name, email = %author.email, "blamed");
        }
        Ok(attribution)
    }

    fn description(&self, location: &FailureLocation, attribution: &BlameAttribution) -> String {
        let mut description = self.config.description.clone();
        description.push_str(&format!(
            "\n\nFailing line: {}:{}",
            location.file_path, location.line
        ));
        for (role, author) in attribution.iter() {
            description.push_str(&format!("\nBlame ({}): {} <{}>", role, author.name, author.email));
        }
        description
    }

    /// Escalate an open issue with the same summary, or create one
    async fn file_issue(
        &self,
        test: &str,
        signature: &IssueSignature,
        attribution: &BlameAttribution,
        description: String,
    ) -> TriageResult<CaseOutcome> {
        let existing = self
            .bounded(
                "issue search",
                self.tracker.search_issues(&signature.search_query(), 1),
            )
            .await?;

        if let Some(issue) = existing.into_iter().next() {
            let current = match issue.priority {
                Some(priority) => priority.id,
                None => self.least_urgent_priority().await?.id,
            };
            let priority_id = Priority::escalated(&current);
            self.bounded(
                "issue update",
                self.tracker.update_priority(&issue.key, &priority_id),
            )
            .await?;
            return Ok(CaseOutcome::Escalated {
                test: test.to_string(),
                key: issue.key,
                priority_id,
            });
        }

        let assignee = self.assignee(attribution).await;
        let priority = self.least_urgent_priority().await?;
        let new_issue = NewIssue {
            project_key: self.config.project_key.clone(),
            summary: signature.summary(),
            issue_type: self.config.issue_type.clone(),
            priority_id: priority.id,
            description,
            assignee: assignee.clone(),
        };
        let key = self
            .bounded("issue create", self.tracker.create_issue(&new_issue))
            .await?;
        Ok(CaseOutcome::Created {
            test: test.to_string(),
            key,
            assignee,
        })
    }

    /// Tracker user matching the test author's email, if any.
    ///
    /// A failed lookup leaves the issue unassigned rather than failing the case.
    async fn assignee(&self, attribution: &BlameAttribution) -> Option<String> {
        let author = attribution.get(BlameRole::Function)?;
        match self
            .bounded("user search", self.tracker.find_users(&author.email, 1))
            .await
        {
            Ok(users) => users.into_iter().next().map(|user| user.name),
            Err(e) => {
                warn!(email = %author.email, error = %e, "user lookup failed, leaving unassigned");
                None
            }
        }
    }

    async fn least_urgent_priority(&self) -> TriageResult<Priority> {
        let priorities = self
            .bounded("priority listing", self.tracker.priorities())
            .await?;
        least_urgent(&priorities)
            .cloned()
            .ok_or_else(|| TriageError::tracker("priority listing", "tracker has no priorities"))
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = TriageResult<T>>,
    ) -> TriageResult<T> {
        let timeout = self.config.operation_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| TriageError::timeout(operation, timeout))?
    }
}
