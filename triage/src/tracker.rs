//! Ticket tracker abstraction
//!
//! Issue identity is the summary signature: the same string is used to
//! search for an existing issue and to create a new one.

use crate::error::TriageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Id of the most urgent priority
pub const MOST_URGENT_PRIORITY: &str = "1";

/// Identity of a failing test on a branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueSignature {
    pub path: String,
    pub classname: String,
    pub testname: String,
    pub branch: String,
}

impl IssueSignature {
    pub fn new(
        path: impl Into<String>,
        classname: impl Into<String>,
        testname: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            classname: classname.into(),
            testname: testname.into(),
            branch: branch.into(),
        }
    }

    /// `Fail: {path}:{classname}.{testname}, branch: {branch}`
    pub fn summary(&self) -> String {
        format!(
            "Fail: {}:{}.{}, branch: {}",
            self.path, self.classname, self.testname, self.branch
        )
    }

    /// JQL for unresolved issues whose summary matches this signature
    pub fn search_query(&self) -> String {
        format!(
            "summary ~ \"{}\" AND resolution = Unresolved",
            escape_jql(&self.summary())
        )
    }
}

/// Escape a value for use inside a double-quoted JQL string
fn escape_jql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Tracker priority; lower numeric id means more urgent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    pub id: String,
    pub name: String,
}

impl Priority {
    /// One step more urgent than `current_id`, never past the most urgent.
    ///
    /// Non-numeric ids are returned unchanged.
    pub fn escalated(current_id: &str) -> String {
        match current_id.trim().parse::<u32>() {
            Ok(id) if id > 1 => (id - 1).to_string(),
            Ok(_) => MOST_URGENT_PRIORITY.to_string(),
            Err(_) => current_id.to_string(),
        }
    }
}

/// Least urgent priority: highest numeric id, or the last one listed when
/// ids are not numeric.
pub fn least_urgent(priorities: &[Priority]) -> Option<&Priority> {
    priorities
        .iter()
        .filter_map(|p| p.id.parse::<u32>().ok().map(|id| (id, p)))
        .max_by_key(|(id, _)| *id)
        .map(|(_, p)| p)
        .or_else(|| priorities.last())
}

/// Issue as seen by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerIssue {
    pub key: String,
    pub summary: String,
    pub priority: Option<Priority>,
    pub resolved: bool,
}

/// Tracker user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerUser {
    /// Login / account name used for assignment
    pub name: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Field set for issue creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub project_key: String,
    pub summary: String,
    pub issue_type: String,
    pub priority_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

/// Issue tracker operations needed by the reconciler
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Search issues with a tracker query, at most `max_results`
    async fn search_issues(&self, query: &str, max_results: u32)
        -> TriageResult<Vec<TrackerIssue>>;

    /// Set the priority of an existing issue
    async fn update_priority(&self, key: &str, priority_id: &str) -> TriageResult<()>;

    /// Create an issue and return its key
    async fn create_issue(&self, issue: &NewIssue) -> TriageResult<String>;

    /// All priorities known to the tracker
    async fn priorities(&self) -> TriageResult<Vec<Priority>>;

    /// Users whose identity matches `email`, at most `max_results`
    async fn find_users(&self, email: &str, max_results: u32) -> TriageResult<Vec<TrackerUser>>;
}
