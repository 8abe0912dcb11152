//! Read-only tracker wrapper for `--dry-run`.
//!
//! Searches, priority and user lookups reach the real tracker; updates and
//! creations are only logged.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::info;
use triage::{IssueTracker, NewIssue, Priority, TrackerIssue, TrackerUser, TriageResult};

pub struct DryRunTracker<T> {
    inner: T,
    created: AtomicU32,
}

impl<T: IssueTracker> DryRunTracker<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            created: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl<T: IssueTracker> IssueTracker for DryRunTracker<T> {
    async fn search_issues(
        &self,
        query: &str,
        max_results: u32,
    ) -> TriageResult<Vec<TrackerIssue>> {
        self.inner.search_issues(query, max_results).await
    }

    async fn update_priority(&self, key: &str, priority_id: &str) -> TriageResult<()> {
        info!(key, priority_id, "dry run: would update priority");
        Ok(())
    }

    async fn create_issue(&self, issue: &NewIssue) -> TriageResult<String> {
        let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            summary = %issue.summary,
            priority_id = %issue.priority_id,
            assignee = ?issue.assignee,
            "dry run: would create issue"
        );
        Ok(format!("DRY-RUN-{}", n))
    }

    async fn priorities(&self) -> TriageResult<Vec<Priority>> {
        self.inner.priorities().await
    }

    async fn find_users(&self, email: &str, max_results: u32) -> TriageResult<Vec<TrackerUser>> {
        self.inner.find_users(email, max_results).await
    }
}
