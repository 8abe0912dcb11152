//! Failing-test triage
//!
//! This library provides:
//! - An xunit (`nosetests.xml`) report parser
//! - Git blame attribution of failing tests to their authors
//! - A tracker-agnostic reconciler that escalates or files issues keyed by a
//!   deterministic summary signature
//!
//! Collaborators sit behind two traits, [`BlameSource`] and [`IssueTracker`];
//! [`GitManager`] implements the former, the `failure-reporter` crate provides
//! a JIRA implementation of the latter.

#![allow(clippy::uninlined_format_args)]

pub mod attribution;
pub mod blame;
pub mod error;
pub mod git;
pub mod reconcile;
pub mod report;
pub mod test_path;
pub mod tracker;

pub use attribution::{BlameAttribution, BlameRole};
pub use blame::{Author, BlameLine, BlameSource};
pub use error::{TriageError, TriageResult};
pub use git::GitManager;
pub use reconcile::{
    BranchGuard, CaseOutcome, ReconcileConfig, Reconciler, RunSummary, ERROR_MARKER,
    NO_ERRORS_MESSAGE,
};
pub use report::{Failure, FailureKind, TestCase, TestReport, DEFAULT_REPORT_FILE};
pub use test_path::{extract_locations, matching_location, parse_test_path, FailureLocation, TestPath};
pub use tracker::{IssueSignature, IssueTracker, NewIssue, Priority, TrackerIssue, TrackerUser};
