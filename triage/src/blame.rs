//! Version-control blame abstraction
//!
//! [`BlameSource`] is the seam between the reconciler and git. The
//! production implementation is [`crate::git::GitManager`]; tests swap in
//! scripted sources.

use crate::error::TriageResult;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Commit author identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// One blamed line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameLine {
    /// Full commit hash
    pub commit: String,
    pub author: Author,
    /// 1-based line number in the file at HEAD
    pub line_number: u32,
    pub content: String,
}

/// Read-only view of a repository used for attribution
#[async_trait]
pub trait BlameSource: Send + Sync {
    /// Name of the checked-out branch
    async fn current_branch(&self) -> TriageResult<String>;

    /// Whether a local branch with this name exists
    async fn has_branch(&self, name: &str) -> TriageResult<bool>;

    /// Blame lines `start..=end` of `file` at HEAD
    async fn blame_lines(&self, file: &str, start: u32, end: u32) -> TriageResult<Vec<BlameLine>>;

    /// Blame the first line of `file` matching `pattern` (basic regex) at HEAD
    async fn blame_matching(&self, file: &str, pattern: &str) -> TriageResult<Vec<BlameLine>>;

    /// Working tree root, used to make absolute traceback paths repo-relative
    fn repo_root(&self) -> Option<&Path> {
        None
    }
}

/// Parse `git blame --line-porcelain` output.
///
/// Every blamed line carries a full header block, so entries are independent.
pub fn parse_line_porcelain(output: &str) -> Vec<BlameLine> {
    let mut lines = Vec::new();
    let mut current: Option<PorcelainEntry> = None;

    for raw in output.lines() {
        if let Some(content) = raw.strip_prefix('\t') {
            if let Some(entry) = current.take() {
                lines.push(entry.finish(content));
            }
            continue;
        }

        match current.as_mut() {
            None => current = PorcelainEntry::from_header(raw),
            Some(entry) => entry.apply(raw),
        }
    }

    lines
}

#[derive(Default)]
struct PorcelainEntry {
    commit: String,
    line_number: u32,
    name: String,
    email: String,
    time: Option<DateTime<Utc>>,
}

impl PorcelainEntry {
    /// `<sha> <orig-line> <final-line> [<group-size>]`
    fn from_header(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let commit = parts.next()?;
        if commit.len() < 7 || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let _orig = parts.next()?;
        let line_number = parts.next()?.parse().ok()?;
        Some(Self {
            commit: commit.to_string(),
            line_number,
            ..Self::default()
        })
    }

    fn apply(&mut self, line: &str) {
        let (key, value) = line.split_once(' ').unwrap_or((line, ""));
        match key {
            "author" => self.name = value.to_string(),
            "author-mail" => {
                self.email = value
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            }
            "author-time" => {
                self.time = value
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            }
            _ => {}
        }
    }

    fn finish(self, content: &str) -> BlameLine {
        BlameLine {
            commit: self.commit,
            author: Author {
                name: self.name,
                email: self.email,
                time: self.time,
            },
            line_number: self.line_number,
            content: content.to_string(),
        }
    }
}
