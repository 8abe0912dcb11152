//! Shared test doubles for reconciler tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use triage::{
    Author, BlameLine, BlameSource, IssueTracker, NewIssue, Priority, TrackerIssue, TrackerUser,
    TriageError, TriageResult,
};

pub fn author(name: &str, email: &str) -> Author {
    Author {
        name: name.to_string(),
        email: email.to_string(),
        time: None,
    }
}

/// Blame source answering from fixed tables.
pub struct ScriptedBlame {
    pub branches: Vec<String>,
    pub current: String,
    /// (file, pattern) -> author
    pub definitions: HashMap<(String, String), Author>,
    /// (file, line) -> author
    pub lines: HashMap<(String, u32), Author>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedBlame {
    pub fn on_branch(current: &str, branches: &[&str]) -> Self {
        Self {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            current: current.to_string(),
            definitions: HashMap::new(),
            lines: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_definition(mut self, file: &str, test: &str, author: Author) -> Self {
        self.definitions
            .insert((file.to_string(), format!("def {}(", test)), author);
        self
    }

    pub fn with_line(mut self, file: &str, line: u32, author: Author) -> Self {
        self.lines.insert((file.to_string(), line), author);
        self
    }

    pub fn blame_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlameSource for ScriptedBlame {
    async fn current_branch(&self) -> TriageResult<String> {
        Ok(self.current.clone())
    }

    async fn has_branch(&self, name: &str) -> TriageResult<bool> {
        Ok(self.branches.iter().any(|b| b == name))
    }

    async fn blame_lines(&self, file: &str, start: u32, end: u32) -> TriageResult<Vec<BlameLine>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("lines {}:{}-{}", file, start, end));
        let author = self
            .lines
            .get(&(file.to_string(), start))
            .cloned()
            .ok_or_else(|| TriageError::git("blame", format!("no such path '{}' in HEAD", file)))?;
        Ok(vec![BlameLine {
            commit: "b".repeat(40),
            author,
            line_number: start,
            content: String::new(),
        }])
    }

    async fn blame_matching(&self, file: &str, pattern: &str) -> TriageResult<Vec<BlameLine>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("match {}:{}", file, pattern));
        let author = self
            .definitions
            .get(&(file.to_string(), pattern.to_string()))
            .cloned()
            .ok_or_else(|| TriageError::blame_not_found(file, pattern))?;
        Ok(vec![BlameLine {
            commit: "a".repeat(40),
            author,
            line_number: 1,
            content: pattern.to_string(),
        }])
    }
}

/// In-memory tracker recording every write.
pub struct MemoryTracker {
    pub issues: Mutex<Vec<TrackerIssue>>,
    pub users: Vec<TrackerUser>,
    pub priorities: Vec<Priority>,
    pub created: Mutex<Vec<NewIssue>>,
    pub updates: Mutex<Vec<(String, String)>>,
    pub searches: Mutex<Vec<String>>,
    /// Make every search fail with this message
    pub fail_search: Option<String>,
    /// Searches whose query contains the text sleep for the duration
    pub slow_search: Option<(String, Duration)>,
    /// Make every user lookup fail with this message
    pub fail_user_search: Option<String>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self {
            issues: Mutex::new(Vec::new()),
            users: Vec::new(),
            priorities: ["Highest", "High", "Medium", "Low", "Lowest"]
                .iter()
                .enumerate()
                .map(|(i, name)| Priority {
                    id: (i + 1).to_string(),
                    name: name.to_string(),
                })
                .collect(),
            created: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
            fail_search: None,
            slow_search: None,
            fail_user_search: None,
        }
    }

    pub fn with_issue(self, key: &str, summary: &str, priority_id: &str, resolved: bool) -> Self {
        self.issues.lock().unwrap().push(TrackerIssue {
            key: key.to_string(),
            summary: summary.to_string(),
            priority: Some(Priority {
                id: priority_id.to_string(),
                name: format!("P{}", priority_id),
            }),
            resolved,
        });
        self
    }

    pub fn with_user(mut self, name: &str, email: &str) -> Self {
        self.users.push(TrackerUser {
            name: name.to_string(),
            email: Some(email.to_string()),
            display_name: None,
        });
        self
    }

    pub fn failing_search(mut self, message: &str) -> Self {
        self.fail_search = Some(message.to_string());
        self
    }

    pub fn slow_search_for(mut self, text: &str, delay: Duration) -> Self {
        self.slow_search = Some((text.to_string(), delay));
        self
    }

    pub fn failing_user_search(mut self, message: &str) -> Self {
        self.fail_user_search = Some(message.to_string());
        self
    }

    pub fn created(&self) -> Vec<NewIssue> {
        self.created.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for MemoryTracker {
    async fn search_issues(
        &self,
        query: &str,
        max_results: u32,
    ) -> TriageResult<Vec<TrackerIssue>> {
        self.searches.lock().unwrap().push(query.to_string());
        if let Some((text, delay)) = &self.slow_search {
            if query.contains(text.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if let Some(message) = &self.fail_search {
            return Err(TriageError::tracker("search", message.clone()));
        }
        Ok(self
            .issues
            .lock()
            .unwrap()
            .iter()
            .filter(|issue| !issue.resolved && query.contains(&issue.summary))
            .take(max_results as usize)
            .cloned()
            .collect())
    }

    async fn update_priority(&self, key: &str, priority_id: &str) -> TriageResult<()> {
        self.updates
            .lock()
            .unwrap()
            .push((key.to_string(), priority_id.to_string()));
        let mut issues = self.issues.lock().unwrap();
        let issue = issues
            .iter_mut()
            .find(|issue| issue.key == key)
            .ok_or_else(|| TriageError::tracker("update", format!("HTTP 404: {}", key)))?;
        issue.priority = Some(Priority {
            id: priority_id.to_string(),
            name: format!("P{}", priority_id),
        });
        Ok(())
    }

    async fn create_issue(&self, issue: &NewIssue) -> TriageResult<String> {
        let mut created = self.created.lock().unwrap();
        created.push(issue.clone());
        let key = format!("{}-{}", issue.project_key, 100 + created.len());
        self.issues.lock().unwrap().push(TrackerIssue {
            key: key.clone(),
            summary: issue.summary.clone(),
            priority: Some(Priority {
                id: issue.priority_id.clone(),
                name: format!("P{}", issue.priority_id),
            }),
            resolved: false,
        });
        Ok(key)
    }

    async fn priorities(&self) -> TriageResult<Vec<Priority>> {
        Ok(self.priorities.clone())
    }

    async fn find_users(&self, email: &str, max_results: u32) -> TriageResult<Vec<TrackerUser>> {
        if let Some(message) = &self.fail_user_search {
            return Err(TriageError::tracker("user search", message.clone()));
        }
        Ok(self
            .users
            .iter()
            .filter(|user| user.email.as_deref() == Some(email))
            .take(max_results as usize)
            .cloned()
            .collect())
    }
}
