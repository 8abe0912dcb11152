//! Blame attribution per test case

use crate::blame::Author;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a blamed author is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlameRole {
    /// Last touched the test's `def` line
    Function,
    /// Last touched the line the traceback points at
    Failure,
}

impl std::fmt::Display for BlameRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Authors responsible for one failing test case, at most one per role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameAttribution {
    authors: BTreeMap<BlameRole, Author>,
}

impl BlameAttribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `author` for `role` unless the role is already filled.
    ///
    /// Returns whether the author was recorded.
    pub fn record(&mut self, role: BlameRole, author: Author) -> bool {
        if self.authors.contains_key(&role) {
            return false;
        }
        self.authors.insert(role, author);
        true
    }

    pub fn get(&self, role: BlameRole) -> Option<&Author> {
        self.authors.get(&role)
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlameRole, &Author)> {
        self.authors.iter().map(|(role, author)| (*role, author))
    }
}
