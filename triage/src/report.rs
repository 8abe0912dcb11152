//! Test report model and xunit XML parser
//!
//! Reads the `nosetests.xml` style report: a `<testsuite>` root carrying
//! `tests`/`errors`/`failures`/`skip` counters and `<testcase>` children. A
//! `<testsuites>` wrapper with several suites is flattened in document order.

use crate::error::{TriageError, TriageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional report file name written by `nosetests --with-xunit`
pub const DEFAULT_REPORT_FILE: &str = "nosetests.xml";

/// Kind of a failure child element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// `<failure>`: an assertion did not hold
    Failure,
    /// `<error>`: the test raised
    Error,
}

impl FailureKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "failure" => Some(Self::Failure),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One failure recorded for a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// Exception type, e.g. `AssertionError`
    pub error_type: Option<String>,
    pub message: Option<String>,
    /// Diagnostic text (usually the traceback)
    pub text: String,
}

/// A single `<testcase>` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Dotted module path plus class, e.g. `tests.test_foo.TestFoo`
    pub classname: String,
    /// Test method name
    pub name: String,
    pub time: Option<f64>,
    pub failures: Vec<Failure>,
}

impl TestCase {
    /// Whether the case has at least one failure element
    pub fn is_failing(&self) -> bool {
        !self.failures.is_empty()
    }

    /// The failure that gets reconciled; later ones are ignored
    pub fn first_failure(&self) -> Option<&Failure> {
        self.failures.first()
    }

    /// `classname.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.classname, self.name)
    }
}

/// Parsed test report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub tests: u32,
    pub errors: u32,
    pub failures: u32,
    pub skipped: u32,
    pub test_cases: Vec<TestCase>,
}

impl TestReport {
    /// Load and parse a report from disk.
    ///
    /// A missing file and an unparsable file are reported as different errors.
    pub fn load(path: impl AsRef<Path>) -> TriageResult<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TriageError::report_not_found(path));
            }
            Err(e) => return Err(TriageError::Io(e)),
        };

        Self::parse(&content).map_err(|e| match e {
            TriageError::InvalidReport { message, .. } => {
                TriageError::invalid_report(path, message)
            }
            other => other,
        })
    }

    /// Parse report XML from a string
    pub fn parse(xml: &str) -> TriageResult<Self> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| TriageError::invalid_report("<input>", e.to_string()))?;
        let root = doc.root_element();

        match root.tag_name().name() {
            "testsuite" => {
                let mut report = Self::counters_from(&root);
                report.test_cases = collect_cases(&root);
                Ok(report)
            }
            "testsuites" => {
                let mut report = Self::counters_from(&root);
                let suites: Vec<_> = root
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "testsuite")
                    .collect();

                // Wrapper counters are optional; fall back to summing the suites.
                if root.attribute("errors").is_none() {
                    report.errors = suites.iter().map(|s| counter(s, &["errors"])).sum();
                }
                if root.attribute("failures").is_none() {
                    report.failures = suites.iter().map(|s| counter(s, &["failures"])).sum();
                }
                if root.attribute("tests").is_none() {
                    report.tests = suites.iter().map(|s| counter(s, &["tests"])).sum();
                }
                if root.attribute("skipped").is_none() && root.attribute("skip").is_none() {
                    report.skipped = suites
                        .iter()
                        .map(|s| counter(s, &["skipped", "skip"]))
                        .sum();
                }

                report.test_cases = suites.iter().flat_map(collect_cases).collect();
                Ok(report)
            }
            other => Err(TriageError::invalid_report(
                "<input>",
                format!("unexpected root element <{}>", other),
            )),
        }
    }

    fn counters_from(node: &roxmltree::Node<'_, '_>) -> Self {
        Self {
            tests: counter(node, &["tests"]),
            errors: counter(node, &["errors"]),
            failures: counter(node, &["failures"]),
            skipped: counter(node, &["skipped", "skip"]),
            test_cases: Vec::new(),
        }
    }

    /// Whether the root reports any errors. Zero or missing means the run is clean.
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Test cases with at least one failure, in document order
    pub fn failing_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|case| case.is_failing())
    }
}

/// Read the first present counter attribute; unparsable values count as zero.
fn counter(node: &roxmltree::Node<'_, '_>, names: &[&str]) -> u32 {
    names
        .iter()
        .find_map(|name| node.attribute(*name))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn collect_cases(suite: &roxmltree::Node<'_, '_>) -> Vec<TestCase> {
    suite
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "testcase")
        .map(|node| TestCase {
            classname: node.attribute("classname").unwrap_or_default().to_string(),
            name: node.attribute("name").unwrap_or_default().to_string(),
            time: node.attribute("time").and_then(|t| t.parse().ok()),
            failures: node
                .children()
                .filter(|n| n.is_element())
                .filter_map(|child| {
                    let kind = FailureKind::from_tag(child.tag_name().name())?;
                    Some(Failure {
                        kind,
                        error_type: child.attribute("type").map(str::to_string),
                        message: child.attribute("message").map(str::to_string),
                        text: element_text(&child),
                    })
                })
                .collect(),
        })
        .collect()
}

/// Concatenated text and CDATA content of an element
fn element_text(node: &roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}
