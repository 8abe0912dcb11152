//! End-to-end: real git repository, in-memory tracker.
//!
//! Alice writes `test_bar`, Bob later breaks line 42. The report points at
//! line 42; the issue must be filed against the test and assigned to Alice.

mod common;

use common::MemoryTracker;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tempfile::tempdir;
use triage::{GitManager, ReconcileConfig, Reconciler};

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn commit_as(dir: &Path, name: &str, email: &str, message: &str) {
    let user = format!("user.name={}", name);
    let mail = format!("user.email={}", email);
    git(dir, &["add", "."]);
    git(dir, &["-c", &user, "-c", &mail, "commit", "-m", message]);
}

fn test_file(line_42: &str) -> String {
    let mut lines = vec![
        "import unittest".to_string(),
        String::new(),
        String::new(),
        "class TestFoo(unittest.TestCase):".to_string(),
        "    def test_bar(self):".to_string(),
    ];
    for n in 6..42 {
        lines.push(format!("        value_{} = {}", n, n));
    }
    lines.push(line_42.to_string());
    lines.push(String::new());
    lines.join("\n")
}

const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="nosetests" tests="1" errors="1" failures="0" skip="0">
  <testcase classname="tests.test_foo.TestFoo" name="test_bar" time="0.002">
    <error type="exceptions.AssertionError" message="1 != 2"><![CDATA[Traceback (most recent call last):
  File "tests/test_foo.py", line 42, in test_bar
    self.assertEqual(1, 2)
AssertionError: 1 != 2
]]></error>
  </testcase>
</testsuite>"#;

fn setup_repo() -> tempfile::TempDir {
    let dir = tempdir().expect("Failed to create temp dir");
    git(dir.path(), &["init", "-b", "main"]);
    fs::create_dir_all(dir.path().join("tests")).unwrap();

    fs::write(
        dir.path().join("tests/test_foo.py"),
        test_file("        self.assertEqual(1, 1)"),
    )
    .unwrap();
    commit_as(dir.path(), "Alice", "alice@example.com", "Add test_bar");

    fs::write(
        dir.path().join("tests/test_foo.py"),
        test_file("        self.assertEqual(1, 2)"),
    )
    .unwrap();
    commit_as(dir.path(), "Bob", "bob@example.com", "Tweak assertion");

    fs::write(dir.path().join("nosetests.xml"), REPORT).unwrap();
    dir
}

fn config() -> ReconcileConfig {
    ReconcileConfig::new("main", vec!["main".to_string()], "QA", "Bug")
        .with_timeout(Duration::from_secs(30))
}

#[tokio::test]
async fn test_failure_is_filed_and_assigned_to_test_author() {
    let dir = setup_repo();
    let git = GitManager::new(dir.path());
    let tracker = MemoryTracker::new().with_user("alice", "alice@example.com");
    let reconciler = Reconciler::new(&git, &tracker, config());

    let summary = reconciler.run(&dir.path().join("nosetests.xml")).await;

    assert_eq!(summary.failed, 0, "messages: {:?}", summary.messages);
    assert_eq!(
        summary.render(),
        "Created issue QA-101 for tests.test_foo.TestFoo.test_bar (assigned to alice)"
    );

    let created = tracker.created();
    assert_eq!(created.len(), 1);
    assert_eq!(
        created[0].summary,
        "Fail: tests/test_foo:TestFoo.test_bar, branch: main"
    );
    assert_eq!(created[0].assignee.as_deref(), Some("alice"));
    assert!(created[0]
        .description
        .contains("Blame (failure): Bob <bob@example.com>"));
    assert!(created[0]
        .description
        .contains("Blame (function): Alice <alice@example.com>"));
}

#[tokio::test]
async fn test_unknown_author_still_creates_issue() {
    let dir = setup_repo();
    let git = GitManager::new(dir.path());
    let tracker = MemoryTracker::new();
    let reconciler = Reconciler::new(&git, &tracker, config());

    let summary = reconciler.run(&dir.path().join("nosetests.xml")).await;

    assert_eq!(
        summary.messages,
        vec!["Created issue QA-101 for tests.test_foo.TestFoo.test_bar"]
    );
    assert!(tracker.created()[0].assignee.is_none());
}

#[tokio::test]
async fn test_other_branch_is_skipped() {
    let dir = setup_repo();
    git(dir.path(), &["checkout", "-b", "feature"]);
    let git = GitManager::new(dir.path());
    let tracker = MemoryTracker::new();
    let reconciler = Reconciler::new(&git, &tracker, config());

    let summary = reconciler.run(&dir.path().join("nosetests.xml")).await;

    assert_eq!(
        summary.messages,
        vec!["Current branch \"feature\" does not match target branch \"main\""]
    );
    assert!(tracker.searches().is_empty());
}

#[tokio::test]
async fn test_absolute_traceback_under_source_root_is_blamed() {
    let dir = tempdir().expect("Failed to create temp dir");
    git(dir.path(), &["init", "-b", "main"]);
    fs::create_dir_all(dir.path().join("src/app")).unwrap();
    fs::write(
        dir.path().join("src/app/tests.py"),
        "import unittest\n\nclass TestX(unittest.TestCase):\n    def test_y(self):\n        self.fail()\n",
    )
    .unwrap();
    commit_as(dir.path(), "Alice", "alice@example.com", "Add app tests");

    let traceback_path = dir.path().join("src/app/tests.py");
    let report = format!(
        r#"<testsuite tests="1" errors="1" failures="0">
  <testcase classname="app.tests.TestX" name="test_y">
    <error type="AssertionError" message="fail"><![CDATA[Traceback (most recent call last):
  File "{}", line 5, in test_y
    self.fail()
AssertionError: None
]]></error>
  </testcase>
</testsuite>"#,
        traceback_path.display()
    );
    fs::write(dir.path().join("nosetests.xml"), report).unwrap();

    let git = GitManager::new(dir.path());
    let tracker = MemoryTracker::new().with_user("alice", "alice@example.com");
    let reconciler = Reconciler::new(&git, &tracker, config());

    let summary = reconciler.run(&dir.path().join("nosetests.xml")).await;

    assert_eq!(summary.failed, 0, "messages: {:?}", summary.messages);
    assert_eq!(
        summary.render(),
        "Created issue QA-101 for app.tests.TestX.test_y (assigned to alice)"
    );
    let created = tracker.created();
    assert_eq!(created[0].summary, "Fail: app/tests:TestX.test_y, branch: main");
    assert!(created[0]
        .description
        .contains("Blame (failure): Alice <alice@example.com>"));
}
