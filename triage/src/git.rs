//! Git blame manager
//!
//! Shells out to `git` for branch lookups and line blame.

use crate::blame::{parse_line_porcelain, BlameLine, BlameSource};
use crate::error::{TriageError, TriageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Default deadline for a single git invocation
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Git repository handle
pub struct GitManager {
    working_dir: PathBuf,
    max_retries: u32,
    timeout: Duration,
}

impl GitManager {
    /// Create manager for working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create manager with custom retry settings
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Bound every git invocation by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run git command and return stdout
    async fn run_git(&self, args: &[&str]) -> TriageResult<String> {
        debug!(args = ?args, "running git");
        let child = Command::new("git")
            .args(args)
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| TriageError::timeout(format!("git {}", args.join(" ")), self.timeout))?
            .map_err(|e| TriageError::git("execute", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TriageError::git(args.join(" "), stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run git command with automatic retry for transient failures
    ///
    /// Uses exponential backoff: 100ms, 200ms, 400ms, etc.
    async fn run_git_with_retry(&self, args: &[&str]) -> TriageResult<String> {
        let mut attempt = 0;
        loop {
            match self.run_git(args).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = RETRY_BASE_DELAY_MS * (1 << attempt);
                    debug!(attempt, delay_ms = delay, error = %e, "retrying git");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get current commit hash (full)
    pub async fn current_commit(&self) -> TriageResult<String> {
        Ok(self.run_git(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    async fn blame(&self, file: &str, range: &str) -> TriageResult<Vec<BlameLine>> {
        let output = self
            .run_git_with_retry(&["blame", "--line-porcelain", "-L", range, "HEAD", "--", file])
            .await?;
        Ok(parse_line_porcelain(&output))
    }
}

#[async_trait]
impl BlameSource for GitManager {
    async fn current_branch(&self) -> TriageResult<String> {
        Ok(self
            .run_git(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .trim()
            .to_string())
    }

    async fn has_branch(&self, name: &str) -> TriageResult<bool> {
        let reference = format!("refs/heads/{}", name);
        match self
            .run_git(&["rev-parse", "--verify", "--quiet", &reference])
            .await
        {
            Ok(_) => Ok(true),
            // --quiet exits 1 with empty stderr for a missing ref
            Err(TriageError::GitError { message, .. }) if message.is_empty() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn blame_lines(&self, file: &str, start: u32, end: u32) -> TriageResult<Vec<BlameLine>> {
        let lines = self.blame(file, &format!("{},{}", start, end)).await?;
        if lines.is_empty() {
            return Err(TriageError::blame_not_found(file, format!("lines {}-{}", start, end)));
        }
        Ok(lines)
    }

    async fn blame_matching(&self, file: &str, pattern: &str) -> TriageResult<Vec<BlameLine>> {
        // `/` delimits the regex in -L, so it must be escaped inside it
        let escaped = pattern.replace('/', "\\/");
        let lines = self.blame(file, &format!("/{}/,+1", escaped)).await?;
        if lines.is_empty() {
            return Err(TriageError::blame_not_found(file, pattern));
        }
        Ok(lines)
    }

    fn repo_root(&self) -> Option<&Path> {
        Some(&self.working_dir)
    }
}
