//! Test identity heuristics
//!
//! Maps a dotted xunit `classname` to a source path and pulls
//! `File "<path>", line <n>,` locations out of tracebacks.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Module path and class name derived from a dotted classname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPath {
    /// Slash-separated module path, e.g. `tests/test_foo`. Empty when the
    /// classname has no dots.
    pub module_path: String,
    pub class_name: String,
}

/// Split a classname on its last `.`: the right segment is the class, the
/// rest is a dotted module path turned into a slash path.
///
/// `tests.test_foo.TestFoo` -> (`tests/test_foo`, `TestFoo`).
///
/// Assumes the rightmost segment is always a class. Module-level test
/// functions (no class) come out with the module's last segment as class.
pub fn parse_test_path(classname: &str) -> TestPath {
    match classname.rsplit_once('.') {
        Some((module, class_name)) => TestPath {
            module_path: module.replace('.', "/"),
            class_name: class_name.to_string(),
        },
        None => TestPath {
            module_path: String::new(),
            class_name: classname.to_string(),
        },
    }
}

/// A `(file, line)` pair found in a traceback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureLocation {
    pub file_path: String,
    pub line: u32,
}

impl FailureLocation {
    /// Path to hand to `git blame`.
    ///
    /// Relative traceback paths are kept as they are. Absolute paths under
    /// `repo_root` lose that prefix. Any other absolute path falls back to
    /// [`repo_relative`](Self::repo_relative).
    pub fn blame_path(&self, repo_root: Option<&Path>, module_path: &str) -> String {
        let path = Path::new(&self.file_path);
        if !path.is_absolute() {
            return self.file_path.clone();
        }
        if let Some(root) = repo_root {
            let canonical = std::fs::canonicalize(root).ok();
            let relative = path
                .strip_prefix(root)
                .ok()
                .or_else(|| canonical.as_deref().and_then(|c| path.strip_prefix(c).ok()));
            if let Some(relative) = relative {
                return relative.to_string_lossy().replace('\\', "/");
            }
        }
        self.repo_relative(module_path).to_string()
    }

    /// Anything before the module path is dropped, so
    /// `/ci/checkout/tests/test_foo.py` becomes `tests/test_foo.py`.
    pub fn repo_relative(&self, module_path: &str) -> &str {
        if module_path.is_empty() {
            return &self.file_path;
        }
        match self.file_path.find(module_path) {
            Some(idx) => &self.file_path[idx..],
            None => &self.file_path,
        }
    }
}

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"File\s"([^"]+)",\sline\s(\d+),"#).expect("LOCATION_RE regex should compile")
});

/// All traceback locations in order of appearance
pub fn extract_locations(text: &str) -> Vec<FailureLocation> {
    LOCATION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let line = caps[2].parse().ok()?;
            Some(FailureLocation {
                file_path: caps[1].to_string(),
                line,
            })
        })
        .collect()
}

/// First traceback location inside the test's own module.
///
/// Substring match on the path, not path equality.
pub fn matching_location(text: &str, module_path: &str) -> Option<FailureLocation> {
    extract_locations(text)
        .into_iter()
        .find(|loc| loc.file_path.contains(module_path))
}
