//! Glob matching compiled to a regex over forward-slash relative paths.

use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{has_shell_metacharacters, SearchError};

/// Extra directory levels walked beyond the pattern's own segment count, so
/// `src/*.rs` still sees files under a symlinked or re-rooted layout without
/// walking the whole tree.
const DEPTH_SLACK: usize = 2;

/// Finds files under `cwd` matching a glob pattern.
///
/// Supports `**` (any depth), `*` (any run of non-separator characters) and
/// `?` (one non-separator character). Returns forward-slash relative paths,
/// sorted. Hidden entries are skipped unless a pattern segment explicitly
/// starts with a dot. Fail-soft: invalid patterns and walk errors are logged
/// and yield an empty list.
#[must_use]
pub fn glob(pattern: &str, cwd: &Path) -> Vec<String> {
    match run_glob(pattern, cwd) {
        Ok(paths) => paths,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "glob search failed");
            Vec::new()
        }
    }
}

fn run_glob(pattern: &str, cwd: &Path) -> Result<Vec<String>, SearchError> {
    let pattern = validate_pattern(pattern)?;
    let regex = compile(pattern)?;
    let max_depth = pattern.split('/').count() + DEPTH_SLACK;
    let match_hidden = wants_hidden(pattern);

    let mut results = Vec::new();
    let walker = WalkDir::new(cwd)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            match_hidden || entry.depth() == 0 || !is_hidden(entry.file_name())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Unreadable directories are skipped, not fatal.
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry during glob walk");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(cwd) else {
            continue;
        };
        let normalized = to_forward_slashes(relative);
        if regex.is_match(&normalized) {
            results.push(normalized);
        }
    }

    results.sort();
    Ok(results)
}

fn validate_pattern(pattern: &str) -> Result<&str, SearchError> {
    let reject = |reason: &str| SearchError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.is_empty() {
        return Err(reject("empty pattern"));
    }
    if pattern.contains("..") {
        return Err(reject("path traversal"));
    }
    if has_shell_metacharacters(pattern) {
        return Err(reject("shell metacharacters"));
    }
    if Path::new(pattern).is_absolute() && !pattern.contains(['*', '?']) {
        return Err(reject("absolute non-wildcard pattern"));
    }
    Ok(pattern)
}

/// Compiles a glob pattern into an anchored regex over forward-slash
/// relative paths.
pub(crate) fn compile(pattern: &str) -> Result<Regex, SearchError> {
    let pattern = pattern.trim_start_matches('/');
    let mut regex = String::with_capacity(pattern.len() * 2);
    regex.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // "**/" matches zero or more whole segments.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        regex.push_str("(?:[^/]+/)*");
                    } else {
                        regex.push_str(".*");
                    }
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }
    regex.push('$');

    Regex::new(&regex).map_err(|source| SearchError::Compile {
        pattern: pattern.to_string(),
        source,
    })
}

/// Hidden entries are only matched when a pattern segment targets them
/// explicitly, e.g. `.github/**`.
fn wants_hidden(pattern: &str) -> bool {
    pattern.split('/').any(|segment| segment.starts_with('.'))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/util")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("main.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/util/io.rs"), "").unwrap();
        std::fs::write(dir.path().join(".git/config"), "").unwrap();
        std::fs::write(dir.path().join(".hidden.rs"), "").unwrap();
        dir
    }

    #[test]
    fn test_star_matches_single_segment() {
        let dir = tree();
        assert_eq!(glob("*.rs", dir.path()), vec!["main.rs"]);
    }

    #[test]
    fn test_double_star_matches_any_depth() {
        let dir = tree();
        assert_eq!(
            glob("**/*.rs", dir.path()),
            vec!["main.rs", "src/lib.rs", "src/util/io.rs"]
        );
    }

    #[test]
    fn test_question_mark_matches_one_character() {
        let dir = tree();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("ab.rs"), "").unwrap();
        assert_eq!(glob("?.rs", dir.path()), vec!["a.rs"]);
    }

    #[test]
    fn test_hidden_entries_skipped_by_default() {
        let dir = tree();
        let results = glob("**/*", dir.path());
        assert!(results.iter().all(|p| !p.starts_with('.')));
    }

    #[test]
    fn test_hidden_entries_matched_when_requested() {
        let dir = tree();
        assert_eq!(glob(".git/*", dir.path()), vec![".git/config"]);
    }

    #[test]
    fn test_invalid_patterns_yield_empty() {
        let dir = tree();
        assert!(glob("../*.rs", dir.path()).is_empty());
        assert!(glob("*.rs; rm -rf", dir.path()).is_empty());
        assert!(glob("/etc/passwd", dir.path()).is_empty());
        assert!(glob("", dir.path()).is_empty());
    }

    #[test]
    fn test_results_are_idempotent_under_reapplication() {
        let dir = tree();
        let results = glob("**/*.rs", dir.path());
        let regex = compile("**/*.rs").unwrap();
        let refiltered: Vec<String> = results
            .iter()
            .filter(|p| regex.is_match(p))
            .cloned()
            .collect();
        assert_eq!(results, refiltered);
    }

    #[test]
    fn test_literal_dots_do_not_match_any_character() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("libxrs"), "").unwrap();
        assert_eq!(glob("*.rs", dir.path()), vec!["lib.rs"]);
    }

    #[test]
    fn test_missing_directory_yields_empty() {
        let dir = TempDir::new().unwrap();
        assert!(glob("**/*.rs", &dir.path().join("nope")).is_empty());
    }
}
