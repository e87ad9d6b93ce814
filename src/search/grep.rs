//! Case-insensitive content search over text files.

use std::path::Path;

use tracing::{debug, warn};

use super::{glob::glob, has_shell_metacharacters, SearchError};

/// Bound on the candidate file set.
const MAX_FILES: usize = 1_000;
/// Matched lines are truncated to this many characters.
const MAX_LINE_LEN: usize = 200;

/// Extensions considered text and worth scanning.
const TEXT_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "c", "h", "cpp", "hpp", "cs", "rb",
    "php", "swift", "kt", "scala", "sh", "bash", "zsh", "html", "css", "scss", "json", "yaml",
    "yml", "toml", "xml", "md", "txt", "sql", "proto", "cfg", "ini", "env", "lock",
];

/// One matched line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepMatch {
    /// Forward-slash relative path of the file.
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    /// The matched line, truncated.
    pub text: String,
}

/// Searches text files under `search_path` for lines containing `pattern`,
/// case-insensitively.
///
/// Fail-soft: rejected patterns and I/O failures are logged and yield an
/// empty list. Unreadable files are skipped.
#[must_use]
pub fn grep(pattern: &str, search_path: &Path) -> Vec<GrepMatch> {
    match run_grep(pattern, search_path) {
        Ok(matches) => matches,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "grep search failed");
            Vec::new()
        }
    }
}

fn run_grep(pattern: &str, search_path: &Path) -> Result<Vec<GrepMatch>, SearchError> {
    let reject = |reason: &str| SearchError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    if pattern.trim().is_empty() {
        return Err(reject("empty pattern"));
    }
    if pattern.contains("..") {
        return Err(reject("path traversal"));
    }
    if has_shell_metacharacters(pattern) {
        return Err(reject("shell metacharacters"));
    }

    let mut candidates: Vec<String> = Vec::new();
    for ext in TEXT_EXTENSIONS {
        candidates.extend(glob(&format!("**/*.{ext}"), search_path));
        if candidates.len() >= MAX_FILES {
            debug!(cap = MAX_FILES, "grep candidate set capped");
            candidates.truncate(MAX_FILES);
            break;
        }
    }

    let needle = pattern.to_lowercase();
    let mut matches = Vec::new();
    for relative in candidates {
        let content = match std::fs::read_to_string(search_path.join(&relative)) {
            Ok(content) => content,
            // Binary or unreadable files are skipped, not fatal.
            Err(e) => {
                debug!(path = %relative, error = %e, "skipping unreadable file during grep");
                continue;
            }
        };
        for (number, line) in content.lines().enumerate() {
            if line.to_lowercase().contains(&needle) {
                matches.push(GrepMatch {
                    path: relative.clone(),
                    line: number + 1,
                    text: truncate_line(line),
                });
            }
        }
    }

    Ok(matches)
}

fn truncate_line(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_LEN {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(MAX_LINE_LEN).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {\n    start();\n}\n")
            .unwrap();
        std::fs::write(dir.path().join("notes.md"), "Start Here\nnothing else\n").unwrap();
        std::fs::write(dir.path().join("image.bin"), [0u8, 159, 146, 150]).unwrap();
        dir
    }

    #[test]
    fn test_case_insensitive_match() {
        let dir = tree();
        let matches = grep("start", dir.path());
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().any(|m| m.path == "src/main.rs" && m.line == 2));
        assert!(matches
            .iter()
            .any(|m| m.path == "notes.md" && m.text == "Start Here"));
    }

    #[test]
    fn test_non_text_extensions_skipped() {
        let dir = tree();
        let matches = grep("150", dir.path());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_rejected_patterns_yield_empty() {
        let dir = tree();
        assert!(grep("", dir.path()).is_empty());
        assert!(grep("x; rm -rf /", dir.path()).is_empty());
        assert!(grep("../secret", dir.path()).is_empty());
    }

    #[test]
    fn test_long_lines_truncated() {
        let dir = TempDir::new().unwrap();
        let long = format!("needle {}", "x".repeat(300));
        std::fs::write(dir.path().join("big.txt"), &long).unwrap();

        let matches = grep("needle", dir.path());
        assert_eq!(matches.len(), 1);
        assert!(matches[0].text.ends_with("..."));
        assert_eq!(matches[0].text.chars().count(), MAX_LINE_LEN + 3);
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "first\nsecond\n").unwrap();
        let matches = grep("first", dir.path());
        assert_eq!(matches[0].line, 1);
    }
}
