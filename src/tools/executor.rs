//! Dispatches validated tool calls to the sandbox primitives.
//!
//! Every failure, including sandbox violations, is converted into an error
//! string fed back to the model. A single bad tool call never aborts the
//! conversation; the only way a tool affects control flow is through its
//! result text.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use super::ToolError;
use crate::sandbox::{sanitize, PathGuard};
use crate::search::{glob, grep};

/// Wall-clock limit for one shell command.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Combined stdout/stderr cap.
const MAX_OUTPUT_BYTES: usize = 1_048_576;

/// The platform shell used to run command lines.
#[cfg(unix)]
const SHELL: (&str, &str) = ("sh", "-c");
#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");

/// Outcome of one tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    /// The tool ran and produced output.
    Success(String),
    /// The tool failed; the message is reported to the model as text.
    Error(String),
}

impl ToolResult {
    /// The result text, regardless of outcome.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) => text,
            Self::Error(text) => text,
        }
    }

    /// Returns true for [`ToolResult::Error`].
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Executes tool calls inside a working directory and a sandbox root.
pub struct ToolExecutor {
    working_dir: PathBuf,
    guard: PathGuard,
}

impl ToolExecutor {
    /// Creates an executor whose sandbox root equals the working directory.
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        let guard = PathGuard::new(working_dir.clone());
        Self { working_dir, guard }
    }

    /// Widens the sandbox root beyond the working directory.
    #[must_use]
    pub fn with_sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.guard = PathGuard::new(root);
        self
    }

    /// Returns the working directory.
    #[must_use]
    pub fn working_dir(&self) -> &std::path::Path {
        &self.working_dir
    }

    /// Runs one tool call. Unknown tool names produce a descriptive error
    /// result rather than a failure.
    pub async fn execute(&self, name: &str, args: &Value) -> ToolResult {
        debug!(tool = %name, "executing tool");
        let outcome = match name {
            "read_file" => self.read_file(args).await,
            "write_file" => self.write_file(args).await,
            "edit_file" => self.edit_file(args).await,
            "glob_search" => self.glob_search(args),
            "grep_search" => self.grep_search(args),
            "execute_command" => self.execute_command(args).await,
            other => {
                warn!(tool = %other, "unknown tool requested");
                return ToolResult::Error(format!("Unknown tool: {other}"));
            }
        };

        match outcome {
            Ok(text) => ToolResult::Success(text),
            Err(e) => {
                warn!(tool = %name, error = %e, "tool execution failed");
                ToolResult::Error(e.to_string())
            }
        }
    }

    async fn read_file(&self, args: &Value) -> Result<String, ToolError> {
        let path = required_str(args, "file_path")?;
        // Reads may leave the working directory; agents legitimately read
        // context files outside the project tree.
        let resolved = PathGuard::resolve(&self.working_dir, path, true)?;
        Ok(tokio::fs::read_to_string(&resolved).await?)
    }

    async fn write_file(&self, args: &Value) -> Result<String, ToolError> {
        let path = required_str(args, "file_path")?;
        let content = required_str(args, "content")?;
        let resolved = PathGuard::resolve(&self.working_dir, path, false)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;
        Ok(format!("Wrote {} bytes to {path}", content.len()))
    }

    async fn edit_file(&self, args: &Value) -> Result<String, ToolError> {
        let path = required_str(args, "file_path")?;
        let old_string = required_str(args, "old_string")?;
        let new_string = required_str(args, "new_string")?;
        let resolved = PathGuard::resolve(&self.working_dir, path, false)?;

        let content = tokio::fs::read_to_string(&resolved).await?;
        if !content.contains(old_string) {
            return Err(ToolError::OldStringNotFound {
                path: path.to_string(),
            });
        }
        let updated = content.replacen(old_string, new_string, 1);
        tokio::fs::write(&resolved, &updated).await?;

        Ok(format!(
            "Edited {path}:\n- {}\n+ {}",
            summarize(old_string),
            summarize(new_string)
        ))
    }

    fn glob_search(&self, args: &Value) -> Result<String, ToolError> {
        let pattern = required_str(args, "pattern")?;
        let root = self.search_root(args)?;
        let paths = glob(pattern, &root);
        if paths.is_empty() {
            Ok(format!("No files matching '{pattern}'"))
        } else {
            Ok(paths.join("\n"))
        }
    }

    fn grep_search(&self, args: &Value) -> Result<String, ToolError> {
        let pattern = required_str(args, "pattern")?;
        let root = self.search_root(args)?;
        let matches = grep(pattern, &root);
        if matches.is_empty() {
            Ok(format!("No matches for '{pattern}'"))
        } else {
            Ok(matches
                .iter()
                .map(|m| format!("{}:{}: {}", m.path, m.line, m.text))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }

    /// Resolves the optional `path` argument into a validated search root.
    fn search_root(&self, args: &Value) -> Result<PathBuf, ToolError> {
        let root = match args.get("path").and_then(Value::as_str) {
            Some(path) => PathGuard::resolve(&self.working_dir, path, false)?,
            None => self.working_dir.clone(),
        };
        self.guard.enforce_root(&root)?;
        Ok(root)
    }

    async fn execute_command(&self, args: &Value) -> Result<String, ToolError> {
        let command_line = required_str(args, "command")?;
        self.guard.enforce_root(&self.working_dir)?;
        let sanitized = sanitize(command_line, &self.working_dir)?;
        let reassembled = sanitized.reassemble();

        // Minimal environment: PATH only.
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        let child = Command::new(SHELL.0)
            .arg(SHELL.1)
            .arg(&reassembled)
            .current_dir(&self.working_dir)
            .env_clear()
            .env("PATH", path_var)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // On timeout the wait future is dropped and kill_on_drop reaps the
        // child. Timeouts are a string result, not an error.
        let output = match tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output()).await
        {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    command = %reassembled,
                    timeout_secs = COMMAND_TIMEOUT.as_secs(),
                    "command timed out and was killed"
                );
                return Ok(format!(
                    "Command timed out after {}s: {reassembled}",
                    COMMAND_TIMEOUT.as_secs()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}{stderr}");

        let text = if combined.len() > MAX_OUTPUT_BYTES {
            warn!(
                original_size = combined.len(),
                cap = MAX_OUTPUT_BYTES,
                "command output truncated"
            );
            format!(
                "{}\n\n[Output truncated: {} bytes exceeded {MAX_OUTPUT_BYTES} byte limit]",
                truncate_to_char_boundary(&combined, MAX_OUTPUT_BYTES),
                combined.len()
            )
        } else {
            combined
        };

        if output.status.success() {
            Ok(text)
        } else {
            Ok(format!(
                "Exit code {}: {text}",
                output.status.code().unwrap_or(-1)
            ))
        }
    }
}

/// Cuts `text` to at most `limit` bytes, backing up to a char boundary so
/// the cut never splits a multibyte character.
fn truncate_to_char_boundary(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::MissingArgument {
            name: name.to_string(),
        })
}

/// First line of a replacement string, shortened for the edit report.
fn summarize(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() > 80 {
        let head: String = first_line.chars().take(80).collect();
        format!("{head}...")
    } else if text.lines().count() > 1 {
        format!("{first_line}...")
    } else {
        first_line.to_string()
    }
}
