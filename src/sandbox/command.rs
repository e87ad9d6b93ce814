//! Shell command-line sanitization.
//!
//! A command line is validated in stages: the raw string is scanned against
//! destructive patterns before any tokenization, then split into pipe/chain
//! stages, and each stage is tokenized with a quote-aware state machine and
//! checked against the deny list and path rules. Every chained stage gets
//! the full validation, not just the first one — a blocked command cannot
//! hide behind a pipe.
//!
//! The tokenizer is deliberately separate from the validation steps so each
//! can be tested on its own.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::path_guard::PathGuard;
use super::SandboxError;

/// Destructive command patterns, matched against the raw command line (and
/// its escape-normalized form) before tokenization.
static DANGEROUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Recursive delete from the filesystem root
        Regex::new(r"rm\s+-rf\s+/").expect("invalid regex: rm -rf"),
        Regex::new(r"rm\s+-fr\s+/").expect("invalid regex: rm -fr"),
        Regex::new(r"rm\s+--no-preserve-root").expect("invalid regex: rm --no-preserve-root"),
        // Disk and filesystem destruction
        Regex::new(r"mkfs\.").expect("invalid regex: mkfs"),
        Regex::new(r"dd\s+if=.+of=/dev/").expect("invalid regex: dd to device"),
        Regex::new(r">\s*/dev/sd[a-z]").expect("invalid regex: redirect to sd"),
        Regex::new(r">\s*/dev/nvme").expect("invalid regex: redirect to nvme"),
        // Power control with flags
        Regex::new(r"\bshutdown\s+-").expect("invalid regex: shutdown"),
        Regex::new(r"\breboot\s+-").expect("invalid regex: reboot"),
        Regex::new(r"\bhalt\s+-").expect("invalid regex: halt"),
        // Fork bomb
        Regex::new(r":\(\)\s*\{\s*:\|:&\s*\}\s*;").expect("invalid regex: fork bomb"),
    ]
});

/// Base commands that are never allowed, matched case-insensitively against
/// the basename after stripping `.exe`/`.bat`/`.cmd`.
static DENIED_COMMANDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Disk / format tools
        "mkfs", "mkswap", "fdisk", "parted", "dd", "format", "diskpart",
        // Power control
        "shutdown", "reboot", "halt", "poweroff", "init", "telinit",
        // User management
        "useradd", "userdel", "usermod", "adduser", "deluser", "passwd", "groupadd",
        "groupdel", "groupmod",
        // Privilege escalation
        "sudo", "su", "doas",
    ]
    .into_iter()
    .collect()
});

/// Flags whose following token is a path.
const PATH_FLAGS: &[&str] = &[
    "-f", "-o", "-i", "--file", "--output", "--out", "-C", "-c", "--config",
];

/// A validated command, the only representation that may reach process
/// execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedCommand {
    /// The base command.
    pub command: String,
    /// Arguments, tokenized and validated.
    pub args: Vec<String>,
    /// Shell redirects stripped from the token stream, e.g. "> out.txt".
    pub redirects: Vec<String>,
    /// Validated chained stages, each prefixed with its operator,
    /// e.g. "| wc -l".
    pub pipes: Vec<String>,
}

impl SanitizedCommand {
    /// Reassembles the full command line for execution.
    #[must_use]
    pub fn reassemble(&self) -> String {
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args.iter().map(|a| quote_token(a)));
        parts.extend(self.redirects.iter().cloned());
        parts.extend(self.pipes.iter().cloned());
        parts.join(" ")
    }
}

/// Quotes a token for shell reassembly if it contains whitespace.
fn quote_token(token: &str) -> String {
    if token.chars().any(char::is_whitespace) {
        format!("\"{}\"", token.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        token.to_string()
    }
}

/// Normalizes a command by stripping backslash escapes in front of letters,
/// so `r\m -rf /` is scanned as `rm -rf /`. Conventional escape sequences
/// (`\n`, `\t`, ...) are preserved.
pub(crate) fn normalize_command(cmd: &str) -> String {
    let mut result = String::with_capacity(cmd.len());
    let mut chars = cmd.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n' | 't' | 'r' | '0' | 'x') => {
                    result.push(c);
                    if let Some(next) = chars.next() {
                        result.push(next);
                    }
                }
                Some(next) if next.is_ascii_alphabetic() => {
                    if let Some(next) = chars.next() {
                        result.push(next);
                    }
                }
                Some(_) => {
                    result.push(c);
                    if let Some(next) = chars.next() {
                        result.push(next);
                    }
                }
                None => result.push(c),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Tokenizer quote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Single,
    Double,
}

/// Splits a command stage into tokens, respecting single and double quotes.
pub(crate) fn tokenize(stage: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = QuoteState::Unquoted;
    let mut in_token = false;

    for c in stage.chars() {
        match (state, c) {
            (QuoteState::Unquoted, '\'') => {
                state = QuoteState::Single;
                in_token = true;
            }
            (QuoteState::Unquoted, '"') => {
                state = QuoteState::Double;
                in_token = true;
            }
            (QuoteState::Unquoted, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (QuoteState::Single, '\'') | (QuoteState::Double, '"') => {
                state = QuoteState::Unquoted;
            }
            (_, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }

    tokens
}

/// Splits a command line on unquoted pipe/chain operators, keeping each
/// stage's operator. The first stage's operator is empty.
pub(crate) fn split_stages(line: &str) -> Vec<(String, String)> {
    let mut stages = Vec::new();
    let mut current = String::new();
    let mut op = String::new();
    let mut state = QuoteState::Unquoted;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (state, c) {
            (QuoteState::Unquoted, '\'') => {
                state = QuoteState::Single;
                current.push(c);
            }
            (QuoteState::Unquoted, '"') => {
                state = QuoteState::Double;
                current.push(c);
            }
            (QuoteState::Single, '\'') | (QuoteState::Double, '"') => {
                state = QuoteState::Unquoted;
                current.push(c);
            }
            (QuoteState::Unquoted, '|' | '&' | ';') => {
                let mut next_op = String::from(c);
                if (c == '|' || c == '&') && chars.peek() == Some(&c) {
                    next_op.push(c);
                    chars.next();
                }
                // "2>&1" style redirects are handled at the token level, not
                // here; a '>' immediately before '&' keeps the '&' attached.
                if c == '&' && current.trim_end().ends_with('>') {
                    current.push(c);
                    continue;
                }
                stages.push((std::mem::take(&mut op), std::mem::take(&mut current)));
                op = next_op;
            }
            (_, c) => current.push(c),
        }
    }
    stages.push((op, current));

    stages
        .into_iter()
        .map(|(op, stage)| (op, stage.trim().to_string()))
        .collect()
}

/// Extracts trailing-style shell redirects from the token stream.
///
/// Returns the remaining tokens and the redirect strings (operator plus
/// target, e.g. "> out.txt").
fn extract_redirects(
    tokens: Vec<String>,
    cwd: &Path,
) -> Result<(Vec<String>, Vec<String>), SandboxError> {
    const OPS: &[&str] = &[">>", ">", "<", "2>>", "2>", "&>>", "&>"];

    let mut remaining = Vec::new();
    let mut redirects = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        if token == "2>&1" {
            redirects.push(token);
            continue;
        }
        if OPS.contains(&token.as_str()) {
            let target = iter.next().ok_or(SandboxError::EmptyCommand)?;
            check_redirect_target(&target, cwd)?;
            redirects.push(format!("{token} {target}"));
            continue;
        }
        // Attached form, e.g. ">out.txt" or "2>/dev/null".
        if let Some((op, target)) = split_attached_redirect(&token) {
            if target == "&1" || target == "&2" {
                redirects.push(token);
                continue;
            }
            check_redirect_target(target, cwd)?;
            redirects.push(format!("{op} {target}"));
            continue;
        }
        remaining.push(token);
    }

    Ok((remaining, redirects))
}

/// Redirect targets resolve through the path guard like any other path
/// argument; `/dev/null` is the one allowed sink outside the sandbox.
fn check_redirect_target(target: &str, cwd: &Path) -> Result<(), SandboxError> {
    check_traversal(target)?;
    if target == "/dev/null" {
        return Ok(());
    }
    PathGuard::resolve(cwd, target, false)?;
    Ok(())
}

/// Splits an attached redirect token like `>out.txt` into `(">", "out.txt")`.
fn split_attached_redirect(token: &str) -> Option<(&str, &str)> {
    for op in ["2>>", "2>", "&>>", "&>", ">>", ">", "<"] {
        if let Some(rest) = token.strip_prefix(op) {
            if !rest.is_empty() {
                return Some((op, rest));
            }
        }
    }
    None
}

fn check_traversal(arg: &str) -> Result<(), SandboxError> {
    if arg.contains("..") {
        warn!(arg = %arg, "path traversal in command argument rejected");
        return Err(SandboxError::PathTraversal {
            arg: arg.to_string(),
        });
    }
    Ok(())
}

/// Strips a Windows executable suffix and lowercases the basename.
fn canonical_command_name(command: &str) -> String {
    let base = Path::new(command)
        .file_name()
        .map_or(command, |n| n.to_str().unwrap_or(command));
    let lower = base.to_ascii_lowercase();
    for suffix in [".exe", ".bat", ".cmd"] {
        if let Some(stripped) = lower.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    lower
}

/// True if a token should be resolved through the path guard.
fn is_path_like(token: &str, after_path_flag: bool) -> bool {
    after_path_flag || token.contains('/') || token.starts_with('.') || token.starts_with('~')
}

/// One fully validated stage: command, args, redirects.
struct SanitizedStage {
    command: String,
    args: Vec<String>,
    redirects: Vec<String>,
}

fn sanitize_stage(stage: &str, cwd: &Path) -> Result<SanitizedStage, SandboxError> {
    let tokens = tokenize(stage);
    let (tokens, redirects) = extract_redirects(tokens, cwd)?;

    let mut iter = tokens.into_iter();
    let command = iter.next().ok_or(SandboxError::EmptyCommand)?;
    let args: Vec<String> = iter.collect();

    let name = canonical_command_name(&command);
    if DENIED_COMMANDS.contains(name.as_str()) {
        warn!(command = %command, "denied command rejected");
        return Err(SandboxError::CommandBlocked { command: name });
    }

    // `ln` creates links; its second path argument is where the link lands
    // and escapes there get their own error.
    let link_target = if name == "ln" {
        args.iter()
            .enumerate()
            .filter(|(_, a)| !a.starts_with('-'))
            .map(|(i, _)| i)
            .nth(1)
    } else {
        None
    };

    let mut after_path_flag = false;
    for (position, arg) in args.iter().enumerate() {
        check_traversal(arg)?;

        // --flag=value and -Xvalue forms carry the path inside the token.
        let value = arg
            .split_once('=')
            .map(|(_, v)| v)
            .filter(|_| arg.starts_with('-'));
        let candidate = value.unwrap_or(arg.as_str());

        if link_target == Some(position) {
            PathGuard::resolve(cwd, candidate, false).map_err(|_| {
                warn!(target = %candidate, "ln target escapes working directory");
                SandboxError::SymlinkTargetEscape {
                    target: candidate.to_string(),
                }
            })?;
            after_path_flag = false;
            continue;
        }

        if !candidate.starts_with('-') && is_path_like(candidate, after_path_flag) {
            if candidate.starts_with('~') {
                return Err(SandboxError::AccessDenied {
                    path: candidate.to_string(),
                });
            }
            PathGuard::resolve(cwd, candidate, false)?;
        }

        after_path_flag = PATH_FLAGS.contains(&arg.as_str());
    }

    Ok(SanitizedStage {
        command,
        args,
        redirects,
    })
}

/// Validates a shell command line for sandboxed execution.
///
/// # Errors
///
/// - [`SandboxError::EmptyCommand`] for blank input.
/// - [`SandboxError::DangerousPattern`] when the raw line (or its
///   escape-normalized form) matches a destructive pattern; checked before
///   tokenization.
/// - [`SandboxError::CommandBlocked`] when any stage's base command is on
///   the deny list.
/// - [`SandboxError::PathTraversal`] when any argument, including values
///   embedded in `--flag=value` forms and redirect targets, contains `..`.
/// - [`SandboxError::SymlinkTargetEscape`] when an `ln` target resolves
///   outside the working directory.
/// - Path guard errors for path-bearing arguments and redirect targets that
///   escape the sandbox (`/dev/null` excepted).
pub fn sanitize(command_line: &str, cwd: &Path) -> Result<SanitizedCommand, SandboxError> {
    let trimmed = command_line.trim();
    if trimmed.is_empty() {
        return Err(SandboxError::EmptyCommand);
    }

    let normalized = normalize_command(trimmed);
    for pattern in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(trimmed) || pattern.is_match(&normalized) {
            warn!(
                pattern = %pattern.as_str(),
                command = %trimmed,
                "dangerous command pattern rejected"
            );
            return Err(SandboxError::DangerousPattern {
                pattern: pattern.as_str().to_string(),
            });
        }
    }

    let mut stages = split_stages(trimmed).into_iter();
    let (_, first) = stages.next().ok_or(SandboxError::EmptyCommand)?;
    if first.is_empty() {
        return Err(SandboxError::EmptyCommand);
    }
    let head = sanitize_stage(&first, cwd)?;

    let mut pipes = Vec::new();
    for (op, stage) in stages {
        if stage.is_empty() {
            continue;
        }
        sanitize_stage(&stage, cwd)?;
        pipes.push(format!("{op} {stage}"));
    }

    Ok(SanitizedCommand {
        command: head.command,
        args: head.args,
        redirects: head.redirects,
        pipes,
    })
}
