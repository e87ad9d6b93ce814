//! Filesystem and command sandboxing.
//!
//! Every tool invocation is confined to a bounded project directory. The
//! [`path_guard`] module validates paths against traversal and symlink
//! escapes; the [`command`] module parses and validates shell command lines
//! before anything reaches process execution.

pub mod command;
pub mod path_guard;

pub use command::{sanitize, SanitizedCommand};
pub use path_guard::PathGuard;

use thiserror::Error;

/// A sandbox violation.
///
/// These are raised by [`PathGuard`] and [`sanitize`] and converted by the
/// tool executor into tool-result error strings fed back to the model; a
/// violation never aborts the conversation.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The path resolves outside the working directory.
    #[error("access denied: '{path}' resolves outside the working directory")]
    AccessDenied {
        /// The offending path as supplied.
        path: String,
    },

    /// A symlink (or a symlinked parent) points outside the working directory.
    #[error("symlink escape: '{path}' links outside the working directory")]
    SymlinkEscape {
        /// The offending path as supplied.
        path: String,
    },

    /// The path contains an embedded NUL byte.
    #[error("path contains an embedded NUL byte")]
    NullByteInjection,

    /// The path is outside the process-wide sandbox root.
    #[error("path '{path}' is outside the sandbox root")]
    OutsideSandboxRoot {
        /// The offending path.
        path: String,
    },

    /// The command line is empty.
    #[error("empty command")]
    EmptyCommand,

    /// The command matches a destructive pattern.
    #[error("command blocked by security policy: matches dangerous pattern '{pattern}'")]
    DangerousPattern {
        /// The pattern that matched.
        pattern: String,
    },

    /// The base command is on the deny list.
    #[error("command '{command}' is blocked by security policy")]
    CommandBlocked {
        /// The blocked command name.
        command: String,
    },

    /// An argument contains `..`.
    #[error("path traversal detected in argument '{arg}'")]
    PathTraversal {
        /// The offending argument.
        arg: String,
    },

    /// An `ln` target resolves outside the working directory.
    #[error("symlink target '{target}' resolves outside the working directory")]
    SymlinkTargetEscape {
        /// The offending target argument.
        target: String,
    },

    /// Filesystem access failed during validation.
    #[error("I/O error for '{path}': {message}")]
    Io {
        /// The path being validated.
        path: String,
        /// The underlying error description.
        message: String,
    },
}
