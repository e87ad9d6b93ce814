//! Tool definitions and the sandboxed tool executor.

pub mod definitions;
pub mod executor;

pub use definitions::{default_tools, filtered_tools, ToolChoice, ToolDefinition};
pub use executor::{ToolExecutor, ToolResult};

use thiserror::Error;

use crate::sandbox::SandboxError;

/// A tool execution failure. The executor converts these to error strings
/// fed back to the model; they never abort the conversation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required argument was absent or had the wrong type.
    #[error("missing required argument '{name}'")]
    MissingArgument {
        /// The argument name.
        name: String,
    },

    /// `edit_file` found no occurrence of `old_string`.
    #[error("old_string not found in '{path}'; file left unchanged")]
    OldStringNotFound {
        /// The file that was to be edited.
        path: String,
    },

    /// A sandbox violation.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Filesystem or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
