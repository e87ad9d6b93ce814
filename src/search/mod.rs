//! Native file search, no shell involved.
//!
//! [`glob`] compiles a glob pattern to a regex and walks the tree with a
//! depth bound; [`grep`] expands a text-extension allow-list into glob
//! patterns and scans the candidates line by line. Both back a best-effort
//! search tool, so both fail soft: on internal error they log and return an
//! empty result.

pub mod glob;
pub mod grep;

pub use glob::glob;
pub use grep::{grep, GrepMatch};

use thiserror::Error;

/// An internal search failure. Never crosses the tool boundary; the public
/// entry points log these and return empty results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The pattern is rejected before compilation.
    #[error("invalid search pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The compiled regex was rejected by the regex engine.
    #[error("pattern '{pattern}' failed to compile: {source}")]
    Compile {
        /// The offending pattern.
        pattern: String,
        /// The regex error.
        #[source]
        source: regex::Error,
    },

    /// Filesystem access failed.
    #[error("I/O error during search: {0}")]
    Io(#[from] std::io::Error),
}

/// Characters that have meaning to a shell; search patterns carrying them
/// are rejected outright since these functions never shell out.
pub(crate) fn has_shell_metacharacters(pattern: &str) -> bool {
    pattern
        .chars()
        .any(|c| matches!(c, ';' | '&' | '|' | '`' | '$' | '<' | '>' | '(' | ')' | '\n'))
}
