//! Path resolution against the working directory and sandbox root.
//!
//! Canonicalization is the source of truth: a candidate path is joined to
//! the working directory, canonicalized (via its nearest existing parent for
//! not-yet-created targets), and the result must stay under the working
//! directory unless the caller explicitly allows outside reads. Symlinks are
//! detected with `symlink_metadata` on the original, non-canonical path so
//! that an escape through a link is reported as such.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::SandboxError;

/// Process-wide sandbox boundary, broader than the per-call working
/// directory. Applied to search and execution roots.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for the given sandbox root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the sandbox root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fails if `path` is outside the sandbox root.
    pub fn enforce_root(&self, path: &Path) -> Result<(), SandboxError> {
        let canonical_root = self.root.canonicalize().map_err(|e| SandboxError::Io {
            path: self.root.display().to_string(),
            message: e.to_string(),
        })?;
        let canonical = canonicalize_lenient(path)?;
        if canonical.starts_with(&canonical_root) {
            Ok(())
        } else {
            warn!(
                path = %path.display(),
                root = %canonical_root.display(),
                "path outside sandbox root rejected"
            );
            Err(SandboxError::OutsideSandboxRoot {
                path: path.display().to_string(),
            })
        }
    }

    /// Resolves `candidate` against `base_cwd`.
    ///
    /// Read operations may pass `allow_outside = true`; write, edit, and
    /// search operations must always pass `false`.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::NullByteInjection`] for embedded NUL bytes.
    /// - [`SandboxError::SymlinkEscape`] when the candidate (or its parent,
    ///   for not-yet-created targets) is a symlink resolving outside
    ///   `base_cwd` and `allow_outside` is false.
    /// - [`SandboxError::AccessDenied`] when the resolved path is outside
    ///   `base_cwd` and `allow_outside` is false.
    pub fn resolve(
        base_cwd: &Path,
        candidate: &str,
        allow_outside: bool,
    ) -> Result<PathBuf, SandboxError> {
        if candidate.contains('\0') {
            warn!(path = %candidate.escape_debug(), "NUL byte in path rejected");
            return Err(SandboxError::NullByteInjection);
        }

        let canonical_base = base_cwd.canonicalize().map_err(|e| SandboxError::Io {
            path: base_cwd.display().to_string(),
            message: e.to_string(),
        })?;

        let joined = if Path::new(candidate).is_absolute() {
            PathBuf::from(candidate)
        } else {
            canonical_base.join(candidate)
        };

        let via_symlink = is_symlink_or_has_symlink_parent(&joined);
        let resolved = canonicalize_lenient(&joined)?;

        if !allow_outside && !resolved.starts_with(&canonical_base) {
            warn!(
                path = %candidate,
                resolved = %resolved.display(),
                base = %canonical_base.display(),
                via_symlink,
                "path escapes working directory"
            );
            if via_symlink {
                return Err(SandboxError::SymlinkEscape {
                    path: candidate.to_string(),
                });
            }
            return Err(SandboxError::AccessDenied {
                path: candidate.to_string(),
            });
        }

        Ok(resolved)
    }
}

/// Canonicalizes a path that may not exist yet.
///
/// For existing paths this is plain canonicalization. For new targets the
/// nearest existing ancestor is canonicalized and the remaining components
/// are re-applied, with `..` collapsed lexically so traversal cannot hide
/// behind a missing parent.
fn canonicalize_lenient(path: &Path) -> Result<PathBuf, SandboxError> {
    if path.exists() {
        return path.canonicalize().map_err(|e| SandboxError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        });
    }

    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => {
                return Err(SandboxError::Io {
                    path: path.display().to_string(),
                    message: "no existing ancestor".to_string(),
                })
            }
        }
    }

    let mut resolved = existing.canonicalize().map_err(|e| SandboxError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    for component in tail.into_iter().rev() {
        if component == ".." {
            resolved.pop();
        } else if component != "." {
            resolved.push(component);
        }
    }
    Ok(resolved)
}

/// True if the path itself, or its nearest existing ancestor, is a symlink.
fn is_symlink_or_has_symlink_parent(path: &Path) -> bool {
    let mut current = path.to_path_buf();
    loop {
        if let Ok(metadata) = std::fs::symlink_metadata(&current) {
            if metadata.file_type().is_symlink() {
                return true;
            }
        }
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent.to_path_buf(),
            _ => return false,
        }
    }
}
