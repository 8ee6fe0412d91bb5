//! Filesystem error classification shared by every layer that touches disk.
//!
//! Every raw `std::io::Error` that crosses into the core is funneled through
//! [`FsError::classify`] so call sites dispatch on failure *category*, never
//! on the underlying OS error code.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A filesystem failure, normalised to one of four stable categories.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("invalid path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    #[error("access denied: {path}")]
    AccessDenied { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Other { path: PathBuf, source: io::Error },
}

impl FsError {
    /// Classify a raw I/O error observed while operating on `path`.
    pub fn classify(source: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path },
            io::ErrorKind::PermissionDenied => FsError::AccessDenied { path },
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                FsError::InvalidPath { path }
            }
            _ => FsError::Other { path, source },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FsError::InvalidPath { path }
            | FsError::NotFound { path }
            | FsError::AccessDenied { path }
            | FsError::Other { path, .. } => path,
        }
    }

    pub fn kind(&self) -> FsErrorKind {
        match self {
            FsError::InvalidPath { .. } => FsErrorKind::InvalidPath,
            FsError::NotFound { .. } => FsErrorKind::NotFound,
            FsError::AccessDenied { .. } => FsErrorKind::AccessDenied,
            FsError::Other { .. } => FsErrorKind::Other,
        }
    }
}

/// The bare category, for callers that want to `match` without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    InvalidPath,
    NotFound,
    AccessDenied,
    Other,
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsErrorKind::InvalidPath => "invalid path",
            FsErrorKind::NotFound => "not found",
            FsErrorKind::AccessDenied => "access denied",
            FsErrorKind::Other => "other I/O error",
        };
        f.write_str(s)
    }
}

/// Convenience for `tokio::fs` call sites: classify an I/O result in place.
pub fn classify_result<T>(result: io::Result<T>, path: impl Into<PathBuf>) -> Result<T, FsError> {
    result.map_err(|e| FsError::classify(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_not_found() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "nope");
        let err = FsError::classify(io_err, "/tmp/missing");
        assert_eq!(err.kind(), FsErrorKind::NotFound);
    }

    #[test]
    fn classifies_permission_denied_as_access_denied() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let err = FsError::classify(io_err, "/tmp/locked");
        assert_eq!(err.kind(), FsErrorKind::AccessDenied);
    }

    #[test]
    fn classifies_other_kinds_as_other() {
        let io_err = io::Error::new(io::ErrorKind::Interrupted, "nope");
        let err = FsError::classify(io_err, "/tmp/whatever");
        assert_eq!(err.kind(), FsErrorKind::Other);
    }
}
