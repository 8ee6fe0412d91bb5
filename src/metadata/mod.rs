//! Structured per-backup records (`start.json`, `completion.json`) and the
//! target-wide index (`index.txt`).

mod completion;
mod index;
mod start;

pub use completion::BackupCompletionInfo;
pub use index::{BackupIndex, IndexError};
pub use start::BackupStartInfo;

use thiserror::Error;

use crate::error::FsError;

/// Shared error for the two JSON-backed records.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata I/O failure: {0}")]
    Io(#[from] FsError),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
}
