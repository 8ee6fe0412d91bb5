use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::error::FsError;
use crate::paths::{newline_decode, newline_encode};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index I/O failure: {0}")]
    Io(#[from] FsError),

    #[error("backup name {0:?} is not 16 alphanumeric characters")]
    InvalidBackupName(String),
}

/// `index.txt`: an append-only mapping from backup directory name to the
/// canonical source path that backup covers.
#[derive(Debug, Clone, Default)]
pub struct BackupIndex {
    entries: HashMap<String, String>,
}

impl BackupIndex {
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn source_of(&self, backup_name: &str) -> Option<&str> {
        self.entries.get(backup_name).map(|s| s.as_str())
    }

    /// Read `index.txt`. A missing file is treated as an empty index, not an
    /// error. A truncated final line (no trailing LF) is simply skipped, as
    /// is any blank line. On a duplicate backup name the later line wins.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            return Ok(BackupIndex::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| FsError::classify(e, path.to_path_buf()))?;

        let mut entries = HashMap::new();
        let lines: Vec<&str> = contents.split('\n').collect();
        let had_trailing_newline = contents.ends_with('\n');

        for (idx, line) in lines.iter().enumerate() {
            let is_last = idx == lines.len() - 1;
            if is_last && !had_trailing_newline {
                // Partial final line from an interrupted append: skip it.
                continue;
            }
            if line.is_empty() {
                continue;
            }
            if let Some((name, encoded_source)) = line.split_once(';') {
                entries.insert(name.to_string(), newline_decode(encoded_source));
            }
        }

        Ok(BackupIndex { entries })
    }

    /// Append one entry. Opens in append mode so a crash mid-write can only
    /// ever truncate the final, not-yet-committed line.
    pub fn append(
        path: &Path,
        backup_name: &str,
        source_path: &str,
    ) -> Result<(), IndexError> {
        if backup_name.len() != 16 || !backup_name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IndexError::InvalidBackupName(backup_name.to_string()));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FsError::classify(e, path.to_path_buf()))?;

        let line = format!("{};{}\n", backup_name, newline_encode(source_path));
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| FsError::classify(e, path.to_path_buf()))?;

        Ok(())
    }
}
