use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MetadataError;
use crate::error::FsError;

/// `completion.json`: written at traversal end. Its absence means the
/// backup was interrupted; that backup will simply never appear in
/// `index.txt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BackupCompletionInfo {
    pub end_time: DateTime<Utc>,
    pub paths_skipped: bool,
    pub manifest_complete: bool,
}

impl BackupCompletionInfo {
    pub fn write(&self, path: &Path) -> Result<(), MetadataError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| FsError::classify(e, path.to_path_buf()))?;
        Ok(())
    }

    /// Read the completion record if present. Missing is informational, not
    /// an error — callers that care should check `path.exists()` separately
    /// if they need to distinguish "absent" from "read failed".
    pub fn read(path: &Path) -> Result<Option<Self>, MetadataError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(path).map_err(|e| FsError::classify(e, path.to_path_buf()))?;
        let info = serde_json::from_str(&contents).map_err(|source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completion.json");
        assert_eq!(BackupCompletionInfo::read(&path).unwrap(), None);
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completion.json");
        let info = BackupCompletionInfo {
            end_time: "2024-01-01T10:05:00Z".parse().unwrap(),
            paths_skipped: true,
            manifest_complete: false,
        };
        info.write(&path).unwrap();
        assert_eq!(BackupCompletionInfo::read(&path).unwrap(), Some(info));
    }
}
