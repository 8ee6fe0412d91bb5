use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MetadataError;
use crate::error::FsError;

/// `start.json`: written once, immediately before traversal begins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BackupStartInfo {
    pub source_path: String,
    pub start_time: DateTime<Utc>,
}

impl BackupStartInfo {
    pub fn write(&self, path: &Path) -> Result<(), MetadataError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| FsError::classify(e, path.to_path_buf()))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, MetadataError> {
        let contents =
            fs::read_to_string(path).map_err(|e| FsError::classify(e, path.to_path_buf()))?;
        serde_json::from_str(&contents).map_err(|source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("start.json");
        let info = BackupStartInfo {
            source_path: "/srv/docs".to_string(),
            start_time: "2024-01-01T10:00:00Z".parse().unwrap(),
        };
        info.write(&path).unwrap();
        let loaded = BackupStartInfo::read(&path).unwrap();
        assert_eq!(info, loaded);
    }

    #[test]
    fn uses_pascal_case_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("start.json");
        let info = BackupStartInfo {
            source_path: "/srv/docs".to_string(),
            start_time: "2024-01-01T10:00:00Z".parse().unwrap(),
        };
        info.write(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"SourcePath\""));
        assert!(raw.contains("\"StartTime\""));
    }

    #[test]
    fn unknown_fields_are_ignored_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("start.json");
        fs::write(
            &path,
            r#"{"SourcePath":"/x","StartTime":"2024-01-01T00:00:00Z","Extra":123}"#,
        )
        .unwrap();
        let loaded = BackupStartInfo::read(&path).unwrap();
        assert_eq!(loaded.source_path, "/x");
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("start.json");
        fs::write(&path, r#"{"SourcePath":"/x"}"#).unwrap();
        assert!(matches!(
            BackupStartInfo::read(&path),
            Err(MetadataError::Parse { .. })
        ));
    }
}
