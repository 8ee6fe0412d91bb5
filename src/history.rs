//! Reads the index and each matched backup's start info + manifest, folding
//! out anything unreadable or inconsistent with a warning rather than
//! failing the run.

use std::path::Path;

use tracing::warn;

use crate::layout;
use crate::manifest::{read_manifest, ManifestTree};
use crate::metadata::{BackupIndex, BackupStartInfo};
use crate::paths::path_equal;

/// A single prior backup, fully loaded and ready to fold into a
/// [`crate::sum::BackupSum`].
#[derive(Debug, Clone)]
pub struct BackupMetadata {
    pub name: String,
    pub start: BackupStartInfo,
    pub manifest: ManifestTree,
}

/// Load every backup under `target` whose recorded source matches `source`
/// (case-insensitively, trailing separators ignored). Unreadable or
/// inconsistent entries are skipped with a warning, never abort the load.
pub fn load_history(source: &str, target: &Path, index: &BackupIndex) -> Vec<BackupMetadata> {
    let mut loaded = Vec::new();

    for (backup_name, index_source) in index.entries() {
        if !path_equal(index_source, source) {
            continue;
        }

        let bdir = layout::backup_dir(target, backup_name);

        let start = match BackupStartInfo::read(&layout::start_info_path(&bdir)) {
            Ok(start) => start,
            Err(e) => {
                warn!(backup = backup_name, error = %e, "skipping backup: could not read start.json");
                continue;
            }
        };

        if !path_equal(&start.source_path, index_source) {
            warn!(
                backup = backup_name,
                index_source,
                start_source = %start.source_path,
                "skipping backup: start.json source disagrees with index",
            );
            continue;
        }

        let manifest = match read_manifest(&layout::manifest_path(&bdir)) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(backup = backup_name, error = %e, "skipping backup: could not read manifest.txt");
                continue;
            }
        };

        loaded.push(BackupMetadata {
            name: backup_name.to_string(),
            start,
            manifest,
        });
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestWriter;

    fn write_backup(target: &Path, name: &str, source: &str, start_time: &str) {
        let bdir = layout::backup_dir(target, name);
        std::fs::create_dir_all(&bdir).unwrap();
        BackupStartInfo {
            source_path: source.to_string(),
            start_time: start_time.parse().unwrap(),
        }
        .write(&layout::start_info_path(&bdir))
        .unwrap();
        let mut w = ManifestWriter::create(layout::manifest_path(&bdir)).unwrap();
        w.file_copied("a.txt").unwrap();
    }

    #[test]
    fn loads_only_matching_source_entries() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path();
        write_backup(target, "aaaaaaaaaaaaaaaa", "/srv/docs", "2024-01-01T00:00:00Z");
        write_backup(target, "bbbbbbbbbbbbbbbb", "/srv/other", "2024-01-01T00:00:00Z");

        let index_path = layout::index_path(target);
        crate::metadata::BackupIndex::append(&index_path, "aaaaaaaaaaaaaaaa", "/srv/docs").unwrap();
        crate::metadata::BackupIndex::append(&index_path, "bbbbbbbbbbbbbbbb", "/srv/other").unwrap();
        let index = BackupIndex::load(&index_path).unwrap();

        let loaded = load_history("/srv/docs", target, &index);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "aaaaaaaaaaaaaaaa");
    }

    #[test]
    fn skips_entries_whose_start_info_disagrees_with_index() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path();
        write_backup(target, "aaaaaaaaaaaaaaaa", "/srv/real-source", "2024-01-01T00:00:00Z");

        let index_path = layout::index_path(target);
        // Index claims a different source than start.json actually records.
        crate::metadata::BackupIndex::append(&index_path, "aaaaaaaaaaaaaaaa", "/srv/claimed").unwrap();
        let index = BackupIndex::load(&index_path).unwrap();

        let loaded = load_history("/srv/claimed", target, &index);
        assert!(loaded.is_empty());
    }

    #[test]
    fn skips_entries_with_unreadable_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path();
        let bdir = layout::backup_dir(target, "aaaaaaaaaaaaaaaa");
        std::fs::create_dir_all(&bdir).unwrap();
        BackupStartInfo {
            source_path: "/srv/docs".to_string(),
            start_time: "2024-01-01T00:00:00Z".parse().unwrap(),
        }
        .write(&layout::start_info_path(&bdir))
        .unwrap();
        // No manifest.txt written at all.

        let index_path = layout::index_path(target);
        crate::metadata::BackupIndex::append(&index_path, "aaaaaaaaaaaaaaaa", "/srv/docs").unwrap();
        let index = BackupIndex::load(&index_path).unwrap();

        assert!(load_history("/srv/docs", target, &index).is_empty());
    }
}
