//! Folds an ordered sequence of prior backups into one tree: per-file "last
//! backup that copied me", per-directory existence, with removals applied.

use chrono::{DateTime, Utc};

use crate::history::BackupMetadata;
use crate::manifest::ManifestDirNode;
use crate::paths::path_equal;

/// A file known to the sum: it exists, and was last copied by the backup
/// whose `start_time` is recorded here. Per the design notes, the timestamp
/// is stored directly rather than as a reference back into the owning
/// `BackupMetadata` — it is the only field ever read through such a
/// reference, so the indirection buys nothing but a lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumFile {
    pub name: String,
    pub last_backup_start: DateTime<Utc>,
}

/// A directory known to the sum: it exists, and has these children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SumDirectory {
    pub name: String,
    pub subdirectories: Vec<SumDirectory>,
    pub files: Vec<SumFile>,
}

impl SumDirectory {
    fn root() -> Self {
        SumDirectory::default()
    }

    pub fn find_subdirectory(&self, name: &str) -> Option<&SumDirectory> {
        self.subdirectories.iter().find(|d| path_equal(&d.name, name))
    }

    pub fn find_file(&self, name: &str) -> Option<&SumFile> {
        self.files.iter().find(|f| path_equal(&f.name, name))
    }

    fn find_or_create_subdirectory_mut(&mut self, name: &str) -> &mut SumDirectory {
        if let Some(pos) = self
            .subdirectories
            .iter()
            .position(|d| path_equal(&d.name, name))
        {
            return &mut self.subdirectories[pos];
        }
        self.subdirectories.push(SumDirectory {
            name: name.to_string(),
            ..Default::default()
        });
        self.subdirectories.last_mut().unwrap()
    }

    fn upsert_file(&mut self, name: &str, start_time: DateTime<Utc>) {
        if let Some(existing) = self.files.iter_mut().find(|f| path_equal(&f.name, name)) {
            existing.last_backup_start = start_time;
        } else {
            self.files.push(SumFile {
                name: name.to_string(),
                last_backup_start: start_time,
            });
        }
    }

    fn remove_file(&mut self, name: &str) {
        self.files.retain(|f| !path_equal(&f.name, name));
    }

    fn remove_subdirectory(&mut self, name: &str) {
        self.subdirectories.retain(|d| !path_equal(&d.name, name));
    }

    fn apply_manifest_node(&mut self, node: &ManifestDirNode, start_time: DateTime<Utc>) {
        for name in &node.copied_files {
            self.upsert_file(name, start_time);
        }
        for name in &node.removed_files {
            self.remove_file(name);
        }
        for name in &node.removed_dirs {
            self.remove_subdirectory(name);
        }
        for child in &node.children {
            let child_sum = self.find_or_create_subdirectory_mut(&child.name);
            child_sum.apply_manifest_node(child, start_time);
        }
    }
}

/// The cumulative, read-only view of every prior backup for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupSum {
    root: SumDirectory,
}

impl BackupSum {
    /// Fold `metadatas`, sorted by `start_time` ascending, into a single
    /// sum. The fold is deterministic given the ordered inputs.
    pub fn build(metadatas: &[BackupMetadata]) -> Self {
        let mut ordered: Vec<&BackupMetadata> = metadatas.iter().collect();
        ordered.sort_by_key(|m| m.start.start_time);

        let mut root = SumDirectory::root();
        for metadata in ordered {
            root.apply_manifest_node(&metadata.manifest, metadata.start.start_time);
        }

        BackupSum { root }
    }

    pub fn root(&self) -> &SumDirectory {
        &self.root
    }

    /// Walk case-insensitively from the root through `components`, returning
    /// the subtree if every component exists.
    pub fn find_directory(&self, components: &[String]) -> Option<&SumDirectory> {
        let mut current = &self.root;
        for component in components {
            current = current.find_subdirectory(component)?;
        }
        Some(current)
    }
}

/// The §4.9 decision rule: copy iff there is no record of this file, or it
/// was modified no earlier than the last backup that copied it.
pub fn should_copy(
    directory: Option<&SumDirectory>,
    file_name: &str,
    last_modified_utc: DateTime<Utc>,
) -> bool {
    match directory.and_then(|d| d.find_file(file_name)) {
        None => true,
        Some(entry) => last_modified_utc >= entry.last_backup_start,
    }
}
