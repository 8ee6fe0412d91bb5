//! Sequences one backup run end to end: load history, fold the sum,
//! allocate a backup directory, traverse, and persist the result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use crate::history::load_history;
use crate::layout;
use crate::manifest::ManifestWriter;
use crate::metadata::{BackupCompletionInfo, BackupIndex, BackupStartInfo};
use crate::sum::BackupSum;
use crate::traversal::{self, RunState};

/// What the run amounted to, once every best-effort step has been tried.
/// This is distinct from the two fatal conditions `run_backup` returns as
/// `Err`: `Success`/`Warning` both mean the backup directory holds usable
/// data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Warning,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub backup_name: String,
    pub backup_dir: PathBuf,
    pub outcome: RunOutcome,
}

/// Run one backup of `source` into `target`, excluding any canonical path
/// in `excludes`. `rng` drives backup-directory name generation only.
///
/// Errors here are always the §4.11 runtime-error or programmer-error
/// categories: directory allocation, manifest open, start-info write, or
/// source-root enumeration failing, or a manifest-depth invariant breaking.
/// Everything else is absorbed into the returned `RunOutcome`.
pub async fn run_backup(
    source: &Path,
    target: &Path,
    excludes: &[String],
    rng: &mut impl Rng,
) -> Result<RunReport> {
    let source_str = source.to_string_lossy().into_owned();

    let index_path = layout::index_path(target);
    let index = BackupIndex::load(&index_path).context("failed to load index.txt")?;
    let history = load_history(&source_str, target, &index);
    let sum = BackupSum::build(&history);
    info!(backups = history.len(), "loaded prior backup history");

    let (backup_name, backup_dir) = layout::allocate_backup_dir(target, rng)
        .context("failed to allocate a backup directory")?;
    let data_dir = layout::data_dir(&backup_dir);

    let mut writer = ManifestWriter::create(layout::manifest_path(&backup_dir))
        .context("failed to open manifest writer")?;

    let start_time = Utc::now();
    let start_info = BackupStartInfo {
        source_path: source_str.clone(),
        start_time,
    };
    start_info
        .write(&layout::start_info_path(&backup_dir))
        .context("failed to write start.json")?;

    info!(backup = %backup_name, source = %source_str, "backup started");

    let mut state = RunState::default();
    traversal::traverse(source, &data_dir, &sum, excludes, &mut writer, &mut state)
        .await
        .context("traversal aborted")?;

    drop(writer);

    let end_time = Utc::now();
    let completion = BackupCompletionInfo {
        end_time,
        paths_skipped: state.paths_skipped,
        manifest_complete: state.manifest_complete,
    };
    let completion_written = match completion.write(&layout::completion_info_path(&backup_dir)) {
        Ok(()) => true,
        Err(e) => {
            warn!(backup = %backup_name, error = %e, "failed to write completion.json");
            false
        }
    };

    let index_appended = match BackupIndex::append(&index_path, &backup_name, &source_str) {
        Ok(()) => true,
        Err(e) => {
            warn!(backup = %backup_name, error = %e, "failed to append index.txt");
            false
        }
    };

    let outcome = if !state.paths_skipped
        && state.manifest_complete
        && completion_written
        && index_appended
    {
        RunOutcome::Success
    } else {
        RunOutcome::Warning
    };

    info!(backup = %backup_name, outcome = ?outcome, "backup finished");

    Ok(RunReport {
        backup_name,
        backup_dir,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::fs;

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(99)
    }

    #[tokio::test]
    async fn first_run_copies_everything_and_reports_success() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("a.txt"), b"hello").unwrap();
        let target = tempfile::tempdir().unwrap();

        let mut rng = rng();
        let report = run_backup(source.path(), target.path(), &[], &mut rng)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Success);
        assert!(report.backup_dir.join("data").join("a.txt").exists());
        assert!(report.backup_dir.join("start.json").exists());
        assert!(report.backup_dir.join("completion.json").exists());

        let index = BackupIndex::load(&layout::index_path(target.path())).unwrap();
        assert_eq!(
            index.source_of(&report.backup_name),
            Some(source.path().to_string_lossy().into_owned().as_str())
        );
    }

    #[tokio::test]
    async fn second_run_skips_unmodified_file() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("a.txt"), b"hello").unwrap();
        let target = tempfile::tempdir().unwrap();

        let mut rng = rng();
        run_backup(source.path(), target.path(), &[], &mut rng)
            .await
            .unwrap();

        // Second backup sees the same mtime, so the decision rule skips it.
        let report = run_backup(source.path(), target.path(), &[], &mut rng)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Success);
        assert!(!report.backup_dir.join("data").join("a.txt").exists());
    }

    #[tokio::test]
    async fn removed_file_is_recorded_and_not_present_in_new_backup() {
        let source = tempfile::tempdir().unwrap();
        let file_path = source.path().join("a.txt");
        fs::write(&file_path, b"hello").unwrap();
        let target = tempfile::tempdir().unwrap();

        let mut rng = rng();
        run_backup(source.path(), target.path(), &[], &mut rng)
            .await
            .unwrap();

        fs::remove_file(&file_path).unwrap();
        let report = run_backup(source.path(), target.path(), &[], &mut rng)
            .await
            .unwrap();

        let tree = crate::manifest::read_manifest(&layout::manifest_path(&report.backup_dir))
            .unwrap();
        assert_eq!(tree.removed_files, vec!["a.txt".to_string()]);
    }
}
