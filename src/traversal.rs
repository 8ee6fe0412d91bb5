//! The depth-first walk of the source directory: per-file copy/skip
//! decisions, per-directory manifest push/pop, and removal detection
//! against the backup sum.
//!
//! Scheduling is an explicit stack of [`WorkItem`]s rather than recursion,
//! per the design notes — there is no need for boxed futures or trait
//! objects to express "visit this directory" vs. "pop back out of it".

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::FsError;
use crate::manifest::{ManifestError, ManifestWriter};
use crate::paths::path_equal;
use crate::sum::{should_copy, BackupSum};

#[derive(Debug, Error)]
pub enum TraversalFatal {
    #[error("cannot enumerate source root: {0}")]
    RootUnreadable(FsError),

    #[error("manifest invariant violation: leave() at depth 0")]
    InvariantViolation,
}

/// The two sticky accumulators the traversal reports back to the
/// orchestrator. `paths_skipped` only ever goes false → true;
/// `manifest_complete` only ever goes true → false.
#[derive(Debug, Clone, Copy)]
pub struct RunState {
    pub paths_skipped: bool,
    pub manifest_complete: bool,
}

impl Default for RunState {
    fn default() -> Self {
        RunState {
            paths_skipped: false,
            manifest_complete: true,
        }
    }
}

enum WorkItem {
    Visit {
        source_dir: PathBuf,
        rel: Vec<String>,
        is_root: bool,
    },
    Leave,
}

/// Walk `source_root`, mirroring changed files under `backup_data_root`,
/// consulting `sum` for the copy/removal decisions, and streaming the
/// result to `writer`. Sticky flags accumulate into `state`.
///
/// Returns `Err` only for the two truly fatal conditions: the source root
/// itself could not be enumerated, or the manifest writer's cursor
/// underflowed (a programmer error that should never occur given a
/// correctly driven stack). Every other failure is absorbed into `state`
/// and logged.
pub async fn traverse(
    source_root: &Path,
    backup_data_root: &Path,
    sum: &BackupSum,
    excludes: &[String],
    writer: &mut ManifestWriter,
    state: &mut RunState,
) -> Result<(), TraversalFatal> {
    let mut stack = vec![WorkItem::Visit {
        source_dir: source_root.to_path_buf(),
        rel: Vec::new(),
        is_root: true,
    }];

    while let Some(item) = stack.pop() {
        match item {
            WorkItem::Leave => match writer.leave() {
                Ok(()) => {}
                Err(ManifestError::DepthUnderflow) => {
                    return Err(TraversalFatal::InvariantViolation);
                }
                Err(ManifestError::Io(e)) => {
                    warn!(error = %e, "manifest I/O failure on leave(); halting traversal");
                    state.paths_skipped = true;
                    state.manifest_complete = false;
                    return Ok(());
                }
            },
            WorkItem::Visit {
                source_dir,
                rel,
                is_root,
            } => {
                visit_directory(
                    &source_dir,
                    &rel,
                    is_root,
                    backup_data_root,
                    sum,
                    excludes,
                    writer,
                    state,
                    &mut stack,
                )
                .await?;
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn visit_directory(
    source_dir: &Path,
    rel: &[String],
    is_root: bool,
    backup_data_root: &Path,
    sum: &BackupSum,
    excludes: &[String],
    writer: &mut ManifestWriter,
    state: &mut RunState,
    stack: &mut Vec<WorkItem>,
) -> Result<(), TraversalFatal> {
    // Step 1: canonicalize.
    let canonical = match canonicalize(source_dir).await {
        Ok(p) => p,
        Err(e) => {
            if is_root {
                return Err(TraversalFatal::RootUnreadable(FsError::classify(
                    e,
                    source_dir.to_path_buf(),
                )));
            }
            warn!(path = %source_dir.display(), error = %e, "cannot canonicalize directory, skipping");
            state.paths_skipped = true;
            return Ok(());
        }
    };
    let canonical_str = canonical.to_string_lossy().into_owned();

    // Step 2: exclude check.
    if excludes.iter().any(|ex| path_equal(ex, &canonical_str)) {
        debug!(path = %canonical_str, "excluded, skipping");
        return Ok(());
    }

    // Step 3: sum node lookup.
    let sum_node = sum.find_directory(rel);

    // Step 4: mirror directory.
    let target_dir = backup_data_root.join(relative_path(rel));
    if let Err(e) = tokio::fs::create_dir_all(&target_dir).await {
        warn!(path = %target_dir.display(), error = %e, "cannot create mirror directory, skipping");
        state.paths_skipped = true;
        return Ok(());
    }

    // Step 5: enter.
    let mut entered = false;
    if !is_root {
        let name = rel.last().expect("non-root always has at least one component");
        match writer.enter(name) {
            Ok(()) => entered = true,
            Err(ManifestError::DepthUnderflow) => return Err(TraversalFatal::InvariantViolation),
            Err(ManifestError::Io(e)) => {
                warn!(path = %canonical_str, error = %e, "manifest I/O failure on enter(), skipping subtree");
                state.paths_skipped = true;
                state.manifest_complete = false;
                return Ok(());
            }
        }
    }

    // Steps 6-10: read directory entries once, split into files/subdirs.
    let (files_on_disk, dirs_on_disk) = match read_entries(source_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if is_root {
                return Err(TraversalFatal::RootUnreadable(e));
            }
            warn!(path = %canonical_str, error = %e, "cannot read directory entries, treating as empty");
            state.paths_skipped = true;
            (Vec::new(), Vec::new())
        }
    };

    // Step 7: per-file decision.
    let mut observed_file_names = Vec::with_capacity(files_on_disk.len());
    for name in &files_on_disk {
        observed_file_names.push(name.clone());
        let file_path = source_dir.join(name);

        let canonical_file = match canonicalize(&file_path).await {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "cannot canonicalize file, skipping");
                state.paths_skipped = true;
                continue;
            }
        };
        let canonical_file_str = canonical_file.to_string_lossy().into_owned();

        if excludes.iter().any(|ex| path_equal(ex, &canonical_file_str)) {
            debug!(path = %canonical_file_str, "excluded, skipping");
            continue;
        }

        let mtime = match tokio::fs::metadata(&file_path)
            .await
            .and_then(|m| m.modified())
        {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "cannot read file metadata, skipping");
                state.paths_skipped = true;
                continue;
            }
        };

        if !should_copy(sum_node, name, mtime) {
            continue;
        }

        let target_file = target_dir.join(name);
        if let Err(e) = copy_file(&file_path, &target_file).await {
            // `e.path()` names whichever side (source or destination) the
            // failure actually occurred on, which `file_path` alone can't.
            warn!(path = %e.path().display(), error = %e, "failed to copy file, skipping");
            state.paths_skipped = true;
            continue;
        }

        if let Err(record_err) = writer.file_copied(name) {
            record_manifest_error(record_err, state)?;
        }
    }

    // Step 8: files removed since the prior sum.
    if let Some(node) = sum_node {
        for existing in &node.files {
            if !observed_file_names
                .iter()
                .any(|n| path_equal(n, &existing.name))
            {
                if let Err(record_err) = writer.file_removed(&existing.name) {
                    record_manifest_error(record_err, state)?;
                }
            }
        }
    }

    // Steps 9-10: directories removed since the prior sum.
    if let Some(node) = sum_node {
        for existing in &node.subdirectories {
            if !dirs_on_disk.iter().any(|n| path_equal(n, &existing.name)) {
                if let Err(record_err) = writer.directory_removed(&existing.name) {
                    record_manifest_error(record_err, state)?;
                }
            }
        }
    }

    // Step 11 & 12: schedule leave and children in depth-first order.
    if entered {
        stack.push(WorkItem::Leave);
    }
    for name in dirs_on_disk.iter().rev() {
        let mut child_rel = rel.to_vec();
        child_rel.push(name.clone());
        stack.push(WorkItem::Visit {
            source_dir: source_dir.join(name),
            rel: child_rel,
            is_root: false,
        });
    }

    Ok(())
}

/// A failed manifest write outside of `leave()` degrades `manifest_complete`
/// but never halts the run, except for the underflow invariant (which
/// cannot actually occur here, since `enter`/`file_copied`/etc. never pop).
fn record_manifest_error(err: ManifestError, state: &mut RunState) -> Result<(), TraversalFatal> {
    match err {
        ManifestError::DepthUnderflow => Err(TraversalFatal::InvariantViolation),
        ManifestError::Io(e) => {
            warn!(error = %e, "manifest I/O failure recording an assertion");
            state.manifest_complete = false;
            Ok(())
        }
    }
}

/// `dunce::canonicalize` rather than `tokio::fs::canonicalize`, to match the
/// form used for exclude-list resolution in `cli.rs` — both must agree on
/// the same canonical form for `path_equal` comparisons to ever match (on
/// Windows, the two otherwise disagree about the `\\?\` extended-length
/// prefix). Run on the blocking pool since `dunce` does its own blocking
/// I/O outside tokio's async file API.
async fn canonicalize(path: &Path) -> std::io::Result<PathBuf> {
    let path = path.to_path_buf();
    match tokio::task::spawn_blocking(move || dunce::canonicalize(&path)).await {
        Ok(result) => result,
        Err(join_err) => Err(std::io::Error::other(join_err)),
    }
}

async fn read_entries(dir: &Path) -> Result<(Vec<String>, Vec<String>), FsError> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FsError::classify(e, dir.to_path_buf()))?;

    loop {
        let entry = entries
            .next_entry()
            .await
            .map_err(|e| FsError::classify(e, dir.to_path_buf()))?;
        let Some(entry) = entry else { break };

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        match entry.file_type().await {
            Ok(ft) if ft.is_dir() => dirs.push(name),
            Ok(ft) if ft.is_file() => files.push(name),
            Ok(_) => {}
            Err(_) => continue,
        }
    }

    Ok((files, dirs))
}

fn relative_path(rel: &[String]) -> PathBuf {
    rel.iter().collect()
}

const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Byte-for-byte streaming copy with an explicit flush and fsync, matching
/// the manifest's own durability contract: the copy is fully on disk before
/// the `FileCopied` record that asserts it.
async fn copy_file(src: &Path, dst: &Path) -> Result<(), FsError> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut src_file = tokio::fs::File::open(src)
        .await
        .map_err(|e| FsError::classify(e, src.to_path_buf()))?;
    let mut dst_file = tokio::fs::File::create(dst)
        .await
        .map_err(|e| FsError::classify(e, dst.to_path_buf()))?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let read = src_file
            .read(&mut buffer)
            .await
            .map_err(|e| FsError::classify(e, src.to_path_buf()))?;
        if read == 0 {
            break;
        }
        dst_file
            .write_all(&buffer[..read])
            .await
            .map_err(|e| FsError::classify(e, dst.to_path_buf()))?;
    }

    dst_file
        .sync_all()
        .await
        .map_err(|e| FsError::classify(e, dst.to_path_buf()))?;

    Ok(())
}
