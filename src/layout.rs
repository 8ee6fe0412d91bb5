//! Fixed filenames and path composition within a target/backup directory,
//! and random backup-directory name generation with collision retry.

use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

const BACKUP_NAME_LEN: usize = 16;
const MAX_NAME_ATTEMPTS: usize = 20;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(
        "could not allocate a unique backup directory under {target} after {attempts} attempts ({tried:?}): {last_error}"
    )]
    ExhaustedAttempts {
        target: PathBuf,
        attempts: usize,
        tried: Vec<String>,
        last_error: std::io::Error,
    },
}

pub fn index_path(target: &Path) -> PathBuf {
    target.join("index.txt")
}

pub fn backup_dir(target: &Path, backup_name: &str) -> PathBuf {
    target.join(backup_name)
}

pub fn data_dir(backup_dir: &Path) -> PathBuf {
    backup_dir.join("data")
}

pub fn start_info_path(backup_dir: &Path) -> PathBuf {
    backup_dir.join("start.json")
}

pub fn manifest_path(backup_dir: &Path) -> PathBuf {
    backup_dir.join("manifest.txt")
}

pub fn completion_info_path(backup_dir: &Path) -> PathBuf {
    backup_dir.join("completion.json")
}

/// Out of core scope (no code in this crate writes to it) but named here so
/// an external log collaborator has a fixed place to put a per-backup log.
pub fn log_path(backup_dir: &Path) -> PathBuf {
    backup_dir.join("log.txt")
}

fn random_backup_name(rng: &mut impl Rng) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(BACKUP_NAME_LEN)
        .map(char::from)
        .collect()
}

/// Pick a backup directory name not already in use under `target`, retrying
/// up to [`MAX_NAME_ATTEMPTS`] times. Each attempt checks for both a file
/// and a directory of that name, since a stray `log.txt`-only artefact from
/// a previous run should also be avoided. This is inherently a best-effort,
/// non-atomic check — see the crate's concurrency notes.
pub fn allocate_backup_dir(
    target: &Path,
    rng: &mut impl Rng,
) -> Result<(String, PathBuf), LayoutError> {
    let mut tried = Vec::with_capacity(MAX_NAME_ATTEMPTS);
    let mut last_error = None;

    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = random_backup_name(rng);
        let candidate = backup_dir(target, &name);
        tried.push(name.clone());

        match std::fs::symlink_metadata(&candidate) {
            Ok(_) => continue, // something (file or dir) already exists
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match std::fs::create_dir_all(&candidate) {
                    Ok(()) => return Ok((name, candidate)),
                    Err(create_err) => {
                        last_error = Some(create_err);
                        continue;
                    }
                }
            }
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    Err(LayoutError::ExhaustedAttempts {
        target: target.to_path_buf(),
        attempts: MAX_NAME_ATTEMPTS,
        tried,
        last_error: last_error
            .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "no attempts made")),
    })
}
