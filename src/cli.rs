//! Manual argument parsing for the single `backup` verb. A hand-rolled
//! `match` expresses this surface at least as clearly as a derive-macro
//! parser would, since there is exactly one command.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::paths::trim_trailing_separators;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_WARNING: i32 = 1;
pub const EXIT_INVALID_ARGS: i32 = 2;
pub const EXIT_RUNTIME_ERROR: i32 = 3;
pub const EXIT_PROGRAMMER_ERROR: i32 = 4;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
}

pub enum Command {
    Help,
    Backup(Invocation),
}

pub struct Invocation {
    pub source: PathBuf,
    pub target: PathBuf,
    pub excludes: Vec<String>,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
}

/// Parse `args` as given by `std::env::args()`, i.e. `args[0]` is the
/// program name.
pub fn parse(args: &[String]) -> Result<Command, CliError> {
    match args.get(1).map(String::as_str) {
        Some("--help") | Some("-h") => Ok(Command::Help),
        Some("backup") => parse_backup(&args[2..]).map(Command::Backup),
        Some(other) => Err(CliError::Usage(format!("unknown command {other:?}"))),
        None => Err(CliError::Usage(
            "no command given (try --help)".to_string(),
        )),
    }
}

fn parse_backup(args: &[String]) -> Result<Invocation, CliError> {
    let mut positionals = Vec::new();
    let mut log_dir = None;
    let mut log_level = "info".to_string();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--log-dir" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| CliError::Usage("--log-dir requires a value".to_string()))?;
                log_dir = Some(PathBuf::from(value));
                i += 2;
            }
            "--log-level" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| CliError::Usage("--log-level requires a value".to_string()))?;
                log_level = value.clone();
                i += 2;
            }
            positional => {
                positionals.push(positional.to_string());
                i += 1;
            }
        }
    }

    if positionals.len() < 2 {
        return Err(CliError::Usage(
            "backup requires <source_dir> <target_dir> [exclude_path...]".to_string(),
        ));
    }

    let source = canonicalize_existing(Path::new(&positionals[0]))?;
    let target = canonicalize_or_create(Path::new(&positionals[1]))?;

    let excludes = positionals[2..]
        .iter()
        .map(|raw| resolve_exclude(&source, raw))
        .collect();

    Ok(Invocation {
        source,
        target,
        excludes,
        log_dir,
        log_level,
    })
}

fn canonicalize_existing(raw: &Path) -> Result<PathBuf, CliError> {
    dunce::canonicalize(raw)
        .map_err(|e| CliError::Usage(format!("cannot resolve {}: {e}", raw.display())))
}

fn canonicalize_or_create(raw: &Path) -> Result<PathBuf, CliError> {
    if !raw.exists() {
        std::fs::create_dir_all(raw)
            .map_err(|e| CliError::Usage(format!("cannot create {}: {e}", raw.display())))?;
    }
    canonicalize_existing(raw)
}

/// Resolve one exclude argument against `source` and canonicalise it. A
/// path that does not currently exist on disk is normalised lexically
/// instead — it can never match anything during traversal, but a typo in
/// an exclude list should not abort the whole backup.
fn resolve_exclude(source: &Path, raw: &str) -> String {
    let trimmed = trim_trailing_separators(raw);
    let candidate = if Path::new(trimmed).is_absolute() {
        PathBuf::from(trimmed)
    } else {
        source.join(trimmed)
    };

    dunce::canonicalize(&candidate)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| candidate.to_string_lossy().into_owned())
}

pub fn print_help() {
    println!("increbak {} - incremental filesystem backup", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("  increbak backup <source_dir> <target_dir> [exclude_path...]");
    println!("  increbak --help");
    println!();
    println!("OPTIONS:");
    println!("  --log-dir <dir>      also write logs to <dir>/increbak.log");
    println!("  --log-level <level>  default log level when RUST_LOG is unset (default: info)");
    println!();
    println!("EXIT CODES:");
    println!("  0  success");
    println!("  1  completed with warnings (paths skipped or metadata not fully written)");
    println!("  2  invalid arguments");
    println!("  3  aborted runtime error (no files copied)");
    println!("  4  programmer error (invariant violation)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_flag_is_recognised_in_either_form() {
        let argv = |flag: &str| vec!["increbak".to_string(), flag.to_string()];
        assert!(matches!(parse(&argv("--help")).unwrap(), Command::Help));
        assert!(matches!(parse(&argv("-h")).unwrap(), Command::Help));
    }

    #[test]
    fn missing_command_is_a_usage_error() {
        let argv = vec!["increbak".to_string()];
        assert!(matches!(parse(&argv), Err(CliError::Usage(_))));
    }

    #[test]
    fn unknown_command_is_a_usage_error() {
        let argv = vec!["increbak".to_string(), "restore".to_string()];
        assert!(matches!(parse(&argv), Err(CliError::Usage(_))));
    }

    #[test]
    fn backup_requires_two_positionals() {
        let source = tempfile::tempdir().unwrap();
        let argv = vec![
            "increbak".to_string(),
            "backup".to_string(),
            source.path().to_string_lossy().into_owned(),
        ];
        assert!(matches!(parse(&argv), Err(CliError::Usage(_))));
    }

    #[test]
    fn backup_parses_source_target_and_excludes() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let excluded = source.path().join("skip.txt");
        std::fs::write(&excluded, b"x").unwrap();

        let argv = vec![
            "increbak".to_string(),
            "backup".to_string(),
            source.path().to_string_lossy().into_owned(),
            target.path().to_string_lossy().into_owned(),
            "skip.txt".to_string(),
        ];

        match parse(&argv).unwrap() {
            Command::Backup(inv) => {
                assert_eq!(inv.excludes.len(), 1);
                assert!(inv.excludes[0].ends_with("skip.txt") || inv.excludes[0].contains("skip.txt"));
            }
            Command::Help => panic!("expected Backup"),
        }
    }

    #[test]
    fn log_dir_and_log_level_flags_are_parsed() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let log_dir = tempfile::tempdir().unwrap();

        let argv = vec![
            "increbak".to_string(),
            "backup".to_string(),
            "--log-dir".to_string(),
            log_dir.path().to_string_lossy().into_owned(),
            "--log-level".to_string(),
            "debug".to_string(),
            source.path().to_string_lossy().into_owned(),
            target.path().to_string_lossy().into_owned(),
        ];

        match parse(&argv).unwrap() {
            Command::Backup(inv) => {
                assert_eq!(inv.log_level, "debug");
                assert!(inv.log_dir.is_some());
            }
            Command::Help => panic!("expected Backup"),
        }
    }
}
