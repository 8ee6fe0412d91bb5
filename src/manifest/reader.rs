use std::fs;
use std::path::Path;

use thiserror::Error;

use super::{ManifestDirNode, RecordCode};
use crate::error::FsError;
use crate::paths::newline_decode;

#[derive(Debug, Error)]
pub enum ManifestParseError {
    #[error("manifest I/O failure: {0}")]
    Io(#[from] FsError),

    #[error("manifest parse error at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Parse a manifest file into its [`ManifestTree`](super::ManifestTree).
///
/// A bad manifest yields no tree at all — the 1-based line number of the
/// first offending line is reported, but partial results are never
/// surfaced, since a half-applied tree would silently understate what the
/// backup actually did.
pub fn read_manifest(path: &Path) -> Result<ManifestDirNode, ManifestParseError> {
    let contents =
        fs::read_to_string(path).map_err(|e| FsError::classify(e, path.to_path_buf()))?;

    let mut stack = vec![ManifestDirNode::root()];

    for (idx, line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        if line.is_empty() {
            continue;
        }

        let (code_str, arg_str) = line.split_once(';').ok_or_else(|| {
            ManifestParseError::Malformed {
                line: line_no,
                reason: format!("missing ';' separator: {line:?}"),
            }
        })?;

        let code = RecordCode::parse(code_str).ok_or_else(|| ManifestParseError::Malformed {
            line: line_no,
            reason: format!("unknown record code: {code_str:?}"),
        })?;

        let arg = newline_decode(arg_str);

        match code {
            RecordCode::Enter => {
                let top = stack.last_mut().expect("stack never empties");
                if top.find_child_mut(&arg).is_none() {
                    top.children.push(ManifestDirNode {
                        name: arg.clone(),
                        ..Default::default()
                    });
                }
                let slot = top
                    .children
                    .iter()
                    .position(|c| crate::paths::path_equal(&c.name, &arg))
                    .expect("just inserted or already present");
                let child = std::mem::take(&mut top.children[slot]);
                stack.push(child);
            }
            RecordCode::Leave => {
                if !arg.is_empty() {
                    return Err(ManifestParseError::Malformed {
                        line: line_no,
                        reason: "leave record carries a non-empty argument".to_string(),
                    });
                }
                if stack.len() <= 1 {
                    return Err(ManifestParseError::Malformed {
                        line: line_no,
                        reason: "leave with an empty directory stack".to_string(),
                    });
                }
                let finished = stack.pop().expect("checked len above");
                let parent = stack.last_mut().expect("stack never empties");
                let slot = parent
                    .children
                    .iter()
                    .position(|c| crate::paths::path_equal(&c.name, &finished.name))
                    .expect("child was pushed under this name");
                parent.children[slot] = finished;
            }
            RecordCode::DirectoryRemoved => {
                stack.last_mut().unwrap().removed_dirs.push(arg);
            }
            RecordCode::FileCopied => {
                stack.last_mut().unwrap().copied_files.push(arg);
            }
            RecordCode::FileRemoved => {
                stack.last_mut().unwrap().removed_files.push(arg);
            }
        }
    }

    if stack.len() != 1 {
        return Err(ManifestParseError::Malformed {
            line: contents.lines().count(),
            reason: "manifest ended with unbalanced enter/leave nesting".to_string(),
        });
    }

    Ok(stack.pop().expect("checked len == 1"))
}
