use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

use super::ManifestRecord;
use crate::error::FsError;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest I/O failure: {0}")]
    Io(#[from] FsError),

    /// `leave()` was called with the cursor already at the manifest root.
    /// A correctly driven traversal never triggers this; it exists so the
    /// orchestrator can map it to the programmer-error exit code rather than
    /// silently underflowing the cursor.
    #[error("invariant violation: leave() called at depth 0")]
    DepthUnderflow,
}

/// Streaming writer for `manifest.txt`.
///
/// Opens (create-or-truncate) the file on construction and appends one
/// record per call, flushing to the OS after every write. This is the
/// core's durability contract: a crash between two calls leaves a manifest
/// that still parses cleanly up to the last flushed record.
pub struct ManifestWriter {
    file: File,
    path: PathBuf,
    depth: u32,
}

impl ManifestWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| FsError::classify(e, path.clone()))?;
        Ok(ManifestWriter {
            file,
            path,
            depth: 0,
        })
    }

    /// Current nesting depth relative to the source root (0 at the root).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn enter(&mut self, name: &str) -> Result<(), ManifestError> {
        self.write_record(&ManifestRecord::Enter(name.to_string()))?;
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) -> Result<(), ManifestError> {
        if self.depth == 0 {
            return Err(ManifestError::DepthUnderflow);
        }
        self.write_record(&ManifestRecord::Leave)?;
        self.depth -= 1;
        Ok(())
    }

    pub fn directory_removed(&mut self, name: &str) -> Result<(), ManifestError> {
        self.write_record(&ManifestRecord::DirectoryRemoved(name.to_string()))
    }

    pub fn file_copied(&mut self, name: &str) -> Result<(), ManifestError> {
        self.write_record(&ManifestRecord::FileCopied(name.to_string()))
    }

    pub fn file_removed(&mut self, name: &str) -> Result<(), ManifestError> {
        self.write_record(&ManifestRecord::FileRemoved(name.to_string()))
    }

    fn write_record(&mut self, record: &ManifestRecord) -> Result<(), ManifestError> {
        let line = record.encode_line();
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.write_all(b"\n"))
            .and_then(|_| self.file.flush())
            .map_err(|e| FsError::classify(e, self.path.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_balanced_enter_leave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.txt");
        let mut w = ManifestWriter::create(&path).unwrap();
        assert_eq!(w.depth(), 0);
        w.enter("sub").unwrap();
        assert_eq!(w.depth(), 1);
        w.file_copied("b.txt").unwrap();
        w.leave().unwrap();
        assert_eq!(w.depth(), 0);
        w.file_copied("a.txt").unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, ">d;sub\n+f;b.txt\n<d;\n+f;a.txt\n");
    }

    #[test]
    fn leave_at_depth_zero_is_an_invariant_violation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.txt");
        let mut w = ManifestWriter::create(&path).unwrap();
        assert!(matches!(w.leave(), Err(ManifestError::DepthUnderflow)));
    }

    #[test]
    fn names_are_newline_encoded_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.txt");
        let mut w = ManifestWriter::create(&path).unwrap();
        w.file_copied("weird\nname").unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "+f;weird\\nname\n");
    }
}
