//! The per-backup manifest: a line-oriented, write-ahead log of directory and
//! file operations, plus the tree-shaped reader output that one manifest
//! folds down to ([`ManifestTree`]).

mod reader;
mod writer;

pub use reader::{read_manifest, ManifestParseError};
pub use writer::{ManifestError, ManifestWriter};

/// The two-character record codes, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCode {
    Enter,
    Leave,
    DirectoryRemoved,
    FileCopied,
    FileRemoved,
}

impl RecordCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordCode::Enter => ">d",
            RecordCode::Leave => "<d",
            RecordCode::DirectoryRemoved => "-d",
            RecordCode::FileCopied => "+f",
            RecordCode::FileRemoved => "-f",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">d" => Some(RecordCode::Enter),
            "<d" => Some(RecordCode::Leave),
            "-d" => Some(RecordCode::DirectoryRemoved),
            "+f" => Some(RecordCode::FileCopied),
            "-f" => Some(RecordCode::FileRemoved),
            _ => None,
        }
    }
}

/// One decoded line of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestRecord {
    Enter(String),
    Leave,
    DirectoryRemoved(String),
    FileCopied(String),
    FileRemoved(String),
}

impl ManifestRecord {
    pub fn code(&self) -> RecordCode {
        match self {
            ManifestRecord::Enter(_) => RecordCode::Enter,
            ManifestRecord::Leave => RecordCode::Leave,
            ManifestRecord::DirectoryRemoved(_) => RecordCode::DirectoryRemoved,
            ManifestRecord::FileCopied(_) => RecordCode::FileCopied,
            ManifestRecord::FileRemoved(_) => RecordCode::FileRemoved,
        }
    }

    pub fn argument(&self) -> &str {
        match self {
            ManifestRecord::Enter(name)
            | ManifestRecord::DirectoryRemoved(name)
            | ManifestRecord::FileCopied(name)
            | ManifestRecord::FileRemoved(name) => name,
            ManifestRecord::Leave => "",
        }
    }

    /// Render as the exact line that would be written to `manifest.txt`
    /// (without the trailing newline).
    pub fn encode_line(&self) -> String {
        format!(
            "{};{}",
            self.code().as_str(),
            crate::paths::newline_encode(self.argument())
        )
    }
}

/// The un-folded parse result of a single manifest file: a tree whose nodes
/// mirror the `Enter`/`Leave` nesting, each carrying the direct-child
/// assertions recorded while that directory was the cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDirNode {
    pub name: String,
    pub children: Vec<ManifestDirNode>,
    pub copied_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub removed_dirs: Vec<String>,
}

impl ManifestDirNode {
    fn root() -> Self {
        ManifestDirNode {
            name: String::new(),
            ..Default::default()
        }
    }

    fn find_child_mut(&mut self, name: &str) -> Option<&mut ManifestDirNode> {
        self.children
            .iter_mut()
            .find(|c| crate::paths::path_equal(&c.name, name))
    }
}

/// Alias emphasising that a `ManifestDirNode` read from disk is the root of
/// a whole manifest, i.e. a `ManifestTree`.
pub type ManifestTree = ManifestDirNode;
