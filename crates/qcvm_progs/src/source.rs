//! Where program images come from.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use qcvm_foundation::{Error, ErrorKind, Result};

/// Fetches raw image bytes by file name.
pub trait ContentSource {
    /// Reads the whole file called `name`.
    fn fetch(&self, name: &str) -> Result<Vec<u8>>;
}

/// In-memory files, for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }
}

impl ContentSource for MemorySource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::Io(format!("{name}: not found"))))
    }
}

/// Files under a directory on disk.
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Serves files relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSource for DirSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let rel = Path::new(name);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::new(ErrorKind::Io(format!(
                "{name}: path escapes content root"
            ))));
        }
        std::fs::read(self.root.join(rel))
            .map_err(|e| Error::new(ErrorKind::Io(format!("{name}: {e}"))))
    }
}
