//! Schema corpus access

use crate::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// File suffix of NXDL definitions
pub const NXDL_SUFFIX: &str = ".nxdl.xml";

/// Source of raw definition documents, looked up by class name
pub trait SchemaSource: Send + Sync {
    /// Fetch the document defining `name`, or `None` if the corpus has none
    fn fetch(&self, name: &str) -> Result<Option<String>>;

    /// Human readable description used in not-found errors
    fn describe(&self) -> String;
}

/// Corpus rooted at one or more directories, searched recursively for
/// `<name>.nxdl.xml`
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    roots: Vec<PathBuf>,
}

impl DirectoryCorpus {
    /// Create a corpus searching the given directories in order
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Add a search directory
    pub fn add_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    fn find_in(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
        let candidate = dir.join(file_name);
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        let mut subdirs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                subdirs.push(path);
            }
        }
        // Deterministic search order across platforms
        subdirs.sort();
        for sub in subdirs {
            if let Some(found) = Self::find_in(&sub, file_name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

impl SchemaSource for DirectoryCorpus {
    fn fetch(&self, name: &str) -> Result<Option<String>> {
        let file_name = format!("{name}{NXDL_SUFFIX}");
        for root in &self.roots {
            if !root.is_dir() {
                trace!(root = %root.display(), "Skipping missing corpus directory");
                continue;
            }
            if let Some(path) = Self::find_in(root, &file_name)? {
                trace!(class = name, path = %path.display(), "Found definition file");
                return Ok(Some(fs::read_to_string(path)?));
            }
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        format!("search paths {:?}", self.roots)
    }
}

/// In-memory corpus, mostly for tests and embedded definitions
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    documents: HashMap<String, String>,
}

impl MemoryCorpus {
    /// Create an empty corpus
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under a class name
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, document: impl Into<String>) -> Self {
        self.insert(name, document);
        self
    }

    /// Add or replace a document
    pub fn insert(&mut self, name: impl Into<String>, document: impl Into<String>) {
        self.documents.insert(name.into(), document.into());
    }
}

impl SchemaSource for MemoryCorpus {
    fn fetch(&self, name: &str) -> Result<Option<String>> {
        Ok(self.documents.get(name).cloned())
    }

    fn describe(&self) -> String {
        format!("in-memory corpus of {} definitions", self.documents.len())
    }
}
