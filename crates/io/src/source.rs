//! Source-file abstraction and an in-memory implementation.
//!
//! The pipeline only needs three things from a model output file: whether it
//! holds a variable, the variable itself with its dimension names, and the
//! file's path for diagnostics. [`SourceFile`] captures that contract;
//! [`SourceReader`] opens files by path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::IoError;
use crate::raw::RawVariable;

/// An opened model output file.
pub trait SourceFile {
    /// Path the file was opened from.
    fn path(&self) -> &Path;

    /// Returns `true` if the file contains a variable called `name`.
    fn has_variable(&self, name: &str) -> bool;

    /// Read a variable in full, together with its dimension names.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingVariable`] if `name` is absent, or a
    /// format-specific error if the read fails.
    fn read_variable(&self, name: &str) -> Result<RawVariable, IoError>;

    /// Read the first variable that exists among `aliases`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingVariable`] naming the first alias if none of
    /// them is present.
    fn read_first_of(&self, aliases: &[&str]) -> Result<RawVariable, IoError> {
        match aliases.iter().find(|a| self.has_variable(a)) {
            Some(name) => self.read_variable(name),
            None => Err(IoError::MissingVariable {
                name: aliases.first().copied().unwrap_or("unknown").to_string(),
                path: self.path().to_path_buf(),
            }),
        }
    }
}

/// Opens [`SourceFile`]s by path.
pub trait SourceReader {
    /// Open the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] if nothing exists at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn SourceFile>, IoError>;
}

/// A [`SourceFile`] held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    path: PathBuf,
    variables: BTreeMap<String, RawVariable>,
}

impl MemorySource {
    /// Create an empty source that reports `path` as its origin.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Add (or replace) a variable.
    pub fn with_variable(mut self, var: RawVariable) -> Self {
        self.variables.insert(var.name().to_string(), var);
        self
    }

    /// Remove a variable, if present.
    pub fn without_variable(mut self, name: &str) -> Self {
        self.variables.remove(name);
        self
    }
}

impl SourceFile for MemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn read_variable(&self, name: &str) -> Result<RawVariable, IoError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| IoError::MissingVariable {
                name: name.to_string(),
                path: self.path.clone(),
            })
    }
}

/// A [`SourceReader`] over a fixed set of [`MemorySource`]s keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: BTreeMap<PathBuf, MemorySource>,
}

impl MemoryReader {
    /// Create a reader with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under its own path.
    pub fn with_file(mut self, source: MemorySource) -> Self {
        self.files.insert(source.path.clone(), source);
        self
    }
}

impl SourceReader for MemoryReader {
    fn open(&self, path: &Path) -> Result<Box<dyn SourceFile>, IoError> {
        self.files
            .get(path)
            .cloned()
            .map(|s| Box::new(s) as Box<dyn SourceFile>)
            .ok_or_else(|| IoError::FileNotFound {
                path: path.to_path_buf(),
            })
    }
}
