//! FileSystem trait for abstracting whole-file reads and writes.
//!
//! The locker only ever reads or writes a file in one piece, so the
//! backends are small:
//! - Native fs (via `std::fs`)
//! - In-memory (for testing)
//!
//! # Notes
//!
//! - The FileSystem trait itself has no transform logic - compression and
//!   encryption happen in the locker before bytes reach this layer
//! - `InMemoryFs` is for testing only

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Abstract filesystem operations
pub trait FileSystem {
    /// Read a whole file
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace a whole file with `data`, creating it if needed
    fn write_file(&mut self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Check whether a file exists
    fn exists(&self, path: &Path) -> bool;
}

/// Filesystem backed by the host OS
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFs;

impl NativeFs {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for NativeFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_file(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory filesystem for testing
/// Uses Rc<RefCell<...>> so clones share the same underlying storage
#[derive(Default, Clone)]
pub struct InMemoryFs {
    files: Rc<RefCell<HashMap<PathBuf, Vec<u8>>>>,
    /// Write counters per file (for testing write avoidance)
    write_counts: Rc<RefCell<HashMap<PathBuf, usize>>>,
    /// Paths whose writes fail (for testing error paths)
    failing: Rc<RefCell<Vec<PathBuf>>>,
}

impl InMemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of file contents (for testing)
    #[must_use]
    pub fn get_file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.borrow().get(path.as_ref()).cloned()
    }

    /// Put a file in place without counting it as a write (for testing)
    pub fn put_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        self.files
            .borrow_mut()
            .insert(path.as_ref().to_path_buf(), data.into());
    }

    /// Get write count for a file (for testing)
    #[must_use]
    pub fn write_count(&self, path: impl AsRef<Path>) -> usize {
        *self.write_counts.borrow().get(path.as_ref()).unwrap_or(&0)
    }

    /// Reset write count for a file (for testing)
    pub fn reset_write_count(&self, path: impl AsRef<Path>) {
        self.write_counts
            .borrow_mut()
            .insert(path.as_ref().to_path_buf(), 0);
    }

    /// Make every later write to `path` fail (for testing)
    pub fn fail_writes(&self, path: impl AsRef<Path>) {
        self.failing.borrow_mut().push(path.as_ref().to_path_buf());
    }

    /// Undo `fail_writes` for every path
    pub fn clear_failures(&self) {
        self.failing.borrow_mut().clear();
    }
}

impl FileSystem for InMemoryFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write_file(&mut self, path: &Path, data: &[u8]) -> io::Result<()> {
        if self.failing.borrow().iter().any(|p| p == path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                path.display().to_string(),
            ));
        }

        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), data.to_vec());

        // Increment write counter
        *self
            .write_counts
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }
}
