//! Storage engine: moves whole containers between the index and a file.
//!
//! `save` encodes the full container in memory and hands it to the
//! filesystem in one write. `load` reads the whole file and decodes it into
//! a fresh [`Index`]; callers only replace their state once decoding has
//! fully succeeded, so a failed load never leaves a half-built index behind.

use std::path::Path;

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::entry::Index;
use crate::format::{self, FormatVersion};
use crate::fs::FileSystem;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },
    #[error("Unsupported container version {0}")]
    UnsupportedVersion(u32),
    #[error("Unexpected end of container while reading {context}")]
    UnexpectedEof { context: &'static str },
    #[error("{0} trailing bytes after the last entry")]
    TrailingBytes(usize),
    #[error("Invalid UTF-8 in {context}")]
    InvalidUtf8 { context: &'static str },
    #[error("{what} of {size} bytes does not fit the container format")]
    TooLarge { what: &'static str, size: u64 },
}

/// Index and PIN read back from disk
pub struct Loaded {
    pub index: Index,
    pub pin: Zeroizing<String>,
    pub version: FormatVersion,
}

/// Write `index` and `master_pin` to `path` as a current-version container
///
/// A failed write may leave a partial file behind; it is reported, not
/// rolled back.
pub fn save<F: FileSystem>(
    fs: &mut F,
    path: &Path,
    index: &Index,
    master_pin: &str,
) -> Result<(), StorageError> {
    let bytes = format::encode(index, master_pin)?;
    fs.write_file(path, &bytes)?;
    debug!(path = %path.display(), entries = index.len(), bytes = bytes.len(), "container saved");
    Ok(())
}

/// Read and decode the container at `path`
///
/// The stored PIN is truncated to `max_pin_len` bytes.
pub fn load<F: FileSystem>(
    fs: &F,
    path: &Path,
    max_pin_len: usize,
) -> Result<Loaded, StorageError> {
    let bytes = Zeroizing::new(fs.read_file(path)?);
    let container = format::decode(&bytes, max_pin_len)?;
    debug!(
        path = %path.display(),
        version = container.version.as_u32(),
        entries = container.index.len(),
        "container loaded"
    );
    Ok(Loaded {
        index: container.index,
        pin: container.pin,
        version: container.version,
    })
}

/// Write an empty container holding `default_pin`
pub fn create_default<F: FileSystem>(
    fs: &mut F,
    path: &Path,
    default_pin: &str,
) -> Result<(), StorageError> {
    save(fs, path, &Index::new(), default_pin)?;
    info!(path = %path.display(), "created empty container");
    Ok(())
}
