//! Doc Locker - single-file, PIN-protected document container
//!
//! This crate stores many small documents in one container file, each
//! optionally run-length compressed and XOR-enciphered with a key stream
//! derived from a master PIN. It provides:
//! - A binary container format (v2, reads legacy v1)
//! - Two access roles: admin (master PIN) and public (read-only, public entries)
//! - Per-entry content digests, verified on extraction
//! - PIN rotation that re-keys every encrypted entry
//! - Memory hygiene with zeroize on drop for PINs and key streams
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!     ↓ open / add / extract / edit / remove / list / search / change_pin / close
//! Locker (role gate, dirty tracking)
//!     ├── codec   (run-length encoding)
//!     ├── crypto  (key stream, XOR cipher, PIN and content digests)
//!     └── Index   (insertion-ordered entries)
//!     ↓ save / load whole container
//! storage + format (header, entry records)
//!     ↓ read_file / write_file
//! FileSystem (native / in-memory)
//!     ↓
//! locker.dat: [magic][version][count][pin][entry 1][entry 2]...
//! ```
//!
//! # Security Notes
//!
//! The cipher is a repeating XOR stream keyed by a short PIN. It hides
//! content from casual inspection only and offers no confidentiality
//! against an attacker holding the container. The PIN is stored in the
//! clear inside the header.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod crypto;
pub mod entry;
pub mod format;
pub mod fs;
pub mod locker;
pub mod storage;

pub use codec::{compress, compress_bound, decompress, CodecError, MAX_RUN};
pub use config::LockerConfig;
pub use crypto::{
    content_digest, derive_key_stream, pin_digest, pins_match, xor_cipher, CryptoError, KeyStream,
};
pub use entry::{Entry, EntryFlags, EntryInfo, Index};
pub use format::{FormatVersion, CONTAINER_MAGIC, HEADER_SIZE};
pub use fs::{FileSystem, InMemoryFs, NativeFs};
pub use locker::{AddOptions, EditRequest, Listing, Locker, LockerError, LockerState, Role};
pub use storage::StorageError;
