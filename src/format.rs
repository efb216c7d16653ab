//! Container binary format.
//!
//! # Binary Layout (v2, all integers u32 little-endian)
//!
//! ```text
//! Field          Size
//! -----          ----
//! magic          4      0x4C4B5255
//! version        4      1 or 2
//! entry_count    4
//! pin_length     4
//! pin            pin_length
//! entry_count times:
//!   title_length   4
//!   title          title_length
//!   original_size  4
//!   stored_size    4
//!   content_hash   4    (v2 only)
//!   meta           1    bits 0-6 flags, bit 7 public
//!   payload        stored_size
//! ```
//!
//! Payload bytes are written exactly as the locker produced them; this
//! module never compresses or enciphers anything.

// Length fields are u32 on disk; every narrowing cast is checked first
#![allow(clippy::cast_possible_truncation)]

use zeroize::Zeroizing;

use crate::entry::{Entry, EntryFlags, Index};
use crate::storage::StorageError;

// ============================================================
// CONSTANTS
// ============================================================

/// File magic
pub const CONTAINER_MAGIC: u32 = 0x4C4B_5255;

/// Size of the fixed header (magic, version, entry count)
pub const HEADER_SIZE: usize = 12;

/// Bit 7 of the meta byte marks a public entry
const META_PUBLIC: u8 = 0x80;

/// Low 7 bits of the meta byte carry the flags
const META_FLAGS_MASK: u8 = 0x7F;

// ============================================================
// VERSION
// ============================================================

/// On-disk schema version
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatVersion {
    /// No per-entry content hash
    V1,
    /// Adds a 32-bit content hash per entry
    V2,
}

impl FormatVersion {
    /// Version every writer emits
    pub const CURRENT: Self = Self::V2;

    /// Numeric tag stored in the header
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Parse the header tag
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }

    /// Whether entries carry a content hash field
    #[must_use]
    pub const fn has_content_hash(self) -> bool {
        matches!(self, Self::V2)
    }
}

// ============================================================
// CONTAINER
// ============================================================

/// Fully decoded container
pub struct Container {
    /// Version found on disk
    pub version: FormatVersion,
    /// Master PIN (truncated to the caller's limit)
    pub pin: Zeroizing<String>,
    /// Rebuilt index
    pub index: Index,
}

fn len_u32(what: &'static str, len: u64) -> Result<u32, StorageError> {
    u32::try_from(len).map_err(|_| StorageError::TooLarge { what, size: len })
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Encode an index and master PIN as a current-version container
pub fn encode(index: &Index, pin: &str) -> Result<Vec<u8>, StorageError> {
    let body: usize = index
        .iter()
        .map(|e| 17 + e.title.len() + e.payload().len())
        .sum();
    let mut buf = Vec::with_capacity(HEADER_SIZE + 4 + pin.len() + body);

    put_u32(&mut buf, CONTAINER_MAGIC);
    put_u32(&mut buf, FormatVersion::CURRENT.as_u32());
    put_u32(&mut buf, len_u32("entry count", index.len() as u64)?);

    put_u32(&mut buf, len_u32("PIN", pin.len() as u64)?);
    buf.extend_from_slice(pin.as_bytes());

    for entry in index {
        put_u32(&mut buf, len_u32("title", entry.title.len() as u64)?);
        buf.extend_from_slice(entry.title.as_bytes());
        put_u32(&mut buf, len_u32("original size", entry.original_size)?);
        put_u32(&mut buf, len_u32("payload", entry.stored_size())?);
        put_u32(&mut buf, entry.content_hash.unwrap_or(0));

        let mut meta = entry.flags.bits() & META_FLAGS_MASK;
        if entry.is_public {
            meta |= META_PUBLIC;
        }
        buf.push(meta);
        buf.extend_from_slice(entry.payload());
    }

    Ok(buf)
}

/// Cursor over container bytes
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], StorageError> {
        if len > self.remaining() {
            return Err(StorageError::UnexpectedEof { context });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, StorageError> {
        Ok(self.take(1, context)?[0])
    }

    fn u32(&mut self, context: &'static str) -> Result<u32, StorageError> {
        let bytes = self.take(4, context)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self, context: &'static str) -> Result<String, StorageError> {
        let len = self.u32(context)? as usize;
        let bytes = self.take(len, context)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| StorageError::InvalidUtf8 { context })
    }
}

/// Truncate to at most `max` bytes without splitting a character
fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Decode a container of any supported version
///
/// The PIN is truncated to `max_pin_len` bytes; excess PIN bytes are
/// skipped rather than rejected. Nothing is returned unless every declared
/// entry was read and no bytes remain.
pub fn decode(bytes: &[u8], max_pin_len: usize) -> Result<Container, StorageError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.u32("header")?;
    if magic != CONTAINER_MAGIC {
        return Err(StorageError::InvalidMagic {
            expected: CONTAINER_MAGIC,
            found: magic,
        });
    }

    let raw_version = reader.u32("header")?;
    let version =
        FormatVersion::from_u32(raw_version).ok_or(StorageError::UnsupportedVersion(raw_version))?;
    let count = reader.u32("header")?;

    let mut pin = Zeroizing::new(reader.string("master PIN")?);
    truncate_on_char_boundary(&mut pin, max_pin_len);

    let mut index = Index::new();
    for _ in 0..count {
        let title = reader.string("entry title")?;
        let original_size = u64::from(reader.u32("entry sizes")?);
        let stored_size = reader.u32("entry sizes")? as usize;
        let content_hash = if version.has_content_hash() {
            // A zero hash is a record written before hashing existed
            Some(reader.u32("content hash")?).filter(|&h| h != 0)
        } else {
            None
        };
        let meta = reader.u8("entry meta")?;
        let payload = reader.take(stored_size, "entry payload")?.to_vec();

        index.insert(Entry::new(
            title,
            original_size,
            EntryFlags::from_bits_truncate(meta & META_FLAGS_MASK),
            content_hash,
            meta & META_PUBLIC != 0,
            payload,
        ));
    }

    if reader.remaining() != 0 {
        return Err(StorageError::TrailingBytes(reader.remaining()));
    }

    Ok(Container { version, pin, index })
}

// ============================================================
// TESTS
// ============================================================
