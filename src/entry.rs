//! Entries and the in-memory index.
//!
//! - `EntryFlags`: compressed/encrypted bits, packed into the low 7 bits of
//!   the on-disk meta byte
//! - `Entry`: one stored document, owning its transformed payload
//! - `Index`: insertion-ordered collection of entries
//!
//! Enumeration is oldest-first. Lookups by title scan newest-first, so when
//! duplicate titles exist the most recent insertion wins.

use std::fmt;

// ============================================================
// FLAGS
// ============================================================

bitflags::bitflags! {
    /// Per-entry transform flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u8 {
        /// Payload is run-length compressed
        const COMPRESSED = 1 << 0;
        /// Payload is XOR-enciphered with the master PIN key stream
        const ENCRYPTED = 1 << 1;
    }
}

impl EntryFlags {
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    #[must_use]
    pub const fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }
}

// ============================================================
// ENTRY
// ============================================================

/// One stored document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Lookup key
    pub title: String,
    /// Size before compression/encryption
    pub original_size: u64,
    /// Transform flags applied to `payload`
    pub flags: EntryFlags,
    /// Digest of the original bytes; `None` for legacy records (check skipped)
    pub content_hash: Option<u32>,
    /// Visible to the public role
    pub is_public: bool,
    /// Stored (transformed) bytes
    payload: Vec<u8>,
}

impl Entry {
    /// Create a new entry around an already transformed payload
    pub fn new(
        title: impl Into<String>,
        original_size: u64,
        flags: EntryFlags,
        content_hash: Option<u32>,
        is_public: bool,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            title: title.into(),
            original_size,
            flags,
            content_hash,
            is_public,
            payload,
        }
    }

    /// Stored payload size in bytes
    #[must_use]
    pub fn stored_size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Stored (transformed) bytes
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Swap in a new payload, returning the old one
    pub fn replace_payload(&mut self, payload: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.payload, payload)
    }

    /// Summary without payload bytes
    #[must_use]
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            title: self.title.clone(),
            original_size: self.original_size,
            stored_size: self.stored_size(),
            flags: self.flags,
            is_public: self.is_public,
        }
    }
}

/// Entry metadata as shown by listings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    pub title: String,
    pub original_size: u64,
    pub stored_size: u64,
    pub flags: EntryFlags,
    pub is_public: bool,
}

impl fmt::Display for EntryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<30} orig={} stored={} flags=0x{:02X}{}",
            self.title,
            self.original_size,
            self.stored_size,
            self.flags.bits(),
            if self.is_public { " public" } else { "" }
        )
    }
}

// ============================================================
// INDEX
// ============================================================

/// In-memory collection of entries for one open container
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Index {
    entries: Vec<Entry>,
}

impl Index {
    /// Create empty index
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Get number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Mutable entries in insertion order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entry> {
        self.entries.iter_mut()
    }

    /// Add an entry (duplicates are not rejected)
    pub fn insert(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    fn position(&self, title: &str) -> Option<usize> {
        self.entries.iter().rposition(|e| e.title == title)
    }

    /// Find the most recently added entry with this title
    #[must_use]
    pub fn get(&self, title: &str) -> Option<&Entry> {
        self.position(title).map(|i| &self.entries[i])
    }

    /// Find mutable reference to the most recently added entry with this title
    #[must_use]
    pub fn get_mut(&mut self, title: &str) -> Option<&mut Entry> {
        self.position(title).map(move |i| &mut self.entries[i])
    }

    /// Check if any entry has this title
    #[must_use]
    pub fn contains(&self, title: &str) -> bool {
        self.position(title).is_some()
    }

    /// Unlink and return the most recently added entry with this title
    pub fn remove(&mut self, title: &str) -> Option<Entry> {
        self.position(title).map(|i| self.entries.remove(i))
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ============================================================
// TESTS
// ============================================================
