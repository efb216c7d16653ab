//! Locker facade: role-gated operations over one open container.
//!
//! Manages the lifecycle of a locker session:
//! - Open (create the container if missing, load the index, pick a role)
//! - Add / extract / edit / remove documents
//! - List and search, filtered by role
//! - Change the master PIN (re-keys every encrypted entry)
//! - Close (persist if anything changed, drop all buffers)
//!
//! # Pipeline
//!
//! ```text
//! add:     original ─► digest ─► RLE (raw on failure) ─► XOR(PIN) ─► Entry
//! extract: Entry ─► XOR(PIN) ─► RLE⁻¹ (capacity = original size) ─► verify digest
//! ```
//!
//! # Concurrency
//!
//! `Locker` performs no internal synchronization. It is `Send` when its
//! filesystem is, and sharing it across threads requires an external lock.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::codec;
use crate::config::LockerConfig;
use crate::crypto::{content_digest, derive_key_stream, pins_match, CryptoError};
use crate::entry::{Entry, EntryFlags, EntryInfo, Index};
use crate::format::FormatVersion;
use crate::fs::FileSystem;
use crate::storage::{self, StorageError};

// ============================================================
// TYPES
// ============================================================

/// Access level of an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Authenticated with the master PIN; full access
    Admin,
    /// No PIN; read-only access to public entries
    Public,
}

impl Role {
    fn can_see(self, entry: &Entry) -> bool {
        match self {
            Self::Admin => true,
            Self::Public => entry.is_public,
        }
    }
}

/// Locker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockerState {
    /// No container open
    Closed,
    /// Container open with the given role
    Open(Role),
}

/// Error types for locker operations
#[derive(Debug, thiserror::Error)]
pub enum LockerError {
    #[error("Locker is not open")]
    NotOpen,
    #[error("Locker already open")]
    AlreadyOpen,
    #[error("Wrong PIN")]
    WrongPin,
    #[error("Operation requires the admin role")]
    Forbidden,
    #[error("No entry titled {0:?}")]
    NotFound(String),
    #[error("Title is empty or too long")]
    InvalidTitle,
    #[error("PIN is empty or too long")]
    InvalidPin,
    #[error("An entry titled {0:?} already exists")]
    DuplicateTitle(String),
    #[error("Entry {title:?} is corrupted: {reason}")]
    Corrupted { title: String, reason: String },
    #[error("Entry {title:?} failed its integrity check: expected {expected:#010x}, got {actual:#010x}")]
    IntegrityMismatch { title: String, expected: u32, actual: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// How a new document is stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Run-length compress the content
    pub compress: bool,
    /// Encipher with the master PIN key stream
    pub encrypt: bool,
    /// Visible to the public role
    pub public: bool,
}

impl AddOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }
}

/// Changes applied by [`Locker::edit`]; unset fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub new_title: Option<String>,
    pub content: Option<Vec<u8>>,
    pub is_public: Option<bool>,
    pub compress: Option<bool>,
    pub encrypt: Option<bool>,
}

impl EditRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rename(mut self, title: impl Into<String>) -> Self {
        self.new_title = Some(title.into());
        self
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    #[must_use]
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = Some(encrypt);
        self
    }
}

/// Result of [`Locker::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Visible entries in insertion order
    Entries(Vec<EntryInfo>),
    /// Public session with nothing visible
    NoPublicFiles,
}

// ============================================================
// PAYLOAD PIPELINE
// ============================================================

/// Transformed content ready to become an entry
struct Encoded {
    payload: Vec<u8>,
    flags: EntryFlags,
    content_hash: u32,
}

/// Digest, then optionally compress and encipher `content`
///
/// Compression failure falls back to storing the bytes raw. Empty content
/// has no key material and is always stored untransformed.
fn encode_payload(
    content: &[u8],
    compress: bool,
    encrypt: bool,
    pin: &str,
) -> Result<Encoded, LockerError> {
    let content_hash = content_digest(content);
    let mut flags = EntryFlags::empty();

    if content.is_empty() {
        return Ok(Encoded { payload: Vec::new(), flags, content_hash });
    }

    let mut payload = if compress {
        let (payload, packed) = compress_or_raw(content, codec::compress_bound(content.len()));
        flags.set(EntryFlags::COMPRESSED, packed);
        payload
    } else {
        content.to_vec()
    };

    if encrypt {
        let key = derive_key_stream(pin, payload.len())?;
        key.apply(&mut payload);
        flags.insert(EntryFlags::ENCRYPTED);
    }

    Ok(Encoded { payload, flags, content_hash })
}

/// Compress into `capacity` bytes, or copy verbatim if that fails
///
/// The flag says whether the returned bytes are compressed.
fn compress_or_raw(content: &[u8], capacity: usize) -> (Vec<u8>, bool) {
    match codec::compress(content, capacity) {
        Ok(packed) => (packed, true),
        Err(err) => {
            warn!(%err, "compression failed, storing raw");
            (content.to_vec(), false)
        }
    }
}

fn corrupted(entry: &Entry, reason: impl Into<String>) -> LockerError {
    LockerError::Corrupted {
        title: entry.title.clone(),
        reason: reason.into(),
    }
}

/// Undo the stored transforms of `entry` and verify the result
///
/// Nothing is returned unless the decoded length matches the recorded
/// original size and, when a digest is recorded, the digest matches too.
fn decode_payload(entry: &Entry, pin: &str) -> Result<Vec<u8>, LockerError> {
    let mut data = entry.payload().to_vec();

    if entry.flags.is_encrypted() && !data.is_empty() {
        let key = derive_key_stream(pin, data.len())?;
        key.apply(&mut data);
    }

    let original_size = usize::try_from(entry.original_size)
        .map_err(|_| corrupted(entry, "original size exceeds address space"))?;

    let data = if entry.flags.is_compressed() {
        codec::decompress(&data, original_size).map_err(|err| corrupted(entry, err.to_string()))?
    } else {
        data
    };

    if data.len() != original_size {
        return Err(corrupted(
            entry,
            format!("decoded {} bytes, expected {}", data.len(), original_size),
        ));
    }

    if let Some(expected) = entry.content_hash {
        let actual = content_digest(&data);
        if actual != expected {
            warn!(title = %entry.title, "content digest mismatch");
            return Err(LockerError::IntegrityMismatch {
                title: entry.title.clone(),
                expected,
                actual,
            });
        }
    }

    Ok(data)
}

/// New payload for `entry` keyed to `new_pin`, or `None` if it is not enciphered
fn rekey(entry: &Entry, old_pin: &str, new_pin: &str) -> Result<Option<Vec<u8>>, CryptoError> {
    if !entry.flags.is_encrypted() || entry.payload().is_empty() {
        return Ok(None);
    }
    let len = entry.payload().len();
    let old_key = derive_key_stream(old_pin, len)?;
    let new_key = derive_key_stream(new_pin, len)?;

    let mut payload = entry.payload().to_vec();
    old_key.apply(&mut payload);
    new_key.apply(&mut payload);
    Ok(Some(payload))
}

/// Record a digest for every entry that lacks one
///
/// Used when a legacy container is upgraded. An entry that fails to decode
/// keeps `None`, so the open still succeeds and the failure surfaces on
/// extract instead. Returns how many entries gained a digest.
fn backfill_digests(index: &mut Index, pin: &str) -> usize {
    let mut count = 0;
    for entry in index.iter_mut().filter(|e| e.content_hash.is_none()) {
        match decode_payload(entry, pin) {
            Ok(plain) => {
                entry.content_hash = Some(content_digest(&plain));
                count += 1;
            }
            Err(err) => warn!(title = %entry.title, %err, "legacy entry left without digest"),
        }
    }
    count
}

// ============================================================
// SESSION
// ============================================================

/// State of one open container
struct Session {
    index: Index,
    /// Master PIN (zeroized on drop)
    pin: Zeroizing<String>,
    path: PathBuf,
    role: Role,
    /// Index changed since the last save
    dirty: bool,
}

impl Session {
    fn visible<'a>(&'a self) -> impl Iterator<Item = &'a Entry> + 'a {
        self.index.iter().filter(move |e| self.role.can_see(e))
    }

    /// Newest entry with `title` that this role may see
    fn find_visible(&self, title: &str) -> Result<&Entry, LockerError> {
        self.index
            .iter()
            .rev()
            .find(|e| e.title == title && self.role.can_see(e))
            .ok_or_else(|| LockerError::NotFound(title.to_string()))
    }
}

// ============================================================
// LOCKER
// ============================================================

/// Locker facade - handles open/close lifecycle and role-gated operations
pub struct Locker<F: FileSystem> {
    /// Filesystem backend
    fs: F,
    /// Limits and defaults
    config: LockerConfig,
    /// Current open session (if any)
    session: Option<Session>,
}

impl<F: FileSystem> Locker<F> {
    /// Create a locker with the given filesystem and default config
    pub fn new(fs: F) -> Self {
        Self::with_config(fs, LockerConfig::default())
    }

    /// Create a locker with custom configuration
    pub fn with_config(fs: F, config: LockerConfig) -> Self {
        Self { fs, config, session: None }
    }

    /// Get current state
    #[must_use]
    pub fn state(&self) -> LockerState {
        match &self.session {
            Some(session) => LockerState::Open(session.role),
            None => LockerState::Closed,
        }
    }

    /// Role of the open session
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Path of the open container
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Number of entries in the open container, regardless of role
    #[must_use]
    pub fn entry_count(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.index.len())
    }

    #[must_use]
    pub fn config(&self) -> &LockerConfig {
        &self.config
    }

    fn session(&self) -> Result<&Session, LockerError> {
        self.session.as_ref().ok_or(LockerError::NotOpen)
    }

    fn admin_session(&mut self) -> Result<&mut Session, LockerError> {
        let session = self.session.as_mut().ok_or(LockerError::NotOpen)?;
        if session.role != Role::Admin {
            return Err(LockerError::Forbidden);
        }
        Ok(session)
    }

    /// Open the container at `path`
    ///
    /// A non-empty `pin` must match the stored master PIN and grants
    /// [`Role::Admin`]; an empty `pin` grants [`Role::Public`]. A missing
    /// container is created with the configured default PIN first.
    pub fn open(&mut self, path: impl AsRef<Path>, pin: &str) -> Result<Role, LockerError> {
        if self.session.is_some() {
            return Err(LockerError::AlreadyOpen);
        }
        let path = path.as_ref();

        if self.config.create_if_missing && !self.fs.exists(path) {
            storage::create_default(&mut self.fs, path, self.config.default_pin)?;
        }

        let mut loaded = storage::load(&self.fs, path, self.config.max_pin_len)?;

        let role = if pin.is_empty() {
            Role::Public
        } else if pins_match(pin, &loaded.pin) {
            Role::Admin
        } else {
            warn!(path = %path.display(), "PIN mismatch");
            return Err(LockerError::WrongPin);
        };

        info!(
            path = %path.display(),
            ?role,
            entries = loaded.index.len(),
            "locker opened"
        );

        // Admin sessions rewrite legacy containers in the current format on close
        let upgrade = role == Role::Admin && loaded.version != FormatVersion::CURRENT;
        if upgrade {
            let hashed = backfill_digests(&mut loaded.index, &loaded.pin);
            info!(version = loaded.version.as_u32(), hashed, "upgrading legacy container");
        }

        self.session = Some(Session {
            index: loaded.index,
            pin: loaded.pin,
            path: path.to_path_buf(),
            role,
            dirty: upgrade,
        });

        Ok(role)
    }

    /// Persist (if changed) and close the session
    ///
    /// If persisting fails the session stays open so the caller can retry.
    pub fn close(&mut self) -> Result<(), LockerError> {
        self.save()?;
        if let Some(session) = self.session.take() {
            info!(path = %session.path.display(), "locker closed");
        }
        Ok(())
    }

    /// Write the index to disk if it changed since the last save
    pub fn save(&mut self) -> Result<(), LockerError> {
        let session = self.session.as_mut().ok_or(LockerError::NotOpen)?;
        if session.dirty {
            storage::save(&mut self.fs, &session.path, &session.index, &session.pin)?;
            session.dirty = false;
        }
        Ok(())
    }

    /// Discard in-memory changes and re-read the container
    ///
    /// On failure the current index is kept as it was. An admin session
    /// fails with [`LockerError::WrongPin`] if the PIN on disk no longer
    /// matches the session PIN.
    pub fn reload(&mut self) -> Result<(), LockerError> {
        let max_pin_len = self.config.max_pin_len;
        let session = self.session.as_mut().ok_or(LockerError::NotOpen)?;
        let mut loaded = storage::load(&self.fs, &session.path, max_pin_len)?;

        if session.role == Role::Admin && !pins_match(&session.pin, &loaded.pin) {
            return Err(LockerError::WrongPin);
        }

        let upgrade = session.role == Role::Admin && loaded.version != FormatVersion::CURRENT;
        if upgrade {
            backfill_digests(&mut loaded.index, &loaded.pin);
        }

        session.index = loaded.index;
        session.pin = loaded.pin;
        session.dirty = upgrade;
        debug!(entries = session.index.len(), "locker reloaded");
        Ok(())
    }

    /// Store `content` under `title`
    ///
    /// Duplicate titles are not rejected; the newest entry shadows older
    /// ones for lookups.
    pub fn add(&mut self, title: &str, content: &[u8], options: AddOptions) -> Result<(), LockerError> {
        let config = self.config;
        let session = self.admin_session()?;
        if !config.title_is_valid(title) {
            return Err(LockerError::InvalidTitle);
        }

        let encoded = encode_payload(content, options.compress, options.encrypt, &session.pin)?;
        debug!(
            title,
            original = content.len(),
            stored = encoded.payload.len(),
            flags = encoded.flags.bits(),
            "entry added"
        );

        session.index.insert(Entry::new(
            title,
            content.len() as u64,
            encoded.flags,
            Some(encoded.content_hash),
            options.public,
            encoded.payload,
        ));
        session.dirty = true;
        Ok(())
    }

    /// Read `source` through the filesystem and store it under `title`
    pub fn add_file(
        &mut self,
        source: impl AsRef<Path>,
        title: &str,
        options: AddOptions,
    ) -> Result<(), LockerError> {
        self.admin_session()?;
        let content = self.fs.read_file(source.as_ref())?;
        self.add(title, &content, options)
    }

    /// Decode and verify the document stored under `title`
    ///
    /// Entries hidden from the current role are reported as not found.
    pub fn extract(&self, title: &str) -> Result<Vec<u8>, LockerError> {
        let session = self.session()?;
        let entry = session.find_visible(title)?;
        decode_payload(entry, &session.pin)
    }

    /// Extract `title` and write it to `output`
    pub fn extract_to(&mut self, title: &str, output: impl AsRef<Path>) -> Result<(), LockerError> {
        let data = self.extract(title)?;
        self.fs.write_file(output.as_ref(), &data)?;
        debug!(title, output = %output.as_ref().display(), bytes = data.len(), "entry extracted");
        Ok(())
    }

    /// Metadata of a visible entry
    pub fn entry_info(&self, title: &str) -> Result<EntryInfo, LockerError> {
        Ok(self.session()?.find_visible(title)?.info())
    }

    /// Rewrite the entry `title` in place
    ///
    /// Without new content the current content is decoded (and verified)
    /// and re-encoded under the requested flags.
    pub fn edit(&mut self, title: &str, changes: EditRequest) -> Result<(), LockerError> {
        let config = self.config;
        let session = self.admin_session()?;

        let entry = session
            .index
            .get(title)
            .ok_or_else(|| LockerError::NotFound(title.to_string()))?;

        if let Some(new_title) = &changes.new_title {
            if !config.title_is_valid(new_title) {
                return Err(LockerError::InvalidTitle);
            }
            if new_title != title && session.index.contains(new_title) {
                return Err(LockerError::DuplicateTitle(new_title.clone()));
            }
        }

        let content = match changes.content {
            Some(content) => content,
            None => decode_payload(entry, &session.pin)?,
        };
        let compress = changes.compress.unwrap_or(entry.flags.is_compressed());
        let encrypt = changes.encrypt.unwrap_or(entry.flags.is_encrypted());
        let is_public = changes.is_public.unwrap_or(entry.is_public);

        let encoded = encode_payload(&content, compress, encrypt, &session.pin)?;

        let entry = session
            .index
            .get_mut(title)
            .ok_or_else(|| LockerError::NotFound(title.to_string()))?;
        entry.replace_payload(encoded.payload);
        entry.original_size = content.len() as u64;
        entry.flags = encoded.flags;
        entry.content_hash = Some(encoded.content_hash);
        entry.is_public = is_public;
        if let Some(new_title) = changes.new_title {
            entry.title = new_title;
        }

        debug!(title, "entry edited");
        session.dirty = true;
        Ok(())
    }

    /// Remove the entry `title`
    pub fn remove(&mut self, title: &str) -> Result<(), LockerError> {
        let session = self.admin_session()?;
        session
            .index
            .remove(title)
            .ok_or_else(|| LockerError::NotFound(title.to_string()))?;
        debug!(title, "entry removed");
        session.dirty = true;
        Ok(())
    }

    /// Visible entries, or [`Listing::NoPublicFiles`] for an empty public view
    pub fn list(&self) -> Result<Listing, LockerError> {
        let session = self.session()?;
        let entries: Vec<EntryInfo> = session.visible().map(Entry::info).collect();

        if entries.is_empty() && session.role == Role::Public {
            return Ok(Listing::NoPublicFiles);
        }
        Ok(Listing::Entries(entries))
    }

    /// Titles of visible entries containing `pattern`
    pub fn search(&self, pattern: &str) -> Result<Vec<String>, LockerError> {
        let session = self.session()?;
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        Ok(session
            .visible()
            .filter(|e| e.title.contains(pattern))
            .map(|e| e.title.clone())
            .collect())
    }

    /// Replace the master PIN and re-key every encrypted entry
    ///
    /// Every new payload is computed before any entry is touched.
    pub fn change_pin(&mut self, old_pin: &str, new_pin: &str) -> Result<(), LockerError> {
        let config = self.config;
        let session = self.admin_session()?;

        if !pins_match(old_pin, &session.pin) {
            warn!("PIN change rejected: old PIN mismatch");
            return Err(LockerError::WrongPin);
        }
        if !config.pin_is_valid(new_pin) {
            return Err(LockerError::InvalidPin);
        }

        let rekeyed = session
            .index
            .iter()
            .map(|entry| rekey(entry, &session.pin, new_pin))
            .collect::<Result<Vec<_>, _>>()?;

        let mut count = 0usize;
        for (entry, payload) in session.index.iter_mut().zip(rekeyed) {
            if let Some(payload) = payload {
                entry.replace_payload(payload);
                count += 1;
            }
        }

        session.pin = Zeroizing::new(new_pin.to_string());
        session.dirty = true;
        info!(rekeyed = count, "master PIN changed");
        Ok(())
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    const PATH: &str = "locker.dat";

    fn admin_locker(fs: &InMemoryFs) -> Locker<InMemoryFs> {
        let mut locker = Locker::new(fs.clone());
        locker.open(PATH, "admin").unwrap();
        locker
    }

    #[test]
    fn test_lifecycle() {
        let fs = InMemoryFs::new();
        let mut locker = Locker::new(fs.clone());
        assert_eq!(locker.state(), LockerState::Closed);
        assert_eq!(locker.config().default_pin, "admin");

        assert_eq!(locker.open(PATH, "admin").unwrap(), Role::Admin);
        assert_eq!(locker.state(), LockerState::Open(Role::Admin));
        assert_eq!(locker.path(), Some(Path::new(PATH)));
        assert!(fs.exists(Path::new(PATH)));

        locker.close().unwrap();
        assert_eq!(locker.state(), LockerState::Closed);
        assert!(locker.role().is_none());
    }

    #[test]
    fn test_open_twice() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        assert!(matches!(locker.open(PATH, "admin"), Err(LockerError::AlreadyOpen)));
    }

    #[test]
    fn test_wrong_pin_stays_closed() {
        let fs = InMemoryFs::new();
        let mut locker = Locker::new(fs);
        assert!(matches!(locker.open(PATH, "nope"), Err(LockerError::WrongPin)));
        assert_eq!(locker.state(), LockerState::Closed);
    }

    #[test]
    fn test_empty_pin_is_public() {
        let fs = InMemoryFs::new();
        let mut locker = Locker::new(fs);
        assert_eq!(locker.open(PATH, "").unwrap(), Role::Public);
    }

    #[test]
    fn test_missing_container_without_create() {
        let fs = InMemoryFs::new();
        let mut locker = Locker::with_config(fs.clone(), LockerConfig::EXISTING_ONLY);
        assert!(matches!(locker.open(PATH, "admin"), Err(LockerError::Storage(StorageError::Io(_)))));
        assert!(!fs.exists(Path::new(PATH)));
    }

    #[test]
    fn test_operations_require_open() {
        let mut locker = Locker::new(InMemoryFs::new());
        assert!(matches!(locker.add("t", b"x", AddOptions::new()), Err(LockerError::NotOpen)));
        assert!(matches!(locker.extract("t"), Err(LockerError::NotOpen)));
        assert!(matches!(locker.list(), Err(LockerError::NotOpen)));
        assert!(matches!(locker.close(), Err(LockerError::NotOpen)));
    }

    #[test]
    fn test_add_extract_compressed_encrypted() {
        let fs = InMemoryFs::new();
        let mut locker = Locker::with_config(fs, LockerConfig::default().with_default_pin("1234"));
        locker.open(PATH, "1234").unwrap();

        locker
            .add("t", b"AAAAABBBBB", AddOptions::new().compressed().encrypted())
            .unwrap();

        let info = locker.entry_info("t").unwrap();
        assert_eq!(info.flags, EntryFlags::COMPRESSED | EntryFlags::ENCRYPTED);
        assert_eq!(info.original_size, 10);
        assert_eq!(info.stored_size, 4);
        assert_eq!(locker.extract("t").unwrap(), b"AAAAABBBBB");
    }

    #[test]
    fn test_plain_entry_stored_verbatim() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("plain", b"hello", AddOptions::new()).unwrap();

        let info = locker.entry_info("plain").unwrap();
        assert_eq!(info.flags, EntryFlags::empty());
        assert_eq!(info.stored_size, 5);
        assert_eq!(locker.extract("plain").unwrap(), b"hello");
    }

    #[test]
    fn test_empty_content_is_untransformed() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker
            .add("empty", b"", AddOptions::new().compressed().encrypted())
            .unwrap();

        let info = locker.entry_info("empty").unwrap();
        assert_eq!(info.flags, EntryFlags::empty());
        assert_eq!(info.stored_size, 0);
        assert!(locker.extract("empty").unwrap().is_empty());
    }

    #[test]
    fn test_title_validation() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        assert!(matches!(locker.add("", b"x", AddOptions::new()), Err(LockerError::InvalidTitle)));
        let long = "x".repeat(128);
        assert!(matches!(locker.add(&long, b"x", AddOptions::new()), Err(LockerError::InvalidTitle)));
        assert_eq!(locker.entry_count(), Some(0));
    }

    #[test]
    fn test_public_role_is_read_only() {
        let fs = InMemoryFs::new();
        let mut admin = admin_locker(&fs);
        admin.add("pub", b"p", AddOptions::new().public()).unwrap();
        admin.close().unwrap();

        let mut public = Locker::new(fs);
        public.open(PATH, "").unwrap();
        assert!(matches!(public.add("x", b"x", AddOptions::new()), Err(LockerError::Forbidden)));
        assert!(matches!(public.remove("pub"), Err(LockerError::Forbidden)));
        assert!(matches!(public.edit("pub", EditRequest::new()), Err(LockerError::Forbidden)));
        assert!(matches!(public.change_pin("admin", "new"), Err(LockerError::Forbidden)));
        assert_eq!(public.extract("pub").unwrap(), b"p");
    }

    #[test]
    fn test_remove_not_found_vs_forbidden() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        assert!(matches!(locker.remove("ghost"), Err(LockerError::NotFound(_))));

        locker.add("doc", b"1", AddOptions::new()).unwrap();
        locker.remove("doc").unwrap();
        assert!(matches!(locker.extract("doc"), Err(LockerError::NotFound(_))));
    }

    #[test]
    fn test_edit_rename_and_recompress() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("draft", b"zzzzzzzz", AddOptions::new()).unwrap();

        locker
            .edit("draft", EditRequest::new().rename("final").compress(true).public(true))
            .unwrap();

        assert!(matches!(locker.extract("draft"), Err(LockerError::NotFound(_))));
        let info = locker.entry_info("final").unwrap();
        assert_eq!(info.flags, EntryFlags::COMPRESSED);
        assert_eq!(info.stored_size, 2);
        assert!(info.is_public);
        assert_eq!(locker.extract("final").unwrap(), b"zzzzzzzz");
    }

    #[test]
    fn test_edit_replaces_content() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("doc", b"old", AddOptions::new().encrypted()).unwrap();

        locker.edit("doc", EditRequest::new().content(b"brand new".to_vec())).unwrap();

        let info = locker.entry_info("doc").unwrap();
        assert_eq!(info.original_size, 9);
        assert_eq!(info.flags, EntryFlags::ENCRYPTED);
        assert_eq!(locker.extract("doc").unwrap(), b"brand new");
        assert_eq!(locker.entry_count(), Some(1));
    }

    #[test]
    fn test_edit_rename_collision() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("a", b"1", AddOptions::new()).unwrap();
        locker.add("b", b"2", AddOptions::new()).unwrap();

        let err = locker.edit("a", EditRequest::new().rename("b")).unwrap_err();
        assert!(matches!(err, LockerError::DuplicateTitle(t) if t == "b"));
        assert_eq!(locker.extract("a").unwrap(), b"1");
    }

    #[test]
    fn test_change_pin_rekeys_entries() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker
            .add("secret", b"classified material", AddOptions::new().encrypted())
            .unwrap();
        locker.add("plain", b"open", AddOptions::new()).unwrap();

        locker.change_pin("admin", "4321").unwrap();
        assert_eq!(locker.extract("secret").unwrap(), b"classified material");
        assert_eq!(locker.extract("plain").unwrap(), b"open");
    }

    #[test]
    fn test_change_pin_validation() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        assert!(matches!(locker.change_pin("wrong", "1111"), Err(LockerError::WrongPin)));
        assert!(matches!(locker.change_pin("admin", ""), Err(LockerError::InvalidPin)));
        let long = "1".repeat(32);
        assert!(matches!(locker.change_pin("admin", &long), Err(LockerError::InvalidPin)));
    }

    #[test]
    fn test_close_skips_write_when_unchanged() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.close().unwrap();

        fs.reset_write_count(PATH);
        locker.open(PATH, "admin").unwrap();
        let _ = locker.list().unwrap();
        locker.close().unwrap();
        assert_eq!(fs.write_count(PATH), 0);
    }

    #[test]
    fn test_close_failure_keeps_session() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("doc", b"data", AddOptions::new()).unwrap();

        fs.fail_writes(PATH);
        assert!(matches!(locker.close(), Err(LockerError::Storage(StorageError::Io(_)))));
        assert!(locker.is_open());

        fs.clear_failures();
        locker.close().unwrap();
        assert!(!locker.is_open());
    }

    #[test]
    fn test_reload_failure_keeps_index() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("kept", b"in memory", AddOptions::new()).unwrap();

        fs.put_file(PATH, b"garbage".to_vec());
        assert!(locker.reload().is_err());
        assert_eq!(locker.extract("kept").unwrap(), b"in memory");
    }

    #[test]
    fn test_reload_discards_unsaved_changes() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("saved", b"1", AddOptions::new()).unwrap();
        locker.save().unwrap();
        locker.add("unsaved", b"2", AddOptions::new()).unwrap();

        locker.reload().unwrap();
        assert_eq!(locker.entry_count(), Some(1));
        assert!(matches!(locker.extract("unsaved"), Err(LockerError::NotFound(_))));
    }

    #[test]
    fn test_add_file_and_extract_to() {
        let fs = InMemoryFs::new();
        fs.put_file("notes.txt", b"meeting at noon".to_vec());

        let mut locker = admin_locker(&fs);
        locker
            .add_file("notes.txt", "notes", AddOptions::new().compressed().encrypted())
            .unwrap();
        locker.extract_to("notes", "out.txt").unwrap();
        assert_eq!(fs.get_file("out.txt").unwrap(), b"meeting at noon");
    }

    #[test]
    fn test_add_file_missing_source() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        assert!(matches!(
            locker.add_file("absent.txt", "x", AddOptions::new()),
            Err(LockerError::Io(_))
        ));
    }

    #[test]
    fn test_edit_missing_title_is_not_found_before_rename_checks() {
        let fs = InMemoryFs::new();
        let mut locker = admin_locker(&fs);
        locker.add("taken", b"1", AddOptions::new()).unwrap();

        let err = locker.edit("ghost", EditRequest::new().rename("taken")).unwrap_err();
        assert!(matches!(err, LockerError::NotFound(t) if t == "ghost"));
    }

    #[test]
    fn test_compress_fallback_stores_raw() {
        let content = b"abcdef";
        let (payload, packed) = compress_or_raw(content, 4);
        assert!(!packed);
        assert_eq!(payload, content);

        let (payload, packed) = compress_or_raw(b"aaaa", 4);
        assert!(packed);
        assert_eq!(payload, vec![4, b'a']);
    }

    /// v1 container with PIN "admin" and one compressed entry "rle" = "xxxyyy",
    /// plus a second entry whose size field does not match its payload
    fn legacy_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        for v in [0x4C4B_5255u32, 1, 2, 5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(b"admin");
        for (title, original, meta, payload) in
            [("rle", 6u32, 0x01u8, &[3u8, b'x', 3, b'y'][..]), ("bad", 9, 0x01, &[2, b'q'][..])]
        {
            bytes.extend_from_slice(&(title.len() as u32).to_le_bytes());
            bytes.extend_from_slice(title.as_bytes());
            bytes.extend_from_slice(&original.to_le_bytes());
            bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            bytes.push(meta);
            bytes.extend_from_slice(payload);
        }
        bytes
    }

    #[test]
    fn test_admin_open_backfills_legacy_digests() {
        let fs = InMemoryFs::new();
        fs.put_file(PATH, legacy_bytes());

        let mut locker = Locker::new(fs.clone());
        locker.open(PATH, "admin").unwrap();
        let index = &locker.session.as_ref().unwrap().index;
        assert_eq!(index.get("rle").unwrap().content_hash, Some(content_digest(b"xxxyyy")));
        // Undecodable entries keep no digest and fail on extract
        assert_eq!(index.get("bad").unwrap().content_hash, None);
        assert!(matches!(locker.extract("bad"), Err(LockerError::Corrupted { .. })));
    }

    #[test]
    fn test_public_open_leaves_legacy_digests_unset() {
        let fs = InMemoryFs::new();
        fs.put_file(PATH, legacy_bytes());

        let mut locker = Locker::new(fs);
        locker.open(PATH, "").unwrap();
        let index = &locker.session.as_ref().unwrap().index;
        assert!(index.iter().all(|e| e.content_hash.is_none()));
    }
}
