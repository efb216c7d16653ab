//! PIN-keyed stream cipher and digests.
//!
//! - Key stream: deterministic expansion of the master PIN
//! - Stream cipher: in-place XOR, its own inverse
//! - PIN digest: DJB2 rolling hash, used for PIN comparison
//! - Content digest: FNV rolling hash over original (untransformed) bytes
//!
//! # Security Notes
//!
//! None of these primitives are cryptographically strong. The cipher is
//! obfuscation keyed by the PIN and the digests only detect accidental
//! corruption. They are kept bit-exact so existing containers stay readable.
//!
//! - **Zeroize on drop**: `KeyStream` clears its bytes when dropped

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error types for crypto operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("PIN is empty")]
    EmptyPin,
    #[error("Key stream length must be non-zero")]
    ZeroLength,
}

/// Initial accumulator for key stream expansion
const KEY_STREAM_SEED: u8 = 0xA5;

/// DJB2 seed
const PIN_DIGEST_SEED: u32 = 5381;

/// FNV offset basis and prime (32-bit)
const CONTENT_DIGEST_SEED: u32 = 2_166_136_261;
const CONTENT_DIGEST_PRIME: u32 = 16_777_619;

/// Key stream derived from a PIN
/// Automatically zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyStream(Vec<u8>);

impl KeyStream {
    /// Get the key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: derivation refuses zero-length streams
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// XOR `data` in place with this key stream
    pub fn apply(&self, data: &mut [u8]) {
        xor_cipher(data, &self.0);
    }
}

/// Expand `pin` into `length` key bytes
///
/// Each output byte folds the next PIN character (cycling) into an
/// accumulator, then rotates the accumulator left by 3 bits.
pub fn derive_key_stream(pin: &str, length: usize) -> Result<KeyStream, CryptoError> {
    let pin = pin.as_bytes();
    if pin.is_empty() {
        return Err(CryptoError::EmptyPin);
    }
    if length == 0 {
        return Err(CryptoError::ZeroLength);
    }

    let mut acc = KEY_STREAM_SEED;
    let stream = pin
        .iter()
        .cycle()
        .take(length)
        .map(|&c| {
            acc = (acc ^ c).rotate_left(3);
            acc
        })
        .collect();

    Ok(KeyStream(stream))
}

/// XOR every byte of `data` with `key`, cycling the key by position
///
/// Applying it twice with the same key restores the input. An empty key
/// leaves `data` untouched.
pub fn xor_cipher(data: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (byte, k) in data.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

/// DJB2 digest of a PIN (`hash * 33 + byte`)
#[must_use]
pub fn pin_digest(pin: &str) -> u32 {
    pin.bytes().fold(PIN_DIGEST_SEED, |hash, b| {
        hash.wrapping_mul(33).wrapping_add(u32::from(b))
    })
}

/// FNV digest of content (XOR, then multiply, per byte)
#[must_use]
pub fn content_digest(bytes: &[u8]) -> u32 {
    bytes.iter().fold(CONTENT_DIGEST_SEED, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(CONTENT_DIGEST_PRIME)
    })
}

/// Compare two PINs: digest first, then the exact bytes
#[must_use]
pub fn pins_match(a: &str, b: &str) -> bool {
    pin_digest(a) == pin_digest(b) && a.as_bytes() == b.as_bytes()
}
