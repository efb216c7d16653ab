//! Run-length codec for entry payloads.
//!
//! Encodes runs of identical bytes as `(count, value)` pairs, one byte each.
//! A run is capped at 255; longer spans become several pairs.
//!
//! Both directions work against an explicit output capacity. Compression
//! reports [`CodecError::NoRoom`] instead of growing past it, and
//! decompression reports [`CodecError::Overflow`] when the expanded stream
//! would exceed the size the caller expects.

/// Longest run a single pair can describe
pub const MAX_RUN: usize = u8::MAX as usize;

/// Error types for codec operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Output capacity {capacity} too small for compressed stream")]
    NoRoom { capacity: usize },
    #[error("Decompressed stream exceeds capacity {capacity}")]
    Overflow { capacity: usize },
    #[error("Compressed stream ends with a dangling count byte")]
    DanglingByte,
}

/// Capacity that always suffices for `compress` on `len` input bytes
///
/// Worst case is no repetition at all: every byte becomes its own pair.
#[must_use]
pub fn compress_bound(len: usize) -> usize {
    len.saturating_mul(2)
}

/// Compress `input` into at most `capacity` bytes
pub fn compress(input: &[u8], capacity: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(capacity.min(compress_bound(input.len())));
    let mut i = 0;

    while i < input.len() {
        let value = input[i];
        let run = input[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == value)
            .count();

        if out.len() + 2 > capacity {
            return Err(CodecError::NoRoom { capacity });
        }
        // run is in 1..=255
        out.push(run as u8);
        out.push(value);
        i += run;
    }

    Ok(out)
}

/// Expand `input` into at most `capacity` bytes
pub fn decompress(input: &[u8], capacity: usize) -> Result<Vec<u8>, CodecError> {
    if input.len() % 2 != 0 {
        return Err(CodecError::DanglingByte);
    }

    // `capacity` comes from disk; reserve no more than the pairs can expand to
    let mut out = Vec::with_capacity(capacity.min((input.len() / 2).saturating_mul(MAX_RUN)));
    for pair in input.chunks_exact(2) {
        let count = pair[0] as usize;
        if out.len() + count > capacity {
            return Err(CodecError::Overflow { capacity });
        }
        out.resize(out.len() + count, pair[1]);
    }

    Ok(out)
}
