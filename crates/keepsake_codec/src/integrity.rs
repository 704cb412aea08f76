//! SHA-256 integrity frame.
//!
//! A framed payload is `sha256(payload) (32 bytes) || payload`. The hash is
//! checked before the payload reaches a decompressor, so corrupted or foreign
//! bytes are rejected without ever being decoded.

use crate::error::{CodecError, CodecResult};
use sha2::{Digest, Sha256};

/// Size of the integrity hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Prepends the SHA-256 hash of `payload`.
#[must_use]
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let hash = Sha256::digest(payload);
    let mut framed = Vec::with_capacity(HASH_SIZE + payload.len());
    framed.extend_from_slice(&hash);
    framed.extend_from_slice(payload);
    framed
}

/// Verifies a framed payload and returns the payload part.
///
/// # Errors
///
/// Returns [`CodecError::Integrity`] if the input is shorter than the hash
/// or the hash does not match.
pub fn unframe(framed: &[u8]) -> CodecResult<&[u8]> {
    if framed.len() < HASH_SIZE {
        return Err(CodecError::integrity(format!(
            "frame too short: {} bytes",
            framed.len()
        )));
    }
    let (stored, payload) = framed.split_at(HASH_SIZE);
    if Sha256::digest(payload).as_slice() != stored {
        return Err(CodecError::integrity("hash mismatch"));
    }
    Ok(payload)
}
