//! Password-based key derivation.
//!
//! Keys are derived with PBKDF2-HMAC-SHA1 over the UTF-8 password. The key
//! bytes are taken first from the derived stream and the IV bytes directly
//! after them; records written by older versions depend on that order.

use crate::error::{CodecError, CodecResult};
use sha1::Sha1;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key and IV material derived from a password.
///
/// The bytes are zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl DerivedKey {
    /// Returns the key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Returns the IV bytes (empty when none were requested).
    #[must_use]
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Derives `key_bytes` of key followed by `iv_bytes` of IV.
///
/// # Errors
///
/// Returns [`CodecError::InvalidIterations`] if `iterations` is zero.
pub fn derive(
    password: &str,
    salt: &[u8],
    iterations: u32,
    key_bytes: usize,
    iv_bytes: usize,
) -> CodecResult<DerivedKey> {
    if iterations == 0 {
        return Err(CodecError::InvalidIterations { iterations });
    }

    let mut stream = vec![0u8; key_bytes + iv_bytes];
    pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut stream);

    let iv = stream[key_bytes..].to_vec();
    stream[key_bytes..].zeroize();
    stream.truncate(key_bytes);
    Ok(DerivedKey { key: stream, iv })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc6070_vector() {
        // PBKDF2-HMAC-SHA1, P = "password", S = "salt", c = 2, dkLen = 20
        let derived = derive("password", b"salt", 2, 20, 0).unwrap();
        assert_eq!(
            derived.key(),
            [
                0xea, 0x6c, 0x01, 0x4d, 0xc7, 0x2d, 0x6f, 0x8c, 0xcd, 0x1e, 0xd9, 0x2a, 0xce,
                0x1d, 0x41, 0xf0, 0xd8, 0xde, 0x89, 0x57
            ]
        );
        assert!(derived.iv().is_empty());
    }

    #[test]
    fn iv_follows_key_in_stream() {
        let both = derive("hogehogefugafuga", b"piyopiyohogehoge", 10, 16, 16).unwrap();
        let long_key = derive("hogehogefugafuga", b"piyopiyohogehoge", 10, 32, 0).unwrap();

        assert_eq!(both.key(), &long_key.key()[..16]);
        assert_eq!(both.iv(), &long_key.key()[16..]);
    }

    #[test]
    fn deterministic() {
        let a = derive("pw", b"salt", 100, 16, 16).unwrap();
        let b = derive("pw", b"salt", 100, 16, 16).unwrap();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.iv(), b.iv());

        let c = derive("pw", b"other salt", 100, 16, 16).unwrap();
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn zero_iterations_fail_fast() {
        assert_eq!(
            derive("pw", b"salt", 0, 16, 0).unwrap_err(),
            CodecError::InvalidIterations { iterations: 0 }
        );
    }

    #[test]
    fn debug_is_redacted() {
        let derived = derive("pw", b"salt", 1, 16, 16).unwrap();
        let rendered = format!("{derived:?}");
        assert!(rendered.contains("REDACTED"));
    }
}
