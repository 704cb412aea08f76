//! AES-128-CBC encryption with password-derived keys.
//!
//! ## Conventions
//!
//! - **Current**: a fresh random IV per message, stored in front of the
//!   ciphertext: `iv (16 bytes) || AES-128-CBC(key, iv, plaintext)`
//! - **Legacy**: the IV is derived from the password together with the key
//!   and is not stored: `AES-128-CBC(key, derived_iv, plaintext)`
//!
//! New data is always written with the current convention. The legacy
//! convention exists only to read records written by older versions.
//!
//! CBC with PKCS#7 padding is not authenticated. A wrong key or IV usually
//! fails at unpadding, but not always; callers that need to detect
//! corruption frame the plaintext (see [`crate::integrity`]).

use crate::error::{CodecError, CodecResult};
use crate::kdf::{self, DerivedKey};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Size of the AES-128 key in bytes.
pub const KEY_SIZE: usize = 16;
/// Size of an AES block in bytes.
pub const BLOCK_SIZE: usize = 16;
/// Size of the IV in bytes.
pub const IV_SIZE: usize = BLOCK_SIZE;

/// A cipher bound to one password, salt and iteration count.
///
/// Key derivation is slow by design, so derive once and reuse the codec.
/// Key material is zeroized on drop.
#[derive(Clone, Debug)]
pub struct CipherCodec {
    material: DerivedKey,
}

impl CipherCodec {
    /// Derives the key (and the legacy IV) from a password.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidIterations`] if `iterations` is zero.
    pub fn from_password(password: &str, salt: &[u8], iterations: u32) -> CodecResult<Self> {
        let material = kdf::derive(password, salt, iterations, KEY_SIZE, IV_SIZE)?;
        Ok(Self { material })
    }

    /// Encrypts with a random IV and returns `iv || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::KeyDerivation`] if the key material does not fit
    /// the cipher.
    pub fn encrypt(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let body = self.encrypt_with_iv(&iv, plaintext)?;

        let mut blob = Vec::with_capacity(IV_SIZE + body.len());
        blob.extend_from_slice(&iv);
        blob.extend(body);
        Ok(blob)
    }

    /// Decrypts an `iv || ciphertext` blob.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decryption`] if the blob is too short, not
    /// block aligned, or its padding is invalid.
    pub fn decrypt(&self, blob: &[u8]) -> CodecResult<Vec<u8>> {
        if blob.len() < IV_SIZE {
            return Err(CodecError::decryption(format!(
                "blob of {} bytes has no IV",
                blob.len()
            )));
        }
        let (iv, body) = blob.split_at(IV_SIZE);
        self.decrypt_with_iv(iv, body)
    }

    /// Encrypts with the derived IV. No IV is stored.
    ///
    /// Only for producing records in the legacy layout, such as test fixtures.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::KeyDerivation`] if the key material does not fit
    /// the cipher.
    pub fn encrypt_legacy(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        self.encrypt_with_iv(self.material.iv(), plaintext)
    }

    /// Decrypts a ciphertext written with the derived IV.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decryption`] if the ciphertext is not block
    /// aligned or its padding is invalid.
    pub fn decrypt_legacy(&self, ciphertext: &[u8]) -> CodecResult<Vec<u8>> {
        self.decrypt_with_iv(self.material.iv(), ciphertext)
    }

    fn encrypt_with_iv(&self, iv: &[u8], plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        let encryptor = Aes128CbcEnc::new_from_slices(self.material.key(), iv)
            .map_err(|e| CodecError::key_derivation(e.to_string()))?;
        Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    fn decrypt_with_iv(&self, iv: &[u8], body: &[u8]) -> CodecResult<Vec<u8>> {
        if body.is_empty() || body.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::decryption(format!(
                "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
                body.len()
            )));
        }
        let decryptor = Aes128CbcDec::new_from_slices(self.material.key(), iv)
            .map_err(|e| CodecError::key_derivation(e.to_string()))?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| CodecError::decryption("invalid padding"))
    }
}

/// Encrypts `plaintext` under the current convention.
///
/// # Errors
///
/// Returns an error if key derivation or encryption fails.
pub fn encrypt(plaintext: &[u8], password: &str, salt: &[u8], iterations: u32) -> CodecResult<Vec<u8>> {
    CipherCodec::from_password(password, salt, iterations)?.encrypt(plaintext)
}

/// Decrypts a blob written under the current convention.
///
/// # Errors
///
/// Returns an error if key derivation or decryption fails.
pub fn decrypt(blob: &[u8], password: &str, salt: &[u8], iterations: u32) -> CodecResult<Vec<u8>> {
    CipherCodec::from_password(password, salt, iterations)?.decrypt(blob)
}

/// Decrypts a ciphertext written under the legacy convention.
///
/// # Errors
///
/// Returns an error if key derivation or decryption fails.
pub fn decrypt_legacy(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> CodecResult<Vec<u8>> {
    CipherCodec::from_password(password, salt, iterations)?.decrypt_legacy(ciphertext)
}
