//! Serializer configuration.

use crate::compression::CompressionAlgorithm;
use zeroize::Zeroizing;

/// Default key derivation iteration count.
pub const DEFAULT_ITERATIONS: u32 = 1000;

/// Configuration for a [`SerializationResolver`](crate::SerializationResolver).
///
/// The default is plain, pretty-printed JSON: no compression and no
/// encryption.
///
/// # Salt
///
/// The salt is supplied by the application and is never written next to the
/// data. Records can only be read back with the same password, salt and
/// iteration count they were written with; losing the salt makes every
/// encrypted record unrecoverable.
#[derive(Clone)]
pub struct SerializerConfig {
    /// Encryption password. Records are encrypted iff this is set.
    pub password: Option<Zeroizing<String>>,

    /// Key derivation salt.
    pub salt: Vec<u8>,

    /// Key derivation iteration count. Must be non-zero when encrypting.
    pub iterations: u32,

    /// Whether payloads are compressed and integrity framed.
    pub compress: bool,

    /// Algorithm for framed payloads.
    pub compression: CompressionAlgorithm,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            password: None,
            salt: Vec::new(),
            iterations: DEFAULT_ITERATIONS,
            compress: false,
            compression: CompressionAlgorithm::Brotli,
        }
    }
}

impl SerializerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that compresses but does not encrypt.
    #[must_use]
    pub fn compressed(compress: bool) -> Self {
        Self::new().compress(compress)
    }

    /// Creates a configuration that encrypts and compresses.
    #[must_use]
    pub fn encrypted(password: impl Into<String>, salt: impl Into<Vec<u8>>, iterations: u32) -> Self {
        Self::new()
            .with_password(password)
            .salt(salt)
            .iterations(iterations)
            .compress(true)
    }

    /// Sets the encryption password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Sets the key derivation salt.
    #[must_use]
    pub fn salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = salt.into();
        self
    }

    /// Sets the key derivation iteration count.
    #[must_use]
    pub const fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets whether payloads are compressed.
    #[must_use]
    pub const fn compress(mut self, value: bool) -> Self {
        self.compress = value;
        self
    }

    /// Sets the algorithm for framed payloads.
    ///
    /// Must match between save and load. Legacy records are always DEFLATE.
    #[must_use]
    pub const fn compression(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.compression = algorithm;
        self
    }

    /// Returns true if records are encrypted.
    #[must_use]
    pub fn should_encrypt(&self) -> bool {
        self.password.is_some()
    }
}

impl std::fmt::Debug for SerializerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerConfig")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("salt_len", &self.salt.len())
            .field("iterations", &self.iterations)
            .field("compress", &self.compress)
            .field("compression", &self.compression)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_plain() {
        let config = SerializerConfig::default();
        assert!(!config.should_encrypt());
        assert!(!config.compress);
        assert_eq!(config.iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn encrypted_turns_on_compression() {
        let config = SerializerConfig::encrypted("pw", "salt", 10);
        assert!(config.should_encrypt());
        assert!(config.compress);
        assert_eq!(config.salt, b"salt");
        assert_eq!(config.iterations, 10);
    }

    #[test]
    fn builder_pattern() {
        let config = SerializerConfig::compressed(true)
            .compression(CompressionAlgorithm::Deflate)
            .with_password("pw")
            .compress(false);

        assert!(config.should_encrypt());
        assert!(!config.compress);
        assert_eq!(config.compression, CompressionAlgorithm::Deflate);
    }

    #[test]
    fn debug_redacts_password() {
        let config = SerializerConfig::encrypted("hunter2", "salt", 10);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }
}
