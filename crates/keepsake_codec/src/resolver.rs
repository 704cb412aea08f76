//! The serialization pipeline.

use crate::cipher::CipherCodec;
use crate::compression::CompressionAlgorithm;
use crate::config::SerializerConfig;
use crate::error::{CodecError, CodecResult};
use crate::integrity;
use crate::object::{JsonCodec, ObjectCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

/// The on-disk layout a record was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Random IV, integrity frame, configured compression.
    Current,
    /// Derived IV, no frame, DEFLATE.
    Legacy,
}

/// A decoded value together with the layout it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    /// The decoded value.
    pub value: T,
    /// The layout the record was stored in.
    pub format: RecordFormat,
}

/// Turns typed values into records and back.
///
/// ## Record layout
///
/// ```text
/// record  := iv(16) || AES-128-CBC(key, iv, payload)   if encrypted
///          | payload                                    otherwise
/// payload := sha256(c)(32) || c, c = compress(text)     if compressed
///          | text                                       otherwise
/// ```
///
/// Each stage is switched by [`SerializerConfig`]. Text is pretty-printed
/// only when neither compression nor encryption is on.
///
/// ## Legacy records
///
/// Older versions wrote `AES-128-CBC(key, derived_iv, deflate(text))` with
/// no stored IV and no frame. When decoding under the current layout fails
/// in a way such a record would make it fail, decoding is retried once
/// under the legacy layout. If that fails too the result is
/// [`CodecError::BothStrategiesFailed`].
///
/// With encryption on and compression off nothing authenticates the
/// plaintext, so a legacy record can decode under the current layout minus
/// its first block. In that configuration both layouts are tried and the
/// legacy reading wins when it decodes.
///
/// # Example
///
/// ```rust
/// use keepsake_codec::{SerializationResolver, SerializerConfig};
///
/// let resolver = SerializationResolver::new(
///     SerializerConfig::encrypted("password", b"salt".to_vec(), 10),
/// ).unwrap();
///
/// let bytes = resolver.serialize(&vec![1, 2, 3]).unwrap();
/// let back: Vec<i32> = resolver.deserialize(&bytes).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct SerializationResolver<C = JsonCodec> {
    config: SerializerConfig,
    cipher: Option<CipherCodec>,
    codec: C,
}

impl SerializationResolver<JsonCodec> {
    /// Creates a JSON resolver.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidIterations`] if a password is set and
    /// the iteration count is zero.
    pub fn new(config: SerializerConfig) -> CodecResult<Self> {
        Self::with_codec(config, JsonCodec)
    }
}

impl<C: ObjectCodec> SerializationResolver<C> {
    /// Creates a resolver with a custom object codec.
    ///
    /// The key is derived here, once.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidIterations`] if a password is set and
    /// the iteration count is zero.
    pub fn with_codec(config: SerializerConfig, codec: C) -> CodecResult<Self> {
        let cipher = match &config.password {
            Some(password) => Some(CipherCodec::from_password(
                password,
                &config.salt,
                config.iterations,
            )?),
            None => None,
        };
        Ok(Self {
            config,
            cipher,
            codec,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Returns true if records are encrypted.
    pub fn should_encrypt(&self) -> bool {
        self.cipher.is_some()
    }

    fn pretty(&self) -> bool {
        !self.config.compress && !self.should_encrypt()
    }

    /// Encodes `value` into a record in the current layout.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, compression or encryption fails.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut bytes = self.codec.encode(value, self.pretty())?.into_bytes();
        if self.config.compress {
            bytes = integrity::frame(&self.config.compression.compress(&bytes)?);
        }
        if let Some(cipher) = &self.cipher {
            bytes = cipher.encrypt(&bytes)?;
        }
        Ok(bytes)
    }

    /// Encodes `value` into a record in the legacy layout.
    ///
    /// Nothing writes this layout any more; it exists to produce records
    /// that exercise the legacy read path.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, compression or encryption fails.
    pub fn serialize_legacy<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let mut bytes = self.codec.encode(value, self.pretty())?.into_bytes();
        if self.config.compress {
            bytes = CompressionAlgorithm::Deflate.compress(&bytes)?;
        }
        if let Some(cipher) = &self.cipher {
            bytes = cipher.encrypt_legacy(&bytes)?;
        }
        Ok(bytes)
    }

    /// Decodes a record in either layout.
    ///
    /// # Errors
    ///
    /// Returns the current-layout error if no legacy attempt was warranted,
    /// or [`CodecError::BothStrategiesFailed`] if both attempts failed.
    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        self.deserialize_detailed(bytes).map(|decoded| decoded.value)
    }

    /// Decodes a record and reports which layout it was stored in.
    ///
    /// # Errors
    ///
    /// See [`deserialize`](Self::deserialize).
    pub fn deserialize_detailed<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<Decoded<T>> {
        let primary = match self.decode_current(bytes) {
            Ok(value) if self.current_is_unauthenticated() => {
                return Ok(self.prefer_legacy(bytes, value));
            }
            Ok(value) => {
                return Ok(Decoded {
                    value,
                    format: RecordFormat::Current,
                })
            }
            Err(e) => e,
        };

        if !self.retries_legacy(&primary) {
            return Err(primary);
        }
        debug!(error = %primary, "current layout failed, trying legacy");

        match self.decode_legacy(bytes) {
            Ok(value) => {
                info!(len = bytes.len(), "decoded record in legacy layout");
                Ok(Decoded {
                    value,
                    format: RecordFormat::Legacy,
                })
            }
            Err(legacy) => Err(CodecError::BothStrategiesFailed {
                primary: Box::new(primary),
                legacy: Box::new(legacy),
            }),
        }
    }

    /// Encrypted without a frame: a legacy record read under the current
    /// layout loses its first block and may still decode.
    fn current_is_unauthenticated(&self) -> bool {
        self.should_encrypt() && !self.config.compress
    }

    /// Picks the legacy reading when it decodes too.
    ///
    /// A current record read as legacy turns its IV into a block of
    /// garbage in front of the text, which does not decode.
    fn prefer_legacy<T: DeserializeOwned>(&self, bytes: &[u8], current: T) -> Decoded<T> {
        match self.decode_legacy(bytes) {
            Ok(value) => {
                info!(len = bytes.len(), "decoded record in legacy layout");
                Decoded {
                    value,
                    format: RecordFormat::Legacy,
                }
            }
            Err(_) => Decoded {
                value: current,
                format: RecordFormat::Current,
            },
        }
    }

    /// Whether a current-layout failure may mean a legacy record.
    ///
    /// With no stage on, both layouts are the same. With compression on,
    /// the frame authenticates the payload, so only byte-layer failures
    /// qualify. Without it, a wrong IV can still unpad into garbage text.
    fn retries_legacy(&self, error: &CodecError) -> bool {
        if !self.config.compress && !self.should_encrypt() {
            return false;
        }
        error.is_format_error() || (!self.config.compress && error.is_payload_error())
    }

    fn decode_current<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        let decrypted;
        let mut payload = bytes;
        if let Some(cipher) = &self.cipher {
            decrypted = cipher.decrypt(payload)?;
            payload = &decrypted;
        }

        let decompressed;
        if self.config.compress {
            let compressed = integrity::unframe(payload)?;
            decompressed = self.config.compression.decompress(compressed)?;
            payload = &decompressed;
        }

        self.decode_text(payload)
    }

    fn decode_legacy<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        let decrypted;
        let mut payload = bytes;
        if let Some(cipher) = &self.cipher {
            decrypted = cipher.decrypt_legacy(payload)?;
            payload = &decrypted;
        }

        let decompressed;
        if self.config.compress {
            decompressed = CompressionAlgorithm::Deflate.decompress(payload)?;
            payload = &decompressed;
        }

        self.decode_text(payload)
    }

    fn decode_text<T: DeserializeOwned>(&self, payload: &[u8]) -> CodecResult<T> {
        let text = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;
        self.codec.decode(text)
    }
}
