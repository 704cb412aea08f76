//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The key derivation iteration count was zero.
    #[error("invalid iteration count: {iterations}")]
    InvalidIterations {
        /// The rejected count.
        iterations: u32,
    },

    /// The cipher could not be initialised from the derived material.
    #[error("key derivation failed: {message}")]
    KeyDerivation {
        /// Description of the failure.
        message: String,
    },

    /// Decryption failed (bad length, bad padding, wrong key).
    #[error("decryption failed: {message}")]
    Decryption {
        /// Description of the failure.
        message: String,
    },

    /// The integrity frame is missing or its hash does not match.
    #[error("integrity check failed: {message}")]
    Integrity {
        /// Description of the mismatch.
        message: String,
    },

    /// The compressed stream is malformed.
    #[error("invalid compressed data: {message}")]
    InvalidData {
        /// Decoder message.
        message: String,
    },

    /// The compressed stream ended before its terminator.
    #[error("compressed stream truncated after {consumed} bytes")]
    Truncated {
        /// Bytes consumed before the decoder ran out of input.
        consumed: usize,
    },

    /// Compression failed.
    #[error("compression failed: {message}")]
    Compression {
        /// Encoder message.
        message: String,
    },

    /// The object could not be encoded to text.
    #[error("encoding failed: {message}")]
    Encode {
        /// Codec message.
        message: String,
    },

    /// The text could not be decoded into the requested type.
    #[error("decoding failed: {message}")]
    Decode {
        /// Codec message.
        message: String,
    },

    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// Neither the current nor the legacy layout decoded the record.
    #[error("record unreadable in both layouts (current: {primary})")]
    BothStrategiesFailed {
        /// Failure of the current-layout attempt.
        primary: Box<CodecError>,
        /// Failure of the legacy-layout attempt.
        #[source]
        legacy: Box<CodecError>,
    },
}

impl CodecError {
    /// Creates a key derivation error.
    pub fn key_derivation(message: impl Into<String>) -> Self {
        Self::KeyDerivation {
            message: message.into(),
        }
    }

    /// Creates a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Creates an invalid compressed data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Creates a compression error.
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Creates an encoding error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a decoding error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns true for failures of the byte layers: cipher, integrity
    /// frame or compressed stream.
    ///
    /// These are the failures a record in the other on-disk layout produces.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::Decryption { .. }
                | Self::Integrity { .. }
                | Self::InvalidData { .. }
                | Self::Truncated { .. }
        )
    }

    /// Returns true for failures turning the plaintext into an object.
    #[must_use]
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::InvalidUtf8)
    }
}
