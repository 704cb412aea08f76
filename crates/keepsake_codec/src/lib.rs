//! # keepsake codec
//!
//! The serialization pipeline for keepsake: object to text, compression,
//! integrity frame and password-based encryption.
//!
//! ## Stages
//!
//! - [`ObjectCodec`] - typed value to text ([`JsonCodec`] by default)
//! - [`compression`] - push-based DEFLATE and Brotli codecs
//! - [`integrity`] - SHA-256 frame checked before anything is decompressed
//! - [`kdf`] - PBKDF2 key derivation
//! - [`cipher`] - AES-128-CBC in the current and legacy IV conventions
//!
//! [`SerializationResolver`] composes the stages according to a
//! [`SerializerConfig`] and falls back to the legacy record layout when a
//! record does not decode under the current one.
//!
//! ## Usage
//!
//! ```
//! use keepsake_codec::{SerializationResolver, SerializerConfig};
//!
//! let resolver = SerializationResolver::new(SerializerConfig::compressed(true)).unwrap();
//! let bytes = resolver.serialize("hello").unwrap();
//! let text: String = resolver.deserialize(&bytes).unwrap();
//! assert_eq!(text, "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod compression;
mod config;
mod error;
pub mod integrity;
pub mod kdf;
mod object;
mod resolver;

pub use cipher::CipherCodec;
pub use compression::{CompressionAlgorithm, StreamDecoder, StreamEncoder};
pub use config::{SerializerConfig, DEFAULT_ITERATIONS};
pub use error::{CodecError, CodecResult};
pub use kdf::DerivedKey;
pub use object::{JsonCodec, ObjectCodec};
pub use resolver::{Decoded, RecordFormat, SerializationResolver};
