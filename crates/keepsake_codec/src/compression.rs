//! Streaming compression codecs.
//!
//! Encoders and decoders are push-based: the caller owns a growable output
//! buffer, pushes input spans in any chunking, then calls `finish` to drain
//! whatever the codec still holds. Two algorithms are supported:
//!
//! - [`CompressionAlgorithm::Deflate`] - raw DEFLATE (RFC 1951, no zlib
//!   header), the legacy on-disk codec
//! - [`CompressionAlgorithm::Brotli`] - the current codec, better ratio
//!
//! Decoders report a malformed stream as [`CodecError::InvalidData`] and a
//! stream that ends before its terminator as [`CodecError::Truncated`].
//!
//! Decoders must only ever see authenticated bytes; see
//! [`crate::integrity`].

use crate::error::{CodecError, CodecResult};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::io::Write;

/// Output reservation per encoder/decoder step.
const CHUNK: usize = 16 * 1024;
/// Internal buffer size handed to the brotli stream adapters.
const BROTLI_BUFFER: usize = 4096;
/// Brotli quality (0-11).
const BROTLI_QUALITY: u32 = 9;
/// Brotli window size, log2.
const BROTLI_LGWIN: u32 = 22;

/// A compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionAlgorithm {
    /// Raw DEFLATE.
    Deflate,
    /// Brotli.
    #[default]
    Brotli,
}

impl CompressionAlgorithm {
    /// Compresses `input` in one call.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails.
    pub fn compress(self, input: &[u8]) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() / 2 + 64);
        match self {
            Self::Deflate => {
                let mut encoder = DeflateEncoder::new(&mut out);
                encoder.push(input)?;
                encoder.finish()?;
            }
            Self::Brotli => {
                let mut encoder = BrotliEncoder::new(&mut out);
                encoder.push(input)?;
                encoder.finish()?;
            }
        }
        Ok(out)
    }

    /// Decompresses `input` in one call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidData`] or [`CodecError::Truncated`] if
    /// the stream is malformed or incomplete.
    pub fn decompress(self, input: &[u8]) -> CodecResult<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() * 4);
        match self {
            Self::Deflate => {
                let mut decoder = DeflateDecoder::new(&mut out);
                decoder.push(input)?;
                decoder.finish()?;
            }
            Self::Brotli => {
                let mut decoder = BrotliDecoder::new(&mut out);
                decoder.push(input)?;
                decoder.finish()?;
            }
        }
        Ok(out)
    }
}

/// A push-based compressor writing into a caller-owned buffer.
pub trait StreamEncoder {
    /// Consumes `input`, appending any produced output.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails.
    fn push(&mut self, input: &[u8]) -> CodecResult<()>;

    /// Flushes buffered output and writes the stream terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails.
    fn finish(self) -> CodecResult<()>;
}

/// A push-based decompressor writing into a caller-owned buffer.
pub trait StreamDecoder {
    /// Consumes `input`, appending any produced output.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidData`] on a malformed stream.
    fn push(&mut self, input: &[u8]) -> CodecResult<()>;

    /// Drains buffered output and checks the stream terminated.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] if more input was needed.
    fn finish(self) -> CodecResult<()>;
}

/// Raw DEFLATE encoder.
pub struct DeflateEncoder<'a> {
    out: &'a mut Vec<u8>,
    state: Compress,
}

impl<'a> DeflateEncoder<'a> {
    /// Creates an encoder appending to `out`.
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            state: Compress::new(Compression::default(), false),
        }
    }

    fn step(&mut self, input: &[u8], flush: FlushCompress) -> CodecResult<(usize, Status)> {
        self.out.reserve(CHUNK);
        let before = self.state.total_in();
        let status = self
            .state
            .compress_vec(input, self.out, flush)
            .map_err(|e| CodecError::compression(e.to_string()))?;
        Ok(((self.state.total_in() - before) as usize, status))
    }
}

impl StreamEncoder for DeflateEncoder<'_> {
    fn push(&mut self, mut input: &[u8]) -> CodecResult<()> {
        while !input.is_empty() {
            let (consumed, _) = self.step(input, FlushCompress::None)?;
            input = &input[consumed..];
        }
        Ok(())
    }

    fn finish(mut self) -> CodecResult<()> {
        loop {
            let (_, status) = self.step(&[], FlushCompress::Finish)?;
            if status == Status::StreamEnd {
                return Ok(());
            }
        }
    }
}

/// Raw DEFLATE decoder.
///
/// Bytes after the final block are ignored.
pub struct DeflateDecoder<'a> {
    out: &'a mut Vec<u8>,
    state: Decompress,
    done: bool,
}

impl<'a> DeflateDecoder<'a> {
    /// Creates a decoder appending to `out`.
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            state: Decompress::new(false),
            done: false,
        }
    }

    /// Returns (consumed, produced).
    fn step(&mut self, input: &[u8]) -> CodecResult<(usize, usize)> {
        self.out.reserve(CHUNK);
        let before_in = self.state.total_in();
        let before_out = self.state.total_out();
        let status = self
            .state
            .decompress_vec(input, self.out, FlushDecompress::None)
            .map_err(|e| CodecError::invalid_data(e.to_string()))?;
        if status == Status::StreamEnd {
            self.done = true;
        }
        Ok((
            (self.state.total_in() - before_in) as usize,
            (self.state.total_out() - before_out) as usize,
        ))
    }
}

impl StreamDecoder for DeflateDecoder<'_> {
    fn push(&mut self, mut input: &[u8]) -> CodecResult<()> {
        while !input.is_empty() && !self.done {
            let (consumed, produced) = self.step(input)?;
            if consumed == 0 && produced == 0 {
                return Err(CodecError::invalid_data("deflate decoder made no progress"));
            }
            input = &input[consumed..];
        }
        Ok(())
    }

    fn finish(mut self) -> CodecResult<()> {
        while !self.done {
            let (_, produced) = self.step(&[])?;
            if produced == 0 && !self.done {
                return Err(CodecError::Truncated {
                    consumed: self.state.total_in() as usize,
                });
            }
        }
        Ok(())
    }
}

/// Brotli encoder.
pub struct BrotliEncoder<'a> {
    writer: brotli::CompressorWriter<&'a mut Vec<u8>>,
}

impl<'a> BrotliEncoder<'a> {
    /// Creates an encoder appending to `out`.
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            writer: brotli::CompressorWriter::new(out, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN),
        }
    }
}

impl StreamEncoder for BrotliEncoder<'_> {
    fn push(&mut self, input: &[u8]) -> CodecResult<()> {
        self.writer
            .write_all(input)
            .map_err(|e| CodecError::compression(e.to_string()))
    }

    fn finish(self) -> CodecResult<()> {
        // Consuming the writer emits the final meta-block.
        let _ = self.writer.into_inner();
        Ok(())
    }
}

/// Brotli decoder.
pub struct BrotliDecoder<'a> {
    writer: brotli::DecompressorWriter<&'a mut Vec<u8>>,
    consumed: usize,
}

impl<'a> BrotliDecoder<'a> {
    /// Creates a decoder appending to `out`.
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            writer: brotli::DecompressorWriter::new(out, BROTLI_BUFFER),
            consumed: 0,
        }
    }
}

impl StreamDecoder for BrotliDecoder<'_> {
    fn push(&mut self, input: &[u8]) -> CodecResult<()> {
        self.writer
            .write_all(input)
            .map_err(|e| CodecError::invalid_data(e.to_string()))?;
        self.consumed += input.len();
        Ok(())
    }

    fn finish(self) -> CodecResult<()> {
        let consumed = self.consumed;
        self.writer
            .into_inner()
            .map(|_| ())
            .map_err(|_| CodecError::Truncated { consumed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut text = String::new();
        for i in 0..500 {
            text.push_str(&format!("{{\"slot\":{i},\"name\":\"player-{}\"}},", i % 7));
        }
        text.into_bytes()
    }

    #[test]
    fn deflate_roundtrip() {
        let data = sample();
        let compressed = CompressionAlgorithm::Deflate.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        let restored = CompressionAlgorithm::Deflate.decompress(&compressed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn brotli_roundtrip() {
        let data = sample();
        let compressed = CompressionAlgorithm::Brotli.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        let restored = CompressionAlgorithm::Brotli.decompress(&compressed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn empty_input_roundtrip() {
        for algorithm in [CompressionAlgorithm::Deflate, CompressionAlgorithm::Brotli] {
            let compressed = algorithm.compress(b"").unwrap();
            assert!(algorithm.decompress(&compressed).unwrap().is_empty());
        }
    }

    #[test]
    fn chunked_push_matches_one_shot() {
        let data = sample();
        let compressed = CompressionAlgorithm::Deflate.compress(&data).unwrap();

        let mut out = Vec::new();
        let mut decoder = DeflateDecoder::new(&mut out);
        for chunk in compressed.chunks(7) {
            decoder.push(chunk).unwrap();
        }
        decoder.finish().unwrap();
        assert_eq!(out, data);

        let mut out = Vec::new();
        let mut encoder = BrotliEncoder::new(&mut out);
        for chunk in data.chunks(100) {
            encoder.push(chunk).unwrap();
        }
        encoder.finish().unwrap();
        assert_eq!(CompressionAlgorithm::Brotli.decompress(&out).unwrap(), data);
    }

    #[test]
    fn output_appends_to_existing_buffer() {
        let mut out = b"prefix".to_vec();
        let mut encoder = DeflateEncoder::new(&mut out);
        encoder.push(b"body").unwrap();
        encoder.finish().unwrap();

        assert!(out.starts_with(b"prefix"));
        let restored = CompressionAlgorithm::Deflate
            .decompress(&out[b"prefix".len()..])
            .unwrap();
        assert_eq!(restored, b"body");
    }

    #[test]
    fn deflate_truncated_stream() {
        let data = sample();
        let compressed = CompressionAlgorithm::Deflate.compress(&data).unwrap();
        let cut = &compressed[..compressed.len() / 2];

        let result = CompressionAlgorithm::Deflate.decompress(cut);
        assert!(matches!(result, Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn deflate_invalid_block_type() {
        // BFINAL=1, BTYPE=11 (reserved)
        let result = CompressionAlgorithm::Deflate.decompress(&[0x07, 0x00, 0x00]);
        assert!(matches!(result, Err(CodecError::InvalidData { .. })));
    }

    #[test]
    fn brotli_truncated_stream() {
        let data = sample();
        let compressed = CompressionAlgorithm::Brotli.compress(&data).unwrap();
        let cut = &compressed[..compressed.len() / 2];

        assert!(CompressionAlgorithm::Brotli.decompress(cut).is_err());
    }

    #[test]
    fn default_algorithm_is_brotli() {
        assert_eq!(CompressionAlgorithm::default(), CompressionAlgorithm::Brotli);
    }
}
