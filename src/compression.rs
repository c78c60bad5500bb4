//! Chunk compression for exported sample data

use crate::error::{Result, StackError};
use crate::types::DataType;
use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Compression methods available to exporting sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionMethod {
    /// No compression
    #[default]
    None = 0,
    /// Deflate/ZIP compression
    Deflate = 1,
    /// Run-length encoding of whole samples
    RLE = 2,
    /// Zstandard compression
    Zstd = 3,
}

impl CompressionMethod {
    /// Get the method from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionMethod::None),
            1 => Some(CompressionMethod::Deflate),
            2 => Some(CompressionMethod::RLE),
            3 => Some(CompressionMethod::Zstd),
            _ => None,
        }
    }

    /// File suffix used for chunks stored with this method
    pub fn suffix(&self) -> &'static str {
        match self {
            CompressionMethod::None => "raw",
            CompressionMethod::Deflate => "deflate",
            CompressionMethod::RLE => "rle",
            CompressionMethod::Zstd => "zst",
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Compression level (0-9, where 0 is no compression and 9 is maximum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Trait for compression/decompression of serialized chunks
pub trait Compressor: Send + Sync {
    /// Compress data
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>>;

    /// Get the compression method
    fn method(&self) -> CompressionMethod;
}

/// No compression
#[derive(Debug, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::None
    }
}

/// Deflate compression
#[derive(Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(
            Vec::with_capacity(data.len() / 2),
            FlateCompression::new(level.value() as u32),
        );
        encoder
            .write_all(data)
            .map_err(|e| StackError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| StackError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(Vec::with_capacity(expected_size.unwrap_or(0)));
        decoder
            .write_all(data)
            .map_err(|e| StackError::Decompression(e.to_string()))?;
        decoder
            .finish()
            .map_err(|e| StackError::Decompression(e.to_string()))
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }
}

/// Zstandard compression
#[derive(Debug, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        zstd::encode_all(data, level.value() as i32)
            .map_err(|e| StackError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| StackError::Decompression(e.to_string()))
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }
}

/// Run-length encoding over samples of `width` bytes
///
/// Each run is stored as a count byte followed by one sample.
#[derive(Debug)]
pub struct RLECompressor {
    width: usize,
}

impl RLECompressor {
    pub fn new(data_type: DataType) -> Self {
        Self {
            width: data_type.size_in_bytes(),
        }
    }
}

impl Compressor for RLECompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        if data.len() % self.width != 0 {
            return Err(StackError::Compression(format!(
                "RLE input of {} bytes is not a whole number of {}-byte samples",
                data.len(),
                self.width
            )));
        }

        let mut compressed = Vec::new();
        let mut samples = data.chunks_exact(self.width).peekable();

        while let Some(sample) = samples.next() {
            let mut count = 1u8;
            while count < u8::MAX && samples.peek() == Some(&sample) {
                samples.next();
                count += 1;
            }
            compressed.push(count);
            compressed.extend_from_slice(sample);
        }

        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let record = self.width + 1;
        if data.len() % record != 0 {
            return Err(StackError::Decompression(format!(
                "RLE data must be a multiple of {} bytes",
                record
            )));
        }

        let mut decompressed = Vec::with_capacity(expected_size.unwrap_or(0));
        for run in data.chunks_exact(record) {
            for _ in 0..run[0] {
                decompressed.extend_from_slice(&run[1..]);
            }
        }

        Ok(decompressed)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::RLE
    }
}

/// Get a compressor for chunks of `data_type` samples
pub fn get_compressor(method: CompressionMethod, data_type: DataType) -> Box<dyn Compressor> {
    match method {
        CompressionMethod::None => Box::new(NoneCompressor),
        CompressionMethod::Deflate => Box::new(DeflateCompressor),
        CompressionMethod::RLE => Box::new(RLECompressor::new(data_type)),
        CompressionMethod::Zstd => Box::new(ZstdCompressor),
    }
}
