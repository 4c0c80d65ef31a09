//! Block compression codecs and the shuffle filter

use crate::error::{ReaderError, Result};
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Compression applied to every stored voxel block of a dataset
///
/// The numeric wire codes are stable: 0 none, 1-9 gzip at that level,
/// 11-19 shuffle+gzip, 21 zstd, 31 shuffle+zstd. Shuffle is the byte
/// transposition filter applied at the element width before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// No compression
    None,
    /// Gzip at the contained level (1-9)
    Gzip(u8),
    /// Byte shuffle followed by gzip at the contained level (1-9)
    ShuffleGzip(u8),
    /// Zstandard
    Zstd,
    /// Byte shuffle followed by zstandard
    ShuffleZstd,
}

impl Compression {
    /// Gzip with the level clamped into 1-9
    pub fn gzip(level: u8) -> Self {
        Compression::Gzip(level.clamp(1, 9))
    }

    /// Shuffle+gzip with the level clamped into 1-9
    pub fn shuffle_gzip(level: u8) -> Self {
        Compression::ShuffleGzip(level.clamp(1, 9))
    }

    /// Stable numeric code stored in the container catalog
    pub fn code(&self) -> u32 {
        match self {
            Compression::None => 0,
            Compression::Gzip(level) => *level as u32,
            Compression::ShuffleGzip(level) => 10 + *level as u32,
            Compression::Zstd => 21,
            Compression::ShuffleZstd => 31,
        }
    }

    /// Decode a catalog code
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Compression::None),
            1..=9 => Some(Compression::Gzip(code as u8)),
            11..=19 => Some(Compression::ShuffleGzip((code - 10) as u8)),
            21 => Some(Compression::Zstd),
            31 => Some(Compression::ShuffleZstd),
            _ => None,
        }
    }

    /// Whether the shuffle filter runs before the base codec
    pub fn is_shuffled(&self) -> bool {
        matches!(self, Compression::ShuffleGzip(_) | Compression::ShuffleZstd)
    }

    fn base_codec(&self) -> Box<dyn BlockCodec> {
        match self {
            Compression::None => Box::new(NoneCodec),
            Compression::Gzip(level) | Compression::ShuffleGzip(level) => {
                Box::new(GzipCodec { level: *level })
            }
            Compression::Zstd | Compression::ShuffleZstd => Box::new(ZstdCodec),
        }
    }
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Gzip(2)
    }
}

/// Trait for block compression/decompression operations
pub trait BlockCodec: Send + Sync {
    /// Compress a raw block
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a stored block; `expected_size` pre-sizes the output
    fn decode(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>>;
}

/// No compression
#[derive(Debug, Default)]
pub struct NoneCodec;

impl BlockCodec for NoneCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Gzip streams via flate2
#[derive(Debug)]
pub struct GzipCodec {
    level: u8,
}

impl BlockCodec for GzipCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(data, FlateCompression::new(self.level as u32));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| ReaderError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decode(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = if let Some(size) = expected_size {
            Vec::with_capacity(size)
        } else {
            Vec::new()
        };
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| ReaderError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }
}

/// Zstandard compression
#[derive(Debug, Default)]
pub struct ZstdCodec;

impl BlockCodec for ZstdCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, 3).map_err(|e| ReaderError::Compression(e.to_string()))
    }

    fn decode(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| ReaderError::Decompression(e.to_string()))
    }
}

/// Byte-shuffle a buffer of `element_size`-wide samples: all first bytes,
/// then all second bytes, and so on. A trailing partial element is copied
/// through unchanged.
pub fn shuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 {
        return data.to_vec();
    }
    let count = data.len() / element_size;
    let mut out = Vec::with_capacity(data.len());
    for byte_index in 0..element_size {
        for element in 0..count {
            out.push(data[element * element_size + byte_index]);
        }
    }
    out.extend_from_slice(&data[count * element_size..]);
    out
}

/// Invert [`shuffle`]
pub fn unshuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 {
        return data.to_vec();
    }
    let count = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for byte_index in 0..element_size {
        for element in 0..count {
            out[element * element_size + byte_index] = data[byte_index * count + element];
        }
    }
    let tail = count * element_size;
    out[tail..].copy_from_slice(&data[tail..]);
    out
}

/// Compress one raw block per the dataset's compression setting
pub fn compress_block(
    compression: Compression,
    element_size: usize,
    data: &[u8],
) -> Result<Vec<u8>> {
    let codec = compression.base_codec();
    if compression.is_shuffled() {
        codec.encode(&shuffle(data, element_size))
    } else {
        codec.encode(data)
    }
}

/// Decompress one stored block per the dataset's compression setting
pub fn decompress_block(
    compression: Compression,
    element_size: usize,
    data: &[u8],
    expected_size: Option<usize>,
) -> Result<Vec<u8>> {
    let codec = compression.base_codec();
    let decoded = codec.decode(data, expected_size)?;
    if compression.is_shuffled() {
        Ok(unshuffle(&decoded, element_size))
    } else {
        Ok(decoded)
    }
}
