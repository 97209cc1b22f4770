//! Framed DEFLATE (spec §4.7, component C5).
//!
//! `flate2` gives us a DEFLATE implementation but not arbitrary-length streaming in the shape
//! this format wants, so the data section is split into 512 KiB input chunks, each deflated
//! independently and stored as `[u32 LE chunkLen][compressed bytes]`. The chunk-length framing is
//! always little-endian, even inside a big-endian file (spec §9) — only the DEFLATE payload
//! itself is opaque to endianness.
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 512 * 1024;

/// Compress `data` into the framed format, one frame per 512 KiB input chunk.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    for chunk in data.chunks(CHUNK_SIZE) {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(chunk)
            .map_err(|e| Error::CompressFailure(e.to_string()))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::CompressFailure(e.to_string()))?;
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&compressed);
    }
    Ok(out)
}

/// Reverse [`compress`]: read `[u32 LE chunkLen][chunk]*` frames until the buffer is exhausted.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    while cursor < data.len() {
        if cursor + 4 > data.len() {
            return Err(Error::CompressFailure("truncated chunk length frame".into()));
        }
        let len = u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap()) as usize;
        cursor += 4;
        if cursor + len > data.len() {
            return Err(Error::CompressFailure("truncated chunk body".into()));
        }
        let chunk = &data[cursor..cursor + len];
        cursor += len;

        let mut decoder = DeflateDecoder::new(chunk);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::CompressFailure(e.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_input() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let compressed = compress(&data).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn round_trips_across_chunk_boundary() {
        let data = vec![0x5A; CHUNK_SIZE * 2 + 137];
        let compressed = compress(&data).unwrap();
        // Three chunks: two full, one partial.
        assert!(compressed.len() < data.len());
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn empty_input_round_trips() {
        let compressed = compress(&[]).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert!(decompressed.is_empty());
    }

    #[test]
    fn truncated_frame_is_compress_failure() {
        let err = decompress(&[0x05, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, Error::CompressFailure(_)));
    }
}
