//! Raw heightmap (`.r32`) codec.
//!
//! Terrain entries are opaque to the archive pipelines, but the
//! in-memory scene and the tests need a way to produce and inspect
//! them: a flat little-endian `f32` grid, row-major, no header.

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result};

/// Encode a heightmap as raw little-endian `f32`.
pub fn encode_r32(heights: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; heights.len() * 4];
    LittleEndian::write_f32_into(heights, &mut out);
    out
}

/// Decode a raw little-endian `f32` heightmap.
pub fn decode_r32(data: &[u8]) -> Result<Vec<f32>> {
    if data.len() % 4 != 0 {
        return Err(Error::TerrainLength(data.len()));
    }
    let mut out = vec![0f32; data.len() / 4];
    LittleEndian::read_f32_into(data, &mut out);
    Ok(out)
}

/// A constant-height map for a square region.
pub fn flat(size: usize, height: f32) -> Vec<u8> {
    encode_r32(&vec![height; size * size])
}
