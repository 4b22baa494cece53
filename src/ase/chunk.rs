//! Frame chunks.
//!
//! Every frame of an Aseprite file is a list of chunks. Only a handful carry anything the
//! renderer needs; everything else is kept as [`Chunk::Other`] so callers can match
//! exhaustively without caring about the long tail of chunk kinds.

use crate::ase::reader::ByteReader;
use crate::ase::{ColorDepth, DecodeError};
use flate2::read::ZlibDecoder;
use std::io::Read;

const OLD_PALETTE: u16 = 0x0004;
const LAYER: u16 = 0x2004;
const CEL: u16 = 0x2005;
const PALETTE: u16 = 0x2019;

const CHUNK_HEADER_LEN: u32 = 6;

/// One decoded chunk of a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Chunk {
    Layer(LayerChunk),
    Cel(CelChunk),
    /// Palette entries, from either the current or the legacy palette chunk.
    Palette(PaletteChunk),
    /// A chunk kind the renderer has no use for.
    Other { kind: u16 },
}

/// Layer declaration. Layers are numbered in the order their chunks appear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerChunk {
    pub flags: u16,
    pub kind: LayerKind,
    /// Nesting depth; a layer belongs to the closest preceding group with a smaller level.
    pub child_level: u16,
    pub name: String,
}

impl LayerChunk {
    pub const FLAG_VISIBLE: u16 = 1;

    pub fn is_visible(&self) -> bool {
        self.flags & Self::FLAG_VISIBLE != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Normal,
    Group,
    Tilemap,
    Unknown(u16),
}

impl From<u16> for LayerKind {
    fn from(value: u16) -> Self {
        match value {
            0 => LayerKind::Normal,
            1 => LayerKind::Group,
            2 => LayerKind::Tilemap,
            other => LayerKind::Unknown(other),
        }
    }
}

/// A positioned image on one layer of one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CelChunk {
    pub layer_index: u16,
    pub x: i16,
    pub y: i16,
    pub opacity: u8,
    pub z_index: i16,
    pub content: CelContent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CelContent {
    /// Pixel data in the file's color depth, already decompressed.
    Pixels {
        width: u16,
        height: u16,
        data: Vec<u8>,
    },
    /// Reuses the cel of the same layer in another frame.
    Linked { frame: u16 },
    Tilemap,
    Unknown { kind: u16 },
}

/// Palette entries as `(index, rgba)` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaletteChunk {
    pub entries: Vec<(u32, [u8; 4])>,
}

/// Reads one chunk (header included) from `reader`.
pub(crate) fn read_chunk(
    reader: &mut ByteReader,
    color_depth: ColorDepth,
) -> Result<Chunk, DecodeError> {
    let offset = reader.position();
    let size = reader.u32()?;
    if size < CHUNK_HEADER_LEN {
        return Err(DecodeError::ChunkSize { offset, size });
    }
    let kind = reader.u16()?;
    let body = reader.bytes((size - CHUNK_HEADER_LEN) as usize)?;
    let mut body = ByteReader::new(body);

    let chunk = match kind {
        LAYER => Chunk::Layer(read_layer(&mut body)?),
        CEL => Chunk::Cel(read_cel(&mut body, color_depth)?),
        PALETTE => Chunk::Palette(read_palette(&mut body)?),
        OLD_PALETTE => Chunk::Palette(read_old_palette(&mut body)?),
        kind => Chunk::Other { kind },
    };
    Ok(chunk)
}

fn read_layer(body: &mut ByteReader) -> Result<LayerChunk, DecodeError> {
    let flags = body.u16()?;
    let kind = LayerKind::from(body.u16()?);
    let child_level = body.u16()?;
    // default width/height, blend mode, opacity and reserved bytes
    body.skip(2 + 2 + 2 + 1 + 3)?;
    let name = body.string()?;
    Ok(LayerChunk {
        flags,
        kind,
        child_level,
        name,
    })
}

fn read_cel(body: &mut ByteReader, color_depth: ColorDepth) -> Result<CelChunk, DecodeError> {
    let layer_index = body.u16()?;
    let x = body.i16()?;
    let y = body.i16()?;
    let opacity = body.u8()?;
    let kind = body.u16()?;
    let z_index = body.i16()?;
    body.skip(5)?;

    let content = match kind {
        0 => {
            let (width, height) = (body.u16()?, body.u16()?);
            let data = body.bytes(pixel_len(width, height, color_depth))?.to_vec();
            CelContent::Pixels {
                width,
                height,
                data,
            }
        }
        1 => CelContent::Linked { frame: body.u16()? },
        2 => {
            let (width, height) = (body.u16()?, body.u16()?);
            let expected = pixel_len(width, height, color_depth);
            let data = inflate(body.rest(), expected)?;
            CelContent::Pixels {
                width,
                height,
                data,
            }
        }
        3 => CelContent::Tilemap,
        kind => CelContent::Unknown { kind },
    };

    Ok(CelChunk {
        layer_index,
        x,
        y,
        opacity,
        z_index,
        content,
    })
}

fn pixel_len(width: u16, height: u16, color_depth: ColorDepth) -> usize {
    usize::from(width)
        .saturating_mul(usize::from(height))
        .saturating_mul(color_depth.bytes_per_pixel())
}

/// Decompresses at most `expected + 1` bytes. The size in the cel header is not trusted for
/// allocation.
fn inflate(compressed: &[u8], expected: usize) -> Result<Vec<u8>, DecodeError> {
    let limit = u64::try_from(expected).map_or(u64::MAX, |len| len.saturating_add(1));
    let mut data = Vec::with_capacity(expected.min(compressed.len().saturating_mul(4)));
    ZlibDecoder::new(compressed)
        .take(limit)
        .read_to_end(&mut data)
        .map_err(DecodeError::Decompress)?;
    if data.len() != expected {
        return Err(DecodeError::PixelDataLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(data)
}

fn read_palette(body: &mut ByteReader) -> Result<PaletteChunk, DecodeError> {
    let _size = body.u32()?;
    let first = body.u32()?;
    let last = body.u32()?;
    body.skip(8)?;

    let mut entries = Vec::new();
    for index in first..=last {
        let flags = body.u16()?;
        let rgba = [body.u8()?, body.u8()?, body.u8()?, body.u8()?];
        if flags & 1 != 0 {
            // entry name
            body.string()?;
        }
        entries.push((index, rgba));
    }
    Ok(PaletteChunk { entries })
}

fn read_old_palette(body: &mut ByteReader) -> Result<PaletteChunk, DecodeError> {
    let packets = body.u16()?;
    let mut entries = Vec::new();
    let mut index = 0u32;
    for _ in 0..packets {
        index += u32::from(body.u8()?);
        let count = match body.u8()? {
            0 => 256,
            n => u32::from(n),
        };
        for _ in 0..count {
            entries.push((index, [body.u8()?, body.u8()?, body.u8()?, 0xFF]));
            index += 1;
        }
    }
    Ok(PaletteChunk { entries })
}
