//! Decoder for Aseprite (`.ase` / `.aseprite`) files.
//!
//! This only goes as far as the renderer needs: the file header, the frame headers and the
//! chunks listed in [`Chunk`]. Turning cels into positioned RGBA layers is done by
//! [`Document::from_ase`](crate::document::Document::from_ase).
//!
//! ```rust,no_run
//! let file = tase::ase::read_file("goblin.aseprite").unwrap();
//! println!("{}x{}, {} frames", file.header.width, file.header.height, file.frames.len());
//! ```

pub mod chunk;
mod reader;

use crate::ase::reader::ByteReader;
pub use chunk::{CelChunk, CelContent, Chunk, LayerChunk, LayerKind, PaletteChunk};
use std::path::Path;
use thiserror::Error;

const FILE_MAGIC: u16 = 0xA5E0;
const FRAME_MAGIC: u16 = 0xF1FA;
const HEADER_LEN: usize = 128;
const FRAME_HEADER_LEN: u32 = 16;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("not an aseprite file (magic {found:#06x})")]
    FileMagic { found: u16 },
    #[error("bad frame magic {found:#06x} at offset {offset}")]
    FrameMagic { offset: usize, found: u16 },
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("chunk at offset {offset} has invalid size {size}")]
    ChunkSize { offset: usize, size: u32 },
    #[error("unsupported color depth {0} bits per pixel")]
    ColorDepth(u16),
    #[error("cel pixel data has {actual} bytes, expected {expected}")]
    PixelDataLength { expected: usize, actual: usize },
    #[error("failed to decompress cel: {0}")]
    Decompress(#[source] std::io::Error),
}

/// Pixel format of every cel in a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorDepth {
    /// 4 bytes per pixel: red, green, blue, alpha.
    Rgba,
    /// 2 bytes per pixel: value, alpha.
    Grayscale,
    /// 1 byte per pixel: palette index.
    Indexed,
}

impl ColorDepth {
    fn from_bits(bits: u16) -> Result<Self, DecodeError> {
        match bits {
            32 => Ok(ColorDepth::Rgba),
            16 => Ok(ColorDepth::Grayscale),
            8 => Ok(ColorDepth::Indexed),
            other => Err(DecodeError::ColorDepth(other)),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorDepth::Rgba => 4,
            ColorDepth::Grayscale => 2,
            ColorDepth::Indexed => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub frame_count: u16,
    pub width: u16,
    pub height: u16,
    pub color_depth: ColorDepth,
    /// Palette index that counts as transparent in indexed files.
    pub transparent_index: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AseFrame {
    pub duration_ms: u16,
    pub chunks: Vec<Chunk>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AseFile {
    pub header: Header,
    pub frames: Vec<AseFrame>,
}

/// Reads and decodes the file at `path`.
pub fn read_file(path: impl AsRef<Path>) -> Result<AseFile, DecodeError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Decodes an in-memory Aseprite file.
pub fn decode(bytes: &[u8]) -> Result<AseFile, DecodeError> {
    let mut reader = ByteReader::new(bytes);
    let header = read_header(&mut reader)?;

    let mut frames = Vec::with_capacity(usize::from(header.frame_count));
    for _ in 0..header.frame_count {
        frames.push(read_frame(&mut reader, header.color_depth)?);
    }

    log::debug!(
        "decoded {}x{} sprite, {:?}, {} frames",
        header.width,
        header.height,
        header.color_depth,
        frames.len()
    );
    Ok(AseFile { header, frames })
}

fn read_header(reader: &mut ByteReader) -> Result<Header, DecodeError> {
    let start = reader.position();
    let _file_size = reader.u32()?;
    let magic = reader.u16()?;
    if magic != FILE_MAGIC {
        return Err(DecodeError::FileMagic { found: magic });
    }
    let frame_count = reader.u16()?;
    let width = reader.u16()?;
    let height = reader.u16()?;
    let color_depth = ColorDepth::from_bits(reader.u16()?)?;
    // flags, deprecated speed, two reserved DWORDs
    reader.skip(4 + 2 + 4 + 4)?;
    let transparent_index = reader.u8()?;
    let consumed = reader.position() - start;
    reader.skip(HEADER_LEN - consumed)?;

    Ok(Header {
        frame_count,
        width,
        height,
        color_depth,
        transparent_index,
    })
}

fn read_frame(reader: &mut ByteReader, color_depth: ColorDepth) -> Result<AseFrame, DecodeError> {
    let offset = reader.position();
    let size = reader.u32()?;
    let magic = reader.u16()?;
    if magic != FRAME_MAGIC {
        return Err(DecodeError::FrameMagic {
            offset,
            found: magic,
        });
    }
    let old_chunk_count = reader.u16()?;
    let duration_ms = reader.u16()?;
    reader.skip(2)?;
    let new_chunk_count = reader.u32()?;
    let chunk_count = match new_chunk_count {
        0 => u32::from(old_chunk_count),
        n => n,
    };

    let body_len = size
        .checked_sub(FRAME_HEADER_LEN)
        .ok_or(DecodeError::ChunkSize { offset, size })?;
    let mut body = ByteReader::new(reader.bytes(body_len as usize)?);

    let mut chunks = Vec::new();
    for _ in 0..chunk_count {
        chunks.push(chunk::read_chunk(&mut body, color_depth)?);
    }
    if body.remaining() > 0 {
        log::debug!(
            "frame at offset {offset}: ignoring {} trailing bytes",
            body.remaining()
        );
    }

    Ok(AseFrame {
        duration_ms,
        chunks,
    })
}
