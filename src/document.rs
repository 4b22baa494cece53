//! The decoded sprite: canvas size plus frames of positioned layers.
//!
//! A [`Document`] is read-only input to the rendering pipeline. It is normally built from an
//! Aseprite file with [`Document::from_ase`], which is the only place that looks at the
//! decoder's chunk kinds.

use crate::ase::{AseFile, CelContent, Chunk, ColorDepth, Header, LayerKind};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("canvas size {width}x{height} is empty")]
    EmptyCanvas { width: usize, height: usize },
    #[error("document has no frames")]
    NoFrames,
}

/// One positioned pixel image within a frame (a "cel").
///
/// The offset may be negative or put the layer partially or entirely outside the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    x: i64,
    y: i64,
    image: RgbaImage,
}

impl Layer {
    pub fn new(x: i64, y: i64, image: RgbaImage) -> Self {
        Self { x, y, image }
    }

    /// The position of the layer's top-left pixel on the canvas.
    pub fn offset(&self) -> (i64, i64) {
        (self.x, self.y)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// One animation step. Layers are in painter's order: later layers are drawn on top.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    layers: Vec<Layer>,
    duration: Duration,
}

impl Frame {
    pub fn new(layers: Vec<Layer>, duration: Duration) -> Self {
        Self { layers, duration }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// How long the frame stays on screen during playback.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    width: usize,
    height: usize,
    frames: Vec<Frame>,
}

impl Document {
    pub fn new(width: usize, height: usize, frames: Vec<Frame>) -> Result<Self, DocumentError> {
        if width == 0 || height == 0 {
            return Err(DocumentError::EmptyCanvas { width, height });
        }
        if frames.is_empty() {
            return Err(DocumentError::NoFrames);
        }
        Ok(Self {
            width,
            height,
            frames,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Whether the document has more than one frame and should be played as an animation.
    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// Builds a document from a decoded Aseprite file.
    ///
    /// Cels are turned into layers in chunk order. Linked cels reuse the pixels of the frame
    /// they point at. Cels on hidden layers, or below a hidden group, are left out.
    pub fn from_ase(file: &AseFile) -> Result<Self, DocumentError> {
        let header = &file.header;
        let palette = Palette::collect(file);
        let visible = layer_visibility(file);

        // (frame, layer index) -> layer, for resolving linked cels
        let mut resolved: HashMap<(usize, u16), Layer> = HashMap::new();
        let mut frames = Vec::with_capacity(file.frames.len());

        for (frame_index, frame) in file.frames.iter().enumerate() {
            let mut layers = Vec::new();
            for chunk in &frame.chunks {
                let cel = match chunk {
                    Chunk::Cel(cel) => cel,
                    Chunk::Layer(_) | Chunk::Palette(_) | Chunk::Other { .. } => continue,
                };
                let layer = match &cel.content {
                    CelContent::Pixels {
                        width,
                        height,
                        data,
                    } => Layer::new(
                        i64::from(cel.x),
                        i64::from(cel.y),
                        to_rgba(header, &palette, *width, *height, data),
                    ),
                    CelContent::Linked { frame } => {
                        let Some(linked) = resolved.get(&(usize::from(*frame), cel.layer_index))
                        else {
                            log::warn!(
                                "frame {frame_index}: cel on layer {} links to missing frame {frame}",
                                cel.layer_index
                            );
                            continue;
                        };
                        linked.clone()
                    }
                    CelContent::Tilemap => {
                        log::warn!("frame {frame_index}: skipping tilemap cel");
                        continue;
                    }
                    CelContent::Unknown { kind } => {
                        log::warn!("frame {frame_index}: skipping cel of unknown kind {kind}");
                        continue;
                    }
                };
                resolved.insert((frame_index, cel.layer_index), layer.clone());

                if visible
                    .get(usize::from(cel.layer_index))
                    .copied()
                    .unwrap_or(true)
                {
                    layers.push(layer);
                } else {
                    log::debug!(
                        "frame {frame_index}: skipping cel on hidden layer {}",
                        cel.layer_index
                    );
                }
            }
            let duration = Duration::from_millis(u64::from(frame.duration_ms));
            frames.push(Frame::new(layers, duration));
        }

        Document::new(
            usize::from(header.width),
            usize::from(header.height),
            frames,
        )
    }
}

/// Effective visibility of every layer, by layer index. A layer is visible only if it and all
/// of its enclosing groups are.
fn layer_visibility(file: &AseFile) -> Vec<bool> {
    let layers = file
        .frames
        .iter()
        .flat_map(|frame| &frame.chunks)
        .filter_map(|chunk| match chunk {
            Chunk::Layer(layer) => Some(layer),
            _ => None,
        });

    let mut visible = Vec::new();
    // visibility of the groups enclosing the current layer, indexed by child level
    let mut ancestors: Vec<bool> = Vec::new();
    for (index, layer) in layers.enumerate() {
        let level = usize::from(layer.child_level);
        ancestors.truncate(level);
        let effective = ancestors.iter().all(|&v| v) && layer.is_visible();
        if !effective {
            log::debug!("layer {index} ({:?}) is hidden", layer.name);
        }
        visible.push(effective);
        // only a group encloses the following layers of a deeper level
        if layer.kind == LayerKind::Group {
            ancestors.resize(level, true);
            ancestors.push(layer.is_visible());
        }
    }
    visible
}

struct Palette {
    colors: HashMap<u32, [u8; 4]>,
}

impl Palette {
    /// The first palette chunk in the file wins for every index it defines.
    fn collect(file: &AseFile) -> Self {
        let mut colors = HashMap::new();
        for chunk in file.frames.iter().flat_map(|frame| &frame.chunks) {
            if let Chunk::Palette(palette) = chunk {
                for &(index, rgba) in &palette.entries {
                    colors.entry(index).or_insert(rgba);
                }
            }
        }
        Self { colors }
    }

    fn get(&self, index: u8) -> [u8; 4] {
        self.colors
            .get(&u32::from(index))
            .copied()
            .unwrap_or([0, 0, 0, 0])
    }
}

fn to_rgba(header: &Header, palette: &Palette, width: u16, height: u16, data: &[u8]) -> RgbaImage {
    let bpp = header.color_depth.bytes_per_pixel();
    RgbaImage::from_fn(u32::from(width), u32::from(height), |x, y| {
        let idx = (y as usize * usize::from(width) + x as usize) * bpp;
        let Some(pixel) = data.get(idx..idx + bpp) else {
            return Rgba([0, 0, 0, 0]);
        };
        Rgba(match header.color_depth {
            ColorDepth::Rgba => [pixel[0], pixel[1], pixel[2], pixel[3]],
            ColorDepth::Grayscale => [pixel[0], pixel[0], pixel[0], pixel[1]],
            ColorDepth::Indexed if pixel[0] == header.transparent_index => [0, 0, 0, 0],
            ColorDepth::Indexed => palette.get(pixel[0]),
        })
    })
}
