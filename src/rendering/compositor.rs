//! Merges the layers of a frame into a single [`Canvas`].
//!
//! Layers are drawn with the painter's algorithm: every layer is blended "source-over" onto
//! the result of all layers before it, so later layers sit visually on top.

use crate::document::Layer;
use crate::rendering::canvas::{widen, Canvas};
use image::{Pixel, Rgba};

/// Composites `layers` in order onto a fresh, fully transparent `width` x `height` canvas.
///
/// Layer pixels that land outside the canvas are clipped. The layers are not modified.
pub fn compose(width: usize, height: usize, layers: &[Layer]) -> Canvas {
    let mut canvas = Canvas::new(width, height);
    for layer in layers {
        draw_layer(&mut canvas, layer);
    }
    canvas
}

fn draw_layer(canvas: &mut Canvas, layer: &Layer) {
    let (offset_x, offset_y) = layer.offset();
    for (local_x, local_y, source) in layer.image().enumerate_pixels() {
        let x = offset_x + i64::from(local_x);
        let y = offset_y + i64::from(local_y);
        if x < 0 || y < 0 {
            continue;
        }
        let Some(target) = canvas.get_mut(x as usize, y as usize) else {
            continue;
        };
        let source = Rgba(source.0.map(widen));
        blend_over(target, source);
    }
}

/// Blends `source` over `target`. A fully opaque source replaces the target outright.
#[inline]
fn blend_over(target: &mut Rgba<u16>, source: Rgba<u16>) {
    match source[3] {
        0 => {}
        u16::MAX => *target = source,
        _ => target.blend(&source),
    }
}
