//! 2D pixel buffer that frames are composited into.
//!
//! The [`Canvas`] is a grid of 16-bit-per-channel RGBA pixels with a fixed width and height.
//! It is created fully transparent for every frame, filled by the
//! [`compositor`](crate::rendering::compositor), and read by the
//! [`renderer`](crate::rendering::renderer).
//!
//! Channels are kept at 16 bit so that blending does not lose precision; the renderer narrows
//! them to 8 bit when emitting terminal colors.

use image::Rgba;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops::{Index, IndexMut};

/// A fully transparent pixel, the initial value of every canvas cell.
pub const TRANSPARENT: Rgba<u16> = Rgba([0, 0, 0, 0]);

/// Alpha values at or below this are rendered as transparent cells.
///
/// This is the half-point of the 16-bit channel range. An 8-bit alpha of 127 widens to
/// `0x7F7F` (transparent), 128 widens to `0x8080` (opaque).
pub const ALPHA_THRESHOLD: u16 = 0x8000;

/// Widens an 8-bit channel to 16 bit, mapping `0xFF` to `0xFFFF`.
#[inline]
pub fn widen(channel: u8) -> u16 {
    u16::from(channel) * 257
}

/// Narrows a 16-bit channel to its 8 most significant bits.
#[inline]
pub fn narrow(channel: u16) -> u8 {
    (channel >> 8) as u8
}

/// Returns whether a pixel is treated as opaque when rendered to the terminal.
#[inline]
pub fn is_opaque(pixel: Rgba<u16>) -> bool {
    pixel[3] > ALPHA_THRESHOLD
}

/// A fixed-size RGBA pixel buffer.
///
/// # Example
///
/// ```rust
/// use image::Rgba;
/// use tase::rendering::canvas::{Canvas, TRANSPARENT};
///
/// let mut canvas = Canvas::new(4, 2);
/// canvas[(3, 1)] = Rgba([0xFFFF, 0, 0, 0xFFFF]);
///
/// assert_eq!(canvas[(0, 0)], TRANSPARENT);
/// assert_eq!(canvas.rows().count(), 2);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Rgba<u16>>,
}

impl Debug for Canvas {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Canvas {{ width: {}, height: {}, pixels: {:?} }}",
            self.width, self.height, self.pixels
        )
    }
}

impl Canvas {
    /// Creates a fully transparent canvas of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width * height],
        }
    }

    #[inline]
    fn get_index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Gets the width of the canvas in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Gets the height of the canvas in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Gets the pixel at the given coordinates, or `None` if they are out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&Rgba<u16>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.get_index(x, y))
    }

    /// Gets a mutable reference to the pixel at the given coordinates, or `None` if they are
    /// out of bounds.
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Rgba<u16>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.get_index(x, y);
        self.pixels.get_mut(idx)
    }

    /// Returns an iterator over the rows of the canvas, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Rgba<u16>]> {
        // chunks_exact panics on 0, an empty canvas simply has no rows
        self.pixels.chunks_exact(self.width.max(1)).take(self.height)
    }
}

impl Index<(usize, usize)> for Canvas {
    type Output = Rgba<u16>;

    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.pixels[self.get_index(x, y)]
    }
}

impl IndexMut<(usize, usize)> for Canvas {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        let idx = self.get_index(x, y);
        &mut self.pixels[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canvas_is_transparent() {
        let canvas = Canvas::new(3, 2);
        assert_eq!(canvas.width(), 3);
        assert_eq!(canvas.height(), 2);
        for row in canvas.rows() {
            assert_eq!(row.len(), 3);
            assert!(row.iter().all(|&p| p == TRANSPARENT));
        }
    }

    #[test]
    fn test_get_out_of_bounds() {
        let mut canvas = Canvas::new(2, 2);
        assert!(canvas.get(2, 0).is_none());
        assert!(canvas.get(0, 2).is_none());
        assert!(canvas.get_mut(5, 5).is_none());
        assert!(canvas.get(1, 1).is_some());
    }

    #[test]
    fn test_rows_are_in_order() {
        let mut canvas = Canvas::new(2, 3);
        canvas[(1, 2)] = Rgba([1, 2, 3, 4]);
        let rows = canvas.rows().collect::<Vec<_>>();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][1], Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn test_widen_and_narrow() {
        assert_eq!(widen(0xFF), 0xFFFF);
        assert_eq!(widen(0), 0);
        assert_eq!(widen(0x80), 0x8080);
        for c in 0..=255u8 {
            assert_eq!(narrow(widen(c)), c);
        }
    }

    #[test]
    fn test_alpha_threshold_boundary() {
        assert!(!is_opaque(Rgba([0xFFFF, 0, 0, ALPHA_THRESHOLD])));
        assert!(is_opaque(Rgba([0xFFFF, 0, 0, ALPHA_THRESHOLD + 1])));
        assert!(!is_opaque(Rgba([0, 0, 0, widen(127)])));
        assert!(is_opaque(Rgba([0, 0, 0, widen(128)])));
    }
}
