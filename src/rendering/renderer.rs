//! Terminal output for composited canvases.
//!
//! [`AnsiRenderer`] walks a [`Canvas`] row by row and writes every pixel as one terminal cell:
//!
//! *   **Transparent pixels** (alpha at or below [`ALPHA_THRESHOLD`]) become a plain space.
//! *   **Opaque pixels** become a 24-bit background color code followed by a space. Every
//!     opaque cell carries its own color code, even when it repeats the previous one.
//! *   A colored run is closed with a reset code when a transparent pixel follows it and at
//!     the end of every row, so no background color bleeds into the next line.
//!
//! Output is queued with `crossterm` and only reaches the terminal on [`AnsiRenderer::flush`].
//! Paired with a [`FrameBuffer`] sink, a whole frame is written in a single call.
//!
//! [`ALPHA_THRESHOLD`]: crate::rendering::canvas::ALPHA_THRESHOLD

use crate::rendering::canvas::{is_opaque, narrow, Canvas};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor};
use crossterm::{cursor, queue, terminal};
use image::Rgba;
use std::io;
use std::io::{stdout, Stdout, Write};

/// Writes canvases to a sink as background-colored terminal cells.
pub struct AnsiRenderer<W: Write> {
    sink: W,
}

impl<W: Write> AnsiRenderer<W> {
    /// Creates a renderer writing to `sink`.
    ///
    /// Allows rendering to targets such as `stdout`, files, or in-memory buffers.
    pub fn new_with_sink(sink: W) -> Self {
        Self { sink }
    }

    /// Queues the cells of `canvas`, top to bottom and left to right.
    pub fn render(&mut self, canvas: &Canvas) -> io::Result<()> {
        for row in canvas.rows() {
            self.render_row(row)?;
        }
        Ok(())
    }

    fn render_row(&mut self, row: &[Rgba<u16>]) -> io::Result<()> {
        // whether the last emitted cell left a background color active
        let mut colored = false;
        for &pixel in row {
            if !is_opaque(pixel) {
                if colored {
                    queue!(self.sink, ResetColor)?;
                    colored = false;
                }
                queue!(self.sink, Print(' '))?;
                continue;
            }
            // straight color; alpha only decides whether the cell is drawn
            let [r, g, b, _] = pixel.0.map(narrow);
            queue!(
                self.sink,
                SetBackgroundColor(Color::Rgb { r, g, b }),
                Print(' ')
            )?;
            colored = true;
        }
        if colored {
            queue!(self.sink, ResetColor)?;
        }
        queue!(self.sink, Print('\n'))
    }

    /// Queues a full screen clear and moves the cursor to the top-left corner.
    pub fn clear_screen(&mut self) -> io::Result<()> {
        queue!(
            self.sink,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )
    }

    /// Flushes everything queued so far to the sink's target.
    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    /// Gives direct access to the sink, e.g. for writing cursor codes.
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Consumes the renderer and returns the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Buffered writer that _only_ writes to its target on an explicit flush.
///
/// A frame is queued in memory and handed to the terminal in one write, which keeps
/// animations from tearing halfway through a frame.
pub struct FrameBuffer<W: Write = Stdout> {
    buf: Vec<u8>,
    target: W,
}

impl FrameBuffer<Stdout> {
    /// A frame buffer in front of stdout.
    pub fn new() -> Self {
        Self::with_target(stdout())
    }
}

impl Default for FrameBuffer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> FrameBuffer<W> {
    /// A frame buffer in front of `target`.
    pub fn with_target(target: W) -> Self {
        Self {
            buf: vec![],
            target,
        }
    }

    /// Bytes queued since the last flush.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    pub fn get_ref(&self) -> &W {
        &self.target
    }
}

impl<W: Write> Write for FrameBuffer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Writes the queued frame in one go. The queue is emptied even if the write fails, so a
    /// broken frame is never sent twice.
    fn flush(&mut self) -> io::Result<()> {
        let result = self
            .target
            .write_all(&self.buf)
            .and_then(|()| self.target.flush());
        self.buf.clear();
        result
    }
}
