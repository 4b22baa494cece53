//! Rendering pipeline from layers to terminal bytes.
//!
//! **Sub-modules:**
//!
//! *   [`canvas`](crate::rendering::canvas): Defines the [`Canvas`](canvas::Canvas), the per-frame pixel buffer.
//! *   [`compositor`](crate::rendering::compositor): Merges a frame's layers into a canvas.
//! *   [`renderer`](crate::rendering::renderer): Turns a canvas into background-colored terminal cells.
//!
//! **Rendering Process:**
//!
//! 1.  [`compose`](compositor::compose) a frame's layers into a fresh, transparent canvas.
//! 2.  Hand the canvas to an [`AnsiRenderer`](renderer::AnsiRenderer), which queues one cell per pixel.
//! 3.  Call `flush()` to write the queued frame to the terminal.

pub mod canvas;
pub mod compositor;
pub mod renderer;
