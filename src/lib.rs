#![doc = include_str!("../README.md")]

pub mod ase;
pub mod document;
pub mod guard;
pub mod playback;
pub mod rendering;

pub use document::{Document, Frame, Layer};
pub use guard::{install_panic_handler, TerminalGuard};
pub use playback::{Forever, FrameLimit, PlaybackMode, Player};
