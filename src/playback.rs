//! Frame scheduling.
//!
//! A [`Player`] drives the whole pipeline: for every frame it composites the layers, renders
//! the canvas and flushes it to the terminal. Still images are printed once. Animations clear
//! the screen before every frame and sleep for the frame's duration afterwards, cycling
//! through the frames in order until the [`LoopControl`] says stop (which [`Forever`] never
//! does).
//!
//! Durations are honored literally: a slow frame is never skipped or shortened to catch up.

use crate::document::{Document, Frame};
use crate::guard::TerminalGuard;
use crate::rendering::compositor::compose;
use crate::rendering::renderer::AnsiRenderer;
use std::io;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("frame {index} is out of range, the sprite has {count} frames")]
    FrameOutOfRange { index: usize, count: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How a document is presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    /// A single static print, left on the terminal.
    Still,
    /// Looping, full-screen playback with a hidden cursor.
    Animation,
}

impl PlaybackMode {
    pub fn of(document: &Document) -> Self {
        if document.is_animated() {
            PlaybackMode::Animation
        } else {
            PlaybackMode::Still
        }
    }
}

/// Waits between frames.
pub trait FrameClock {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadClock;

impl FrameClock for ThreadClock {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Decides, before each frame of an animation, whether playback goes on.
pub trait LoopControl {
    fn next_frame(&mut self) -> bool;
}

/// Plays until the process is stopped from the outside.
#[derive(Clone, Copy, Debug, Default)]
pub struct Forever;

impl LoopControl for Forever {
    fn next_frame(&mut self) -> bool {
        true
    }
}

/// Stops after a fixed number of presented frames.
#[derive(Clone, Copy, Debug)]
pub struct FrameLimit {
    remaining: u64,
}

impl FrameLimit {
    pub fn new(frames: u64) -> Self {
        Self { remaining: frames }
    }

    /// Enough frames to play `document` through `loops` times.
    pub fn loops(document: &Document, loops: u64) -> Self {
        Self::new(loops.saturating_mul(document.frames().len() as u64))
    }
}

impl LoopControl for FrameLimit {
    fn next_frame(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Presents documents on a sink, one frame at a time.
pub struct Player<W: Write, C: FrameClock = ThreadClock> {
    renderer: AnsiRenderer<W>,
    clock: C,
}

impl<W: Write> Player<W> {
    pub fn new(sink: W) -> Self {
        Self::with_clock(sink, ThreadClock)
    }
}

impl<W: Write, C: FrameClock> Player<W, C> {
    pub fn with_clock(sink: W, clock: C) -> Self {
        Self {
            renderer: AnsiRenderer::new_with_sink(sink),
            clock,
        }
    }

    /// Plays `document` the way its [`PlaybackMode`] calls for.
    pub fn play<G: Write + Send + 'static>(
        &mut self,
        document: &Document,
        guard: &TerminalGuard<G>,
        control: impl LoopControl,
    ) -> io::Result<()> {
        match PlaybackMode::of(document) {
            PlaybackMode::Still => self.play_single(document),
            PlaybackMode::Animation => self.play_loop(document, guard, control),
        }
    }

    /// Prints the first frame once. Never clears the screen or hides the cursor.
    pub fn play_single(&mut self, document: &Document) -> io::Result<()> {
        if let Some(frame) = document.frames().first() {
            self.present(document, frame)?;
        }
        self.renderer.flush()
    }

    /// Prints frame `index` once, as a still.
    pub fn play_frame(&mut self, document: &Document, index: usize) -> Result<(), PlaybackError> {
        let frame = document
            .frames()
            .get(index)
            .ok_or(PlaybackError::FrameOutOfRange {
                index,
                count: document.frames().len(),
            })?;
        self.present(document, frame)?;
        self.renderer.flush()?;
        Ok(())
    }

    /// Cycles through the frames of `document` for as long as `control` allows.
    ///
    /// The cursor is hidden through `guard` first. Every frame starts on a cleared screen and
    /// is followed by a sleep of exactly its duration.
    pub fn play_loop<G: Write + Send + 'static>(
        &mut self,
        document: &Document,
        guard: &TerminalGuard<G>,
        mut control: impl LoopControl,
    ) -> io::Result<()> {
        guard.hide_cursor(self.renderer.sink_mut())?;

        for (index, frame) in document.frames().iter().enumerate().cycle() {
            if !control.next_frame() {
                break;
            }
            log::trace!("presenting frame {index} for {:?}", frame.duration());
            self.renderer.clear_screen()?;
            self.present(document, frame)?;
            self.renderer.flush()?;
            self.clock.sleep(frame.duration());
        }

        self.renderer.flush()
    }

    fn present(&mut self, document: &Document, frame: &Frame) -> io::Result<()> {
        let canvas = compose(document.width(), document.height(), frame.layers());
        self.renderer.render(&canvas)
    }

    pub fn into_inner(self) -> W {
        self.renderer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Layer;
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::rc::Rc;

    const CLEAR: &str = "\x1b[2J\x1b[1;1H";
    const HIDE: &str = "\x1b[?25l";
    const RED_CELL: &str = "\x1b[48;2;255;0;0m \x1b[0m\n";
    const BLUE_CELL: &str = "\x1b[48;2;0;0;255m \x1b[0m\n";

    /// Terminal output and sleeps, interleaved in the order they happened.
    #[derive(Clone, Default)]
    struct Transcript(Rc<RefCell<String>>);

    impl Transcript {
        fn contents(&self) -> String {
            self.0.borrow().clone()
        }
    }

    impl Write for Transcript {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().push_str(&String::from_utf8_lossy(buf));
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl FrameClock for Transcript {
        fn sleep(&mut self, duration: Duration) {
            let line = format!("<sleep {}ms>", duration.as_millis());
            self.0.borrow_mut().push_str(&line);
        }
    }

    fn pixel_frame(color: [u8; 4], millis: u64) -> Frame {
        let layer = Layer::new(0, 0, RgbaImage::from_pixel(1, 1, Rgba(color)));
        Frame::new(vec![layer], Duration::from_millis(millis))
    }

    fn red_blue() -> Document {
        Document::new(
            1,
            1,
            vec![
                pixel_frame([255, 0, 0, 255], 100),
                pixel_frame([0, 0, 255, 255], 50),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_loop_presents_frames_in_order_with_their_durations() {
        let transcript = Transcript::default();
        let mut player = Player::with_clock(transcript.clone(), transcript.clone());
        let guard = TerminalGuard::new(Vec::new());

        player
            .play_loop(&red_blue(), &guard, FrameLimit::new(3))
            .unwrap();

        let expected = [
            HIDE,
            CLEAR,
            RED_CELL,
            "<sleep 100ms>",
            CLEAR,
            BLUE_CELL,
            "<sleep 50ms>",
            CLEAR,
            RED_CELL,
            "<sleep 100ms>",
        ]
        .concat();
        assert_eq!(transcript.contents(), expected);
    }

    #[test]
    fn test_single_never_clears_or_hides() {
        let mut player = Player::new(Vec::new());
        player.play_single(&red_blue()).unwrap();
        let out = String::from_utf8(player.into_inner()).unwrap();
        assert_eq!(out, RED_CELL);
        assert!(!out.contains("\x1b[2J"));
        assert!(!out.contains(HIDE));
    }

    #[test]
    fn test_play_dispatches_on_frame_count() {
        let still = Document::new(1, 1, vec![pixel_frame([255, 0, 0, 255], 100)]).unwrap();
        let guard = TerminalGuard::new(Vec::new());

        let clock = Transcript::default();
        let mut player = Player::with_clock(Vec::new(), clock.clone());
        player.play(&still, &guard, Forever).unwrap();
        assert_eq!(player.into_inner(), RED_CELL.as_bytes());
        assert!(clock.contents().is_empty());

        let mut player = Player::with_clock(Vec::new(), Transcript::default());
        player
            .play(&red_blue(), &guard, FrameLimit::new(1))
            .unwrap();
        assert_eq!(
            String::from_utf8(player.into_inner()).unwrap(),
            [HIDE, CLEAR, RED_CELL].concat()
        );
    }

    #[test]
    fn test_play_frame_picks_frame_and_checks_range() {
        let mut player = Player::new(Vec::new());
        player.play_frame(&red_blue(), 1).unwrap();
        assert!(matches!(
            player.play_frame(&red_blue(), 2),
            Err(PlaybackError::FrameOutOfRange { index: 2, count: 2 })
        ));
        assert_eq!(player.into_inner(), BLUE_CELL.as_bytes());
    }

    #[test]
    fn test_zero_limit_only_hides_cursor() {
        let transcript = Transcript::default();
        let mut player = Player::with_clock(transcript.clone(), transcript.clone());
        let guard = TerminalGuard::new(Vec::new());
        player
            .play_loop(&red_blue(), &guard, FrameLimit::new(0))
            .unwrap();
        assert_eq!(transcript.contents(), HIDE);
    }

    #[test]
    fn test_frame_limit_loops() {
        let mut limit = FrameLimit::loops(&red_blue(), 2);
        let presented = std::iter::from_fn(|| limit.next_frame().then_some(())).count();
        assert_eq!(presented, 4);
    }

    #[test]
    fn test_forever_keeps_going() {
        let mut forever = Forever;
        assert!((0..1000).all(|_| forever.next_frame()));
    }
}
