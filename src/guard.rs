//! Terminal state restoration.
//!
//! Animation playback hides the cursor. If the process is interrupted (Ctrl-C, `SIGTERM`,
//! `SIGHUP`) the [`TerminalGuard`] shows the cursor again and resets colors before exiting,
//! so the user's terminal is never left with a hidden cursor or a stuck background color.
//!
//! Interrupts are delivered over a one-shot [`interrupt_channel`]: the signal handler only
//! notifies, and a dedicated `terminal-guard` thread waits for the notification, restores the
//! terminal exactly once, and ends the process.
//!
//! The guard also restores the terminal when it is dropped with the cursor still hidden, which
//! covers bounded playback and I/O errors, and [`install_panic_handler`] does the same before
//! a panic message is printed.

use crate::playback::PlaybackMode;
use crossterm::style::ResetColor;
use crossterm::{cursor, queue};
use std::io;
use std::io::{stdout, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("failed to install interrupt handler: {0}")]
    Handler(#[from] ctrlc::Error),
    #[error("failed to spawn guard thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Sending half of the interrupt channel. Cheap to clone, safe to call from a signal handler
/// thread.
#[derive(Clone)]
pub struct InterruptNotifier {
    tx: SyncSender<()>,
}

impl InterruptNotifier {
    /// Requests termination. Requests arriving while one is already pending are dropped.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Receiving half of the interrupt channel.
pub struct InterruptListener {
    rx: Receiver<()>,
}

impl InterruptListener {
    /// Blocks until a termination request arrives. Returns `false` if every notifier is gone.
    pub fn wait(&self) -> bool {
        self.rx.recv().is_ok()
    }
}

/// Creates a connected notifier/listener pair holding at most one pending request.
pub fn interrupt_channel() -> (InterruptNotifier, InterruptListener) {
    let (tx, rx) = sync_channel(1);
    (InterruptNotifier { tx }, InterruptListener { rx })
}

struct Restorer<W> {
    sink: Mutex<W>,
    cursor_hidden: AtomicBool,
    restored: AtomicBool,
}

impl<W: Write> Restorer<W> {
    fn restore(&self) -> io::Result<bool> {
        if self.restored.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        queue!(sink, cursor::Show, ResetColor)?;
        sink.flush()?;
        Ok(true)
    }

    fn needs_restore(&self) -> bool {
        self.cursor_hidden.load(Ordering::SeqCst) && !self.restored.load(Ordering::SeqCst)
    }
}

/// What the guard thread does: wait for one request, restore, then exit.
fn watch<W: Write>(listener: &InterruptListener, restorer: &Restorer<W>, exit: impl FnOnce()) {
    if !listener.wait() {
        return;
    }
    log::debug!("termination requested, restoring terminal");
    if let Err(err) = restorer.restore() {
        log::error!("failed to restore terminal: {err}");
    }
    exit();
}

/// Owner of the terminal's cursor and color state during playback.
pub struct TerminalGuard<W: Write + Send + 'static = Stdout> {
    restorer: Arc<Restorer<W>>,
    armed: bool,
}

impl TerminalGuard<Stdout> {
    /// A guard that restores the terminal on stdout.
    pub fn stdout() -> Self {
        Self::new(stdout())
    }
}

impl<W: Write + Send + 'static> TerminalGuard<W> {
    /// Creates a disarmed guard that writes restoration codes to `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            restorer: Arc::new(Restorer {
                sink: Mutex::new(sink),
                cursor_hidden: AtomicBool::new(false),
                restored: AtomicBool::new(false),
            }),
            armed: false,
        }
    }

    /// Starts listening for termination requests.
    ///
    /// Still images never touch the cursor, so this does nothing for [`PlaybackMode::Still`].
    /// Arming an already armed guard does nothing either.
    pub fn arm(&mut self, mode: PlaybackMode) -> Result<(), GuardError> {
        if mode == PlaybackMode::Still || self.armed {
            return Ok(());
        }

        let (notifier, listener) = interrupt_channel();
        ctrlc::set_handler(move || notifier.notify())?;

        let restorer = Arc::clone(&self.restorer);
        thread::Builder::new()
            .name("terminal-guard".to_string())
            .spawn(move || watch(&listener, &*restorer, || std::process::exit(0)))?;

        self.armed = true;
        log::info!("terminal guard armed");
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Queues a hide-cursor code on `out` and remembers that the cursor needs restoring.
    pub fn hide_cursor(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, cursor::Hide)?;
        self.restorer.cursor_hidden.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Shows the cursor and resets colors. Only the first call writes anything; returns
    /// whether this call did.
    pub fn restore(&self) -> io::Result<bool> {
        self.restorer.restore()
    }
}

impl<W: Write + Send + 'static> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        if self.restorer.needs_restore() {
            if let Err(err) = self.restorer.restore() {
                log::error!("failed to restore terminal: {err}");
            }
        }
    }
}

/// Installs a panic handler that restores the terminal before the panic message is printed.
///
/// Without this, a panic during playback would leave the cursor hidden.
pub fn install_panic_handler<W: Write + Send + 'static>(guard: &TerminalGuard<W>) {
    let restorer = Arc::clone(&guard.restorer);
    let old_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |pinfo| {
        if restorer.needs_restore() {
            let _ = restorer.restore();
        }
        old_hook(pinfo);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const RESTORE: &str = "\x1b[?25h\x1b[0m";

    #[test]
    fn test_restore_writes_once() {
        let out = SharedBuf::default();
        let guard = TerminalGuard::new(out.clone());
        assert!(guard.restore().unwrap());
        assert!(!guard.restore().unwrap());
        assert_eq!(out.contents(), RESTORE);
    }

    #[test]
    fn test_double_interrupt_restores_once() {
        let out = SharedBuf::default();
        let guard = TerminalGuard::new(out.clone());
        let (notifier, listener) = interrupt_channel();
        notifier.notify();
        notifier.notify();
        drop(notifier);

        let exits = Cell::new(0);
        watch(&listener, &*guard.restorer, || exits.set(exits.get() + 1));
        // the second request was coalesced into the first, the channel is now closed
        watch(&listener, &*guard.restorer, || exits.set(exits.get() + 1));

        assert_eq!(exits.get(), 1);
        assert_eq!(out.contents(), RESTORE);
    }

    #[test]
    fn test_concurrent_restores_write_once() {
        let out = SharedBuf::default();
        let guard = Arc::new(TerminalGuard::new(out.clone()));
        let handles = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                thread::spawn(move || guard.restore().unwrap())
            })
            .collect::<Vec<_>>();
        let wrote = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&wrote| wrote)
            .count();
        assert_eq!(wrote, 1);
        assert_eq!(out.contents(), RESTORE);
    }

    #[test]
    fn test_drop_restores_hidden_cursor() {
        let out = SharedBuf::default();
        let mut frame = Vec::new();
        {
            let guard = TerminalGuard::new(out.clone());
            guard.hide_cursor(&mut frame).unwrap();
        }
        assert_eq!(frame, b"\x1b[?25l");
        assert_eq!(out.contents(), RESTORE);
    }

    #[test]
    fn test_drop_without_hiding_is_silent() {
        let out = SharedBuf::default();
        drop(TerminalGuard::new(out.clone()));
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_arm_is_noop_for_stills() {
        let mut guard = TerminalGuard::new(SharedBuf::default());
        guard.arm(PlaybackMode::Still).unwrap();
        assert!(!guard.is_armed());
    }
}
