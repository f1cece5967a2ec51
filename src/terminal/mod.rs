//! Terminal management and abstraction for oolong.
//!
//! This module provides the platform-abstracted terminal controller: one
//! contract covering cursor motion, visibility, style, screen and line
//! clearing, raw writes, size and capability discovery, and the
//! alternate-screen and raw-mode lifecycle. Two backends satisfy the
//! contract:
//!
//! - [`AnsiTerminal`]: an escape-sequence emitter layered over termios (or
//!   console-mode flags on Windows) for raw mode. Works anywhere a VT-style
//!   terminal does.
//! - `ConsoleTerminal` (Windows only): direct Win32 Console API calls, with
//!   screen-buffer readback and rectangle fills the ANSI path cannot offer.
//!
//! [`detect`] picks a backend at construction: the native console is tried
//! first on platforms where it exists, falling back to ANSI when the
//! probing syscall fails (redirected output, WSL, an ANSI-mode shim).
//! Callers that need a capability must use the typed predicates
//! ([`TerminalController::supports_readback`] and friends), never branch on
//! [`TerminalController::platform`] — the platform enum exists for
//! diagnostics only.
//!
//! # Mode invariants
//!
//! Raw mode and the alternate screen are each a two-state machine:
//! `out --enter()--> in --exit()--> out`. Any other edge is a caller error
//! ([`Error::AlreadyInRawMode`], [`Error::NotInAltScreen`], ...). Both
//! flags live under a single mutex per controller instance, so concurrent
//! readers observe transitions atomically.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::Error;

mod ansi;
mod mock;
#[cfg(unix)]
pub(crate) mod unix;
#[cfg(windows)]
pub(crate) mod windows;

pub use ansi::AnsiTerminal;
pub use mock::{MockCall, MockTerminal, MockTerminalHandle};
#[cfg(windows)]
pub use windows::ConsoleTerminal;

/// The cursor shapes a controller can request.
///
/// Platforms approximate: the ANSI backend emits the DECSCUSR-style
/// sequence, the native console maps the shape onto cursor-cell height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    /// A filled cell.
    Block,
    /// A low underline.
    Underline,
    /// A thin vertical bar.
    Bar,
}

/// Which backend family a controller belongs to.
///
/// Diagnostic only. Capability questions must go through the typed
/// predicates on [`TerminalController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Direct Win32 Console API backend.
    NativeConsole,
    /// ANSI backend on a Unix-family system.
    Unix,
    /// ANSI backend on Windows (native probe failed or was skipped).
    WindowsAnsi,
    /// ANSI backend on an unrecognized system.
    Unknown,
}

/// Color resolution the attached terminal advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    /// The classic 16-color palette.
    Ansi16,
    /// The xterm 256-color palette.
    Ansi256,
    /// 24-bit direct color.
    TrueColor,
}

/// A shareable asynchronous output sink, as injected via
/// `ProgramBuilder::output`.
pub type SharedWriter = Arc<Mutex<dyn AsyncWrite + Send + Unpin>>;

/// Where a controller sends its bytes: the process's stdout, or an
/// injected writer (tests, captures, redirection).
pub(crate) enum Output {
    /// The process's own standard output.
    Stdout,
    /// An injected asynchronous writer.
    Writer(SharedWriter),
}

impl Output {
    pub(crate) fn from_writer(writer: Option<SharedWriter>) -> Self {
        match writer {
            Some(writer) => Output::Writer(writer),
            None => Output::Stdout,
        }
    }

    /// Write and flush in one step. Every emission flushes: the sequences
    /// this crate writes are small and must reach the terminal before the
    /// next mode-changing syscall.
    pub(crate) async fn emit(&self, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Output::Stdout => {
                use std::io::Write;
                let mut stdout = std::io::stdout();
                stdout.write_all(bytes)?;
                stdout.flush()?;
                Ok(())
            }
            Output::Writer(writer) => {
                let mut writer = writer.lock().await;
                writer.write_all(bytes).await?;
                writer.flush().await?;
                Ok(())
            }
        }
    }
}

/// The raw-mode / alt-screen flag pair, kept under one mutex per
/// controller instance.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ModeFlags {
    pub(crate) raw: bool,
    pub(crate) alt: bool,
}

pub(crate) type SharedModeFlags = Arc<parking_lot::Mutex<ModeFlags>>;

/// The platform-abstracted terminal capability surface.
///
/// All mutating operations take `&mut self`; the controller is owned
/// exclusively by the program while the TUI is active, and yielded
/// temporarily during external-process handoff. Flag reads are safe from
/// any thread holding a shared reference.
///
/// # Failure semantics
///
/// Syscall and write errors in cursor/clear operations surface directly;
/// the caller decides what to do. Mode transitions are strict (see the
/// module docs). Restore paths in the program are best-effort and keep
/// going past individual failures.
#[async_trait::async_trait]
pub trait TerminalController: Send {
    /// Place the cursor at 0-based column `x`, row `y`.
    async fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<(), Error>;

    /// Query the cursor position on platforms that can answer without an
    /// escape-sequence round-trip.
    ///
    /// Fails with [`Error::Unsupported`] on the ANSI backend; guard with
    /// [`TerminalController::supports_direct_positioning`].
    async fn cursor_position(&mut self) -> Result<(u16, u16), Error>;

    /// Move the cursor up `n` rows. No-op when `n == 0`; clamped to the
    /// buffer bounds on backends that track them.
    async fn move_cursor_up(&mut self, n: u16) -> Result<(), Error>;

    /// Move the cursor down `n` rows. No-op when `n == 0`.
    async fn move_cursor_down(&mut self, n: u16) -> Result<(), Error>;

    /// Move the cursor left `n` columns. No-op when `n == 0`.
    async fn move_cursor_left(&mut self, n: u16) -> Result<(), Error>;

    /// Move the cursor right `n` columns. No-op when `n == 0`.
    async fn move_cursor_right(&mut self, n: u16) -> Result<(), Error>;

    /// Push the current cursor position onto the controller's save stack.
    ///
    /// Save/restore form LIFO pairs per controller instance; nested saves
    /// behave like a stack even where the emulator only stores one slot.
    async fn save_cursor_position(&mut self) -> Result<(), Error>;

    /// Pop the most recently saved cursor position and move there.
    async fn restore_cursor_position(&mut self) -> Result<(), Error>;

    /// Hide the cursor.
    async fn hide_cursor(&mut self) -> Result<(), Error>;

    /// Show the cursor.
    async fn show_cursor(&mut self) -> Result<(), Error>;

    /// Request a cursor shape; platforms approximate.
    async fn set_cursor_style(&mut self, style: CursorStyle) -> Result<(), Error>;

    /// Blank the whole screen and home the cursor to (0, 0).
    async fn clear(&mut self) -> Result<(), Error>;

    /// Blank the current line and leave the cursor at column 0.
    async fn clear_line(&mut self) -> Result<(), Error>;

    /// Erase from the cursor to the end of the screen.
    async fn clear_from_cursor(&mut self) -> Result<(), Error>;

    /// Clear `n` lines ending at the current row, leaving the cursor at
    /// column 0 of the first cleared line.
    ///
    /// No-op when `n == 0`. When `n` exceeds the current row the clear
    /// clamps at the top of the screen and the cursor lands at (0, 0).
    async fn clear_lines(&mut self, n: u16) -> Result<(), Error>;

    /// Write raw text at the current cursor position.
    async fn write(&mut self, s: &str) -> Result<(), Error>;

    /// Write raw text at an explicit position.
    async fn write_at(&mut self, x: u16, y: u16, s: &str) -> Result<(), Error>;

    /// Write the current frame: home the cursor, clear, and emit the frame
    /// with newlines normalized for raw mode.
    ///
    /// This is the bare "write current frame" contract; differential
    /// rendering belongs to an external renderer collaborator.
    async fn render(&mut self, frame: &str) -> Result<(), Error>;

    /// Read the visible screen contents back as text.
    ///
    /// Native console only; fails with [`Error::Unsupported`] elsewhere.
    /// Guard with [`TerminalController::supports_readback`].
    async fn read_screen_buffer(&mut self) -> Result<String, Error>;

    /// Switch input to raw mode: no line buffering, no echo, no signal
    /// processing; each byte is delivered immediately.
    ///
    /// Fails with [`Error::AlreadyInRawMode`] if raw mode is engaged.
    async fn enter_raw_mode(&mut self) -> Result<(), Error>;

    /// Restore the input attributes saved by `enter_raw_mode`.
    ///
    /// Fails with [`Error::NotInRawMode`] if raw mode is not engaged.
    async fn exit_raw_mode(&mut self) -> Result<(), Error>;

    /// Switch to the alternate screen buffer, preserving the primary
    /// screen's contents and scrollback.
    ///
    /// Fails with [`Error::AlreadyInAltScreen`] if already active.
    async fn enter_alt_screen(&mut self) -> Result<(), Error>;

    /// Switch back to the primary screen buffer.
    ///
    /// Fails with [`Error::NotInAltScreen`] if not active.
    async fn exit_alt_screen(&mut self) -> Result<(), Error>;

    /// Thread-safe read of the raw-mode flag.
    fn is_in_raw_mode(&self) -> bool;

    /// Thread-safe read of the alt-screen flag.
    fn is_in_alt_screen(&self) -> bool;

    /// Enable mouse reporting for cell-to-cell motion.
    async fn enable_mouse_cell_motion(&mut self) -> Result<(), Error>;

    /// Enable mouse reporting for all motion.
    async fn enable_mouse_all_motion(&mut self) -> Result<(), Error>;

    /// Disable all mouse reporting.
    async fn disable_mouse(&mut self) -> Result<(), Error>;

    /// Set the terminal window title.
    async fn set_window_title(&mut self, title: &str) -> Result<(), Error>;

    /// True when the backend can both place and query the cursor without
    /// an escape-sequence round-trip.
    fn supports_direct_positioning(&self) -> bool;

    /// True when [`TerminalController::read_screen_buffer`] works.
    fn supports_readback(&self) -> bool;

    /// True when the terminal takes 24-bit color.
    fn supports_true_color(&self) -> bool;

    /// Which backend family this controller is. Diagnostics only.
    fn platform(&self) -> Platform;

    /// Current terminal size as (columns, rows), with an (80, 24) fallback
    /// when detection fails.
    fn size(&self) -> (u16, u16);

    /// The color resolution the terminal advertises.
    fn color_depth(&self) -> ColorDepth;
}

/// Construct the best terminal controller for this process.
///
/// On Windows the native console backend is probed first; if querying the
/// screen-buffer info fails — redirected output, WSL, an ANSI-mode shim —
/// construction falls back to the ANSI backend. Everywhere else the ANSI
/// backend is used directly. An injected output writer always selects the
/// ANSI backend, since the native console writes through its own handles.
pub fn detect(output: Option<SharedWriter>) -> Result<Box<dyn TerminalController>, Error> {
    #[cfg(windows)]
    {
        if output.is_none() {
            if let Ok(console) = windows::ConsoleTerminal::new() {
                return Ok(Box::new(console));
            }
        }
    }
    Ok(Box::new(AnsiTerminal::new(output)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_produces_a_controller() {
        let controller = detect(None).expect("controller");
        // Whatever backend was picked, the capability predicates must be
        // answerable without touching the terminal.
        let _ = controller.supports_readback();
        let _ = controller.platform();
    }

    #[test]
    fn size_has_fallback() {
        let controller = detect(None).expect("controller");
        let (w, h) = controller.size();
        assert!(w > 0);
        assert!(h > 0);
    }
}
