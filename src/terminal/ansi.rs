//! The escape-sequence terminal backend.
//!
//! [`AnsiTerminal`] drives any VT-style terminal by emitting ANSI control
//! sequences on its output sink, with raw mode handled by a thin syscall
//! wrapper (termios on POSIX, console-mode flags on Windows). It has no
//! way to read the screen or the cursor position back, so
//! `cursor_position` and `read_screen_buffer` report
//! [`Error::Unsupported`]; callers discover that through the capability
//! predicates rather than by platform sniffing.

use crate::terminal::{
    ColorDepth, CursorStyle, ModeFlags, Output, Platform, SharedModeFlags, SharedWriter,
    TerminalController,
};
use crate::Error;

// The bit-exact sequence surface this backend speaks.
const ALT_SCREEN_ENTER: &str = "\x1b[?1049h";
const ALT_SCREEN_EXIT: &str = "\x1b[?1049l";
const CURSOR_SHOW: &str = "\x1b[?25h";
const CURSOR_HIDE: &str = "\x1b[?25l";
const CURSOR_SAVE: &str = "\x1b[s";
const CURSOR_RESTORE: &str = "\x1b[u";
const CLEAR_SCREEN: &str = "\x1b[2J";
const CLEAR_LINE: &str = "\r\x1b[2K";
const CLEAR_FROM_CURSOR: &str = "\x1b[J";
const CURSOR_HOME: &str = "\x1b[1;1H";

/// Terminal controller that talks pure ANSI.
///
/// Output goes to the process's stdout or to an injected asynchronous
/// writer (tests, captures). Raw mode always acts on the process's real
/// stdin, so entering it can fail in non-TTY contexts; the program treats
/// that as best-effort.
pub struct AnsiTerminal {
    output: Output,
    modes: SharedModeFlags,
    platform: Platform,
    color_depth: ColorDepth,
    /// Reusable buffer for frame writes to minimize allocations.
    render_buffer: String,
    #[cfg(unix)]
    saved_termios: Option<super::unix::SavedTermios>,
    #[cfg(windows)]
    saved_console: Option<super::windows::SavedConsoleModes>,
}

impl AnsiTerminal {
    /// Create an ANSI backend writing to `writer`, or to stdout when
    /// `None`.
    pub fn new(writer: Option<SharedWriter>) -> Self {
        #[cfg(unix)]
        let platform = Platform::Unix;
        #[cfg(windows)]
        let platform = Platform::WindowsAnsi;
        #[cfg(not(any(unix, windows)))]
        let platform = Platform::Unknown;

        Self {
            output: Output::from_writer(writer),
            modes: SharedModeFlags::default(),
            platform,
            color_depth: color_depth_from_env(),
            render_buffer: String::with_capacity(8192),
            #[cfg(unix)]
            saved_termios: None,
            #[cfg(windows)]
            saved_console: None,
        }
    }

    async fn emit(&mut self, sequence: &str) -> Result<(), Error> {
        self.output.emit(sequence.as_bytes()).await
    }

    #[cfg(unix)]
    fn engage_raw_mode(&mut self) -> Result<(), Error> {
        let saved = super::unix::enter_raw_mode(libc::STDIN_FILENO)?;
        self.saved_termios = Some(saved);
        Ok(())
    }

    #[cfg(windows)]
    fn engage_raw_mode(&mut self) -> Result<(), Error> {
        let saved = super::windows::enter_vt_raw_mode()?;
        self.saved_console = Some(saved);
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn engage_raw_mode(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported("raw mode"))
    }

    #[cfg(unix)]
    fn release_raw_mode(&mut self) -> Result<(), Error> {
        if let Some(saved) = self.saved_termios.take() {
            super::unix::restore_mode(libc::STDIN_FILENO, &saved)?;
        }
        Ok(())
    }

    #[cfg(windows)]
    fn release_raw_mode(&mut self) -> Result<(), Error> {
        if let Some(saved) = self.saved_console.take() {
            super::windows::restore_console_modes(&saved)?;
        }
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn release_raw_mode(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Discover the advertised color resolution from the environment.
///
/// `COLORTERM` set to `truecolor` or `24bit` wins; a `TERM` containing
/// `256color` means the xterm palette; anything else gets the classic 16.
fn color_depth_from_env() -> ColorDepth {
    if let Ok(colorterm) = std::env::var("COLORTERM") {
        let colorterm = colorterm.to_ascii_lowercase();
        if colorterm == "truecolor" || colorterm == "24bit" {
            return ColorDepth::TrueColor;
        }
    }
    if let Ok(term) = std::env::var("TERM") {
        if term.contains("256color") {
            return ColorDepth::Ansi256;
        }
    }
    ColorDepth::Ansi16
}

#[async_trait::async_trait]
impl TerminalController for AnsiTerminal {
    async fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<(), Error> {
        // ANSI addressing is 1-based.
        let sequence = format!("\x1b[{};{}H", y.saturating_add(1), x.saturating_add(1));
        self.emit(&sequence).await
    }

    async fn cursor_position(&mut self) -> Result<(u16, u16), Error> {
        Err(Error::Unsupported("cursor position query"))
    }

    async fn move_cursor_up(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let sequence = format!("\x1b[{n}A");
        self.emit(&sequence).await
    }

    async fn move_cursor_down(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let sequence = format!("\x1b[{n}B");
        self.emit(&sequence).await
    }

    async fn move_cursor_right(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let sequence = format!("\x1b[{n}C");
        self.emit(&sequence).await
    }

    async fn move_cursor_left(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let sequence = format!("\x1b[{n}D");
        self.emit(&sequence).await
    }

    async fn save_cursor_position(&mut self) -> Result<(), Error> {
        self.emit(CURSOR_SAVE).await
    }

    async fn restore_cursor_position(&mut self) -> Result<(), Error> {
        self.emit(CURSOR_RESTORE).await
    }

    async fn hide_cursor(&mut self) -> Result<(), Error> {
        self.emit(CURSOR_HIDE).await
    }

    async fn show_cursor(&mut self) -> Result<(), Error> {
        self.emit(CURSOR_SHOW).await
    }

    async fn set_cursor_style(&mut self, style: CursorStyle) -> Result<(), Error> {
        let n = match style {
            CursorStyle::Block => 2,
            CursorStyle::Underline => 4,
            CursorStyle::Bar => 6,
        };
        let sequence = format!("\x1b[{n}q");
        self.emit(&sequence).await
    }

    async fn clear(&mut self) -> Result<(), Error> {
        let mut sequence = String::with_capacity(CLEAR_SCREEN.len() + CURSOR_HOME.len());
        sequence.push_str(CLEAR_SCREEN);
        sequence.push_str(CURSOR_HOME);
        self.emit(&sequence).await
    }

    async fn clear_line(&mut self) -> Result<(), Error> {
        // CR first so the cursor is at column 0 after the erase.
        self.emit(CLEAR_LINE).await
    }

    async fn clear_from_cursor(&mut self) -> Result<(), Error> {
        self.emit(CLEAR_FROM_CURSOR).await
    }

    async fn clear_lines(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let sequence = if n == 1 {
            format!("\r{CLEAR_FROM_CURSOR}")
        } else {
            format!("\x1b[{}A\r{CLEAR_FROM_CURSOR}", n - 1)
        };
        self.emit(&sequence).await
    }

    async fn write(&mut self, s: &str) -> Result<(), Error> {
        self.output.emit(s.as_bytes()).await
    }

    async fn write_at(&mut self, x: u16, y: u16, s: &str) -> Result<(), Error> {
        self.set_cursor_position(x, y).await?;
        self.write(s).await
    }

    async fn render(&mut self, frame: &str) -> Result<(), Error> {
        self.render_buffer.clear();

        // Home + clear, then the frame with newlines normalized for raw
        // mode (bare LF would keep the column).
        let estimated =
            8 + frame.len() + frame.chars().filter(|&c| c == '\n').count();
        self.render_buffer.reserve(estimated);
        self.render_buffer.push_str("\x1b[H");
        self.render_buffer.push_str(CLEAR_SCREEN);
        for ch in frame.chars() {
            if ch == '\n' {
                self.render_buffer.push_str("\r\n");
            } else {
                self.render_buffer.push(ch);
            }
        }

        let buffer = std::mem::take(&mut self.render_buffer);
        let result = self.output.emit(buffer.as_bytes()).await;
        self.render_buffer = buffer;
        result
    }

    async fn read_screen_buffer(&mut self) -> Result<String, Error> {
        Err(Error::Unsupported("screen buffer readback"))
    }

    async fn enter_raw_mode(&mut self) -> Result<(), Error> {
        if self.modes.lock().raw {
            return Err(Error::AlreadyInRawMode);
        }
        self.engage_raw_mode()?;
        self.modes.lock().raw = true;
        Ok(())
    }

    async fn exit_raw_mode(&mut self) -> Result<(), Error> {
        if !self.modes.lock().raw {
            return Err(Error::NotInRawMode);
        }
        self.release_raw_mode()?;
        self.modes.lock().raw = false;
        Ok(())
    }

    async fn enter_alt_screen(&mut self) -> Result<(), Error> {
        if self.modes.lock().alt {
            return Err(Error::AlreadyInAltScreen);
        }
        self.emit(ALT_SCREEN_ENTER).await?;
        self.modes.lock().alt = true;
        Ok(())
    }

    async fn exit_alt_screen(&mut self) -> Result<(), Error> {
        if !self.modes.lock().alt {
            return Err(Error::NotInAltScreen);
        }
        self.emit(ALT_SCREEN_EXIT).await?;
        self.modes.lock().alt = false;
        Ok(())
    }

    fn is_in_raw_mode(&self) -> bool {
        self.modes.lock().raw
    }

    fn is_in_alt_screen(&self) -> bool {
        self.modes.lock().alt
    }

    async fn enable_mouse_cell_motion(&mut self) -> Result<(), Error> {
        self.emit("\x1b[?1002h\x1b[?1006h").await
    }

    async fn enable_mouse_all_motion(&mut self) -> Result<(), Error> {
        self.emit("\x1b[?1003h\x1b[?1006h").await
    }

    async fn disable_mouse(&mut self) -> Result<(), Error> {
        self.emit("\x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l").await
    }

    async fn set_window_title(&mut self, title: &str) -> Result<(), Error> {
        let sequence = format!("\x1b]0;{title}\x07");
        self.emit(&sequence).await
    }

    fn supports_direct_positioning(&self) -> bool {
        false
    }

    fn supports_readback(&self) -> bool {
        false
    }

    fn supports_true_color(&self) -> bool {
        self.color_depth == ColorDepth::TrueColor
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn size(&self) -> (u16, u16) {
        #[cfg(unix)]
        if let Ok(size) = super::unix::window_size(libc::STDOUT_FILENO) {
            return size;
        }
        crossterm::terminal::size().unwrap_or((80, 24))
    }

    fn color_depth(&self) -> ColorDepth {
        self.color_depth
    }
}

impl Drop for AnsiTerminal {
    fn drop(&mut self) {
        // Best-effort restoration; only the real stdout gets cleanup
        // bytes, injected writers belong to tests.
        let flags: ModeFlags = *self.modes.lock();
        if flags.alt {
            if let Output::Stdout = self.output {
                use std::io::Write;
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(ALT_SCREEN_EXIT.as_bytes());
                let _ = stdout.flush();
            }
        }
        if flags.raw {
            let _ = self.release_raw_mode();
        }
    }
}
