//! Windows specific definitions: the native console backend and the
//! console-mode glue shared with the ANSI fallback.
//!
//! The native backend drives the console through direct Win32 calls
//! instead of escape sequences, which buys three capabilities the ANSI
//! path cannot offer: cursor-position queries, screen-buffer readback, and
//! rectangle fills (a single `FillConsoleOutputCharacterW` clears a block
//! that would take several sequences otherwise). The alternate screen is a
//! second console screen buffer swapped in with
//! `SetConsoleActiveScreenBuffer`; cursor save/restore is a software stack
//! because the API has no native pair.

use std::io;
use std::mem;

use winapi::shared::minwindef::DWORD;
use winapi::um::winnt::HANDLE;
use winapi::um::{consoleapi, handleapi, processenv, winbase, wincon};

use crate::terminal::{
    ColorDepth, CursorStyle, ModeFlags, Platform, SharedModeFlags, TerminalController,
};
use crate::Error;

macro_rules! check {
    ($funcall:expr) => {{
        let rc = unsafe { $funcall };
        if rc == 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
    }};
}

fn std_handle(which: DWORD) -> Result<HANDLE, Error> {
    let handle = unsafe { processenv::GetStdHandle(which) };
    if handle == handleapi::INVALID_HANDLE_VALUE {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    if handle.is_null() {
        return Err(Error::Io(io::Error::other(
            "no stdio handle available for this process",
        )));
    }
    Ok(handle)
}

fn buffer_info(handle: HANDLE) -> Result<wincon::CONSOLE_SCREEN_BUFFER_INFO, Error> {
    let mut info: wincon::CONSOLE_SCREEN_BUFFER_INFO = unsafe { mem::zeroed() };
    check!(wincon::GetConsoleScreenBufferInfo(handle, &mut info));
    Ok(info)
}

/// Saved console input mode from before a raw-mode switch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SavedConsoleModes {
    stdin_mode: DWORD,
}

/// Raw-mode for the ANSI-on-Windows fallback: drop line input, echo, and
/// processed input, and turn on virtual-terminal input so keys arrive as
/// VT sequences the shared decoder understands.
pub(crate) fn enter_vt_raw_mode() -> Result<SavedConsoleModes, Error> {
    let stdin = std_handle(winbase::STD_INPUT_HANDLE)?;
    let mut mode: DWORD = 0;
    check!(consoleapi::GetConsoleMode(stdin, &mut mode));
    let saved = SavedConsoleModes { stdin_mode: mode };

    let raw = (mode
        & !(wincon::ENABLE_LINE_INPUT
            | wincon::ENABLE_ECHO_INPUT
            | wincon::ENABLE_PROCESSED_INPUT))
        | wincon::ENABLE_VIRTUAL_TERMINAL_INPUT;
    check!(consoleapi::SetConsoleMode(stdin, raw));
    Ok(saved)
}

/// Restore the input mode saved by [`enter_vt_raw_mode`].
pub(crate) fn restore_console_modes(saved: &SavedConsoleModes) -> Result<(), Error> {
    let stdin = std_handle(winbase::STD_INPUT_HANDLE)?;
    check!(consoleapi::SetConsoleMode(stdin, saved.stdin_mode));
    Ok(())
}

/// Inject a synthetic key event into the console input queue.
///
/// Unblocks a worker parked in a console read; the cancelled flag makes it
/// discard whatever the read returns.
pub(crate) fn inject_wakeup_event() -> Result<(), Error> {
    let stdin = std_handle(winbase::STD_INPUT_HANDLE)?;
    let mut record: wincon::INPUT_RECORD = unsafe { mem::zeroed() };
    record.EventType = wincon::KEY_EVENT;
    unsafe {
        let key = record.Event.KeyEvent_mut();
        key.bKeyDown = 0;
        key.wRepeatCount = 1;
    }
    let mut written: DWORD = 0;
    check!(consoleapi::WriteConsoleInputW(
        stdin,
        &record,
        1,
        &mut written
    ));
    Ok(())
}

/// A console handle we promise to use from one task at a time.
///
/// Console handles are process-global identifiers, not thread-affine
/// resources; the controller's ownership discipline serializes access.
struct ConsoleHandle(HANDLE);

unsafe impl Send for ConsoleHandle {}

/// Terminal controller speaking the Win32 Console API directly.
pub struct ConsoleTerminal {
    stdin: ConsoleHandle,
    /// The buffer all drawing currently targets: the primary screen
    /// buffer, or the alternate one while it is active.
    active: ConsoleHandle,
    primary: ConsoleHandle,
    alt: Option<ConsoleHandle>,
    modes: SharedModeFlags,
    saved_input_mode: Option<DWORD>,
    /// Software cursor stash; the console API has no save/restore pair.
    cursor_stack: Vec<(i16, i16)>,
    cursor_visible: bool,
}

impl ConsoleTerminal {
    /// Open the console, probing `GetConsoleScreenBufferInfo` so that
    /// redirected output or an ANSI-only shim fails construction and the
    /// factory can fall back.
    pub fn new() -> Result<Self, Error> {
        let stdin = std_handle(winbase::STD_INPUT_HANDLE)?;
        let stdout = std_handle(winbase::STD_OUTPUT_HANDLE)?;
        buffer_info(stdout)?;
        Ok(Self {
            stdin: ConsoleHandle(stdin),
            active: ConsoleHandle(stdout),
            primary: ConsoleHandle(stdout),
            alt: None,
            modes: SharedModeFlags::default(),
            saved_input_mode: None,
            cursor_stack: Vec::new(),
            cursor_visible: true,
        })
    }

    fn set_position(&self, x: i16, y: i16) -> Result<(), Error> {
        let coord = wincon::COORD { X: x, Y: y };
        check!(wincon::SetConsoleCursorPosition(self.active.0, coord));
        Ok(())
    }

    fn position(&self) -> Result<(i16, i16), Error> {
        let info = buffer_info(self.active.0)?;
        Ok((info.dwCursorPosition.X, info.dwCursorPosition.Y))
    }

    /// Blank `length` cells starting at `start`, resetting their
    /// attributes to the current ones.
    fn fill(&self, start: wincon::COORD, length: DWORD) -> Result<(), Error> {
        let info = buffer_info(self.active.0)?;
        let mut written: DWORD = 0;
        check!(wincon::FillConsoleOutputCharacterW(
            self.active.0,
            b' ' as u16,
            length,
            start,
            &mut written
        ));
        check!(wincon::FillConsoleOutputAttribute(
            self.active.0,
            info.wAttributes,
            length,
            start,
            &mut written
        ));
        Ok(())
    }

    fn set_cursor_visibility(&mut self, visible: bool) -> Result<(), Error> {
        let mut info: wincon::CONSOLE_CURSOR_INFO = unsafe { mem::zeroed() };
        check!(wincon::GetConsoleCursorInfo(self.active.0, &mut info));
        info.bVisible = visible as i32;
        check!(wincon::SetConsoleCursorInfo(self.active.0, &info));
        self.cursor_visible = visible;
        Ok(())
    }

    fn write_text(&self, s: &str) -> Result<(), Error> {
        if s.is_empty() {
            return Ok(());
        }
        let utf16: Vec<u16> = s.encode_utf16().collect();
        let mut written: DWORD = 0;
        check!(consoleapi::WriteConsoleW(
            self.active.0,
            utf16.as_ptr() as *const _,
            utf16.len() as DWORD,
            &mut written,
            std::ptr::null_mut()
        ));
        Ok(())
    }
}

#[async_trait::async_trait]
impl TerminalController for ConsoleTerminal {
    async fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<(), Error> {
        self.set_position(x as i16, y as i16)
    }

    async fn cursor_position(&mut self) -> Result<(u16, u16), Error> {
        let (x, y) = self.position()?;
        Ok((x.max(0) as u16, y.max(0) as u16))
    }

    async fn move_cursor_up(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let (x, y) = self.position()?;
        self.set_position(x, y.saturating_sub(n as i16).max(0))
    }

    async fn move_cursor_down(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let info = buffer_info(self.active.0)?;
        let bottom = info.dwSize.Y - 1;
        let (x, y) = (info.dwCursorPosition.X, info.dwCursorPosition.Y);
        self.set_position(x, y.saturating_add(n as i16).min(bottom))
    }

    async fn move_cursor_left(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let (x, y) = self.position()?;
        self.set_position(x.saturating_sub(n as i16).max(0), y)
    }

    async fn move_cursor_right(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let info = buffer_info(self.active.0)?;
        let right = info.dwSize.X - 1;
        let (x, y) = (info.dwCursorPosition.X, info.dwCursorPosition.Y);
        self.set_position(x.saturating_add(n as i16).min(right), y)
    }

    async fn save_cursor_position(&mut self) -> Result<(), Error> {
        let position = self.position()?;
        self.cursor_stack.push(position);
        Ok(())
    }

    async fn restore_cursor_position(&mut self) -> Result<(), Error> {
        if let Some((x, y)) = self.cursor_stack.pop() {
            self.set_position(x, y)?;
        }
        Ok(())
    }

    async fn hide_cursor(&mut self) -> Result<(), Error> {
        self.set_cursor_visibility(false)
    }

    async fn show_cursor(&mut self) -> Result<(), Error> {
        self.set_cursor_visibility(true)
    }

    async fn set_cursor_style(&mut self, style: CursorStyle) -> Result<(), Error> {
        // The console models shape as the filled percentage of the cell.
        let size = match style {
            CursorStyle::Block => 100,
            CursorStyle::Underline => 15,
            CursorStyle::Bar => 25,
        };
        let info = wincon::CONSOLE_CURSOR_INFO {
            dwSize: size,
            bVisible: self.cursor_visible as i32,
        };
        check!(wincon::SetConsoleCursorInfo(self.active.0, &info));
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), Error> {
        let info = buffer_info(self.active.0)?;
        let length = info.dwSize.X as DWORD * info.dwSize.Y as DWORD;
        self.fill(wincon::COORD { X: 0, Y: 0 }, length)?;
        self.set_position(0, 0)
    }

    async fn clear_line(&mut self) -> Result<(), Error> {
        let info = buffer_info(self.active.0)?;
        let y = info.dwCursorPosition.Y;
        self.fill(wincon::COORD { X: 0, Y: y }, info.dwSize.X as DWORD)?;
        self.set_position(0, y)
    }

    async fn clear_from_cursor(&mut self) -> Result<(), Error> {
        let info = buffer_info(self.active.0)?;
        let width = info.dwSize.X as DWORD;
        let height = info.dwSize.Y as DWORD;
        let (x, y) = (info.dwCursorPosition.X, info.dwCursorPosition.Y);
        let consumed = y as DWORD * width + x as DWORD;
        self.fill(info.dwCursorPosition, width * height - consumed)
    }

    async fn clear_lines(&mut self, n: u16) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }
        let info = buffer_info(self.active.0)?;
        let current = info.dwCursorPosition.Y;
        // Clamp at the top: clearing more lines than exist above the
        // cursor clears down from row zero instead.
        let first = current.saturating_sub(n as i16 - 1).max(0);
        let rows = (current - first + 1) as DWORD;
        let start = wincon::COORD { X: 0, Y: first };
        // One rectangle fill covers every requested line.
        self.fill(start, rows * info.dwSize.X as DWORD)?;
        self.set_position(0, first)
    }

    async fn write(&mut self, s: &str) -> Result<(), Error> {
        self.write_text(s)
    }

    async fn write_at(&mut self, x: u16, y: u16, s: &str) -> Result<(), Error> {
        self.set_position(x as i16, y as i16)?;
        self.write_text(s)
    }

    async fn render(&mut self, frame: &str) -> Result<(), Error> {
        self.clear().await?;
        let normalized = frame.replace('\n', "\r\n");
        self.write_text(&normalized)
    }

    async fn read_screen_buffer(&mut self) -> Result<String, Error> {
        let info = buffer_info(self.active.0)?;
        let width = info.dwSize.X as usize;
        let window = info.srWindow;
        let mut out = String::new();
        for row in window.Top..=window.Bottom {
            let mut cells: Vec<u16> = vec![0; width];
            let mut read: DWORD = 0;
            check!(wincon::ReadConsoleOutputCharacterW(
                self.active.0,
                cells.as_mut_ptr(),
                width as DWORD,
                wincon::COORD { X: 0, Y: row },
                &mut read
            ));
            cells.truncate(read as usize);
            let line = String::from_utf16_lossy(&cells);
            out.push_str(line.trim_end());
            if row != window.Bottom {
                out.push('\n');
            }
        }
        Ok(out)
    }

    async fn enter_raw_mode(&mut self) -> Result<(), Error> {
        if self.modes.lock().raw {
            return Err(Error::AlreadyInRawMode);
        }
        let mut mode: DWORD = 0;
        check!(consoleapi::GetConsoleMode(self.stdin.0, &mut mode));
        let raw = (mode
            & !(wincon::ENABLE_LINE_INPUT
                | wincon::ENABLE_ECHO_INPUT
                | wincon::ENABLE_PROCESSED_INPUT))
            | wincon::ENABLE_VIRTUAL_TERMINAL_INPUT;
        check!(consoleapi::SetConsoleMode(self.stdin.0, raw));
        self.saved_input_mode = Some(mode);
        self.modes.lock().raw = true;
        Ok(())
    }

    async fn exit_raw_mode(&mut self) -> Result<(), Error> {
        if !self.modes.lock().raw {
            return Err(Error::NotInRawMode);
        }
        if let Some(saved) = self.saved_input_mode.take() {
            check!(consoleapi::SetConsoleMode(self.stdin.0, saved));
        }
        self.modes.lock().raw = false;
        Ok(())
    }

    async fn enter_alt_screen(&mut self) -> Result<(), Error> {
        if self.modes.lock().alt {
            return Err(Error::AlreadyInAltScreen);
        }
        let buffer = unsafe {
            wincon::CreateConsoleScreenBuffer(
                winapi::um::winnt::GENERIC_READ | winapi::um::winnt::GENERIC_WRITE,
                winapi::um::winnt::FILE_SHARE_READ | winapi::um::winnt::FILE_SHARE_WRITE,
                std::ptr::null(),
                wincon::CONSOLE_TEXTMODE_BUFFER,
                std::ptr::null_mut(),
            )
        };
        if buffer == handleapi::INVALID_HANDLE_VALUE {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        check!(wincon::SetConsoleActiveScreenBuffer(buffer));
        self.alt = Some(ConsoleHandle(buffer));
        self.active = ConsoleHandle(buffer);
        self.modes.lock().alt = true;
        Ok(())
    }

    async fn exit_alt_screen(&mut self) -> Result<(), Error> {
        if !self.modes.lock().alt {
            return Err(Error::NotInAltScreen);
        }
        check!(wincon::SetConsoleActiveScreenBuffer(self.primary.0));
        self.active = ConsoleHandle(self.primary.0);
        if let Some(alt) = self.alt.take() {
            unsafe {
                handleapi::CloseHandle(alt.0);
            }
        }
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
        let mut mode: DWORD = 0;
        check!(consoleapi::GetConsoleMode(self.stdin.0, &mut mode));
        check!(consoleapi::SetConsoleMode(
            self.stdin.0,
            (mode | wincon::ENABLE_MOUSE_INPUT) & !wincon::ENABLE_QUICK_EDIT_MODE
        ));
        Ok(())
    }

    async fn enable_mouse_all_motion(&mut self) -> Result<(), Error> {
        // Console mouse events already include motion; the two modes
        // collapse to one flag here.
        self.enable_mouse_cell_motion().await
    }

    async fn disable_mouse(&mut self) -> Result<(), Error> {
        let mut mode: DWORD = 0;
        check!(consoleapi::GetConsoleMode(self.stdin.0, &mut mode));
        check!(consoleapi::SetConsoleMode(
            self.stdin.0,
            mode & !wincon::ENABLE_MOUSE_INPUT
        ));
        Ok(())
    }

    async fn set_window_title(&mut self, title: &str) -> Result<(), Error> {
        let mut utf16: Vec<u16> = title.encode_utf16().collect();
        utf16.push(0);
        check!(wincon::SetConsoleTitleW(utf16.as_ptr()));
        Ok(())
    }

    fn supports_direct_positioning(&self) -> bool {
        true
    }

    fn supports_readback(&self) -> bool {
        true
    }

    fn supports_true_color(&self) -> bool {
        true
    }

    fn platform(&self) -> Platform {
        Platform::NativeConsole
    }

    fn size(&self) -> (u16, u16) {
        match buffer_info(self.active.0) {
            Ok(info) => (
                info.dwSize.X.max(1) as u16,
                (info.srWindow.Bottom - info.srWindow.Top + 1).max(1) as u16,
            ),
            Err(_) => (80, 24),
        }
    }

    fn color_depth(&self) -> ColorDepth {
        ColorDepth::TrueColor
    }
}

impl Drop for ConsoleTerminal {
    fn drop(&mut self) {
        let flags: ModeFlags = *self.modes.lock();
        if flags.alt {
            unsafe {
                wincon::SetConsoleActiveScreenBuffer(self.primary.0);
            }
            if let Some(alt) = self.alt.take() {
                unsafe {
                    handleapi::CloseHandle(alt.0);
                }
            }
        }
        if flags.raw {
            if let Some(saved) = self.saved_input_mode.take() {
                unsafe {
                    consoleapi::SetConsoleMode(self.stdin.0, saved);
                }
            }
        }
    }
}
