//! A recording mock terminal for tests.
//!
//! [`MockTerminal`] satisfies [`TerminalController`] without touching a
//! real terminal. Every invocation is recorded with its arguments, call
//! counts are queryable per method, and individual methods can be made to
//! fail on demand. The mode flags are tracked honestly, so the same
//! sequencing invariants that hold for real backends can be asserted
//! against the mock.
//!
//! # Example
//!
//! ```rust
//! use oolong::terminal::{MockTerminal, TerminalController};
//!
//! # async fn example() -> Result<(), oolong::Error> {
//! let (mut mock, handle) = MockTerminal::new();
//! mock.enter_raw_mode().await?;
//! mock.exit_raw_mode().await?;
//! assert_eq!(handle.call_count("enter_raw_mode"), 1);
//! assert_eq!(
//!     handle.method_sequence(),
//!     vec!["enter_raw_mode", "exit_raw_mode"]
//! );
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::terminal::{
    ColorDepth, CursorStyle, Platform, SharedModeFlags, TerminalController,
};
use crate::Error;

/// One recorded invocation, with arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `set_cursor_position(x, y)`
    SetCursorPosition(u16, u16),
    /// `cursor_position()`
    CursorPosition,
    /// `move_cursor_up(n)`
    MoveCursorUp(u16),
    /// `move_cursor_down(n)`
    MoveCursorDown(u16),
    /// `move_cursor_left(n)`
    MoveCursorLeft(u16),
    /// `move_cursor_right(n)`
    MoveCursorRight(u16),
    /// `save_cursor_position()`
    SaveCursorPosition,
    /// `restore_cursor_position()`
    RestoreCursorPosition,
    /// `hide_cursor()`
    HideCursor,
    /// `show_cursor()`
    ShowCursor,
    /// `set_cursor_style(style)`
    SetCursorStyle(CursorStyle),
    /// `clear()`
    Clear,
    /// `clear_line()`
    ClearLine,
    /// `clear_from_cursor()`
    ClearFromCursor,
    /// `clear_lines(n)`
    ClearLines(u16),
    /// `write(s)`
    Write(String),
    /// `write_at(x, y, s)`
    WriteAt(u16, u16, String),
    /// `render(frame)`
    Render(String),
    /// `read_screen_buffer()`
    ReadScreenBuffer,
    /// `enter_raw_mode()`
    EnterRawMode,
    /// `exit_raw_mode()`
    ExitRawMode,
    /// `enter_alt_screen()`
    EnterAltScreen,
    /// `exit_alt_screen()`
    ExitAltScreen,
    /// `enable_mouse_cell_motion()`
    EnableMouseCellMotion,
    /// `enable_mouse_all_motion()`
    EnableMouseAllMotion,
    /// `disable_mouse()`
    DisableMouse,
    /// `set_window_title(title)`
    SetWindowTitle(String),
}

impl MockCall {
    /// The method name this call records, as used by
    /// [`MockTerminalHandle::call_count`] and error injection.
    pub fn method(&self) -> &'static str {
        match self {
            MockCall::SetCursorPosition(..) => "set_cursor_position",
            MockCall::CursorPosition => "cursor_position",
            MockCall::MoveCursorUp(_) => "move_cursor_up",
            MockCall::MoveCursorDown(_) => "move_cursor_down",
            MockCall::MoveCursorLeft(_) => "move_cursor_left",
            MockCall::MoveCursorRight(_) => "move_cursor_right",
            MockCall::SaveCursorPosition => "save_cursor_position",
            MockCall::RestoreCursorPosition => "restore_cursor_position",
            MockCall::HideCursor => "hide_cursor",
            MockCall::ShowCursor => "show_cursor",
            MockCall::SetCursorStyle(_) => "set_cursor_style",
            MockCall::Clear => "clear",
            MockCall::ClearLine => "clear_line",
            MockCall::ClearFromCursor => "clear_from_cursor",
            MockCall::ClearLines(_) => "clear_lines",
            MockCall::Write(_) => "write",
            MockCall::WriteAt(..) => "write_at",
            MockCall::Render(_) => "render",
            MockCall::ReadScreenBuffer => "read_screen_buffer",
            MockCall::EnterRawMode => "enter_raw_mode",
            MockCall::ExitRawMode => "exit_raw_mode",
            MockCall::EnterAltScreen => "enter_alt_screen",
            MockCall::ExitAltScreen => "exit_alt_screen",
            MockCall::EnableMouseCellMotion => "enable_mouse_cell_motion",
            MockCall::EnableMouseAllMotion => "enable_mouse_all_motion",
            MockCall::DisableMouse => "disable_mouse",
            MockCall::SetWindowTitle(_) => "set_window_title",
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    failing: HashSet<&'static str>,
    size: Option<(u16, u16)>,
}

/// A terminal controller that records instead of drawing.
pub struct MockTerminal {
    state: Arc<Mutex<MockState>>,
    modes: SharedModeFlags,
    cursor_stack: Vec<(u16, u16)>,
}

/// Shared view of a [`MockTerminal`]'s recording; clone freely across
/// tasks.
#[derive(Clone)]
pub struct MockTerminalHandle {
    state: Arc<Mutex<MockState>>,
    modes: SharedModeFlags,
}

impl MockTerminal {
    /// Create a mock and the handle used to inspect it.
    pub fn new() -> (Self, MockTerminalHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let modes = SharedModeFlags::default();
        let handle = MockTerminalHandle {
            state: state.clone(),
            modes: modes.clone(),
        };
        (
            Self {
                state,
                modes,
                cursor_stack: Vec::new(),
            },
            handle,
        )
    }

    /// Record `call`, then fail if an error was injected for its method.
    fn record(&self, call: MockCall) -> Result<(), Error> {
        let mut state = self.state.lock();
        let method = call.method();
        state.calls.push(call);
        if state.failing.contains(method) {
            return Err(Error::Injected(method));
        }
        Ok(())
    }
}

impl Default for MockTerminal {
    fn default() -> Self {
        Self::new().0
    }
}

impl MockTerminalHandle {
    /// Every recorded call, in invocation order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// The method names of every recorded call, in invocation order.
    pub fn method_sequence(&self) -> Vec<&'static str> {
        self.state.lock().calls.iter().map(MockCall::method).collect()
    }

    /// How many times `method` has been invoked.
    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    /// Make every future invocation of `method` fail with
    /// [`Error::Injected`]. The call is still recorded.
    pub fn inject_error(&self, method: &'static str) {
        self.state.lock().failing.insert(method);
    }

    /// Stop failing `method`.
    pub fn clear_injected_error(&self, method: &str) {
        self.state.lock().failing.remove(method);
    }

    /// Forget all recorded calls (injected errors stay).
    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Override what `size()` reports.
    pub fn set_size(&self, width: u16, height: u16) {
        self.state.lock().size = Some((width, height));
    }

    /// Thread-safe read of the raw-mode flag.
    pub fn is_in_raw_mode(&self) -> bool {
        self.modes.lock().raw
    }

    /// Thread-safe read of the alt-screen flag.
    pub fn is_in_alt_screen(&self) -> bool {
        self.modes.lock().alt
    }
}

#[async_trait::async_trait]
impl TerminalController for MockTerminal {
    async fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<(), Error> {
        self.record(MockCall::SetCursorPosition(x, y))
    }

    async fn cursor_position(&mut self) -> Result<(u16, u16), Error> {
        self.record(MockCall::CursorPosition)?;
        Ok((0, 0))
    }

    async fn move_cursor_up(&mut self, n: u16) -> Result<(), Error> {
        self.record(MockCall::MoveCursorUp(n))
    }

    async fn move_cursor_down(&mut self, n: u16) -> Result<(), Error> {
        self.record(MockCall::MoveCursorDown(n))
    }

    async fn move_cursor_left(&mut self, n: u16) -> Result<(), Error> {
        self.record(MockCall::MoveCursorLeft(n))
    }

    async fn move_cursor_right(&mut self, n: u16) -> Result<(), Error> {
        self.record(MockCall::MoveCursorRight(n))
    }

    async fn save_cursor_position(&mut self) -> Result<(), Error> {
        self.record(MockCall::SaveCursorPosition)?;
        self.cursor_stack.push((0, 0));
        Ok(())
    }

    async fn restore_cursor_position(&mut self) -> Result<(), Error> {
        self.record(MockCall::RestoreCursorPosition)?;
        self.cursor_stack.pop();
        Ok(())
    }

    async fn hide_cursor(&mut self) -> Result<(), Error> {
        self.record(MockCall::HideCursor)
    }

    async fn show_cursor(&mut self) -> Result<(), Error> {
        self.record(MockCall::ShowCursor)
    }

    async fn set_cursor_style(&mut self, style: CursorStyle) -> Result<(), Error> {
        self.record(MockCall::SetCursorStyle(style))
    }

    async fn clear(&mut self) -> Result<(), Error> {
        self.record(MockCall::Clear)
    }

    async fn clear_line(&mut self) -> Result<(), Error> {
        self.record(MockCall::ClearLine)
    }

    async fn clear_from_cursor(&mut self) -> Result<(), Error> {
        self.record(MockCall::ClearFromCursor)
    }

    async fn clear_lines(&mut self, n: u16) -> Result<(), Error> {
        self.record(MockCall::ClearLines(n))
    }

    async fn write(&mut self, s: &str) -> Result<(), Error> {
        self.record(MockCall::Write(s.to_string()))
    }

    async fn write_at(&mut self, x: u16, y: u16, s: &str) -> Result<(), Error> {
        self.record(MockCall::WriteAt(x, y, s.to_string()))
    }

    async fn render(&mut self, frame: &str) -> Result<(), Error> {
        self.record(MockCall::Render(frame.to_string()))
    }

    async fn read_screen_buffer(&mut self) -> Result<String, Error> {
        self.record(MockCall::ReadScreenBuffer)?;
        Ok(String::new())
    }

    async fn enter_raw_mode(&mut self) -> Result<(), Error> {
        self.record(MockCall::EnterRawMode)?;
        let mut modes = self.modes.lock();
        if modes.raw {
            return Err(Error::AlreadyInRawMode);
        }
        modes.raw = true;
        Ok(())
    }

    async fn exit_raw_mode(&mut self) -> Result<(), Error> {
        self.record(MockCall::ExitRawMode)?;
        let mut modes = self.modes.lock();
        if !modes.raw {
            return Err(Error::NotInRawMode);
        }
        modes.raw = false;
        Ok(())
    }

    async fn enter_alt_screen(&mut self) -> Result<(), Error> {
        self.record(MockCall::EnterAltScreen)?;
        let mut modes = self.modes.lock();
        if modes.alt {
            return Err(Error::AlreadyInAltScreen);
        }
        modes.alt = true;
        Ok(())
    }

    async fn exit_alt_screen(&mut self) -> Result<(), Error> {
        self.record(MockCall::ExitAltScreen)?;
        let mut modes = self.modes.lock();
        if !modes.alt {
            return Err(Error::NotInAltScreen);
        }
        modes.alt = false;
        Ok(())
    }

    fn is_in_raw_mode(&self) -> bool {
        self.modes.lock().raw
    }

    fn is_in_alt_screen(&self) -> bool {
        self.modes.lock().alt
    }

    async fn enable_mouse_cell_motion(&mut self) -> Result<(), Error> {
        self.record(MockCall::EnableMouseCellMotion)
    }

    async fn enable_mouse_all_motion(&mut self) -> Result<(), Error> {
        self.record(MockCall::EnableMouseAllMotion)
    }

    async fn disable_mouse(&mut self) -> Result<(), Error> {
        self.record(MockCall::DisableMouse)
    }

    async fn set_window_title(&mut self, title: &str) -> Result<(), Error> {
        self.record(MockCall::SetWindowTitle(title.to_string()))
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
        Platform::Unknown
    }

    fn size(&self) -> (u16, u16) {
        self.state.lock().size.unwrap_or((80, 24))
    }

    fn color_depth(&self) -> ColorDepth {
        ColorDepth::TrueColor
    }
}
