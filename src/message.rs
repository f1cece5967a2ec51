//! This module defines the message types used in `oolong`.
//! Messages are events that trigger updates in your application's model.
//! They are typically sent by commands or the input reader.
//!
//! [`Message`] is a tagged sum type: the event loop branches on the variant
//! tag, and only the [`Message::Custom`] escape hatch carries dynamically
//! typed application payloads. Everything the loop interprets specially —
//! quitting, batching, terminal control, external-process handoff — has its
//! own variant, so routing never relies on runtime type reflection.

use std::any::Any;

use crate::exec::ExecOptions;
use crate::Error;

/// A keyboard input event.
///
/// The key payload reuses crossterm's parsed representation; the input
/// reader's decoding layer guarantees these arrive in press order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMsg {
    /// The key that was pressed.
    pub key: crossterm::event::KeyCode,
    /// The modifiers active during the key press.
    pub modifiers: crossterm::event::KeyModifiers,
}

/// A mouse input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseMsg {
    /// The column coordinate of the mouse event, 0-based.
    pub x: u16,
    /// The row coordinate of the mouse event, 0-based.
    pub y: u16,
    /// The kind of mouse event (press, release, drag, motion, scroll).
    pub button: crossterm::event::MouseEventKind,
    /// The keyboard modifiers active during the mouse event.
    pub modifiers: crossterm::event::KeyModifiers,
}

/// A change in the terminal window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSizeMsg {
    /// The new width of the terminal window, in columns.
    pub width: u16,
    /// The new height of the terminal window, in rows.
    pub height: u16,
}

/// A request to hand the terminal to an external process.
///
/// Produced by [`crate::command::exec`]; the event loop intercepts it,
/// performs the full terminal handoff, runs the command, and delivers an
/// [`ExecFinishedMsg`] to the model afterwards.
#[derive(Debug)]
pub struct ExecMsg {
    /// The command to run with the terminal handed over.
    pub command: std::process::Command,
    /// Platform handoff options (foreground transfer, process group).
    pub options: ExecOptions,
}

/// Delivered to the model after an external process completes.
#[derive(Debug)]
pub struct ExecFinishedMsg {
    /// The failure, if any: spawn error, unsuccessful exit status, or a
    /// compound error when terminal restore also failed.
    pub error: Option<Error>,
}

/// A message represents any event that can trigger a model update.
///
/// The event loop interprets the built-in variants itself where they carry
/// runtime meaning (`Quit`, `Batch`, `Sequence`, terminal-control requests,
/// `Exec`) and forwards the rest to the model's `update`. Application
/// messages travel through [`Message::Custom`] and are forwarded untouched.
///
/// # Example
///
/// ```rust
/// use oolong::{KeyMsg, Message};
/// use crossterm::event::{KeyCode, KeyModifiers};
///
/// fn is_quit_key(msg: &Message) -> bool {
///     matches!(
///         msg,
///         Message::Key(KeyMsg { key: KeyCode::Char('q'), .. })
///     )
/// }
/// # let _ = is_quit_key(&Message::Key(KeyMsg {
/// #     key: KeyCode::Char('q'),
/// #     modifiers: KeyModifiers::NONE,
/// # }));
/// ```
pub enum Message {
    /// Request a graceful shutdown of the event loop.
    Quit,
    /// The program was interrupted (typically Ctrl+C).
    Interrupt,
    /// Request suspension: release the terminal and pause for job control.
    Suspend,
    /// Delivered to the model after the program resumes from suspension.
    Resume,
    /// Parallel fan-out: the loop feeds each contained message back into
    /// the message channel with no ordering guarantee between them.
    Batch(Vec<Message>),
    /// Ordered fan-out: the loop feeds the contained messages back into the
    /// message channel in the order given. Unrelated messages may still
    /// interleave between them.
    Sequence(Vec<Message>),
    /// A keyboard event from the input reader.
    Key(KeyMsg),
    /// A mouse event from the input reader.
    Mouse(MouseMsg),
    /// A window resize notification.
    WindowSize(WindowSizeMsg),
    /// Ask the terminal to switch to the alternate screen buffer.
    EnterAltScreen,
    /// Ask the terminal to switch back from the alternate screen buffer.
    ExitAltScreen,
    /// Ask the terminal to clear the visible screen.
    ClearScreen,
    /// Ask the terminal to make the cursor visible.
    ShowCursor,
    /// Ask the terminal to hide the cursor.
    HideCursor,
    /// Ask the terminal to report mouse events when the pointer moves
    /// between cells.
    EnableMouseCellMotion,
    /// Ask the terminal to report all mouse motion.
    EnableMouseAllMotion,
    /// Ask the terminal to stop reporting mouse events.
    DisableMouse,
    /// Ask the program to report the current terminal size; answered with a
    /// [`Message::WindowSize`].
    RequestWindowSize,
    /// Ask the terminal to set the window title.
    SetWindowTitle(String),
    /// Hand the terminal to an external process (loop-internal).
    Exec(ExecMsg),
    /// An external process finished; carries its error, if any.
    ExecFinished(ExecFinishedMsg),
    /// An application-defined message, forwarded to the model untouched.
    Custom(Box<dyn Any + Send>),
}

impl Message {
    /// Wrap an application-defined value as a [`Message::Custom`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use oolong::Message;
    ///
    /// struct TickMsg(u64);
    ///
    /// let msg = Message::custom(TickMsg(7));
    /// assert_eq!(msg.as_custom::<TickMsg>().unwrap().0, 7);
    /// ```
    pub fn custom<T: Any + Send>(value: T) -> Self {
        Message::Custom(Box::new(value))
    }

    /// Borrow the payload of a [`Message::Custom`] as `T`, if this message
    /// is a custom message of that type.
    pub fn as_custom<T: Any>(&self) -> Option<&T> {
        match self {
            Message::Custom(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Take the payload of a [`Message::Custom`] as `T`.
    ///
    /// Returns the message unchanged in the error position when it is not a
    /// custom message of type `T`, so callers can keep routing it.
    pub fn into_custom<T: Any>(self) -> Result<Box<T>, Message> {
        match self {
            Message::Custom(payload) => payload.downcast::<T>().map_err(Message::Custom),
            other => Err(other),
        }
    }

    /// True when this message requests loop termination.
    pub fn is_quit(&self) -> bool {
        matches!(self, Message::Quit)
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Quit => f.write_str("Quit"),
            Message::Interrupt => f.write_str("Interrupt"),
            Message::Suspend => f.write_str("Suspend"),
            Message::Resume => f.write_str("Resume"),
            Message::Batch(msgs) => f.debug_tuple("Batch").field(msgs).finish(),
            Message::Sequence(msgs) => f.debug_tuple("Sequence").field(msgs).finish(),
            Message::Key(msg) => f.debug_tuple("Key").field(msg).finish(),
            Message::Mouse(msg) => f.debug_tuple("Mouse").field(msg).finish(),
            Message::WindowSize(msg) => f.debug_tuple("WindowSize").field(msg).finish(),
            Message::EnterAltScreen => f.write_str("EnterAltScreen"),
            Message::ExitAltScreen => f.write_str("ExitAltScreen"),
            Message::ClearScreen => f.write_str("ClearScreen"),
            Message::ShowCursor => f.write_str("ShowCursor"),
            Message::HideCursor => f.write_str("HideCursor"),
            Message::EnableMouseCellMotion => f.write_str("EnableMouseCellMotion"),
            Message::EnableMouseAllMotion => f.write_str("EnableMouseAllMotion"),
            Message::DisableMouse => f.write_str("DisableMouse"),
            Message::RequestWindowSize => f.write_str("RequestWindowSize"),
            Message::SetWindowTitle(title) => {
                f.debug_tuple("SetWindowTitle").field(title).finish()
            }
            Message::Exec(msg) => f.debug_tuple("Exec").field(msg).finish(),
            Message::ExecFinished(msg) => f.debug_tuple("ExecFinished").field(msg).finish(),
            Message::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<KeyMsg> for Message {
    fn from(msg: KeyMsg) -> Self {
        Message::Key(msg)
    }
}

impl From<MouseMsg> for Message {
    fn from(msg: MouseMsg) -> Self {
        Message::Mouse(msg)
    }
}

impl From<WindowSizeMsg> for Message {
    fn from(msg: WindowSizeMsg) -> Self {
        Message::WindowSize(msg)
    }
}
