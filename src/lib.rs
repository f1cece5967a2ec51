//! # oolong
//!
//! A Model-View-Update (MVU) runtime for interactive terminal
//! applications in Rust. This library provides the engine that drives a
//! full-screen or inline TUI: the event loop, the command system, the
//! platform-abstracted terminal controller, and the cancellable input
//! reader — plus the machinery that makes handing the terminal to an
//! external program (editor, pager, shell) safe.
//!
//! ## Features
//!
//! - **Model-View-Update Architecture**: state is a value, `update` is
//!   the only place it changes, `view` is a pure projection
//! - **Async Command System**: deferred effects run as independent
//!   workers outside the message-processing critical section
//! - **Platform-Abstracted Terminal Control**: a native console backend
//!   and an ANSI backend behind one contract, picked at construction
//! - **Cancellable Input**: a blocked read can be unblocked promptly from
//!   any task
//! - **External-Process Handoff**: raw mode, alternate screen, and the
//!   input reader are torn down and rebuilt in the right order around a
//!   child process, including foreground-process-group transfer on POSIX
//! - **Suspend/Resume**: release the terminal for shell job control and
//!   restore exactly the state that was engaged
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oolong::{Model, Program, Message, Cmd};
//!
//! struct MyModel {
//!     counter: i32,
//! }
//!
//! impl Model for MyModel {
//!     fn init() -> (Self, Option<Cmd>) {
//!         (Self { counter: 0 }, None)
//!     }
//!
//!     fn update(&mut self, _msg: Message) -> Option<Cmd> {
//!         None
//!     }
//!
//!     fn view(&self) -> String {
//!         format!("Counter: {}", self.counter)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let program = Program::<MyModel>::builder().build()?;
//!     program.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture Overview
//!
//! 1. **Model**: your application state implementing the [`Model`] trait
//! 2. **Messages**: a tagged sum type ([`Message`]) the loop routes on —
//!    keyboard, mouse, resize, lifecycle, plus your own via
//!    [`Message::Custom`]
//! 3. **Update**: process a message, optionally issue a [`Cmd`]
//! 4. **View**: render the model as a string for the terminal
//! 5. **Commands**: async operations that produce future messages
//!
//! ## Testing
//!
//! Inject a [`MockTerminal`] and a scripted input stream through the
//! builder; the mock records every terminal call with its arguments and
//! supports per-method error injection.

#![warn(missing_docs)]

/// Commands for async operations that produce messages.
pub mod command;
/// Error types and handling.
pub mod error;
/// External-process execution and platform handoff options.
pub mod exec;
/// Cancellable input reading.
pub mod input;
/// Logging utilities for debugging and monitoring.
pub mod logging;
/// Message types and the tagged message sum type.
pub mod message;
/// The core Model trait defining application behavior.
pub mod model;
/// Program runtime and builder for TUI applications.
pub mod program;
/// Terminal controller abstraction and backend implementations.
pub mod terminal;

pub use command::{
    batch, clear_screen, custom, disable_mouse, enable_mouse_all_motion,
    enable_mouse_cell_motion, enter_alt_screen, exec, exec_with_opts, exit_alt_screen,
    hide_cursor, interrupt, quit, sequence, set_window_title, show_cursor, suspend, tick,
    window_size, Cmd,
};
pub use error::Error;
pub use exec::ExecOptions;
pub use input::{InputReader, InputSource, ReaderState};
pub use message::{ExecFinishedMsg, ExecMsg, KeyMsg, Message, MouseMsg, WindowSizeMsg};
pub use model::Model;
pub use program::{Handle, MouseMotion, Program, ProgramBuilder, ProgramConfig};
pub use terminal::{
    detect, AnsiTerminal, ColorDepth, CursorStyle, MockTerminal, MockTerminalHandle, Platform,
    TerminalController,
};

#[cfg(feature = "logging")]
pub use logging::log_to_file;

pub mod prelude {
    //! Convenient re-exports of the most commonly used types.

    pub use crate::{Cmd, Error, Message, Model, Program};
    pub use crate::{KeyMsg, MouseMsg, WindowSizeMsg};

    #[cfg(feature = "logging")]
    pub use crate::log_to_file;
}
