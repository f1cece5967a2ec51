//! Error types for oolong.
//!
//! This module defines the custom error types used throughout the `oolong`
//! library. All errors are unified under the [`Error`] enum, providing a
//! consistent way to handle the various failure conditions the runtime can
//! hit, from I/O problems to mis-sequenced terminal-mode calls.
//!
//! # Error Handling Philosophy
//!
//! All fallible operations return `Result<T, Error>`. The library uses the
//! `thiserror` crate for clear messages and convenient conversions. Errors
//! fall into a few families:
//!
//! - **Caller-sequence errors** (`AlreadyInRawMode`, `NotInAltScreen`,
//!   `AlreadyRunning`, ...) signal a programming mistake: an operation was
//!   invoked from a state it is not legal in. These are never retried
//!   internally.
//! - **I/O and syscall errors** surface at the operation boundary; the
//!   runtime does not retry them either.
//! - **Timeout errors** (`SendTimeout`, `StopTimeout`) indicate a bounded
//!   wait expired; partial effects may persist.
//! - **Child and compound errors** come out of the external-process
//!   executor, which reports the child's failure and any terminal-restore
//!   failure together rather than losing one of them.
//!
//! # Basic Error Handling
//!
//! ```no_run
//! use oolong::{Program, Model, Message, Error, Cmd};
//!
//! # struct MyModel;
//! # impl Model for MyModel {
//! #     fn init() -> (Self, Option<Cmd>) { (MyModel, None) }
//! #     fn update(&mut self, _msg: Message) -> Option<Cmd> { None }
//! #     fn view(&self) -> String { String::new() }
//! # }
//! async fn run_program() -> Result<(), Error> {
//!     let program = Program::<MyModel>::builder().build()?;
//!     program.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Pattern Matching on Errors
//!
//! ```no_run
//! use oolong::Error;
//!
//! fn handle_error(err: Error) {
//!     match err {
//!         Error::Interrupted => println!("interrupted by user"),
//!         Error::ProgramKilled => println!("killed"),
//!         Error::Io(io_err) => eprintln!("I/O error: {io_err}"),
//!         other => eprintln!("unexpected error: {other}"),
//!     }
//! }
//! ```

use thiserror::Error;

/// The main error type for `oolong` operations.
///
/// This enum encapsulates every failure condition the runtime reports,
/// from terminal-mode sequencing mistakes through I/O failures to external
/// process errors.
#[derive(Debug, Error)]
pub enum Error {
    /// `enter_raw_mode` was called while raw mode was already engaged.
    #[error("terminal is already in raw mode")]
    AlreadyInRawMode,

    /// `exit_raw_mode` was called while raw mode was not engaged.
    #[error("terminal is not in raw mode")]
    NotInRawMode,

    /// `enter_alt_screen` was called while the alternate screen was already
    /// active.
    #[error("terminal is already in the alternate screen")]
    AlreadyInAltScreen,

    /// `exit_alt_screen` was called while the alternate screen was not
    /// active.
    #[error("terminal is not in the alternate screen")]
    NotInAltScreen,

    /// `run` was invoked on a program whose event loop is already running.
    #[error("program is already running")]
    AlreadyRunning,

    /// A lifecycle operation that requires a running event loop was invoked
    /// on a stopped program.
    #[error("program is not running")]
    NotRunning,

    /// The external-process executor was handed a command with an empty
    /// program name.
    #[error("exec command has an empty program name")]
    EmptyExecCommand,

    /// An I/O error, wrapping `std::io::Error`. Terminal writes, syscalls,
    /// and process spawning all surface through this variant.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation is not available on the active terminal backend.
    ///
    /// The payload names the operation; callers that need the capability
    /// should have consulted the controller's capability predicates first.
    #[error("operation not supported on this terminal backend: {0}")]
    Unsupported(&'static str),

    /// A `send` into the program's message channel did not complete within
    /// its 100 ms budget. The message was not enqueued.
    #[error("timed out sending message to the program")]
    SendTimeout,

    /// `stop` waited its full 1 s budget without observing a clean event
    /// loop exit; the running flag was force-cleared.
    #[error("timed out waiting for the program to stop")]
    StopTimeout,

    /// Bounded channel is full (backpressure). The message could not be
    /// enqueued.
    #[error("channel is full")]
    ChannelFull,

    /// Channel is closed; no receivers (or senders) are available.
    #[error("channel is closed")]
    ChannelClosed,

    /// Receiving from a channel failed because the sending side is gone.
    #[error("channel receive error")]
    ChannelReceive,

    /// The external process ran but exited unsuccessfully.
    #[error("external process exited unsuccessfully: {0}")]
    ChildFailed(std::process::ExitStatus),

    /// Restoring the terminal after an external process failed.
    ///
    /// Both halves are preserved: the child's own error (if it had one) and
    /// the restore failure. The restore path is best-effort, so the restore
    /// error recorded here is the first failing step even though later
    /// steps were still attempted.
    #[error(
        "terminal restore failed{suffix}: {restore}",
        suffix = .child.as_ref().map(|c| format!(" after child error ({c})")).unwrap_or_default()
    )]
    Compound {
        /// The error from the child process, if the child itself failed.
        child: Option<Box<Error>>,
        /// The first error hit on the restore path.
        restore: Box<Error>,
    },

    /// A panic escaped the model's `update` or `view` and was converted to
    /// an error by the panic hook.
    #[error("program panic: {0}")]
    ProgramPanic(String),

    /// The program was explicitly killed via `kill()` rather than shut down
    /// gracefully.
    #[error("program was killed")]
    ProgramKilled,

    /// The program was interrupted, typically by Ctrl+C.
    #[error("program was interrupted")]
    Interrupted,

    /// Invalid or inconsistent configuration, typically from the builder.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An error injected through the mock terminal's test seam.
    #[error("injected error: {0}")]
    Injected(&'static str),
}

impl Error {
    /// Combine a child-process result with a restore-path failure into a
    /// single error preserving both.
    pub(crate) fn compound(child: Option<Error>, restore: Error) -> Error {
        Error::Compound {
            child: child.map(Box::new),
            restore: Box::new(restore),
        }
    }
}

/// Conversion from `tokio::sync::mpsc::error::SendError<T>`.
///
/// An in-flight `send` on an mpsc channel only fails when the receiving
/// half has been dropped, so this maps to [`Error::ChannelClosed`].
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

/// Conversion from `tokio::sync::mpsc::error::TrySendError<T>` that
/// preserves whether the channel was full or closed.
impl<T> From<tokio::sync::mpsc::error::TrySendError<T>> for Error {
    fn from(err: tokio::sync::mpsc::error::TrySendError<T>) -> Self {
        use tokio::sync::mpsc::error::TrySendError;
        match err {
            TrySendError::Full(_) => Error::ChannelFull,
            TrySendError::Closed(_) => Error::ChannelClosed,
        }
    }
}

/// Conversion from `tokio::sync::mpsc::error::SendTimeoutError<T>`.
///
/// A timed-out send maps to [`Error::SendTimeout`]; a send against a closed
/// channel maps to [`Error::ChannelClosed`].
impl<T> From<tokio::sync::mpsc::error::SendTimeoutError<T>> for Error {
    fn from(err: tokio::sync::mpsc::error::SendTimeoutError<T>) -> Self {
        use tokio::sync::mpsc::error::SendTimeoutError;
        match err {
            SendTimeoutError::Timeout(_) => Error::SendTimeout,
            SendTimeoutError::Closed(_) => Error::ChannelClosed,
        }
    }
}

/// Conversion from `tokio::sync::oneshot::error::RecvError`.
impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::ChannelReceive
    }
}

/// Conversion from `String`, producing a configuration error.
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Configuration(msg)
    }
}

/// Conversion from `&str`, producing a configuration error.
impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Configuration(msg.to_string())
    }
}
