//! This module provides functions for creating and managing commands.
//! Commands are asynchronous operations that can produce messages to update
//! the model.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::process::Command as StdCommand;
use std::time::Duration;

use tokio::time::interval;

use crate::exec::ExecOptions;
use crate::message::{ExecMsg, Message};

/// A command represents an asynchronous operation that may produce a
/// message.
///
/// Commands are typically created by the `init` and `update` methods of
/// your `Model` and are then executed by the `Program`'s event loop. Each
/// command runs as an independent worker outside the loop's
/// message-processing critical section, so a command may block for as long
/// as it likes without stalling input handling.
///
/// The `Cmd` type is a `Pin<Box<dyn Future<Output = Option<Message>> + Send>>`:
/// a boxed, pinned future yielding at most one [`Message`]. If the command
/// produces a message, it is fed back into the `Program` to be processed by
/// `update`.
pub type Cmd = Pin<Box<dyn Future<Output = Option<Message>> + Send>>;

/// Creates a command that quits the application.
///
/// This command sends [`Message::Quit`] to the program, which initiates the
/// shutdown process.
pub fn quit() -> Cmd {
    Box::pin(async { Some(Message::Quit) })
}

/// Creates a command that interrupts the application.
///
/// This command sends [`Message::Interrupt`], typically used to signal an
/// external interruption (e.g., Ctrl+C).
pub fn interrupt() -> Cmd {
    Box::pin(async { Some(Message::Interrupt) })
}

/// Creates a command that suspends the application.
///
/// This command sends [`Message::Suspend`] to the program, which releases
/// the terminal and pauses the process for job control where the platform
/// supports it.
pub fn suspend() -> Cmd {
    Box::pin(async { Some(Message::Suspend) })
}

/// Creates a command that wraps an application-defined message.
///
/// Convenience for the common case of a command whose only job is to
/// deliver a custom message back to `update`.
pub fn custom<T: Any + Send>(value: T) -> Cmd {
    Box::pin(async move { Some(Message::custom(value)) })
}

/// Creates a command that executes a batch of commands concurrently.
///
/// The commands run in parallel; their messages are collected into a
/// [`Message::Batch`], which the event loop expands back into individual
/// messages with no ordering guarantee between them.
pub fn batch(cmds: Vec<Cmd>) -> Cmd {
    Box::pin(async move {
        use futures::future::join_all;

        let results = join_all(cmds).await;
        let messages: Vec<Message> = results.into_iter().flatten().collect();

        if messages.is_empty() {
            None
        } else {
            Some(Message::Batch(messages))
        }
    })
}

/// Creates a command that executes a sequence of commands sequentially.
///
/// The commands run one after another; their messages are collected into a
/// [`Message::Sequence`], which the event loop feeds back into the message
/// channel in order. Unrelated messages may still interleave between them.
pub fn sequence(cmds: Vec<Cmd>) -> Cmd {
    Box::pin(async move {
        let mut results = Vec::new();
        for cmd in cmds {
            if let Some(msg) = cmd.await {
                results.push(msg);
            }
        }
        if results.is_empty() {
            None
        } else {
            Some(Message::Sequence(results))
        }
    })
}

/// Creates a command that produces a message after a delay.
///
/// The message is produced by the closure `f` once `duration` has elapsed.
///
/// # Arguments
///
/// * `duration` - How long to wait before emitting.
/// * `f` - A closure that takes the `Duration` and returns a `Message`.
pub fn tick<F>(duration: Duration, f: F) -> Cmd
where
    F: Fn(Duration) -> Message + Send + 'static,
{
    Box::pin(async move {
        let mut ticker = interval(duration);
        // The first tick completes immediately; consume it so we wait one
        // full duration before emitting.
        ticker.tick().await;
        ticker.tick().await;
        Some(f(duration))
    })
}

/// Creates a command that hands the terminal to an external process.
///
/// The event loop intercepts the resulting message, tears down TUI
/// terminal state (input reader, raw mode, alternate screen), runs the
/// command with the process's own stdio, restores everything, and then
/// delivers a [`Message::ExecFinished`] carrying the command's error, if
/// any.
///
/// # Example
///
/// ```rust
/// use oolong::command;
/// use std::process::Command;
///
/// let mut editor = Command::new("vi");
/// editor.arg("notes.txt");
/// let cmd = command::exec(editor);
/// # drop(cmd);
/// ```
pub fn exec(command: StdCommand) -> Cmd {
    exec_with_opts(command, ExecOptions::default())
}

/// Creates an exec command with explicit platform handoff options.
///
/// See [`ExecOptions`] for foreground-transfer and process-group control.
pub fn exec_with_opts(command: StdCommand, options: ExecOptions) -> Cmd {
    Box::pin(async move { Some(Message::Exec(ExecMsg { command, options })) })
}

/// Creates a command that enters the alternate screen buffer.
pub fn enter_alt_screen() -> Cmd {
    Box::pin(async { Some(Message::EnterAltScreen) })
}

/// Creates a command that exits the alternate screen buffer.
pub fn exit_alt_screen() -> Cmd {
    Box::pin(async { Some(Message::ExitAltScreen) })
}

/// Creates a command that clears the terminal screen.
pub fn clear_screen() -> Cmd {
    Box::pin(async { Some(Message::ClearScreen) })
}

/// Creates a command that shows the terminal cursor.
pub fn show_cursor() -> Cmd {
    Box::pin(async { Some(Message::ShowCursor) })
}

/// Creates a command that hides the terminal cursor.
pub fn hide_cursor() -> Cmd {
    Box::pin(async { Some(Message::HideCursor) })
}

/// Creates a command that enables mouse cell-motion reporting.
///
/// The terminal will report presses, releases, and pointer movement
/// between cells.
pub fn enable_mouse_cell_motion() -> Cmd {
    Box::pin(async { Some(Message::EnableMouseCellMotion) })
}

/// Creates a command that enables all-motion mouse reporting.
///
/// The terminal will report every pointer movement. This generates many
/// more events than cell motion; enable it only when the application
/// really tracks the pointer continuously.
pub fn enable_mouse_all_motion() -> Cmd {
    Box::pin(async { Some(Message::EnableMouseAllMotion) })
}

/// Creates a command that disables mouse reporting.
pub fn disable_mouse() -> Cmd {
    Box::pin(async { Some(Message::DisableMouse) })
}

/// Creates a command that requests the current window size.
///
/// The program answers with a [`Message::WindowSize`] containing the
/// terminal's current dimensions.
pub fn window_size() -> Cmd {
    Box::pin(async { Some(Message::RequestWindowSize) })
}

/// Creates a command that sets the terminal window title.
pub fn set_window_title(title: impl Into<String>) -> Cmd {
    let title = title.into();
    Box::pin(async move { Some(Message::SetWindowTitle(title)) })
}
