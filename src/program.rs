//! This module defines the `Program` struct and its associated
//! `ProgramBuilder`, which are responsible for coordinating the entire
//! application lifecycle: terminal setup, input handling, command
//! execution, message routing, rendering, external-process handoff, and
//! suspension.
//!
//! # Concurrency model
//!
//! One task runs the event loop and exclusively owns the model, the
//! terminal controller, and the input reader. One task runs the input
//! reader's worker. A dispatcher task drains the bounded command channel
//! and runs each command as an independent worker, so commands may block
//! arbitrarily without stalling message processing. A worker's result
//! send selects against the shutdown signal: commands that complete after
//! shutdown never block on a full or defunct message channel.
//!
//! # Lifecycle
//!
//! [`Program::run`] drives the loop to completion on the current task;
//! [`Program::start`] spawns it and hands back a [`Handle`] for external
//! control. `Handle::stop` enforces a 1 s ceiling before force-clearing
//! the running flag; `Handle::send` gives up after 100 ms against a
//! saturated queue. Whatever way the loop exits — quit message, kill,
//! external stop, panic — the cleanup path restores raw mode and the
//! alternate screen if they are still engaged.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::exec;
use crate::input::{InputReader, InputSource, ReaderState};
use crate::message::{ExecFinishedMsg, ExecMsg, Message, WindowSizeMsg};
use crate::terminal::{self, SharedWriter, TerminalController};
use crate::{Cmd, Error, Model};

/// Messages queued for the event loop; sized to smooth bursty production
/// from input parsing and command workers.
pub(crate) const MESSAGE_CHANNEL_CAPACITY: usize = 100;
/// Commands queued for the dispatcher.
pub(crate) const COMMAND_CHANNEL_CAPACITY: usize = 10;

/// External `send` gives up after this long against a saturated queue.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);
/// `stop` waits this long for a clean exit before force-clearing the
/// running flag.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);
/// Bounded wait for the input reader's worker to unwind.
const READER_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);
/// Bounded wait for command workers during cleanup.
const TASK_CLEANUP_TIMEOUT: Duration = Duration::from_millis(500);

/// Defines the different modes for mouse motion reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMotion {
    /// No mouse motion events are reported.
    None,
    /// Mouse motion events are reported when the mouse moves over a
    /// different cell.
    Cell,
    /// Mouse motion events are reported for every movement.
    All,
}

/// Alias for a model-aware message filter function.
type MessageFilter<M> = Box<dyn Fn(&M, Message) -> Option<Message> + Send>;

/// Configuration options for a `Program`.
pub struct ProgramConfig {
    /// Whether to use the alternate screen buffer.
    pub alt_screen: bool,
    /// The mouse motion reporting mode.
    pub mouse_motion: MouseMotion,
    /// Whether to convert loop panics into `ProgramPanic` errors.
    pub catch_panics: bool,
    /// Whether to listen for Ctrl+C and deliver it as an interrupt
    /// message.
    pub signal_handler: bool,
    /// The buffer size for the message channel.
    pub message_buffer: usize,
    /// Optional custom output writer.
    pub output_writer: Option<SharedWriter>,
    /// Optional custom input source.
    pub input_source: Option<InputSource>,
    /// Optional pre-supplied terminal controller (testing).
    pub terminal: Option<Box<dyn TerminalController>>,
}

impl std::fmt::Debug for ProgramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramConfig")
            .field("alt_screen", &self.alt_screen)
            .field("mouse_motion", &self.mouse_motion)
            .field("catch_panics", &self.catch_panics)
            .field("signal_handler", &self.signal_handler)
            .field("message_buffer", &self.message_buffer)
            .field("has_output_writer", &self.output_writer.is_some())
            .field("has_input_source", &self.input_source.is_some())
            .field("has_terminal", &self.terminal.is_some())
            .finish()
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            alt_screen: false,
            mouse_motion: MouseMotion::None,
            catch_panics: true,
            signal_handler: true,
            message_buffer: MESSAGE_CHANNEL_CAPACITY,
            output_writer: None,
            input_source: None,
            terminal: None,
        }
    }
}

/// A builder for creating and configuring `Program` instances.
pub struct ProgramBuilder<M: Model> {
    config: ProgramConfig,
    message_filter: Option<MessageFilter<M>>,
}

impl<M: Model> ProgramBuilder<M> {
    pub(crate) fn new() -> Self {
        Self {
            config: ProgramConfig::default(),
            message_filter: None,
        }
    }

    /// Sets whether to use the alternate screen buffer.
    ///
    /// When enabled, the application runs in an alternate screen buffer
    /// and the primary screen's contents are preserved for restoration on
    /// exit.
    pub fn alt_screen(mut self, enabled: bool) -> Self {
        self.config.alt_screen = enabled;
        self
    }

    /// Sets the mouse motion reporting mode.
    pub fn mouse_motion(mut self, motion: MouseMotion) -> Self {
        self.config.mouse_motion = motion;
        self
    }

    /// Sets whether to convert event-loop panics into `ProgramPanic`
    /// errors (enabled by default). Terminal state is restored either
    /// way.
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.config.catch_panics = enabled;
        self
    }

    /// Sets whether the program listens for Ctrl+C and delivers it as a
    /// [`Message::Interrupt`].
    pub fn signal_handler(mut self, enabled: bool) -> Self {
        self.config.signal_handler = enabled;
        self
    }

    /// Sets the message channel buffer size. Values below 1 are clamped.
    pub fn message_buffer(mut self, size: usize) -> Self {
        self.config.message_buffer = size.max(1);
        self
    }

    /// Sets a custom input reader for the program.
    ///
    /// Bytes from the reader are decoded into key messages; useful for
    /// tests and scripted sessions.
    pub fn input(mut self, reader: impl tokio::io::AsyncRead + Send + Unpin + 'static) -> Self {
        self.config.input_source = Some(InputSource::Custom(Box::pin(reader)));
        self
    }

    /// Sets a custom output writer for the program.
    pub fn output(mut self, writer: impl tokio::io::AsyncWrite + Send + Unpin + 'static) -> Self {
        self.config.output_writer = Some(Arc::new(tokio::sync::Mutex::new(writer)));
        self
    }

    /// Injects a terminal controller, bypassing detection. Intended for
    /// tests, together with [`crate::terminal::MockTerminal`].
    pub fn terminal(mut self, terminal: Box<dyn TerminalController>) -> Self {
        self.config.terminal = Some(terminal);
        self
    }

    /// Sets a model-aware message filter.
    ///
    /// The closure sees each incoming message with access to the current
    /// model and may transform or drop it before the loop routes it.
    pub fn filter(mut self, f: impl Fn(&M, Message) -> Option<Message> + Send + 'static) -> Self {
        self.message_filter = Some(Box::new(f));
        self
    }

    /// Builds the `Program` instance with the configured options.
    pub fn build(self) -> Result<Program<M>, Error> {
        Program::new(self.config, self.message_filter)
    }
}

/// State shared between the event loop and its handles.
struct Shared {
    running: AtomicBool,
    suspended: AtomicBool,
    killed: AtomicBool,
    shutdown: CancellationToken,
}

/// External control surface for a running (or about-to-run) program.
///
/// Cheap to clone; every clone addresses the same program.
#[derive(Clone)]
pub struct Handle {
    event_tx: mpsc::Sender<Message>,
    shared: Arc<Shared>,
}

impl Handle {
    /// Inject a message into the program's message queue.
    ///
    /// Bounded by a 100 ms timeout so callers are never parked
    /// indefinitely on a back-pressured queue; a timed-out send reports
    /// [`Error::SendTimeout`] and the message is dropped.
    pub async fn send(&self, msg: Message) -> Result<(), Error> {
        self.event_tx
            .send_timeout(msg, SEND_TIMEOUT)
            .await
            .map_err(Into::into)
    }

    /// Request a graceful shutdown. Non-blocking.
    pub fn quit(&self) {
        if self.event_tx.try_send(Message::Quit).is_err() {
            // Saturated or closed queue; fall back to the shutdown signal
            // so quit cannot be lost.
            self.shared.shutdown.cancel();
        }
    }

    /// Terminate the event loop as soon as possible; the program's `run`
    /// returns [`Error::ProgramKilled`]. Non-blocking.
    pub fn kill(&self) {
        self.shared.killed.store(true, Ordering::SeqCst);
        self.shared.shutdown.cancel();
    }

    /// Signal quit and wait for the event loop to exit.
    ///
    /// Waits up to 1 s; on expiry the running flag is force-cleared and
    /// [`Error::StopTimeout`] is reported.
    pub async fn stop(&self) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }
        self.shared.shutdown.cancel();

        let deadline = tokio::time::Instant::now() + STOP_TIMEOUT;
        while self.is_running() {
            if tokio::time::Instant::now() >= deadline {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(Error::StopTimeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    /// Whether the event loop is currently running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Whether the program is currently suspended.
    pub fn is_suspended(&self) -> bool {
        self.shared.suspended.load(Ordering::SeqCst)
    }
}

/// The main `Program` struct that coordinates the application.
///
/// The `Program` owns the model, the terminal controller, and the input
/// reader for the duration of [`Program::run`]; external code interacts
/// with it through a [`Handle`].
pub struct Program<M: Model> {
    /// The configuration for this `Program` instance.
    pub config: ProgramConfig,
    event_tx: mpsc::Sender<Message>,
    event_rx: Option<mpsc::Receiver<Message>>,
    shared: Arc<Shared>,
    reader_state: ReaderState,
    message_filter: Option<MessageFilter<M>>,
}

impl<M: Model> Program<M> {
    /// Creates a new `ProgramBuilder` for configuring and building a
    /// `Program`.
    pub fn builder() -> ProgramBuilder<M> {
        ProgramBuilder::new()
    }

    fn new(config: ProgramConfig, message_filter: Option<MessageFilter<M>>) -> Result<Self, Error> {
        let (event_tx, event_rx) = mpsc::channel(config.message_buffer.max(1));
        Ok(Self {
            config,
            event_tx,
            event_rx: Some(event_rx),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                killed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
            reader_state: ReaderState::default(),
            message_filter,
        })
    }

    /// Returns a handle for controlling this program from other tasks.
    pub fn handle(&self) -> Handle {
        Handle {
            event_tx: self.event_tx.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Spawn the event loop on the runtime and return a control handle
    /// together with the join handle for the final model.
    pub fn start(self) -> (Handle, JoinHandle<Result<M, Error>>) {
        let handle = self.handle();
        let join = tokio::spawn(self.run());
        (handle, join)
    }

    /// Runs the application to completion.
    ///
    /// Initializes the terminal, starts the event loop, and manages the
    /// application's lifecycle until a quit message arrives or an
    /// unrecoverable error occurs. Returns the final model state.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::AlreadyRunning`] when the loop is already
    /// running, [`Error::ProgramKilled`] after a `kill`, and
    /// [`Error::ProgramPanic`] when a panic escaped the loop with
    /// `catch_panics` enabled. Raw-mode and alt-screen state are restored
    /// on every exit path.
    pub async fn run(mut self) -> Result<M, Error> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let shared = self.shared.clone();
        let catch_panics = self.config.catch_panics;

        let result = if catch_panics {
            match AssertUnwindSafe(self.run_loop()).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(Error::ProgramPanic(panic_payload(payload))),
            }
        } else {
            self.run_loop().await
        };

        shared.suspended.store(false, Ordering::SeqCst);
        shared.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_loop(mut self) -> Result<M, Error> {
        let shared = self.shared.clone();
        let event_tx = self.event_tx.clone();
        let mut event_rx = self
            .event_rx
            .take()
            .ok_or(Error::AlreadyRunning)?;
        let reader_state = self.reader_state.clone();

        // Auto-create the terminal controller if none was injected.
        let mut terminal: Box<dyn TerminalController> = match self.config.terminal.take() {
            Some(terminal) => terminal,
            None => terminal::detect(self.config.output_writer.clone())?,
        };

        // Raw mode is best effort: non-TTY contexts (tests, pipes) run
        // without it.
        let _ = terminal.enter_raw_mode().await;
        if self.config.alt_screen {
            if let Err(err) = terminal.enter_alt_screen().await {
                // Either fully in TUI state or fully out of it.
                if terminal.is_in_raw_mode() {
                    let _ = terminal.exit_raw_mode().await;
                }
                return Err(err);
            }
        }
        let mut mouse_enabled = match self.config.mouse_motion {
            MouseMotion::Cell => terminal.enable_mouse_cell_motion().await.is_ok(),
            MouseMotion::All => terminal.enable_mouse_all_motion().await.is_ok(),
            MouseMotion::None => false,
        };
        let _ = terminal.hide_cursor().await;

        let (mut model, mut cmd) = M::init();

        // Command dispatcher: drains the bounded command queue and runs
        // each command as an independent worker.
        let (cmd_tx, cmd_rx) = mpsc::channel::<Cmd>(COMMAND_CHANNEL_CAPACITY);
        let dispatcher = spawn_command_dispatcher(cmd_rx, event_tx.clone(), shared.shutdown.clone());

        // Input reader. A custom source that ends is not replaced with
        // terminal events on restart; the stream is simply over.
        let initial_source = self
            .config
            .input_source
            .take()
            .unwrap_or(InputSource::Terminal);
        let custom_input = matches!(initial_source, InputSource::Custom(_));
        let mut input_reader = Some(InputReader::spawn(initial_source, &reader_state));
        let mut input_stash: Option<InputSource> = None;

        // Pre-suspend (raw, alt) pair; Some while suspended.
        let mut suspend_restore: Option<(bool, bool)> = None;

        // Initial view. Render errors are swallowed here and below; tests
        // may close the sink early.
        let _ = terminal.render(&model.view()).await;

        let result = loop {
            if let Some(cmd) = cmd.take() {
                if cmd_tx.send(cmd).await.is_err() {
                    break Err(Error::ChannelClosed);
                }
            }

            let msg = tokio::select! {
                _ = shared.shutdown.cancelled() => {
                    if shared.killed.load(Ordering::SeqCst) {
                        break Err(Error::ProgramKilled);
                    }
                    break Ok(model);
                }
                _ = ctrl_c(self.config.signal_handler) => {
                    let _ = event_tx.try_send(Message::Interrupt);
                    continue;
                }
                input = next_input(&mut input_reader) => {
                    match input {
                        Some(msg) => msg,
                        None => {
                            // Input stream ended; keep running on command
                            // and externally sent messages.
                            input_reader = None;
                            continue;
                        }
                    }
                }
                msg = event_rx.recv() => {
                    match msg {
                        Some(msg) => msg,
                        None => break Err(Error::ChannelReceive),
                    }
                }
            };

            let msg = if let Some(filter) = &self.message_filter {
                match filter(&model, msg) {
                    Some(msg) => msg,
                    None => continue,
                }
            } else {
                msg
            };

            match msg {
                Message::Quit => break Ok(model),
                Message::Batch(messages) | Message::Sequence(messages) => {
                    // Feed the contained messages back into the channel
                    // from a forwarder task so a large fan-out cannot
                    // deadlock the loop against its own queue. Order is
                    // preserved within the group.
                    spawn_forwarder(messages, event_tx.clone(), shared.shutdown.clone());
                    continue;
                }
                Message::EnterAltScreen => {
                    let _ = terminal.enter_alt_screen().await;
                    let _ = terminal.render(&model.view()).await;
                    continue;
                }
                Message::ExitAltScreen => {
                    let _ = terminal.exit_alt_screen().await;
                    let _ = terminal.render(&model.view()).await;
                    continue;
                }
                Message::ClearScreen => {
                    let _ = terminal.clear().await;
                    continue;
                }
                Message::ShowCursor => {
                    let _ = terminal.show_cursor().await;
                    continue;
                }
                Message::HideCursor => {
                    let _ = terminal.hide_cursor().await;
                    continue;
                }
                Message::EnableMouseCellMotion => {
                    if terminal.enable_mouse_cell_motion().await.is_ok() {
                        mouse_enabled = true;
                    }
                    continue;
                }
                Message::EnableMouseAllMotion => {
                    if terminal.enable_mouse_all_motion().await.is_ok() {
                        mouse_enabled = true;
                    }
                    continue;
                }
                Message::DisableMouse => {
                    if terminal.disable_mouse().await.is_ok() {
                        mouse_enabled = false;
                    }
                    continue;
                }
                Message::SetWindowTitle(title) => {
                    let _ = terminal.set_window_title(&title).await;
                    continue;
                }
                Message::RequestWindowSize => {
                    let (width, height) = terminal.size();
                    let msg = Message::WindowSize(WindowSizeMsg { width, height });
                    cmd = model.update(msg);
                    let _ = terminal.render(&model.view()).await;
                    continue;
                }
                Message::Suspend => {
                    suspend(
                        terminal.as_mut(),
                        &mut input_reader,
                        &reader_state,
                        &mut input_stash,
                        &mut suspend_restore,
                        &shared,
                    )
                    .await;
                    // Stopped here until the shell continues us (no-op off
                    // Unix); then rebuild and tell the model.
                    exec::stop_for_job_control();
                    resume(
                        terminal.as_mut(),
                        &mut input_reader,
                        &reader_state,
                        &mut input_stash,
                        custom_input,
                        &mut suspend_restore,
                        &shared,
                    )
                    .await;
                    let _ = event_tx.try_send(Message::Resume);
                    continue;
                }
                Message::Exec(ExecMsg { command, options }) => {
                    let error = handle_exec(
                        terminal.as_mut(),
                        &mut input_reader,
                        &reader_state,
                        &mut input_stash,
                        custom_input,
                        command,
                        options,
                    )
                    .await
                    .err();
                    let _ = event_tx.try_send(Message::ExecFinished(ExecFinishedMsg { error }));
                    // Full re-render after the handoff.
                    let _ = terminal.render(&model.view()).await;
                    continue;
                }
                msg => {
                    cmd = model.update(msg);
                    let _ = terminal.render(&model.view()).await;
                }
            }
        };

        // Restore terminal state on exit, whatever path got us here.
        let _ = terminal.show_cursor().await;
        if mouse_enabled {
            let _ = terminal.disable_mouse().await;
        }
        if terminal.is_in_alt_screen() {
            let _ = terminal.exit_alt_screen().await;
        }
        if terminal.is_in_raw_mode() {
            let _ = terminal.exit_raw_mode().await;
        }

        stop_input_reader(&mut input_reader, &reader_state, &mut input_stash).await;

        // Cancel the dispatcher and its workers, bounded.
        shared.shutdown.cancel();
        drop(cmd_tx);
        let _ = tokio::time::timeout(TASK_CLEANUP_TIMEOUT, dispatcher).await;

        result
    }
}

fn panic_payload(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown panic>".to_string()
    }
}

/// Wait for Ctrl+C when the signal handler is enabled; park forever
/// otherwise.
async fn ctrl_c(enabled: bool) {
    if enabled {
        let _ = tokio::signal::ctrl_c().await;
    } else {
        futures::future::pending::<()>().await;
    }
}

/// Read the next input message, or park forever when no reader is
/// installed.
async fn next_input(reader: &mut Option<InputReader>) -> Option<Message> {
    match reader {
        Some(reader) => reader.read().await,
        None => futures::future::pending().await,
    }
}

/// Run each queued command as an independent worker. The worker's result
/// send selects against shutdown, so a command finishing after the loop
/// exits just drops its message.
fn spawn_command_dispatcher(
    mut cmd_rx: mpsc::Receiver<Cmd>,
    event_tx: mpsc::Sender<Message>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut workers = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    let event_tx = event_tx.clone();
                    let shutdown = shutdown.clone();
                    workers.spawn(async move {
                        let result = tokio::select! {
                            _ = shutdown.cancelled() => None,
                            result = cmd => result,
                        };
                        if let Some(msg) = result {
                            tokio::select! {
                                _ = shutdown.cancelled() => {}
                                _ = event_tx.send(msg) => {}
                            }
                        }
                    });
                }
                Some(_) = workers.join_next(), if !workers.is_empty() => {}
            }
        }
        let _ = tokio::time::timeout(TASK_CLEANUP_TIMEOUT, async {
            while workers.join_next().await.is_some() {}
        })
        .await;
        workers.abort_all();
    })
}

/// Forward expanded batch/sequence messages back into the message channel
/// without blocking the loop on its own queue.
fn spawn_forwarder(
    messages: Vec<Message>,
    event_tx: mpsc::Sender<Message>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        for msg in messages {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                sent = event_tx.send(msg) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Stop the input reader: cancel, wait (bounded) for the worker, stash
/// any unconsumed custom source for the next restart, and invalidate
/// stale workers via the generation counter. Idempotent.
async fn stop_input_reader(
    reader: &mut Option<InputReader>,
    state: &ReaderState,
    stash: &mut Option<InputSource>,
) {
    let Some(mut reader) = reader.take() else {
        return;
    };
    reader.cancel();
    if let Ok(leftover) =
        tokio::time::timeout(READER_SHUTDOWN_TIMEOUT, reader.wait_for_shutdown()).await
    {
        if let Some(source) = leftover {
            *stash = Some(source);
        }
    }
    // The worker may still be unwinding; a stale generation cannot clear
    // the running flag for its successor.
    state.bump_generation();
}

/// Restart the input reader; no-op while one is running. Resumes the
/// stashed custom source when the previous stop recovered it; otherwise
/// reads terminal events, unless the program was driven by a custom
/// source that has ended (or was lost to a shutdown timeout), in which
/// case the input stream is over and no reader is installed.
fn restart_input_reader(
    reader: &mut Option<InputReader>,
    state: &ReaderState,
    stash: &mut Option<InputSource>,
    custom_input: bool,
) {
    if reader.is_some() {
        return;
    }
    let source = match stash.take() {
        Some(source) => source,
        None if custom_input => return,
        None => InputSource::Terminal,
    };
    *reader = Some(InputReader::spawn(source, state));
}

/// Release the terminal for suspension: stop the reader, leave the
/// alternate screen, leave raw mode, show the cursor, and remember which
/// modes were engaged. Idempotent on an already-suspended program.
async fn suspend(
    terminal: &mut (dyn TerminalController + '_),
    reader: &mut Option<InputReader>,
    state: &ReaderState,
    stash: &mut Option<InputSource>,
    suspend_restore: &mut Option<(bool, bool)>,
    shared: &Shared,
) {
    if suspend_restore.is_some() {
        return;
    }
    stop_input_reader(reader, state, stash).await;

    let was_raw = terminal.is_in_raw_mode();
    let was_alt = terminal.is_in_alt_screen();
    if was_alt {
        let _ = terminal.exit_alt_screen().await;
    }
    if was_raw {
        let _ = terminal.exit_raw_mode().await;
    }
    let _ = terminal.show_cursor().await;

    *suspend_restore = Some((was_raw, was_alt));
    shared.suspended.store(true, Ordering::SeqCst);
}

/// Rebuild terminal state after suspension, restoring exactly the modes
/// that were engaged before. Idempotent on an already-resumed program.
async fn resume(
    terminal: &mut (dyn TerminalController + '_),
    reader: &mut Option<InputReader>,
    state: &ReaderState,
    stash: &mut Option<InputSource>,
    custom_input: bool,
    suspend_restore: &mut Option<(bool, bool)>,
    shared: &Shared,
) {
    let Some((was_raw, was_alt)) = suspend_restore.take() else {
        return;
    };
    if was_raw {
        let _ = terminal.enter_raw_mode().await;
    }
    if was_alt {
        let _ = terminal.enter_alt_screen().await;
    }
    let _ = terminal.hide_cursor().await;
    restart_input_reader(reader, state, stash, custom_input);
    shared.suspended.store(false, Ordering::SeqCst);
}

/// The external-process handoff, composed around the terminal teardown
/// and rebuild in [`exec::run_with_terminal`]. The input reader is
/// stopped first — the child must inherit an undisturbed stdin — and
/// restarted whatever the outcome.
async fn handle_exec(
    terminal: &mut (dyn TerminalController + '_),
    reader: &mut Option<InputReader>,
    state: &ReaderState,
    stash: &mut Option<InputSource>,
    custom_input: bool,
    command: std::process::Command,
    options: exec::ExecOptions,
) -> Result<(), Error> {
    exec::validate(&command)?;

    stop_input_reader(reader, state, stash).await;
    let result = exec::run_with_terminal(terminal, command, options).await;
    restart_input_reader(reader, state, stash, custom_input);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::MockTerminal;

    fn test_shared() -> Shared {
        Shared {
            running: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    fn empty_custom_source() -> InputSource {
        InputSource::Custom(Box::pin(std::io::Cursor::new(Vec::new())))
    }

    #[tokio::test]
    async fn suspend_resume_restores_pre_suspend_modes() {
        let (mut mock, handle) = MockTerminal::new();
        mock.enter_raw_mode().await.unwrap();
        mock.enter_alt_screen().await.unwrap();
        handle.reset_calls();

        let mut terminal: Box<dyn TerminalController> = Box::new(mock);
        let state = ReaderState::default();
        let shared = test_shared();
        let mut reader: Option<InputReader> = None;
        let mut stash = Some(empty_custom_source());
        let mut restore = None;

        suspend(
            terminal.as_mut(),
            &mut reader,
            &state,
            &mut stash,
            &mut restore,
            &shared,
        )
        .await;
        assert!(shared.suspended.load(Ordering::SeqCst));
        assert!(!handle.is_in_raw_mode());
        assert!(!handle.is_in_alt_screen());
        assert_eq!(restore, Some((true, true)));

        resume(
            terminal.as_mut(),
            &mut reader,
            &state,
            &mut stash,
            true,
            &mut restore,
            &shared,
        )
        .await;
        assert!(!shared.suspended.load(Ordering::SeqCst));
        assert!(handle.is_in_raw_mode());
        assert!(handle.is_in_alt_screen());
        assert!(restore.is_none());
    }

    #[tokio::test]
    async fn suspend_twice_is_a_single_suspend() {
        let (mut mock, handle) = MockTerminal::new();
        mock.enter_raw_mode().await.unwrap();

        let mut terminal: Box<dyn TerminalController> = Box::new(mock);
        let state = ReaderState::default();
        let shared = test_shared();
        let mut reader: Option<InputReader> = None;
        let mut stash: Option<InputSource> = None;
        let mut restore = None;

        for _ in 0..2 {
            suspend(
                terminal.as_mut(),
                &mut reader,
                &state,
                &mut stash,
                &mut restore,
                &shared,
            )
            .await;
        }
        assert_eq!(handle.call_count("exit_raw_mode"), 1);
        assert_eq!(handle.call_count("show_cursor"), 1);
    }

    #[tokio::test]
    async fn resume_without_suspend_is_a_no_op() {
        let (mock, handle) = MockTerminal::new();
        let mut terminal: Box<dyn TerminalController> = Box::new(mock);
        let state = ReaderState::default();
        let shared = test_shared();
        let mut reader: Option<InputReader> = None;
        let mut stash: Option<InputSource> = None;
        let mut restore = None;

        resume(
            terminal.as_mut(),
            &mut reader,
            &state,
            &mut stash,
            true,
            &mut restore,
            &shared,
        )
        .await;
        assert!(handle.calls().is_empty());
        assert!(reader.is_none());
    }

    #[tokio::test]
    async fn restart_while_running_is_a_no_op() {
        let state = ReaderState::default();
        let mut reader = Some(InputReader::spawn(empty_custom_source(), &state));
        let original_generation = reader.as_ref().unwrap().generation();
        let mut stash: Option<InputSource> = None;

        restart_input_reader(&mut reader, &state, &mut stash, true);
        assert_eq!(reader.as_ref().unwrap().generation(), original_generation);
    }

    #[tokio::test]
    async fn stop_input_reader_twice_is_a_single_stop() {
        let state = ReaderState::default();
        let mut reader = Some(InputReader::spawn(empty_custom_source(), &state));
        let mut stash: Option<InputSource> = None;

        stop_input_reader(&mut reader, &state, &mut stash).await;
        let generation_after_first = state.current_generation();
        stop_input_reader(&mut reader, &state, &mut stash).await;
        assert_eq!(state.current_generation(), generation_after_first);
        assert!(reader.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_call_order_and_mode_restoration() {
        let (mut mock, handle) = MockTerminal::new();
        mock.enter_raw_mode().await.unwrap();
        mock.enter_alt_screen().await.unwrap();
        handle.reset_calls();

        let mut terminal: Box<dyn TerminalController> = Box::new(mock);
        let state = ReaderState::default();
        let mut reader: Option<InputReader> = None;
        let mut stash = Some(empty_custom_source());

        let result = handle_exec(
            terminal.as_mut(),
            &mut reader,
            &state,
            &mut stash,
            true,
            std::process::Command::new("true"),
            exec::ExecOptions::default(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(
            handle.method_sequence(),
            vec![
                "exit_raw_mode",
                "exit_alt_screen",
                "show_cursor",
                "hide_cursor",
                "enter_alt_screen",
                "enter_raw_mode",
            ]
        );
        assert!(handle.is_in_raw_mode());
        assert!(handle.is_in_alt_screen());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_restores_modes_when_child_fails() {
        let (mut mock, handle) = MockTerminal::new();
        mock.enter_raw_mode().await.unwrap();
        mock.enter_alt_screen().await.unwrap();

        let mut terminal: Box<dyn TerminalController> = Box::new(mock);
        let state = ReaderState::default();
        let mut reader: Option<InputReader> = None;
        let mut stash = Some(empty_custom_source());

        let result = handle_exec(
            terminal.as_mut(),
            &mut reader,
            &state,
            &mut stash,
            true,
            std::process::Command::new("false"),
            exec::ExecOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::ChildFailed(_))));
        assert!(handle.is_in_raw_mode());
        assert!(handle.is_in_alt_screen());
    }

    #[tokio::test]
    async fn exec_rejects_empty_command_before_touching_state() {
        let (mock, handle) = MockTerminal::new();
        let mut terminal: Box<dyn TerminalController> = Box::new(mock);
        let state = ReaderState::default();
        let mut reader: Option<InputReader> = None;
        let mut stash: Option<InputSource> = None;

        let result = handle_exec(
            terminal.as_mut(),
            &mut reader,
            &state,
            &mut stash,
            true,
            std::process::Command::new(""),
            exec::ExecOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::EmptyExecCommand)));
        assert!(handle.calls().is_empty());
    }
}
