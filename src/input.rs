//! Input handling for oolong: the cancellable input reader.
//!
//! This module converts a blocking byte or event stream into an
//! asynchronous, cancellable message stream. A background worker reads
//! from the configured [`InputSource`] and publishes parsed messages
//! through a single-slot channel; [`InputReader::read`] multiplexes that
//! channel against the cancellation signal, so a reader parked on input
//! can be unblocked promptly from any task.
//!
//! # Cancellation contract
//!
//! Once [`InputReader::cancel`] returns, no further messages from this
//! reader reach the program: the worker's own channel send selects against
//! the cancellation token and drops anything still in flight. `cancel` is
//! idempotent, and every subsequent `read` returns `None` immediately.
//!
//! # Worker generations
//!
//! Readers are stopped and restarted around external-process handoff and
//! suspension. Each worker is stamped with a generation from a shared
//! monotonic counter; on exit it clears the shared running flag only if
//! its generation is still current, so a slow-unwinding worker can never
//! clear the flag out from under its successor.
//!
//! # Examples
//!
//! ```rust
//! use oolong::input::{InputReader, InputSource, ReaderState};
//!
//! # async fn example() {
//! let state = ReaderState::default();
//! let source = InputSource::Custom(Box::pin(std::io::Cursor::new(b"q".to_vec())));
//! let mut reader = InputReader::spawn(source, &state);
//!
//! while let Some(msg) = reader.read().await {
//!     // route into the program's message channel...
//! #   drop(msg);
//! }
//! # }
//! ```

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossterm::event::{Event, EventStream, KeyCode, KeyModifiers};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::message::{KeyMsg, Message, MouseMsg, WindowSizeMsg};

/// Size of the scratch buffer custom-source workers read into.
const READ_BUFFER_SIZE: usize = 256;

/// Represents different input sources the reader can consume.
pub enum InputSource {
    /// Standard terminal input via crossterm's event stream. Handles
    /// keyboard, mouse, and resize events.
    Terminal,

    /// A custom byte reader. Bytes are decoded one at a time into key
    /// messages; useful for tests, pipes, and scripted input.
    Custom(Pin<Box<dyn AsyncRead + Send + Unpin>>),
}

/// Shared reader bookkeeping owned by the program: the running flag and
/// the generation counter that protects it across restarts.
#[derive(Clone, Default)]
pub struct ReaderState {
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl ReaderState {
    /// Whether a reader worker is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The generation the next spawned worker will be stamped with.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidate any worker still unwinding from the previous
    /// generation. Called after a stop's bounded wait expires or
    /// completes.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// The cancellable input reader.
///
/// Owns the background worker for one generation of input processing. See
/// the module docs for the cancellation and generation contracts.
pub struct InputReader {
    event_rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
    cancelled: Arc<AtomicBool>,
    done_rx: Option<oneshot::Receiver<Option<InputSource>>>,
    generation: u64,
}

impl InputReader {
    /// Spawn a worker reading from `source`, stamped with the state's
    /// current generation.
    pub fn spawn(source: InputSource, state: &ReaderState) -> Self {
        // Single-slot channel: the worker parks on the send until the
        // consumer (or cancellation) frees it.
        let (event_tx, event_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();
        let generation = state.current_generation();

        state.running.store(true, Ordering::SeqCst);

        let worker_cancel = cancel.clone();
        let running = state.running.clone();
        let current_generation = state.generation.clone();
        tokio::spawn(async move {
            let leftover = match source {
                InputSource::Terminal => {
                    run_terminal_worker(event_tx, worker_cancel).await;
                    None
                }
                InputSource::Custom(reader) => {
                    run_custom_worker(reader, event_tx, worker_cancel).await
                }
            };
            // A stale worker must not clear the flag for a successor.
            if current_generation.load(Ordering::SeqCst) == generation {
                running.store(false, Ordering::SeqCst);
            }
            let _ = done_tx.send(leftover);
        });

        Self {
            event_rx,
            cancel,
            cancelled: Arc::new(AtomicBool::new(false)),
            done_rx: Some(done_rx),
            generation,
        }
    }

    /// Return the next parsed input message, or `None` at end-of-stream.
    ///
    /// End-of-stream means the underlying source is exhausted or the
    /// reader was cancelled; after cancellation this returns `None`
    /// promptly regardless of any blocked underlying read.
    pub async fn read(&mut self) -> Option<Message> {
        if self.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            msg = self.event_rx.recv() => msg,
        }
    }

    /// Cancel the reader. Idempotent; any in-progress or future
    /// [`InputReader::read`] returns `None` promptly.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        // On Windows a worker can be parked inside the console's blocking
        // read; a synthetic input event guarantees it returns.
        #[cfg(windows)]
        {
            let _ = crate::terminal::windows::inject_wakeup_event();
        }
    }

    /// Whether this reader has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The generation this reader's worker was stamped with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Block until the worker has exited.
    ///
    /// Returns the unconsumed custom source when the worker was cancelled
    /// before reaching end-of-file, so a restarted reader can resume the
    /// same stream. Subsequent calls return `None`.
    pub async fn wait_for_shutdown(&mut self) -> Option<InputSource> {
        match self.done_rx.take() {
            Some(done_rx) => done_rx.await.ok().flatten(),
            None => None,
        }
    }
}

/// Worker loop over crossterm's event stream.
///
/// Keyboard, mouse, and resize events are forwarded; everything else the
/// decoder produces is dropped here. Emission order is preserved: one
/// producer, one slot, one consumer.
async fn run_terminal_worker(event_tx: mpsc::Sender<Message>, cancel: CancellationToken) {
    let mut events = EventStream::new();

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.next() => event,
        };
        let msg = match event {
            Some(Ok(Event::Key(key_event))) => Message::Key(KeyMsg {
                key: key_event.code,
                modifiers: key_event.modifiers,
            }),
            Some(Ok(Event::Mouse(mouse_event))) => Message::Mouse(MouseMsg {
                x: mouse_event.column,
                y: mouse_event.row,
                button: mouse_event.kind,
                modifiers: mouse_event.modifiers,
            }),
            Some(Ok(Event::Resize(width, height))) => {
                Message::WindowSize(WindowSizeMsg { width, height })
            }
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => break,
        };
        // The send selects against cancellation so nothing is enqueued
        // after cancel() returns.
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = event_tx.send(msg) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

/// Worker loop over a custom byte reader.
///
/// Reads into a small scratch buffer and decodes each byte to a key
/// message. Returns the reader when cancelled mid-stream so it can be
/// resumed; returns `None` at end-of-file.
async fn run_custom_worker(
    mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    event_tx: mpsc::Sender<Message>,
    cancel: CancellationToken,
) -> Option<InputSource> {
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return Some(InputSource::Custom(reader)),
            read = reader.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => return None, // EOF
            Ok(n) => n,
            Err(_) => return None,
        };
        for &byte in &buf[..n] {
            let Some(msg) = decode_byte(byte) else {
                continue;
            };
            tokio::select! {
                _ = cancel.cancelled() => return Some(InputSource::Custom(reader)),
                sent = event_tx.send(msg) => {
                    if sent.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}

/// Decode one input byte into a key message.
///
/// Printable ASCII becomes a character key; the common control bytes map
/// to their named keys; anything else is dropped.
fn decode_byte(byte: u8) -> Option<Message> {
    let key = match byte {
        b'\n' | b'\r' => KeyCode::Enter,
        b'\t' => KeyCode::Tab,
        0x1b => KeyCode::Esc,
        0x7f => KeyCode::Backspace,
        0x20..=0x7e => KeyCode::Char(byte as char),
        _ => return None,
    };
    Some(Message::Key(KeyMsg {
        key,
        modifiers: KeyModifiers::NONE,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_maps_printable_and_control_bytes() {
        let msg = decode_byte(b'a').unwrap();
        match msg {
            Message::Key(key) => assert_eq!(key.key, KeyCode::Char('a')),
            other => panic!("expected Key, got {other:?}"),
        }
        let msg = decode_byte(b'\n').unwrap();
        match msg {
            Message::Key(key) => assert_eq!(key.key, KeyCode::Enter),
            other => panic!("expected Key, got {other:?}"),
        }
        assert!(decode_byte(0x01).is_none());
    }

    #[tokio::test]
    async fn custom_source_reaches_eof() {
        let state = ReaderState::default();
        let source = InputSource::Custom(Box::pin(std::io::Cursor::new(b"ab".to_vec())));
        let mut reader = InputReader::spawn(source, &state);

        assert!(reader.read().await.is_some());
        assert!(reader.read().await.is_some());
        assert!(reader.read().await.is_none());
    }

    #[tokio::test]
    async fn generation_bump_invalidates_previous_worker() {
        let state = ReaderState::default();
        let source = InputSource::Custom(Box::pin(std::io::Cursor::new(b"x".to_vec())));
        let mut reader = InputReader::spawn(source, &state);
        assert!(state.is_running());

        // Simulate a successor starting before the old worker unwinds.
        state.bump_generation();
        let successor = InputReader::spawn(
            InputSource::Custom(Box::pin(std::io::Cursor::new(Vec::new()))),
            &state,
        );

        reader.cancel();
        let _ = reader.wait_for_shutdown().await;
        // The stale worker exited, but the flag belongs to the successor
        // generation now.
        drop(successor);
        assert_ne!(reader.generation(), state.current_generation());
    }
}
