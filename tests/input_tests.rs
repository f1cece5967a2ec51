use std::io::Cursor;
use std::time::Duration;

use crossterm::event::KeyCode;
use oolong::input::{InputReader, InputSource, ReaderState};
use oolong::Message;
use tokio::time::timeout;

fn custom(bytes: &[u8]) -> InputSource {
    InputSource::Custom(Box::pin(Cursor::new(bytes.to_vec())))
}

fn key_of(msg: Message) -> KeyCode {
    match msg {
        Message::Key(key) => key.key,
        other => panic!("expected Key, got {other:?}"),
    }
}

#[tokio::test]
async fn bytes_arrive_in_emission_order() {
    let state = ReaderState::default();
    let mut reader = InputReader::spawn(custom(b"abc\n"), &state);

    assert_eq!(key_of(reader.read().await.unwrap()), KeyCode::Char('a'));
    assert_eq!(key_of(reader.read().await.unwrap()), KeyCode::Char('b'));
    assert_eq!(key_of(reader.read().await.unwrap()), KeyCode::Char('c'));
    assert_eq!(key_of(reader.read().await.unwrap()), KeyCode::Enter);
    assert!(reader.read().await.is_none());
}

#[tokio::test]
async fn cancel_unblocks_a_pending_read() {
    // A duplex stream with no data pending parks the worker in its read.
    let (client, _server) = tokio::io::duplex(64);
    let state = ReaderState::default();
    let mut reader = InputReader::spawn(InputSource::Custom(Box::pin(client)), &state);

    reader.cancel();
    let read = timeout(Duration::from_secs(1), reader.read())
        .await
        .expect("read returned within bound");
    assert!(read.is_none());
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let state = ReaderState::default();
    let reader = InputReader::spawn(custom(b"xyz"), &state);

    reader.cancel();
    reader.cancel();
    assert!(reader.is_cancelled());
}

#[tokio::test]
async fn no_messages_after_cancel_returns() {
    let state = ReaderState::default();
    let mut reader = InputReader::spawn(custom(b"abcdef"), &state);

    // The worker may have one result already buffered; after cancel the
    // consumer never sees it.
    reader.cancel();
    for _ in 0..3 {
        assert!(reader.read().await.is_none());
    }
}

#[tokio::test]
async fn cancelled_worker_returns_the_unconsumed_source() {
    let (client, _server) = tokio::io::duplex(64);
    let state = ReaderState::default();
    let mut reader = InputReader::spawn(InputSource::Custom(Box::pin(client)), &state);

    reader.cancel();
    let leftover = timeout(Duration::from_secs(1), reader.wait_for_shutdown())
        .await
        .expect("shutdown within bound");
    assert!(matches!(leftover, Some(InputSource::Custom(_))));
}

#[tokio::test]
async fn exhausted_worker_returns_no_source() {
    let state = ReaderState::default();
    let mut reader = InputReader::spawn(custom(b"a"), &state);

    assert!(reader.read().await.is_some());
    assert!(reader.read().await.is_none());
    let leftover = timeout(Duration::from_secs(1), reader.wait_for_shutdown())
        .await
        .expect("shutdown within bound");
    assert!(leftover.is_none());
}

#[tokio::test]
async fn resumed_source_continues_where_it_stopped() {
    let state = ReaderState::default();
    let mut reader = InputReader::spawn(custom(b"ab"), &state);

    assert_eq!(key_of(reader.read().await.unwrap()), KeyCode::Char('a'));
    reader.cancel();
    let leftover = timeout(Duration::from_secs(1), reader.wait_for_shutdown())
        .await
        .expect("shutdown within bound");

    if let Some(source) = leftover {
        state.bump_generation();
        let mut resumed = InputReader::spawn(source, &state);
        // Whatever was still buffered in the first worker is dropped with
        // it; the stream itself resumes rather than restarting.
        if let Some(msg) = resumed.read().await {
            assert_eq!(key_of(msg), KeyCode::Char('b'));
        }
    }
}

#[tokio::test]
async fn running_flag_tracks_worker_lifetime() {
    let state = ReaderState::default();
    let mut reader = InputReader::spawn(custom(b""), &state);

    // EOF is immediate; once the worker unwinds the flag clears.
    assert!(reader.read().await.is_none());
    let _ = timeout(Duration::from_secs(1), reader.wait_for_shutdown()).await;
    assert!(!state.is_running());
}
