use oolong::{Error, Message};
use tokio::sync::mpsc;

#[test]
fn caller_sequence_errors_have_clear_messages() {
    assert_eq!(
        Error::AlreadyInRawMode.to_string(),
        "terminal is already in raw mode"
    );
    assert_eq!(
        Error::NotInAltScreen.to_string(),
        "terminal is not in the alternate screen"
    );
    assert_eq!(
        Error::AlreadyRunning.to_string(),
        "program is already running"
    );
}

#[test]
fn io_errors_convert_via_from() {
    let io_err = std::io::Error::other("backing store gone");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
    assert!(err.to_string().contains("backing store gone"));
}

#[test]
fn string_conversions_produce_configuration_errors() {
    let err: Error = "bad option".into();
    assert!(matches!(err, Error::Configuration(_)));

    let err: Error = format!("bad value {}", 3).into();
    assert_eq!(err.to_string(), "configuration error: bad value 3");
}

#[tokio::test]
async fn try_send_errors_distinguish_full_from_closed() {
    let (tx, mut rx) = mpsc::channel::<Message>(1);
    tx.try_send(Message::Quit).unwrap();

    let err: Error = tx.try_send(Message::Quit).unwrap_err().into();
    assert!(matches!(err, Error::ChannelFull));

    rx.close();
    while rx.try_recv().is_ok() {}
    let err: Error = tx.try_send(Message::Quit).unwrap_err().into();
    assert!(matches!(err, Error::ChannelClosed));
}

#[tokio::test]
async fn send_timeout_errors_map_to_send_timeout() {
    let (tx, _rx) = mpsc::channel::<Message>(1);
    tx.try_send(Message::Quit).unwrap();

    let err: Error = tx
        .send_timeout(Message::Quit, std::time::Duration::from_millis(10))
        .await
        .unwrap_err()
        .into();
    assert!(matches!(err, Error::SendTimeout));
}

#[test]
fn compound_error_preserves_both_halves() {
    let child = Error::Io(std::io::Error::other("child exploded"));
    let restore = Error::AlreadyInAltScreen;
    let err = Error::Compound {
        child: Some(Box::new(child)),
        restore: Box::new(restore),
    };

    let rendered = err.to_string();
    assert!(rendered.contains("terminal restore failed"));
    assert!(rendered.contains("child exploded"));
    assert!(rendered.contains("already in the alternate screen"));

    match err {
        Error::Compound { child, restore } => {
            assert!(child.is_some());
            assert!(matches!(*restore, Error::AlreadyInAltScreen));
        }
        other => panic!("expected Compound, got {other}"),
    }
}

#[test]
fn compound_error_without_child_mentions_only_restore() {
    let err = Error::Compound {
        child: None,
        restore: Box::new(Error::NotInRawMode),
    };
    let rendered = err.to_string();
    assert!(rendered.contains("terminal restore failed"));
    assert!(!rendered.contains("child error"));
}
