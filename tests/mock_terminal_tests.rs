use oolong::terminal::{MockCall, MockTerminal, TerminalController};
use oolong::Error;

#[tokio::test]
async fn records_calls_with_arguments_in_order() -> anyhow::Result<()> {
    let (mut mock, handle) = MockTerminal::new();

    mock.set_cursor_position(3, 7).await?;
    mock.clear_lines(2).await?;
    mock.write("hello").await?;

    assert_eq!(
        handle.calls(),
        vec![
            MockCall::SetCursorPosition(3, 7),
            MockCall::ClearLines(2),
            MockCall::Write("hello".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn call_counts_are_per_method() {
    let (mut mock, handle) = MockTerminal::new();

    mock.hide_cursor().await.unwrap();
    mock.hide_cursor().await.unwrap();
    mock.show_cursor().await.unwrap();

    assert_eq!(handle.call_count("hide_cursor"), 2);
    assert_eq!(handle.call_count("show_cursor"), 1);
    assert_eq!(handle.call_count("clear"), 0);
}

#[tokio::test]
async fn injected_errors_fail_the_named_method_only() {
    let (mut mock, handle) = MockTerminal::new();
    handle.inject_error("enter_alt_screen");

    assert!(matches!(
        mock.enter_alt_screen().await,
        Err(Error::Injected("enter_alt_screen"))
    ));
    // The failed call is still recorded, and other methods are untouched.
    assert_eq!(handle.call_count("enter_alt_screen"), 1);
    assert!(mock.enter_raw_mode().await.is_ok());

    handle.clear_injected_error("enter_alt_screen");
    assert!(mock.enter_alt_screen().await.is_ok());
}

#[tokio::test]
async fn mode_flags_follow_the_state_machine() {
    let (mut mock, handle) = MockTerminal::new();

    mock.enter_raw_mode().await.unwrap();
    assert!(handle.is_in_raw_mode());
    assert!(matches!(
        mock.enter_raw_mode().await,
        Err(Error::AlreadyInRawMode)
    ));

    mock.exit_raw_mode().await.unwrap();
    assert!(!handle.is_in_raw_mode());
    assert!(matches!(
        mock.exit_raw_mode().await,
        Err(Error::NotInRawMode)
    ));
}

#[tokio::test]
async fn handle_is_usable_from_another_task() {
    let (mut mock, handle) = MockTerminal::new();

    mock.clear().await.unwrap();
    let observed = tokio::spawn(async move { handle.call_count("clear") })
        .await
        .unwrap();
    assert_eq!(observed, 1);
}

#[tokio::test]
async fn size_override() {
    let (mock, handle) = MockTerminal::new();

    assert_eq!(mock.size(), (80, 24));
    handle.set_size(120, 40);
    assert_eq!(mock.size(), (120, 40));
}
