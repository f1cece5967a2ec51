use std::sync::Arc;

use oolong::terminal::{AnsiTerminal, TerminalController};
use oolong::{CursorStyle, Error};
use tokio::sync::Mutex;

/// An ANSI backend writing into a shared buffer, plus the buffer itself.
fn capture_terminal() -> (AnsiTerminal, Arc<Mutex<Vec<u8>>>) {
    let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let terminal = AnsiTerminal::new(Some(buffer.clone()));
    (terminal, buffer)
}

async fn drain(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    let mut bytes = buffer.lock().await;
    let out = String::from_utf8(bytes.clone()).expect("utf8 output");
    bytes.clear();
    out
}

#[tokio::test]
async fn cursor_positioning_is_one_based() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.set_cursor_position(0, 0).await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[1;1H");

    terminal.set_cursor_position(2, 5).await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[6;3H");
}

#[tokio::test]
async fn relative_cursor_moves() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.move_cursor_up(3).await.unwrap();
    terminal.move_cursor_down(1).await.unwrap();
    terminal.move_cursor_right(2).await.unwrap();
    terminal.move_cursor_left(4).await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[3A\x1b[1B\x1b[2C\x1b[4D");
}

#[tokio::test]
async fn zero_count_moves_emit_nothing() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.move_cursor_up(0).await.unwrap();
    terminal.move_cursor_down(0).await.unwrap();
    terminal.move_cursor_left(0).await.unwrap();
    terminal.move_cursor_right(0).await.unwrap();
    assert_eq!(drain(&buffer).await, "");
}

#[tokio::test]
async fn clear_lines_emission() {
    let (mut terminal, buffer) = capture_terminal();

    // Multi-line: cursor up n-1, carriage return, erase to end of screen.
    terminal.clear_lines(3).await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[2A\r\x1b[J");

    // Single line skips the cursor movement.
    terminal.clear_lines(1).await.unwrap();
    assert_eq!(drain(&buffer).await, "\r\x1b[J");

    // Zero is a no-op and emits nothing.
    terminal.clear_lines(0).await.unwrap();
    assert_eq!(drain(&buffer).await, "");
}

#[tokio::test]
async fn clear_line_lands_in_column_zero() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.clear_line().await.unwrap();
    assert_eq!(drain(&buffer).await, "\r\x1b[2K");
}

#[tokio::test]
async fn clear_screen_homes_the_cursor() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.clear().await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[2J\x1b[1;1H");

    terminal.clear_from_cursor().await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[J");
}

#[tokio::test]
async fn cursor_visibility_and_save_restore() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.hide_cursor().await.unwrap();
    terminal.show_cursor().await.unwrap();
    terminal.save_cursor_position().await.unwrap();
    terminal.restore_cursor_position().await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[?25l\x1b[?25h\x1b[s\x1b[u");
}

#[tokio::test]
async fn cursor_styles() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.set_cursor_style(CursorStyle::Block).await.unwrap();
    terminal
        .set_cursor_style(CursorStyle::Underline)
        .await
        .unwrap();
    terminal.set_cursor_style(CursorStyle::Bar).await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[2q\x1b[4q\x1b[6q");
}

#[tokio::test]
async fn write_at_positions_then_writes() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.write_at(1, 2, "hi").await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[3;2Hhi");
}

#[tokio::test]
async fn render_homes_clears_and_normalizes_newlines() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.render("one\ntwo").await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b[H\x1b[2Jone\r\ntwo");
}

#[tokio::test]
async fn window_title_uses_osc() {
    let (mut terminal, buffer) = capture_terminal();

    terminal.set_window_title("tea").await.unwrap();
    assert_eq!(drain(&buffer).await, "\x1b]0;tea\x07");
}

#[tokio::test]
async fn alt_screen_sequences_and_state_machine() {
    let (mut terminal, buffer) = capture_terminal();
    assert!(!terminal.is_in_alt_screen());

    terminal.enter_alt_screen().await.unwrap();
    assert!(terminal.is_in_alt_screen());
    assert_eq!(drain(&buffer).await, "\x1b[?1049h");

    // Double enter is a caller error and emits nothing.
    assert!(matches!(
        terminal.enter_alt_screen().await,
        Err(Error::AlreadyInAltScreen)
    ));
    assert_eq!(drain(&buffer).await, "");

    terminal.exit_alt_screen().await.unwrap();
    assert!(!terminal.is_in_alt_screen());
    assert_eq!(drain(&buffer).await, "\x1b[?1049l");

    assert!(matches!(
        terminal.exit_alt_screen().await,
        Err(Error::NotInAltScreen)
    ));
}

#[tokio::test]
async fn alt_screen_flag_matches_enter_exit_parity() {
    let (mut terminal, _buffer) = capture_terminal();

    for _ in 0..3 {
        terminal.enter_alt_screen().await.unwrap();
        terminal.exit_alt_screen().await.unwrap();
    }
    assert!(!terminal.is_in_alt_screen());

    terminal.enter_alt_screen().await.unwrap();
    assert!(terminal.is_in_alt_screen());
}

#[tokio::test]
async fn exit_raw_mode_without_enter_is_an_error() {
    let (mut terminal, _buffer) = capture_terminal();

    assert!(!terminal.is_in_raw_mode());
    assert!(matches!(
        terminal.exit_raw_mode().await,
        Err(Error::NotInRawMode)
    ));
}

#[tokio::test]
async fn ansi_backend_reports_unsupported_queries() {
    let (mut terminal, _buffer) = capture_terminal();

    assert!(matches!(
        terminal.cursor_position().await,
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        terminal.read_screen_buffer().await,
        Err(Error::Unsupported(_))
    ));
    assert!(!terminal.supports_direct_positioning());
    assert!(!terminal.supports_readback());
}

#[tokio::test]
async fn size_is_never_zero() {
    let (terminal, _buffer) = capture_terminal();

    // Real size where a terminal is attached, the 80x24 fallback where
    // not; either way both axes are positive.
    let (width, height) = terminal.size();
    assert!(width > 0);
    assert!(height > 0);
}

#[test]
fn color_depth_tracks_environment() {
    use oolong::ColorDepth;

    // One test mutates the environment for all scenarios so parallel
    // test threads never race on these variables.
    let saved_colorterm = std::env::var("COLORTERM").ok();
    let saved_term = std::env::var("TERM").ok();

    std::env::set_var("COLORTERM", "truecolor");
    assert_eq!(AnsiTerminal::new(None).color_depth(), ColorDepth::TrueColor);

    std::env::set_var("COLORTERM", "24bit");
    assert_eq!(AnsiTerminal::new(None).color_depth(), ColorDepth::TrueColor);

    std::env::remove_var("COLORTERM");
    std::env::set_var("TERM", "xterm-256color");
    assert_eq!(AnsiTerminal::new(None).color_depth(), ColorDepth::Ansi256);

    std::env::set_var("TERM", "vt100");
    assert_eq!(AnsiTerminal::new(None).color_depth(), ColorDepth::Ansi16);

    match saved_colorterm {
        Some(value) => std::env::set_var("COLORTERM", value),
        None => std::env::remove_var("COLORTERM"),
    }
    match saved_term {
        Some(value) => std::env::set_var("TERM", value),
        None => std::env::remove_var("TERM"),
    }
}
