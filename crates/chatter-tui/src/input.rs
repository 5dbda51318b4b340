//! Keyboard input handling for the chatter TUI.
//!
//! This module provides event types and the key dispatcher. Global
//! bindings (quit, focus rotation) are checked first; everything else
//! goes to whichever widget holds focus.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use chatter_protocol::Message;

use crate::app::{App, WidgetId};

// ============================================================================
// Event Types
// ============================================================================

/// Events that the TUI can receive and process.
///
/// These events drive the main event loop and include both user input
/// and traffic from the server connection.
#[derive(Debug, Clone)]
pub enum Event {
    /// Keyboard input from the user.
    Key(KeyEvent),

    /// Terminal window resize event.
    Resize(u16, u16),

    /// A message received from the server.
    Inbound(Message),

    /// The server connection was lost.
    Disconnected,
}

// ============================================================================
// Action Types
// ============================================================================

/// Actions that can result from user input.
///
/// Returned by the input handler to signal what the main loop should
/// do in response.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// No action required.
    None,

    /// Quit the application.
    Quit,

    /// Send a chat message to the server.
    Submit(Message),
}

// ============================================================================
// Input Handler
// ============================================================================

/// Handles a keyboard event and updates application state accordingly.
///
/// Returns an `Action` indicating what the main loop should do.
///
/// # Key Bindings
///
/// | Key              | Action                                |
/// |------------------|---------------------------------------|
/// | `Ctrl+C`, `Esc`  | Quit                                  |
/// | `Tab`            | Rotate focus between widgets          |
/// | `Enter`          | Submit the input line (when focused)  |
/// | `Up`/`Down`      | Scroll the viewport (when focused)    |
/// | `PgUp`/`PgDn`    | Page the viewport (when focused)      |
#[must_use]
pub fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    // Ctrl+C quits regardless of focus
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return Action::Quit;
    }

    match key.code {
        KeyCode::Esc => {
            app.quit();
            Action::Quit
        }

        KeyCode::Tab => {
            app.focus.advance();
            Action::None
        }

        _ => match app.focus.focused() {
            WidgetId::InputLine => handle_input_key(key, app),
            WidgetId::ChatViewport => handle_viewport_key(key, app),
        },
    }
}

/// Editing keys for the focused input line.
fn handle_input_key(key: KeyEvent, app: &mut App) -> Action {
    match key.code {
        KeyCode::Enter => match app.compose() {
            Some(msg) => Action::Submit(msg),
            None => Action::None,
        },

        KeyCode::Char(c) => {
            // Control-chord characters are bindings, not text.
            if !key.modifiers.contains(KeyModifiers::CONTROL) {
                app.input.insert(c);
            }
            Action::None
        }

        KeyCode::Backspace => {
            app.input.backspace();
            Action::None
        }

        KeyCode::Delete => {
            app.input.delete();
            Action::None
        }

        KeyCode::Left => {
            app.input.move_left();
            Action::None
        }

        KeyCode::Right => {
            app.input.move_right();
            Action::None
        }

        KeyCode::Home => {
            app.input.move_home();
            Action::None
        }

        KeyCode::End => {
            app.input.move_end();
            Action::None
        }

        _ => Action::None,
    }
}

/// Scroll keys for the focused viewport.
fn handle_viewport_key(key: KeyEvent, app: &mut App) -> Action {
    match key.code {
        KeyCode::Up => {
            app.history.scroll_up(1);
            Action::None
        }

        KeyCode::Down => {
            app.history.scroll_down(1);
            Action::None
        }

        KeyCode::PageUp => {
            app.history.page_up();
            Action::None
        }

        KeyCode::PageDown => {
            app.history.page_down();
            Action::None
        }

        _ => Action::None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ChatLine;

    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn key_event_with_mod(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn app() -> App {
        App::new("alice", "ff0000".parse().expect("valid color"))
    }

    fn type_line(app: &mut App, text: &str) {
        for c in text.chars() {
            let _ = handle_key_event(key_event(KeyCode::Char(c)), app);
        }
    }

    // ------------------------------------------------------------------------
    // Quit key tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_escape_quits() {
        let mut app = app();
        let action = handle_key_event(key_event(KeyCode::Esc), &mut app);
        assert_eq!(action, Action::Quit);
        assert!(app.should_quit);
    }

    #[test]
    fn test_ctrl_c_quits_regardless_of_focus() {
        let mut app = app();
        app.focus.advance();
        let action = handle_key_event(
            key_event_with_mod(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut app,
        );
        assert_eq!(action, Action::Quit);
        assert!(app.should_quit);
    }

    // ------------------------------------------------------------------------
    // Focus rotation tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_tab_rotates_focus() {
        let mut app = app();
        assert_eq!(app.focus.focused(), WidgetId::InputLine);

        let action = handle_key_event(key_event(KeyCode::Tab), &mut app);
        assert_eq!(action, Action::None);
        assert_eq!(app.focus.focused(), WidgetId::ChatViewport);

        let _ = handle_key_event(key_event(KeyCode::Tab), &mut app);
        assert_eq!(app.focus.focused(), WidgetId::InputLine);
    }

    // ------------------------------------------------------------------------
    // Input line tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_typed_chars_land_in_input() {
        let mut app = app();
        type_line(&mut app, "hello");
        assert_eq!(app.input.text(), "hello");
    }

    #[test]
    fn test_ctrl_chord_is_not_text() {
        let mut app = app();
        let _ = handle_key_event(
            key_event_with_mod(KeyCode::Char('a'), KeyModifiers::CONTROL),
            &mut app,
        );
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_enter_submits_trimmed_message() {
        let mut app = app();
        type_line(&mut app, "  hello world  ");

        let action = handle_key_event(key_event(KeyCode::Enter), &mut app);
        match action {
            Action::Submit(msg) => {
                assert_eq!(msg.body(), Some("hello world"));
                assert_eq!(msg.username(), "alice");
            }
            other => panic!("expected Submit, got {other:?}"),
        }
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_enter_on_blank_line_does_nothing() {
        let mut app = app();
        type_line(&mut app, "   ");

        let action = handle_key_event(key_event(KeyCode::Enter), &mut app);
        assert_eq!(action, Action::None);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_editing_keys() {
        let mut app = app();
        type_line(&mut app, "helo");
        let _ = handle_key_event(key_event(KeyCode::Left), &mut app);
        let _ = handle_key_event(key_event(KeyCode::Char('l')), &mut app);
        assert_eq!(app.input.text(), "hello");

        let _ = handle_key_event(key_event(KeyCode::Backspace), &mut app);
        assert_eq!(app.input.text(), "helo");
    }

    // ------------------------------------------------------------------------
    // Viewport tests
    // ------------------------------------------------------------------------

    fn scrollable_app() -> App {
        let mut app = app();
        app.history.set_viewport_height(5);
        for i in 0..20 {
            app.history.push(ChatLine::System(format!("line {i}")));
        }
        app.focus.advance();
        app
    }

    #[test]
    fn test_arrows_scroll_focused_viewport() {
        let mut app = scrollable_app();

        let _ = handle_key_event(key_event(KeyCode::Up), &mut app);
        assert_eq!(app.history.offset(), 1);

        let _ = handle_key_event(key_event(KeyCode::Down), &mut app);
        assert_eq!(app.history.offset(), 0);
        assert!(app.history.following());
    }

    #[test]
    fn test_page_keys_scroll_by_viewport() {
        let mut app = scrollable_app();

        let _ = handle_key_event(key_event(KeyCode::PageUp), &mut app);
        assert_eq!(app.history.offset(), 5);

        let _ = handle_key_event(key_event(KeyCode::PageDown), &mut app);
        assert_eq!(app.history.offset(), 0);
    }

    #[test]
    fn test_arrows_do_not_scroll_when_input_focused() {
        let mut app = scrollable_app();
        let _ = handle_key_event(key_event(KeyCode::Tab), &mut app);
        assert_eq!(app.focus.focused(), WidgetId::InputLine);

        let _ = handle_key_event(key_event(KeyCode::Up), &mut app);
        assert_eq!(app.history.offset(), 0);
    }

    #[test]
    fn test_chars_do_not_reach_input_when_viewport_focused() {
        let mut app = scrollable_app();
        let _ = handle_key_event(key_event(KeyCode::Char('x')), &mut app);
        assert!(app.input.is_empty());
    }
}
