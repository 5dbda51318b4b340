//! UI rendering module for the chatter TUI.
//!
//! This module provides the complete rendering pipeline for the chat
//! interface. It orchestrates the layout and individual widget
//! rendering.
//!
//! # Layout Structure
//!
//! ```text
//! +--------------------------------------------------+
//! |  Chat viewport (scrollable history)              |  <- fills remaining
//! |       alice: hello everyone                      |
//! |         bob: hi alice                            |
//! |  bob joined the chat                             |
//! +--------------------------------------------------+
//! |  message> _                                      |  <- 3 lines
//! +--------------------------------------------------+
//! ```

pub mod input_line;
pub mod layout;
pub mod theme;
pub mod viewport;

use ratatui::Frame;

use crate::app::App;
use layout::AppLayout;

pub use input_line::render_input_line;
pub use viewport::render_viewport;

/// Renders the complete TUI interface.
///
/// The main loop derives the same [`AppLayout`] from the drawn area to
/// feed the viewport's inner height back into the history for scroll
/// clamping.
pub fn render(frame: &mut Frame, app: &App) {
    let layout = AppLayout::new(frame.area());

    render_viewport(frame, layout.viewport, app);
    render_input_line(frame, layout.input, app);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ChatLine;
    use chatter_protocol::HexColor;
    use ratatui::{backend::TestBackend, Terminal};

    fn color() -> HexColor {
        "ff0000".parse().expect("valid color")
    }

    fn app() -> App {
        App::new("alice", color())
    }

    #[test]
    fn test_render_empty_state() {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        let app = app();

        terminal.draw(|frame| {
            render(frame, &app);
        })
        .unwrap();
    }

    #[test]
    fn test_render_with_history() {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();

        let mut app = app();
        app.history.set_viewport_height(19);
        app.history.push(ChatLine::System("bob joined the chat".to_string()));
        app.history.push(ChatLine::Chat {
            username: "bob".to_string(),
            color: color(),
            body: "hi alice".to_string(),
        });

        terminal.draw(|frame| {
            render(frame, &app);
        })
        .unwrap();

        let buffer = terminal.backend().buffer();
        let rendered: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(rendered.contains("bob joined the chat"));
        assert!(rendered.contains("hi alice"));
    }

    #[test]
    fn test_render_scrolled_back() {
        let backend = TestBackend::new(40, 10);
        let mut terminal = Terminal::new(backend).unwrap();

        let mut app = app();
        app.history.set_viewport_height(5);
        for i in 0..30 {
            app.history.push(ChatLine::System(format!("line {i}")));
        }
        app.history.scroll_up(10);

        terminal.draw(|frame| {
            render(frame, &app);
        })
        .unwrap();

        let buffer = terminal.backend().buffer();
        let rendered: String = buffer.content.iter().map(|c| c.symbol()).collect();
        // The newest line is below the window once scrolled back.
        assert!(!rendered.contains("line 29"));
        assert!(rendered.contains("line 15"));
    }

    #[test]
    fn test_render_with_input_text() {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();

        let mut app = app();
        for c in "typing away".chars() {
            app.input.insert(c);
        }

        terminal.draw(|frame| {
            render(frame, &app);
        })
        .unwrap();

        let buffer = terminal.backend().buffer();
        let rendered: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(rendered.contains("typing away"));
    }

    #[test]
    fn test_render_tiny_terminal() {
        let backend = TestBackend::new(5, 3);
        let mut terminal = Terminal::new(backend).unwrap();
        let app = app();

        terminal.draw(|frame| {
            render(frame, &app);
        })
        .unwrap();
    }
}
