//! Layout helpers for the chatter TUI.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Main application layout areas.
///
/// The TUI is divided into two vertical sections:
/// - Viewport (fills remaining): scrollable chat history
/// - Input (3 lines): bordered single-line editor
#[derive(Debug, Clone, Copy)]
pub struct AppLayout {
    /// Chat history area
    pub viewport: Rect,
    /// Input line area
    pub input: Rect,
}

impl AppLayout {
    /// Creates a new AppLayout by splitting the given area.
    pub fn new(area: Rect) -> Self {
        let [viewport, input] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // Viewport takes everything left
                Constraint::Length(3), // Input line with borders
            ])
            .areas(area);

        Self { viewport, input }
    }

    /// Text rows inside the viewport's borders.
    ///
    /// The main loop feeds this to the history so scroll clamping
    /// always matches what is actually drawn.
    pub fn viewport_inner_height(&self) -> usize {
        self.viewport.height.saturating_sub(2) as usize
    }
}
