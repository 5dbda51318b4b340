//! Shared theme utilities for the chatter TUI.
//!
//! Provides consistent styling across all UI components.

use ratatui::style::Color;

use chatter_protocol::HexColor;

/// Border color for the focused widget.
pub const FOCUSED_BORDER: Color = Color::Cyan;

/// Border color for unfocused widgets.
pub const UNFOCUSED_BORDER: Color = Color::DarkGray;

/// Color for system notices (joins, leaves, status lines).
pub const SYSTEM_TEXT: Color = Color::DarkGray;

/// Converts a user's hex color into a terminal color.
pub fn user_color(color: &HexColor) -> Color {
    let (r, g, b) = color.rgb();
    Color::Rgb(r, g, b)
}

/// Picks the border color based on focus.
pub fn border_color(focused: bool) -> Color {
    if focused {
        FOCUSED_BORDER
    } else {
        UNFOCUSED_BORDER
    }
}
