//! Input line widget.

use ratatui::layout::{Position, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{App, WidgetId};
use crate::ui::theme;

/// Renders the single-line editor and, when focused, places the
/// terminal cursor at the edit position.
pub fn render_input_line(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus.focused() == WidgetId::InputLine;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" message ")
        .border_style(Style::default().fg(theme::border_color(focused)));

    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor = app.input.cursor();

    // Shift the text left when the cursor would fall past the right
    // edge, keeping the edit position visible.
    let scroll = cursor.saturating_sub(inner_width.saturating_sub(1));

    let paragraph = Paragraph::new(app.input.text())
        .block(block)
        .scroll((0, scroll.min(u16::MAX as usize) as u16));
    frame.render_widget(paragraph, area);

    if focused && inner_width > 0 {
        let x = area.x + 1 + (cursor - scroll).min(inner_width - 1) as u16;
        let y = area.y + 1;
        frame.set_cursor_position(Position::new(x, y));
    }
}
