//! Chat history viewport widget.

use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{App, ChatLine, WidgetId};
use crate::ui::theme;

/// Width reserved for the right-aligned username column.
const USERNAME_WIDTH: usize = 10;

/// Renders the scrollable chat history.
///
/// The scroll position comes from the history's clamped offset, so the
/// widget never points past the content.
pub fn render_viewport(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus.focused() == WidgetId::ChatViewport;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" chat ")
        .border_style(Style::default().fg(theme::border_color(focused)));

    let lines: Vec<Line> = app.history.lines().iter().map(render_line).collect();
    let top = app.history.top_line().min(u16::MAX as usize) as u16;

    let paragraph = Paragraph::new(lines).block(block).scroll((top, 0));
    frame.render_widget(paragraph, area);
}

fn render_line(line: &ChatLine) -> Line<'_> {
    match line {
        ChatLine::Chat {
            username,
            color,
            body,
        } => Line::from(vec![
            Span::styled(
                format!("{username:>width$}: ", width = USERNAME_WIDTH),
                Style::default().fg(theme::user_color(color)),
            ),
            Span::raw(body.as_str()),
        ]),
        ChatLine::System(text) => Line::from(Span::styled(
            text.as_str(),
            Style::default()
                .fg(theme::SYSTEM_TEXT)
                .add_modifier(Modifier::ITALIC),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_protocol::HexColor;

    fn color() -> HexColor {
        "ff0000".parse().expect("valid color")
    }

    #[test]
    fn test_chat_line_right_aligns_username() {
        let chat = ChatLine::Chat {
            username: "bob".to_string(),
            color: color(),
            body: "hi".to_string(),
        };
        let line = render_line(&chat);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "       bob: hi");
    }

    #[test]
    fn test_system_line_is_plain_text() {
        let notice = ChatLine::System("bob joined the chat".to_string());
        let line = render_line(&notice);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "bob joined the chat");
    }
}
