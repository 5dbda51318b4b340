//! Application state for the chatter TUI.
//!
//! This module holds everything the renderer reads: the focus ring,
//! the chat history with its scroll position, and the input line being
//! edited. State changes happen here; drawing happens in `ui`.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use chatter_protocol::{HexColor, Message};

// ============================================================================
// Focus Ring
// ============================================================================

/// The widgets that can hold keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetId {
    ChatViewport,
    InputLine,
}

/// Rotating focus over the interactive widgets.
///
/// Tab advances focus; the ring wraps around. The input line starts
/// focused so the user can type immediately.
#[derive(Debug)]
pub struct FocusRing {
    order: Vec<WidgetId>,
    index: usize,
}

impl FocusRing {
    pub fn new() -> Self {
        Self {
            order: vec![WidgetId::InputLine, WidgetId::ChatViewport],
            index: 0,
        }
    }

    /// The widget currently holding focus.
    pub fn focused(&self) -> WidgetId {
        self.order.get(self.index).copied().unwrap_or(WidgetId::InputLine)
    }

    /// Moves focus to the next widget in the ring.
    pub fn advance(&mut self) {
        if !self.order.is_empty() {
            self.index = (self.index + 1) % self.order.len();
        }
    }
}

impl Default for FocusRing {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Chat History
// ============================================================================

/// One rendered line of history.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatLine {
    /// A chat message from a peer (or our echoed one).
    Chat {
        username: String,
        color: HexColor,
        body: String,
    },
    /// A join/leave notice or a local status line.
    System(String),
}

/// Append-only chat history with a clamped scroll offset.
///
/// `offset` counts lines scrolled back from the bottom. While `follow`
/// is set the view sticks to the newest line; scrolling up detaches,
/// scrolling back to the bottom reattaches.
#[derive(Debug)]
pub struct ChatHistory {
    lines: Vec<ChatLine>,
    offset: usize,
    follow: bool,
    viewport_height: usize,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            offset: 0,
            follow: true,
            viewport_height: 0,
        }
    }

    pub fn lines(&self) -> &[ChatLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines scrolled back from the bottom.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether the view is pinned to the newest line.
    pub fn following(&self) -> bool {
        self.follow
    }

    /// Largest valid offset for the current content and viewport.
    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.viewport_height.max(1))
    }

    /// Appends a line. A following view stays at the bottom; a
    /// detached view keeps its position in the existing content.
    pub fn push(&mut self, line: ChatLine) {
        self.lines.push(line);
        if self.follow {
            self.offset = 0;
        } else {
            // One more line below the window; stay anchored.
            self.offset = (self.offset + 1).min(self.max_offset());
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = (self.offset + lines).min(self.max_offset());
        self.follow = self.offset == 0;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
        self.follow = self.offset == 0;
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.viewport_height.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.viewport_height.max(1));
    }

    /// Records the viewport height and re-clamps the offset, so a
    /// resize can never leave the view pointing past the content.
    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height;
        self.offset = self.offset.min(self.max_offset());
        if self.offset == 0 {
            self.follow = true;
        }
    }

    /// Index of the first visible line for the current offset.
    pub fn top_line(&self) -> usize {
        self.max_offset().saturating_sub(self.offset)
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Input Line
// ============================================================================

/// Single-line text editor backing the input widget.
///
/// Stored as chars so cursor movement is per character, not per byte.
#[derive(Debug, Default)]
pub struct InputLine {
    chars: Vec<char>,
    cursor: usize,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn insert(&mut self, c: char) {
        if self.cursor <= self.chars.len() {
            self.chars.insert(self.cursor, c);
            self.cursor += 1;
        }
    }

    /// Deletes the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            if self.cursor < self.chars.len() {
                self.chars.remove(self.cursor);
            }
        }
    }

    /// Deletes the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.chars.len();
    }

    /// Takes the current contents, leaving the line empty.
    pub fn submit(&mut self) -> String {
        self.cursor = 0;
        self.chars.drain(..).collect()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Top-level state for the chat client.
pub struct App {
    /// Our registered username, used to render the echo.
    pub username: String,

    /// Our display color.
    pub color: HexColor,

    /// Which widget has keyboard focus.
    pub focus: FocusRing,

    /// Scrollback and notices.
    pub history: ChatHistory,

    /// The line being edited.
    pub input: InputLine,

    /// Set when the user asked to quit.
    pub should_quit: bool,

    /// Cleared when the server connection drops.
    pub connected: bool,
}

impl App {
    pub fn new(username: impl Into<String>, color: HexColor) -> Self {
        Self {
            username: username.into(),
            color,
            focus: FocusRing::new(),
            history: ChatHistory::new(),
            input: InputLine::new(),
            should_quit: false,
            connected: true,
        }
    }

    /// Folds a message from the server into the history.
    ///
    /// Our own chat messages arrive here too; the round trip through
    /// the server is the only way a line enters the history.
    pub fn apply_inbound(&mut self, msg: Message) {
        let line = match msg {
            Message::Chat {
                username,
                color,
                body,
                ..
            } => ChatLine::Chat {
                username,
                color,
                body,
            },
            Message::Join { username, .. } => {
                ChatLine::System(format!("{username} joined the chat"))
            }
            Message::Leave { username, .. } => {
                ChatLine::System(format!("{username} left the chat"))
            }
        };
        self.history.push(line);
    }

    /// Appends a local status line (connection notices and the like).
    pub fn push_system(&mut self, text: impl Into<String>) {
        self.history.push(ChatLine::System(text.into()));
    }

    /// Takes the input line and builds the chat message to send.
    ///
    /// Returns `None` for an empty or whitespace-only line; nothing is
    /// sent and nothing is cleared in that case beyond the line itself.
    pub fn compose(&mut self) -> Option<Message> {
        let text = self.input.submit();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Message::chat(
            self.username.clone(),
            self.color.clone(),
            trimmed,
        ))
    }

    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

// ============================================================================
// Tests
// ============================================================================
