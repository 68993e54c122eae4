use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::ChatClient;
use crate::lines::LineHistory;
use crate::session::ChatSession;
use crate::stream::StreamHandle;
use crate::ui::Theme;

/// Chat view state. Owned and mutated exclusively by the single-threaded
/// event loop; stream bridges reach it only through enqueued events.
pub struct App {
    pub should_quit: bool,

    // Conversation state
    pub session: ChatSession,
    /// Accumulated text of the in-flight assistant turn. Not part of the
    /// transcript until finalized.
    pub pending: String,

    // Input box state
    pub input: String,
    pub input_cursor: usize, // char position in input

    // Viewport state (updated during render)
    pub scroll: u16,
    pub follow: bool,
    pub viewport_height: u16,
    pub total_lines: u16,

    // Waiting indicator
    pub waiting: bool,
    pub animation_frame: u8,

    pub lines: LineHistory,
    pub stream: Option<StreamHandle>,
    pub client: ChatClient,
    pub theme: Theme,
    /// Root cancellation for this invocation; each bridge gets a child.
    pub cancel: CancellationToken,
}

impl App {
    pub fn new(session: ChatSession, lines: LineHistory, client: ChatClient) -> Self {
        Self {
            should_quit: false,
            session,
            pending: String::new(),
            input: String::new(),
            input_cursor: 0,
            scroll: 0,
            follow: true,
            viewport_height: 0,
            total_lines: 0,
            waiting: false,
            animation_frame: 0,
            lines,
            stream: None,
            client,
            theme: Theme::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Append one delta to the in-flight assistant turn.
    pub fn apply_delta(&mut self, text: &str) {
        self.waiting = false;
        self.pending.push_str(text);
        self.follow = true;
    }

    /// Commit the in-flight turn as a transcript message. Empty buffers and
    /// buffers already matching the last transcript entry are dropped.
    pub fn finalize_reply(&mut self) {
        self.waiting = false;
        self.stream = None;

        if self.pending.is_empty() {
            return;
        }
        if self.session.messages.last().map(|m| m.content.as_str())
            == Some(self.pending.as_str())
        {
            self.pending.clear();
            return;
        }

        let reply = std::mem::take(&mut self.pending);
        self.session.push_assistant(reply);
        self.follow = true;
    }

    /// Cancel the active bridge (if any) and request termination.
    pub fn quit(&mut self) {
        if let Some(stream) = &self.stream {
            stream.cancel();
            info!("cancelled in-flight reply on quit");
        }
        self.cancel.cancel();
        self.should_quit = true;
    }

    pub fn set_input(&mut self, content: String) {
        self.input_cursor = content.chars().count();
        self.input = content;
    }

    /// Replace the input box with the line at the navigator's new position.
    pub fn recall(&mut self, direction: i32) {
        let content = self.lines.recall(direction, &self.input);
        self.set_input(content);
    }

    // Viewport scrolling; any manual movement stops following the bottom.
    pub fn scroll_up(&mut self, amount: u16) {
        self.scroll = self.scroll.saturating_sub(amount);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let max = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = self.scroll.saturating_add(amount).min(max);
        if self.scroll == max {
            self.follow = true;
        }
    }

    /// Tick the waiting spinner (called by Tick events only).
    pub fn tick_animation(&mut self) {
        if self.waiting {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
