use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};

use crate::app::App;
use crate::stream::StreamHandle;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(
    app: &mut App,
    event: AppEvent,
    events: &UnboundedSender<AppEvent>,
) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, events)?,
        AppEvent::Resize(_, _) => {
            // Layout is recomputed from the frame area on the next draw.
        }
        AppEvent::Tick => app.tick_animation(),
        AppEvent::StreamDelta(text) => app.apply_delta(&text),
        AppEvent::StreamComplete => app.finalize_reply(),
        AppEvent::StreamError(msg) => {
            error!(%msg, "reply stream failed");
            app.quit();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, events: &UnboundedSender<AppEvent>) -> Result<()> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.quit(),
            KeyCode::Char('u') => app.scroll_up(1),
            KeyCode::Char('d') => app.scroll_down(1),
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Esc => app.quit(),
        KeyCode::Enter => submit(app, events)?,

        // Recall navigation
        KeyCode::Up => app.recall(-1),
        KeyCode::Down => app.recall(1),

        // Viewport scrolling
        KeyCode::PageUp => app.scroll_up(app.viewport_height),
        KeyCode::PageDown => app.scroll_down(app.viewport_height),

        // Input editing
        KeyCode::Char(c) => {
            let idx = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(idx, c);
            app.input_cursor += 1;
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let idx = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(idx);
            }
        }
        KeyCode::Delete => {
            if app.input_cursor < app.input.chars().count() {
                let idx = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(idx);
            }
        }
        KeyCode::Left => app.input_cursor = app.input_cursor.saturating_sub(1),
        KeyCode::Right => {
            app.input_cursor = (app.input_cursor + 1).min(app.input.chars().count());
        }
        KeyCode::Home => app.input_cursor = 0,
        KeyCode::End => app.input_cursor = app.input.chars().count(),

        _ => {}
    }
    Ok(())
}

/// Submit the current draft: record it, grow the transcript, and start a
/// bridge streaming the reply back into the event queue. Submits during an
/// active stream are rejected so only one bridge writes the buffer.
fn submit(app: &mut App, events: &UnboundedSender<AppEvent>) -> Result<()> {
    let text = app.input.trim().to_string();
    if text.is_empty() {
        return Ok(());
    }
    if app.is_streaming() {
        debug!("submit ignored while a reply is in flight");
        return Ok(());
    }

    // Durable line history first, then the transcript.
    app.lines.submit(&text)?;
    app.session.push_user(text);
    app.input.clear();
    app.input_cursor = 0;
    app.follow = true;
    app.waiting = true;
    app.animation_frame = 0;

    let client = app.client.clone();
    let model = app.session.model.clone();
    let temperature = app.session.temperature;
    let messages = app.session.messages.clone();
    let connect = async move { client.stream_chat(&model, temperature, &messages).await };

    app.stream = Some(StreamHandle::spawn(
        connect,
        events.clone(),
        app.cancel.child_token(),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatClient;
    use crate::lines::LineHistory;
    use crate::session::{ChatSession, Role};
    use tokio::sync::mpsc;

    fn scenario_app(dir: &tempfile::TempDir) -> App {
        let lines = LineHistory::open(&dir.path().join("lines.txt")).unwrap();
        let client = ChatClient::new("http://localhost:9", None);
        let session = ChatSession::new("You are a helpful AI assistant.", "test-model", 0.0);
        App::new(session, lines, client)
    }

    fn press(app: &mut App, code: KeyCode, events: &mpsc::UnboundedSender<AppEvent>) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        handle_event(app, AppEvent::Key(key), events).unwrap();
    }

    fn type_text(app: &mut App, text: &str, events: &mpsc::UnboundedSender<AppEvent>) {
        for c in text.chars() {
            press(app, KeyCode::Char(c), events);
        }
    }

    #[tokio::test]
    async fn submit_hello_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = scenario_app(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        type_text(&mut app, "hello", &tx);
        press(&mut app, KeyCode::Enter, &tx);

        let recorded = std::fs::read_to_string(dir.path().join("lines.txt")).unwrap();
        assert_eq!(recorded, "hello\n");
        assert_eq!(app.session.messages[1].role, Role::User);
        assert_eq!(app.session.messages[1].content, "hello");
        assert!(app.input.is_empty());
        assert!(app.is_streaming());

        handle_event(&mut app, AppEvent::StreamDelta("Hi".to_string()), &tx).unwrap();
        handle_event(&mut app, AppEvent::StreamDelta(" there".to_string()), &tx).unwrap();
        handle_event(&mut app, AppEvent::StreamComplete, &tx).unwrap();

        let last = app.session.messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hi there");
        assert!(!app.is_streaming());
    }

    #[tokio::test]
    async fn empty_submit_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = scenario_app(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        type_text(&mut app, "   ", &tx);
        press(&mut app, KeyCode::Enter, &tx);

        assert_eq!(app.session.messages.len(), 1);
        assert!(!app.is_streaming());
    }

    #[tokio::test]
    async fn submit_is_rejected_while_a_reply_streams() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = scenario_app(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        type_text(&mut app, "first", &tx);
        press(&mut app, KeyCode::Enter, &tx);
        assert!(app.is_streaming());

        type_text(&mut app, "second", &tx);
        press(&mut app, KeyCode::Enter, &tx);

        // The transcript holds only the first user turn; the draft stays.
        assert_eq!(app.session.messages.len(), 2);
        assert_eq!(app.input, "second");
        let recorded = std::fs::read_to_string(dir.path().join("lines.txt")).unwrap();
        assert_eq!(recorded, "first\n");
    }

    #[tokio::test]
    async fn recall_keys_replace_input_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = scenario_app(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        app.lines.submit("earlier question").unwrap();

        type_text(&mut app, "draft", &tx);
        press(&mut app, KeyCode::Up, &tx);
        assert_eq!(app.input, "earlier question");

        press(&mut app, KeyCode::Down, &tx);
        assert_eq!(app.input, "draft");
    }

    #[tokio::test]
    async fn stream_error_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = scenario_app(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        handle_event(&mut app, AppEvent::StreamError("boom".to_string()), &tx).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn quit_cancels_the_active_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = scenario_app(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        type_text(&mut app, "question", &tx);
        press(&mut app, KeyCode::Enter, &tx);

        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        handle_event(&mut app, AppEvent::Key(key), &tx).unwrap();

        assert!(app.should_quit);
        assert!(app.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn editing_keys_are_utf8_safe() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = scenario_app(&dir);
        let (tx, _rx) = mpsc::unbounded_channel();

        type_text(&mut app, "héllo", &tx);
        press(&mut app, KeyCode::Left, &tx);
        press(&mut app, KeyCode::Backspace, &tx);
        assert_eq!(app.input, "hélo");

        press(&mut app, KeyCode::Home, &tx);
        press(&mut app, KeyCode::Delete, &tx);
        assert_eq!(app.input, "élo");
    }
}
