use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, List, ListItem, Paragraph},
    Frame,
};

use crate::app::App;
use crate::browser::{Browser, Focus};
use crate::session::{Message, Role};

/// Styling for every rendered element, passed explicitly into the render
/// functions instead of living in module-level statics.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub user_label: Style,
    pub assistant_label: Style,
    pub prompt: Style,
    pub hint: Style,
    pub border: Style,
    pub border_focused: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            user_label: Style::default().fg(Color::White).bold(),
            assistant_label: Style::default().fg(Color::Cyan).bold(),
            prompt: Style::default().fg(Color::Magenta),
            hint: Style::default().fg(Color::DarkGray),
            border: Style::default().fg(Color::DarkGray),
            border_focused: Style::default().fg(Color::Cyan),
        }
    }
}

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' {
            // Check for ** (bold)
            if chars.peek().map(|(_, c)| *c) == Some('*') {
                // Consume the second *
                chars.next();

                // Push any accumulated plain text
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }

                // Find closing **
                let mut bold_text = String::new();
                let mut found_close = false;

                while let Some((_, c)) = chars.next() {
                    if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
                        chars.next(); // consume second *
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                }
            } else {
                // Single * - could be italic, but for now treat as literal
                current_text.push(c);
            }
        } else {
            current_text.push(c);
        }
    }

    // Push any remaining text
    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Word-wrap one logical line to `width` columns, hard-splitting words that
/// are longer than a full line.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let len = word.len();
            if len == 0 {
                break;
            }
            let sep = usize::from(count > 0);
            if count + sep + len <= width {
                if sep == 1 {
                    current.push(' ');
                }
                current.extend(word.iter());
                count += sep + len;
                break;
            }
            if len > width {
                if count > 0 {
                    lines.push(std::mem::take(&mut current));
                    count = 0;
                }
                lines.push(word[..width].iter().collect());
                word = word[width..].to_vec();
                continue;
            }
            lines.push(std::mem::take(&mut current));
            count = 0;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Render one message as label-prefixed, wrapped, markdown-styled lines.
/// Continuation lines are indented under the label.
fn message_lines(label: &str, style: Style, content: &str, width: usize) -> Vec<Line<'static>> {
    let label_width = label.chars().count();
    let wrap_width = width.saturating_sub(label_width).max(1);
    let content = content.trim().replace('\t', "  ");

    let mut out = Vec::new();
    for logical in content.split('\n') {
        for piece in wrap_text(logical, wrap_width) {
            let parsed = parse_markdown_line(&piece);
            let mut spans = Vec::with_capacity(parsed.spans.len() + 1);
            if out.is_empty() {
                spans.push(Span::styled(label.to_string(), style));
            } else {
                spans.push(Span::raw(" ".repeat(label_width)));
            }
            spans.extend(parsed.spans);
            out.push(Line::from(spans));
        }
    }
    out
}

/// Build the transcript view. Pure: identical inputs produce identical
/// output. The system prompt is never shown; a non-empty stream buffer is
/// shown as a provisional assistant turn unless the transcript already ends
/// with the same content.
pub fn transcript_text(
    messages: &[Message],
    pending: &str,
    width: u16,
    theme: &Theme,
) -> Text<'static> {
    let width = (width as usize).max(10);
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in messages.iter().skip(1) {
        let (label, style) = match msg.role {
            Role::User => ("You: ", theme.user_label),
            Role::Assistant => ("Assistant: ", theme.assistant_label),
            Role::System => continue,
        };
        lines.extend(message_lines(label, style, &msg.content, width));
        lines.push(Line::default());
    }

    if !pending.is_empty() && messages.last().map(|m| m.content.as_str()) != Some(pending) {
        lines.extend(message_lines(
            "Assistant: ",
            theme.assistant_label,
            pending,
            width,
        ));
        lines.push(Line::default());
    }

    Text::from(lines)
}

pub fn render_chat(app: &mut App, frame: &mut Frame) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(frame.area());

    let chat_block = Block::bordered()
        .title(format!(" {} ", app.session.model))
        .border_style(app.theme.border);
    let inner = chat_block.inner(chat_area);

    let theme = app.theme;
    let mut text = transcript_text(&app.session.messages, &app.pending, inner.width, &theme);
    if app.waiting {
        let dots = ".".repeat(app.animation_frame as usize + 1);
        text.lines.push(Line::from(Span::styled(
            format!("Assistant: thinking{}", dots),
            theme.hint,
        )));
    }

    app.total_lines = text.lines.len() as u16;
    app.viewport_height = inner.height;
    let max_scroll = app.total_lines.saturating_sub(app.viewport_height);
    if app.follow {
        app.scroll = max_scroll;
    } else {
        app.scroll = app.scroll.min(max_scroll);
    }

    frame.render_widget(
        Paragraph::new(text)
            .block(chat_block)
            .scroll((app.scroll, 0)),
        chat_area,
    );

    // Input box with a visible cursor, scrolled so the cursor stays in view
    let input_block = Block::bordered().title(" Message ").border_style(theme.border);
    let input_inner = input_block.inner(input_area);
    let offset = input_offset(app.input_cursor as u16, input_inner.width);
    frame.render_widget(
        Paragraph::new(app.input.as_str())
            .scroll((0, offset))
            .block(input_block),
        input_area,
    );
    frame.set_cursor_position((
        input_inner.x + (app.input_cursor as u16).saturating_sub(offset),
        input_inner.y,
    ));
}

/// Columns to shift the input left so the cursor column stays inside a box
/// `width` columns wide.
fn input_offset(cursor: u16, width: u16) -> u16 {
    cursor.saturating_sub(width.saturating_sub(1))
}

pub fn render_browser(browser: &mut Browser, frame: &mut Frame, theme: &Theme) {
    let [list_area, preview_area] =
        Layout::horizontal([Constraint::Length(40), Constraint::Min(1)]).areas(frame.area());

    let list_border = if browser.focus == Focus::List {
        theme.border_focused
    } else {
        theme.border
    };
    let items: Vec<ListItem> = browser
        .records
        .iter()
        .map(|record| {
            let prompt = record
                .session
                .messages
                .first()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            ListItem::new(vec![
                Line::from(record.filename.clone()),
                Line::from(Span::styled(prompt, theme.hint)),
            ])
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::bordered()
                .title(" Chat History ")
                .border_style(list_border),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, list_area, &mut browser.state);

    let preview_border = if browser.focus == Focus::Preview {
        theme.border_focused
    } else {
        theme.border
    };
    let preview_block = Block::bordered()
        .title(match browser.selected() {
            Some(record) => format!(" {} ", record.filename),
            None => " Preview ".to_string(),
        })
        .border_style(preview_border);
    let inner = preview_block.inner(preview_area);

    let text = match browser.selected() {
        Some(record) => {
            let mut lines = Vec::new();
            if let Some(prompt) = record.session.messages.first() {
                lines.push(Line::from(Span::styled(prompt.content.clone(), theme.prompt)));
                lines.push(Line::default());
            }
            lines.extend(transcript_text(&record.session.messages, "", inner.width, theme).lines);
            Text::from(lines)
        }
        None => Text::default(),
    };

    browser.preview_lines = text.lines.len() as u16;
    browser.preview_height = inner.height;
    let max_scroll = browser.preview_lines.saturating_sub(browser.preview_height);
    browser.preview_scroll = browser.preview_scroll.min(max_scroll);

    frame.render_widget(
        Paragraph::new(text)
            .block(preview_block)
            .scroll((browser.preview_scroll, 0)),
        preview_area,
    );
}
