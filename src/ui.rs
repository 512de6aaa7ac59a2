use std::collections::HashMap;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::{App, InputMode};
use crate::render::{self, Row};

/// Thumbnail width in terminal cells (each cell shows two pixel rows)
const THUMB_COLS: u32 = 24;

fn user_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn assistant_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn dim_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

/// Convert **bold** and `code` spans within one line of text
fn inline_spans(text: &str) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();

                let mut bold_text = String::new();
                let mut found_close = false;
                while let Some(c) = chars.next() {
                    if c == '*' && chars.peek() == Some(&'*') {
                        chars.next();
                        found_close = true;
                        break;
                    }
                    bold_text.push(c);
                }

                if found_close && !bold_text.is_empty() {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(
                        bold_text,
                        Style::default().add_modifier(Modifier::BOLD),
                    ));
                } else {
                    // No closing **, treat as literal
                    current_text.push_str("**");
                    current_text.push_str(&bold_text);
                    if found_close {
                        current_text.push_str("**");
                    }
                }
            }
            '`' => {
                let mut code = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '`' {
                        found_close = true;
                        break;
                    }
                    code.push(c);
                }

                if found_close {
                    if !current_text.is_empty() {
                        spans.push(Span::raw(std::mem::take(&mut current_text)));
                    }
                    spans.push(Span::styled(code, Style::default().fg(Color::Green)));
                } else {
                    current_text.push('`');
                    current_text.push_str(&code);
                }
            }
            _ => current_text.push(c),
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }
    spans
}

fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        line[hashes..].strip_prefix(' ')
    } else {
        None
    }
}

/// Markdown subset for assistant replies: headings, bullets, bold, inline code
fn markdown_line(text: &str) -> Line<'static> {
    let trimmed = text.trim_start();

    if let Some(heading) = heading_text(trimmed) {
        return Line::from(Span::styled(
            heading.to_string(),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));
    }

    let bullet = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* "));
    let spans = match bullet {
        Some(rest) => {
            let mut spans = vec![Span::raw("  • ")];
            spans.extend(inline_spans(rest));
            spans
        }
        None => inline_spans(text),
    };

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Half-block rendering of an image file; `None` if it can't be read
fn load_thumbnail(path: &str) -> Option<Vec<Line<'static>>> {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(path, "cannot render image: {}", e);
            return None;
        }
    };

    let thumb = img.thumbnail(THUMB_COLS, THUMB_COLS).to_rgb8();
    let (width, height) = thumb.dimensions();

    let lines = (0..height)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..width)
                .map(|x| {
                    let top = thumb.get_pixel(x, y);
                    let bottom = if y + 1 < height { thumb.get_pixel(x, y + 1) } else { top };
                    Span::styled(
                        "▀",
                        Style::default()
                            .fg(Color::Rgb(top[0], top[1], top[2]))
                            .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    Some(lines)
}

fn sent_text_lines(text: &str) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled("You:", user_style()))];
    lines.extend(text.lines().map(|l| Line::from(l.to_string())));
    lines
}

fn received_text_lines(text: &str) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled("AI:", assistant_style()))];
    lines.extend(text.lines().map(markdown_line));
    lines
}

fn image_lines(
    thumbnails: &mut HashMap<String, Option<Vec<Line<'static>>>>,
    header: Span<'static>,
    path: Option<&str>,
    caption: Option<&str>,
) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(header)];

    let Some(path) = path else {
        lines.push(Line::from(Span::styled("[image unavailable]", dim_style())));
        return lines;
    };

    let thumbnail = thumbnails
        .entry(path.to_string())
        .or_insert_with(|| load_thumbnail(path));
    match thumbnail {
        Some(rows) => lines.extend(rows.iter().cloned()),
        None => lines.push(Line::from(Span::styled("[image unavailable]", dim_style()))),
    }

    let label = match caption {
        Some(caption) if !caption.is_empty() => format!("{} ({})", caption, path),
        _ => path.to_string(),
    };
    lines.push(Line::from(Span::styled(label, dim_style())));
    lines
}

fn typing_lines(frame: u8) -> Vec<Line<'static>> {
    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat(frame as usize + 1);
    vec![
        Line::from(Span::styled("AI:", assistant_style())),
        Line::from(Span::styled(
            format!("Typing{}", dots),
            dim_style().add_modifier(Modifier::ITALIC),
        )),
    ]
}

/// Rows the lines occupy once wrapped at `width` cells
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let total: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    total.min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, footer_area, input_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(3),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_footer(app, frame, footer_area);
    render_input(app, frame, input_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let pending = app.controller.pending();
    let mut spans = vec![
        Span::styled(" Nector AI ", Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", app.model_label), dim_style()),
    ];
    if pending > 0 {
        spans.push(Span::styled(
            format!("  [{} waiting]", pending),
            Style::default().fg(Color::Yellow),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(" Chat ");

    let snapshot = app.controller.snapshot();
    let text = if snapshot.is_empty() {
        Text::from(vec![
            Line::from(Span::styled("Say something...", dim_style())),
            Line::from(Span::styled(crate::app::HELP_TEXT, dim_style())),
        ])
    } else {
        let mut lines: Vec<Line<'static>> = Vec::new();
        for row in render::rows(&snapshot) {
            let row_lines = match row {
                Row::SentText(text) => sent_text_lines(text),
                Row::ReceivedText(text) => received_text_lines(text),
                Row::SentImage(path) => image_lines(
                    &mut app.thumbnails,
                    Span::styled("You:", user_style()),
                    path,
                    None,
                ),
                Row::ReceivedImage { path, caption } => image_lines(
                    &mut app.thumbnails,
                    Span::styled("AI:", assistant_style()),
                    path,
                    Some(caption),
                ),
                Row::Typing => typing_lines(app.animation_frame),
            };
            lines.extend(row_lines);
            lines.push(Line::default());
        }
        Text::from(lines)
    };

    app.chat_total_lines = wrapped_height(&text.lines, inner_width);
    if app.follow_bottom {
        app.scroll = app.max_scroll();
    } else {
        app.scroll = app.scroll.min(app.max_scroll());
    }

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let line = match &app.notice {
        Some(notice) => Line::from(Span::styled(
            format!(" {}", notice.text),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        None => {
            let hints = match app.input_mode {
                InputMode::Editing => " Enter send | Esc browse | PgUp/PgDn scroll | Ctrl-C quit",
                InputMode::Normal => " i type | j/k scroll | g/G top/bottom | q quit",
            };
            Line::from(Span::styled(hints, dim_style()))
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Message ");

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}
