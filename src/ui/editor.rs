//! Query input with live highlighting.
//!
//! The text itself lives in the app's `TextArea`; what is drawn here are the
//! classified tokens, with the terminal cursor placed from the textarea.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use unicode_truncate::UnicodeTruncateStr;

use matriz_console::highlight::Token;

use crate::app::App;

/// Split classified tokens into styled display lines at `\n`.
pub fn highlighted_lines(tokens: &[Token]) -> Vec<Line<'static>> {
    let mut lines = vec![Line::default()];
    for token in tokens {
        let style = token.kind.style();
        for (i, part) in token.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Line::default());
            }
            if !part.is_empty() {
                if let Some(line) = lines.last_mut() {
                    line.push_span(Span::styled(part.to_string(), style));
                }
            }
        }
    }
    lines
}

/// Terminal column of the `col`th character of `line`.
fn cursor_column(line: &str, col: usize) -> usize {
    let prefix: String = line.chars().take(col).collect();
    prefix.unicode_truncate(usize::MAX).1
}

/// Cursor x offset inside a viewport `width` columns wide (`width > 0`).
fn cursor_offset(line: &str, col: usize, width: u16) -> u16 {
    cursor_column(line, col).min(width as usize - 1) as u16
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Query ")
        .title_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let (row, col) = app.input.cursor();
    let height = inner.height as usize;
    let scroll = row.saturating_sub(height - 1);

    let text = if app.console.tokens.is_empty() && app.input_text().is_empty() {
        Text::from(Line::styled(
            "Type a query and press Enter",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(highlighted_lines(&app.console.tokens))
    };

    let paragraph = Paragraph::new(text).scroll((scroll as u16, 0));
    frame.render_widget(paragraph, inner);

    let line = app.input.lines().get(row).map(String::as_str).unwrap_or("");
    let x = inner.x + cursor_offset(line, col, inner.width);
    let y = inner.y + (row - scroll) as u16;
    frame.set_cursor_position((x, y));
}
