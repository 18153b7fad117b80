//! Console log viewer.

use std::ops::Range;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use matriz_console::render::LogKind;

use crate::app::App;
use crate::state::LogEntry;

/// Entries visible for a log of `total` entries scrolled `scroll` entries
/// up from the newest, in a viewport `height` lines tall.
pub fn visible_range(total: usize, scroll: usize, height: usize) -> Range<usize> {
    let end = total.saturating_sub(scroll);
    end.saturating_sub(height)..end
}

fn kind_style(kind: LogKind) -> Style {
    match kind {
        LogKind::Sent => Style::default().fg(Color::Blue),
        LogKind::Received => Style::default().fg(Color::Green),
        LogKind::System => Style::default().fg(Color::Yellow),
        LogKind::Error => Style::default().fg(Color::Red),
    }
}

fn entry_line(entry: &LogEntry) -> Line<'_> {
    Line::from(vec![
        Span::styled(
            entry.timestamp.format("[%H:%M:%S] ").to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{}{}", entry.kind.prefix(), entry.text),
            kind_style(entry.kind),
        ),
    ])
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    // Calculate visible height (area height minus 2 for borders)
    let visible_height = area.height.saturating_sub(2) as usize;

    let log = &app.console.log;
    let total = log.len();

    let lines: Vec<Line> = if log.is_empty() {
        vec![Line::styled(
            "No messages yet...",
            Style::default().fg(Color::DarkGray),
        )]
    } else {
        // Only render entries visible in the viewport
        log.range(visible_range(total, app.console.log_scroll, visible_height))
            .map(entry_line)
            .collect()
    };

    let title = if app.console.log_scroll > 0 {
        format!(" Log (+{} newer) ", app.console.log_scroll)
    } else {
        format!(" Log ({}) ", total)
    };

    let paragraph = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(paragraph, area);
}
