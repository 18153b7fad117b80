//! Header bar with connection status.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use matriz_console::connection::ConnectionState;

use crate::app::App;

/// Status light color for a connection state.
pub fn status_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Disconnected => Color::Red,
    }
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let state = app.console.status;

    let mut spans = vec![
        Span::styled(" ● ", Style::default().fg(status_color(state))),
        Span::styled(
            state.label(),
            Style::default()
                .fg(status_color(state))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            app.connection.endpoint().to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let failures = app.connection.failed_attempts();
    if state != ConnectionState::Connected && failures > 0 {
        spans.push(Span::styled(
            format!("  (failed attempts: {})", failures),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Matriz Console ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    );

    frame.render_widget(paragraph, area);
}
