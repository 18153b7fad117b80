//! Footer bar with keybindings.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::App;

const KEYBINDINGS: &[(&str, &str)] = &[
    ("Enter/Ctrl+Enter", "Send"),
    ("Alt+Enter", "Newline"),
    ("Esc", "Clear"),
    ("PgUp/Dn", "Scroll Log"),
    ("Ctrl+L", "Clear Log"),
    ("Ctrl+Q", "Quit"),
];

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.last_error {
        Some(error) => Line::from(vec![
            Span::styled(
                " Error ",
                Style::default().bg(Color::Red).fg(Color::White),
            ),
            Span::styled(format!(" {}", error), Style::default().fg(Color::Red)),
        ]),
        None => Line::from(
            KEYBINDINGS
                .iter()
                .flat_map(|(key, action)| {
                    vec![
                        Span::styled(
                            format!(" {} ", key),
                            Style::default().bg(Color::DarkGray).fg(Color::White),
                        ),
                        Span::raw(format!(" {} ", action)),
                        Span::raw(" "),
                    ]
                })
                .collect::<Vec<Span>>(),
        ),
    };

    let paragraph = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);

    frame.render_widget(paragraph, area);
}
