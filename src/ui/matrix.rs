//! Matrix view.

use std::borrow::Cow;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use unicode_truncate::{Alignment as CellAlignment, UnicodeTruncateStr};

use matriz_console::term::Matrix;

use crate::app::App;

/// Cells wider than this are cut and end in `…`.
pub const MAX_CELL_WIDTH: usize = 12;

/// Fit a cell into `MAX_CELL_WIDTH` columns.
fn clamp_cell(cell: &str) -> Cow<'_, str> {
    let (fit, _) = cell.unicode_truncate(MAX_CELL_WIDTH);
    if fit.len() == cell.len() {
        Cow::Borrowed(cell)
    } else {
        let (head, _) = cell.unicode_truncate(MAX_CELL_WIDTH - 1);
        Cow::Owned(format!("{}…", head))
    }
}

fn display_width(text: &str) -> usize {
    text.unicode_truncate(usize::MAX).1
}

/// Lay out a matrix as bracketed text rows with right-aligned columns.
pub fn matrix_lines(matrix: &Matrix) -> Vec<String> {
    if matrix.is_empty() {
        return vec!["[ ]".to_string()];
    }

    let cells: Vec<Vec<Cow<str>>> = matrix
        .rows()
        .iter()
        .map(|row| row.iter().map(|cell| clamp_cell(cell)).collect())
        .collect();

    let mut widths = vec![0; matrix.column_count()];
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let last = cells.len() - 1;
    cells
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let (open, close) = match i {
                _ if last == 0 => ('[', ']'),
                0 => ('┌', '┐'),
                i if i == last => ('└', '┘'),
                _ => ('│', '│'),
            };
            let body = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| cell.unicode_pad(*width, CellAlignment::Right, true))
                .collect::<Vec<_>>()
                .join("  ");
            format!("{} {} {}", open, body, close)
        })
        .collect()
}

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let (title, lines): (String, Vec<Line>) = match &app.console.matrix {
        Some(matrix) => (
            format!(
                " Matrix ({}×{}) ",
                matrix.row_count(),
                matrix.column_count()
            ),
            matrix_lines(matrix)
                .into_iter()
                .map(|line| Line::styled(line, Style::default().fg(Color::White)))
                .collect(),
        ),
        None => (
            " Matrix ".to_string(),
            vec![Line::styled(
                "No matrix received yet...",
                Style::default().fg(Color::DarkGray),
            )],
        ),
    };

    let paragraph = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(paragraph, area);
}
