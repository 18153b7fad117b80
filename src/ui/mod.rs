//! UI rendering module.
//!
//! This module contains all the rendering logic for the TUI.

mod editor;
mod footer;
mod header;
mod log;
mod matrix;

use ratatui::prelude::*;

use crate::app::App;

/// Main render function - called every frame.
pub fn render(frame: &mut Frame, app: &App) {
    // Main layout: Header, Content, Query input, Footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(6),    // Matrix + Log
            Constraint::Length(6), // Query input
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    header::render(frame, app, chunks[0]);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    matrix::render(frame, app, content[0]);
    log::render(frame, app, content[1]);

    editor::render(frame, app, chunks[2]);
    footer::render(frame, app, chunks[3]);
}
