//! State management module.
//!
//! This module contains the MVU/Reducer action types and the console view
//! state, which is the terminal implementation of the core's
//! [`RenderAdapter`].

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use matriz_console::connection::ConnectionState;
use matriz_console::highlight::Token;
use matriz_console::render::{LogKind, RenderAdapter};
use matriz_console::term::Matrix;

pub mod actions;

pub use actions::*;

/// Oldest entries are dropped beyond this many.
pub const MAX_LOG_ENTRIES: usize = 500;

/// Lines moved by a log page scroll.
pub const LOG_PAGE_SIZE: usize = 10;

// =============================================================================
// Log Entries
// =============================================================================

/// One line of the console log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

// =============================================================================
// Console View State
// =============================================================================

/// Everything the console core has asked the terminal to show.
#[derive(Debug)]
pub struct ConsoleView {
    /// Classified spans of the current input.
    pub tokens: Vec<Token>,

    /// Log entries, oldest first.
    pub log: VecDeque<LogEntry>,

    /// Entries scrolled up from the newest one (0 follows new entries).
    pub log_scroll: usize,

    /// Most recently decoded matrix.
    pub matrix: Option<Matrix>,

    /// Last reported connection state.
    pub status: ConnectionState,

    /// Set whenever something visible changed.
    dirty: bool,
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            log: VecDeque::new(),
            log_scroll: 0,
            matrix: None,
            status: ConnectionState::Disconnected,
            dirty: true,
        }
    }
}

impl ConsoleView {
    /// Check if anything changed since the last call and reset the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn max_log_scroll(&self) -> usize {
        self.log.len().saturating_sub(1)
    }

    pub fn scroll_log_up(&mut self, lines: usize) {
        let scroll = (self.log_scroll + lines).min(self.max_log_scroll());
        if scroll != self.log_scroll {
            self.log_scroll = scroll;
            self.dirty = true;
        }
    }

    pub fn scroll_log_down(&mut self, lines: usize) {
        let scroll = self.log_scroll.saturating_sub(lines);
        if scroll != self.log_scroll {
            self.log_scroll = scroll;
            self.dirty = true;
        }
    }

    pub fn scroll_log_bottom(&mut self) {
        self.scroll_log_down(self.log_scroll);
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
        self.log_scroll = 0;
        self.dirty = true;
    }
}

impl RenderAdapter for ConsoleView {
    fn render_tokens(&mut self, tokens: &[Token]) {
        self.tokens = tokens.to_vec();
        self.dirty = true;
    }

    fn render_log_entry(&mut self, kind: LogKind, payload: &str) {
        self.log.push_back(LogEntry::new(kind, payload));
        if self.log.len() > MAX_LOG_ENTRIES {
            self.log.pop_front();
        } else if self.log_scroll > 0 {
            // Keep the viewport on the same entries while scrolled back
            self.log_scroll += 1;
        }
        self.log_scroll = self.log_scroll.min(self.max_log_scroll());
        self.dirty = true;
    }

    fn render_matrix(&mut self, matrix: &Matrix) {
        self.matrix = Some(matrix.clone());
        self.dirty = true;
    }

    fn render_status(&mut self, state: ConnectionState) {
        if self.status != state {
            self.status = state;
            self.dirty = true;
        }
    }
}
