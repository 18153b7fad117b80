//! Presentation boundary.
//!
//! The console core never draws anything itself. It reports tokens, log
//! entries, matrices and connection status through [`RenderAdapter`], which
//! the terminal UI implements.

use crate::connection::ConnectionState;
use crate::highlight::Token;
use crate::term::Matrix;

/// Category of a console log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Payload written to the server.
    Sent,
    /// Payload received from the server.
    Received,
    /// Connection lifecycle and decoder notes.
    System,
    /// Recovered failures surfaced to the user.
    Error,
}

impl LogKind {
    /// Prefix shown before the entry text.
    pub fn prefix(&self) -> &'static str {
        match self {
            LogKind::Sent => "> ",
            LogKind::Received => "< ",
            LogKind::System | LogKind::Error => "",
        }
    }
}

/// Sink for everything the console core wants shown.
pub trait RenderAdapter {
    /// Replace the highlighted input with freshly classified tokens.
    fn render_tokens(&mut self, tokens: &[Token]);

    /// Append an entry to the console log.
    fn render_log_entry(&mut self, kind: LogKind, payload: &str);

    /// Show a decoded matrix, replacing any previous one.
    fn render_matrix(&mut self, matrix: &Matrix);

    /// Report the current connection state.
    fn render_status(&mut self, state: ConnectionState);
}
