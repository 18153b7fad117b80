//! Query wire format.
//!
//! Queries travel to the server as a single JSON object:
//!
//! ```text
//! {"code": "X = 1."}
//! ```

use serde::Serialize;

/// Character that terminates every query sent to the server.
pub const QUERY_TERMINATOR: char = '.';

/// Outbound query payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPayload {
    pub code: String,
}

impl QueryPayload {
    /// Serialize to the compact JSON text sent over the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Normalize user input into a query payload.
///
/// Surrounding whitespace is trimmed and the terminator is appended when
/// missing. Returns `None` for blank input, which must not be sent.
pub fn prepare_query(text: &str) -> Option<QueryPayload> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut code = trimmed.to_string();
    if !code.ends_with(QUERY_TERMINATOR) {
        code.push(QUERY_TERMINATOR);
    }
    Some(QueryPayload { code })
}
