//! Persistent connection to the query server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  TransportEvent   ┌────────────────────┐   WebSocket   ┌──────────────┐
//! │ ConnectionManager│ ◄──── channel ─── │ WsTransport (tokio)│ ◄───────────► │ query server │
//! │   (UI thread)    │ ── open/send ───► │                    │               │              │
//! └──────────────────┘                   └────────────────────┘               └──────────────┘
//! ```
//!
//! The manager owns the state machine and reconnect policy; the transport
//! only moves bytes. Inbound payloads are parsed as JSON and handed to the
//! term decoder, and everything user-visible goes through a
//! [`RenderAdapter`](crate::render::RenderAdapter).
//!
//! # Protocol
//!
//! ```text
//! client → server   {"code": "X = 1."}
//! server → client   [ <solution term>, ... ]
//! ```

mod manager;
mod protocol;
mod transport;

pub use manager::{
    ConnectionError, ConnectionManager, ConnectionState, DEFAULT_RECONNECT_DELAY,
    MAX_RECONNECT_DELAY,
};
pub use protocol::{prepare_query, QueryPayload, QUERY_TERMINATOR};
pub use transport::{
    ConnectionId, Transport, TransportError, TransportEvent, TransportEventKind, WsTransport,
};
