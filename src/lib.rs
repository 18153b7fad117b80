//! Matriz Console Library
//!
//! This library provides the core components of the query console:
//!
//! - `highlight` - Live syntax classification of query text
//! - `term` - Term-tree decoding of server responses into matrices
//! - `connection` - WebSocket connection manager with automatic reconnect
//! - `render` - The presentation boundary the core reports through
//! - `config` - Environment-driven settings
//! - `server` - Optional supervisor for a locally spawned query server
//!
//! # Example
//!
//! ```ignore
//! use matriz_console::connection::{ConnectionManager, WsTransport};
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let transport = WsTransport::new(runtime.handle().clone(), tx);
//! let mut manager = ConnectionManager::new(config.endpoint.clone(), Box::new(transport));
//! manager.start(&mut surface);
//! while let Ok(event) = rx.try_recv() {
//!     manager.handle_event(event, &mut surface);
//! }
//! ```

pub mod config;
pub mod connection;
pub mod highlight;
pub mod render;
pub mod server;
pub mod term;
