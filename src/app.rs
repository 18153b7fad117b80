//! Application state management.
//!
//! This module contains the central `App` struct that ties the query input,
//! the console view and the connection manager together.

use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

use tracing::{debug, error, info, warn};
use tui_textarea::TextArea;

use matriz_console::config::Config;
use matriz_console::connection::{
    ConnectionError, ConnectionManager, Transport, TransportEvent, WsTransport,
};
use matriz_console::highlight::classify;
use matriz_console::render::{LogKind, RenderAdapter};
use matriz_console::server::ServerProcess;

pub use crate::state::{Action, ConsoleView, LOG_PAGE_SIZE};

/// Main application state.
pub struct App<'a> {
    /// Flag to exit the application.
    pub should_quit: bool,

    /// Last non-fatal error message (displayed in status bar, auto-clears).
    pub last_error: Option<String>,

    /// Timestamp when last_error was set (for auto-clear after 5 seconds).
    last_error_time: Option<Instant>,

    /// Dirty flag - set when UI needs to be redrawn.
    /// Resets to false after each draw.
    needs_redraw: bool,

    /// Editable query text.
    pub input: TextArea<'a>,

    /// Everything the core has reported for display.
    pub console: ConsoleView,

    /// Query server connection.
    pub connection: ConnectionManager,

    /// Transport events from the WebSocket worker.
    transport_events: Receiver<TransportEvent>,

    /// Command used to start the query server, if the console owns it.
    server_command: Option<String>,

    /// Locally spawned query server.
    server: Option<ServerProcess>,
}

impl<'a> App<'a> {
    /// Create the application with a WebSocket transport on `runtime`.
    pub fn new(config: &Config, runtime: tokio::runtime::Handle) -> Self {
        let (tx, rx) = mpsc::channel();
        let transport = WsTransport::new(runtime, tx);
        Self::with_transport(config, Box::new(transport), rx)
    }

    /// Create the application with an injected transport (dependency injection for testing).
    pub fn with_transport(
        config: &Config,
        transport: Box<dyn Transport>,
        transport_events: Receiver<TransportEvent>,
    ) -> Self {
        let connection = ConnectionManager::new(config.endpoint.clone(), transport)
            .with_reconnect_delay(config.reconnect_delay)
            .with_matrix_functor(config.matrix_functor.clone());

        let mut app = Self {
            should_quit: false,
            last_error: None,
            last_error_time: None,
            needs_redraw: true,
            input: new_input(),
            console: ConsoleView::default(),
            connection,
            transport_events,
            server_command: config.server_command.clone(),
            server: None,
        };
        app.on_input_change();
        app
    }

    /// Spawn the configured server (if any) and open the first connection.
    pub fn start(&mut self) {
        if let Some(command) = self.server_command.clone() {
            match ServerProcess::spawn(&command) {
                Ok(server) => {
                    self.console.render_log_entry(
                        LogKind::System,
                        &format!("Started query server (pid {}).", server.id()),
                    );
                    self.server = Some(server);
                }
                Err(e) => {
                    error!("Failed to start query server: {:#}", e);
                    self.console.render_log_entry(
                        LogKind::Error,
                        &format!("Failed to start query server: {:#}", e),
                    );
                    self.set_error(format!("Failed to start query server: {}", e));
                }
            }
        }

        info!("Connecting to {}", self.connection.endpoint());
        self.connection.start(&mut self.console);
        self.mark_dirty();
    }

    // ===== Query Input =====

    /// Current input text, lines joined with `\n`.
    pub fn input_text(&self) -> String {
        self.input.lines().join("\n")
    }

    /// Reclassify the input after every edit.
    pub fn on_input_change(&mut self) {
        let tokens = classify(&self.input_text());
        self.console.render_tokens(&tokens);
        self.mark_dirty();
    }

    fn clear_input(&mut self) {
        self.input = new_input();
        self.on_input_change();
    }

    fn insert_newline(&mut self) {
        self.input.insert_newline();
        self.on_input_change();
    }

    /// Send the current input. The input is kept when nothing was sent.
    pub fn submit_query(&mut self) {
        let text = self.input_text();
        match self.connection.submit(&text, &mut self.console) {
            Ok(Some(_)) => self.clear_input(),
            Ok(None) => debug!("Ignoring blank query"),
            Err(ConnectionError::NotConnected) => {
                warn!("Query not sent: not connected");
                self.console.render_log_entry(
                    LogKind::Error,
                    "Cannot send command. WebSocket not connected.",
                );
            }
            Err(e) => {
                error!("Failed to send query: {}", e);
                self.console
                    .render_log_entry(LogKind::Error, &format!("Failed to send query: {}", e));
                self.set_error(format!("Failed to send query: {}", e));
            }
        }
        self.mark_dirty();
    }

    // ===== Event Polling =====

    /// Drain pending transport events into the connection manager.
    pub fn poll_transport_events(&mut self) {
        while let Ok(event) = self.transport_events.try_recv() {
            self.connection.handle_event(event, &mut self.console);
        }
    }

    /// Fire due reconnects and watch the server process.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.connection.tick(now, &mut self.console);

        if let Some(server) = self.server.as_mut() {
            if let Some(status) = server.poll_exit() {
                let entry = format!("Query server '{}' exited ({}).", server.command(), status);
                self.console.render_log_entry(LogKind::System, &entry);
            }
        }
    }

    // ===== Redraw Tracking =====

    /// Mark the UI as needing a redraw.
    pub fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    /// Check if redraw is needed and reset the flag.
    pub fn take_needs_redraw(&mut self) -> bool {
        let console_dirty = self.console.take_dirty();
        std::mem::take(&mut self.needs_redraw) || console_dirty
    }

    // ===== Error Handling =====

    /// Set a non-fatal error to display in the UI.
    /// Errors auto-clear after 5 seconds.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.last_error_time = Some(Instant::now());
        self.mark_dirty();
    }

    /// Clear the current error.
    pub fn clear_error(&mut self) {
        if self.last_error.is_some() {
            self.last_error = None;
            self.last_error_time = None;
            self.mark_dirty();
        }
    }

    /// Clear error if it has been displayed for more than 5 seconds.
    pub fn maybe_clear_error(&mut self) {
        const ERROR_DISPLAY_DURATION: std::time::Duration = std::time::Duration::from_secs(5);

        if let Some(error_time) = self.last_error_time {
            if error_time.elapsed() > ERROR_DISPLAY_DURATION {
                self.clear_error();
            }
        }
    }

    // ===== MVU/Reducer: Centralized State Update =====

    /// Process an action and update application state.
    pub fn update(&mut self, action: Action) {
        match action {
            // Query Input
            Action::Submit => self.submit_query(),
            Action::InsertNewline => self.insert_newline(),
            Action::ClearInput => self.clear_input(),

            // Log
            Action::LogScrollUp => self.console.scroll_log_up(1),
            Action::LogScrollDown => self.console.scroll_log_down(1),
            Action::LogPageUp => self.console.scroll_log_up(LOG_PAGE_SIZE),
            Action::LogPageDown => self.console.scroll_log_down(LOG_PAGE_SIZE),
            Action::LogScrollBottom => self.console.scroll_log_bottom(),
            Action::LogClear => self.console.clear_log(),

            // General
            Action::ErrorClear => self.clear_error(),
            Action::Quit => self.should_quit = true,
        }
    }

    /// Stop reconnecting, close the socket and stop the server.
    pub fn shutdown(&mut self) {
        self.connection.shutdown();
        if self.server.take().is_some() {
            info!("Query server stopped");
        }
    }
}

// Only the textarea's editing state is used; the UI draws the highlighted tokens.
fn new_input<'a>() -> TextArea<'a> {
    TextArea::default()
}
