//! Connection lifecycle state machine.
//!
//! ```text
//!                start()                 Opened
//! Disconnected ─────────► Connecting ─────────► Connected
//!      ▲                      │                     │
//!      └──────── Closed ──────┴────── Closed ───────┘
//!                 (reconnect scheduled after a flat delay)
//! ```
//!
//! The manager is driven entirely from the UI thread: transport events are
//! fed in through [`ConnectionManager::handle_event`] and the reconnect timer
//! is a deadline checked by [`ConnectionManager::tick`]. Reconnection is
//! unbounded and the delay never grows.

use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::connection::protocol::{prepare_query, QueryPayload};
use crate::connection::transport::{
    ConnectionId, Transport, TransportError, TransportEvent, TransportEventKind,
};
use crate::render::{LogKind, RenderAdapter};
use crate::term::{extract_matrix_tagged, MATRIX_FUNCTOR};

/// Default flat delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Longest accepted reconnect delay (one day).
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Display label for the status bar.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Errors returned synchronously to callers of the manager.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A send was attempted outside the `Connected` state.
    #[error("Not connected")]
    NotConnected,

    /// The transport refused the write.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The payload could not be serialized.
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Owns the socket lifecycle and the reconnect policy.
pub struct ConnectionManager {
    endpoint: Url,
    reconnect_delay: Duration,
    matrix_functor: String,
    transport: Box<dyn Transport>,
    state: ConnectionState,
    /// Generation of the current connection; events from older ones are stale.
    connection: ConnectionId,
    reconnect_at: Option<Instant>,
    /// Consecutive closes since the last successful open.
    failed_attempts: u32,
    shut_down: bool,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state.
    pub fn new(endpoint: Url, transport: Box<dyn Transport>) -> Self {
        Self {
            endpoint,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            matrix_functor: MATRIX_FUNCTOR.to_string(),
            transport,
            state: ConnectionState::Disconnected,
            connection: 0,
            reconnect_at: None,
            failed_attempts: 0,
            shut_down: false,
        }
    }

    /// Set the flat reconnect delay, capped at [`MAX_RECONNECT_DELAY`].
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        if delay > MAX_RECONNECT_DELAY {
            warn!(
                "Reconnect delay {:?} exceeds the maximum, using {:?}",
                delay, MAX_RECONNECT_DELAY
            );
        }
        self.reconnect_delay = delay.min(MAX_RECONNECT_DELAY);
        self
    }

    /// Set the functor that tags matrix payloads.
    pub fn with_matrix_functor(mut self, functor: impl Into<String>) -> Self {
        self.matrix_functor = functor.into();
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// When the pending reconnect attempt is due, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Consecutive closes since the last successful open.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ===== Lifecycle =====

    /// Open a new connection if currently disconnected.
    pub fn start(&mut self, surface: &mut dyn RenderAdapter) {
        self.start_at(Instant::now(), surface);
    }

    /// [`start`](Self::start) with an explicit clock reading.
    pub fn start_at(&mut self, now: Instant, surface: &mut dyn RenderAdapter) {
        if self.shut_down || self.state != ConnectionState::Disconnected {
            debug!("Ignoring start() in state {:?}", self.state);
            return;
        }

        self.reconnect_at = None;
        self.connection += 1;
        self.set_state(ConnectionState::Connecting, surface);
        info!(
            "Connecting to {} (connection {}, previous failures {})",
            self.endpoint, self.connection, self.failed_attempts
        );

        if let Err(e) = self.transport.open(&self.endpoint, self.connection) {
            warn!("Failed to open transport: {}", e);
            surface.render_log_entry(LogKind::Error, &format!("Failed to connect: {}", e));
            self.on_closed(now, surface);
        }
    }

    /// Fire the reconnect attempt once its deadline has passed.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn RenderAdapter) {
        if let Some(deadline) = self.reconnect_at {
            if now >= deadline && self.state == ConnectionState::Disconnected {
                self.start_at(now, surface);
            }
        }
    }

    /// Tear down the connection for good.
    ///
    /// Cancels any pending reconnect and closes the transport. No further
    /// events are rendered, and later transport events are ignored.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        info!("Shutting down connection manager");
        self.shut_down = true;
        self.reconnect_at = None;
        self.transport.close();
        self.state = ConnectionState::Disconnected;
    }

    // ===== Transport Events =====

    /// Apply one transport event.
    pub fn handle_event(&mut self, event: TransportEvent, surface: &mut dyn RenderAdapter) {
        self.handle_event_at(event, Instant::now(), surface);
    }

    /// [`handle_event`](Self::handle_event) with an explicit clock reading.
    pub fn handle_event_at(
        &mut self,
        event: TransportEvent,
        now: Instant,
        surface: &mut dyn RenderAdapter,
    ) {
        if self.shut_down {
            return;
        }
        if event.connection != self.connection {
            debug!(
                "Ignoring stale event from connection {} (current {}): {:?}",
                event.connection, self.connection, event.kind
            );
            return;
        }

        match event.kind {
            TransportEventKind::Opened => self.on_opened(surface),
            TransportEventKind::Message(text) => self.on_message(&text, surface),
            TransportEventKind::Error(detail) => self.on_error(&detail, surface),
            TransportEventKind::Closed => self.on_closed(now, surface),
        }
    }

    fn on_opened(&mut self, surface: &mut dyn RenderAdapter) {
        if self.state != ConnectionState::Connecting {
            debug!("Unexpected open in state {:?}", self.state);
            return;
        }
        self.failed_attempts = 0;
        self.set_state(ConnectionState::Connected, surface);
        surface.render_log_entry(LogKind::System, "Connection established.");
    }

    fn on_error(&mut self, detail: &str, surface: &mut dyn RenderAdapter) {
        // State only changes on the close that may follow
        warn!("Transport error: {}", detail);
        surface.render_log_entry(
            LogKind::Error,
            &format!("A WebSocket error occurred: {}", detail),
        );
    }

    fn on_closed(&mut self, now: Instant, surface: &mut dyn RenderAdapter) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.set_state(ConnectionState::Disconnected, surface);
        // Clock readings near the end of the Instant range cannot overflow
        self.reconnect_at = Some(now.checked_add(self.reconnect_delay).unwrap_or(now));
        surface.render_log_entry(
            LogKind::System,
            &format!(
                "Connection closed. Retrying in {}...",
                format_delay(self.reconnect_delay)
            ),
        );
    }

    fn on_message(&mut self, text: &str, surface: &mut dyn RenderAdapter) {
        if self.state != ConnectionState::Connected {
            debug!("Dropping message received in state {:?}", self.state);
            return;
        }

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!("Inbound payload is not JSON: {}", e);
                surface.render_log_entry(
                    LogKind::Error,
                    &format!("Received non-JSON message: {}", text),
                );
                return;
            }
        };

        surface.render_log_entry(LogKind::Received, &value.to_string());

        let extraction = extract_matrix_tagged(&value, &self.matrix_functor);
        for diagnostic in &extraction.diagnostics {
            surface.render_log_entry(
                LogKind::Error,
                &format!("Failed to parse matrix from response: {}", diagnostic),
            );
        }
        for variable in &extraction.superseded {
            surface.render_log_entry(
                LogKind::System,
                &format!(
                    "Found matrix for variable '{}' (replaced by a later solution).",
                    variable
                ),
            );
        }
        if let Some(matrix) = &extraction.matrix {
            let variable = extraction.variable.as_deref().unwrap_or("?");
            info!(
                "Decoded {}x{} matrix for '{}'",
                matrix.row_count(),
                matrix.column_count(),
                variable
            );
            surface.render_log_entry(
                LogKind::System,
                &format!("Found matrix for variable '{}'.", variable),
            );
            surface.render_matrix(matrix);
        }
    }

    fn set_state(&mut self, state: ConnectionState, surface: &mut dyn RenderAdapter) {
        if self.state != state {
            debug!("Connection state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        surface.render_status(state);
    }

    // ===== Outbound =====

    /// Write a query payload to the server.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::NotConnected` outside the `Connected` state
    /// without touching the transport.
    pub fn send(&mut self, payload: &QueryPayload) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected);
        }
        let json = payload.to_json()?;
        self.transport.send(json)?;
        Ok(())
    }

    /// Normalize and send user input, logging what was sent.
    ///
    /// Returns `Ok(None)` for blank input, which is never sent.
    pub fn submit(
        &mut self,
        text: &str,
        surface: &mut dyn RenderAdapter,
    ) -> Result<Option<QueryPayload>, ConnectionError> {
        let Some(payload) = prepare_query(text) else {
            return Ok(None);
        };

        self.send(&payload)?;
        info!("Sent query: {}", payload.code);
        surface.render_log_entry(LogKind::Sent, &payload.to_json()?);
        Ok(Some(payload))
    }
}

/// Human-readable delay ("3s", "1.5s", "250ms").
fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 && delay.as_secs() > 0 {
        format!("{}s", delay.as_secs())
    } else if delay.as_secs() > 0 {
        format!("{:.1}s", delay.as_secs_f64())
    } else {
        format!("{}ms", delay.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::Token;
    use crate::term::Matrix;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    // Mock Transport
    #[derive(Debug, Clone, PartialEq)]
    enum TransportCall {
        Open(String, ConnectionId),
        Send(String),
        Close,
    }

    struct MockTransport {
        calls: Arc<Mutex<Vec<TransportCall>>>,
        fail_open: bool,
    }

    impl Transport for MockTransport {
        fn open(&mut self, endpoint: &Url, connection: ConnectionId) -> Result<(), TransportError> {
            if self.fail_open {
                return Err(TransportError::UnsupportedEndpoint(endpoint.to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(TransportCall::Open(endpoint.to_string(), connection));
            Ok(())
        }

        fn send(&mut self, text: String) -> Result<(), TransportError> {
            self.calls.lock().unwrap().push(TransportCall::Send(text));
            Ok(())
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().push(TransportCall::Close);
        }
    }

    // Recording surface
    #[derive(Debug, Clone, PartialEq)]
    enum Rendered {
        Tokens(usize),
        Log(LogKind, String),
        Matrix(Vec<Vec<String>>),
        Status(ConnectionState),
    }

    #[derive(Default)]
    struct RecordingSurface {
        rendered: Vec<Rendered>,
    }

    impl RecordingSurface {
        fn statuses(&self) -> Vec<ConnectionState> {
            self.rendered
                .iter()
                .filter_map(|r| match r {
                    Rendered::Status(s) => Some(*s),
                    _ => None,
                })
                .collect()
        }

        fn logs(&self, kind: LogKind) -> Vec<String> {
            self.rendered
                .iter()
                .filter_map(|r| match r {
                    Rendered::Log(k, text) if *k == kind => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        fn matrices(&self) -> Vec<Vec<Vec<String>>> {
            self.rendered
                .iter()
                .filter_map(|r| match r {
                    Rendered::Matrix(rows) => Some(rows.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl RenderAdapter for RecordingSurface {
        fn render_tokens(&mut self, tokens: &[Token]) {
            self.rendered.push(Rendered::Tokens(tokens.len()));
        }

        fn render_log_entry(&mut self, kind: LogKind, payload: &str) {
            self.rendered.push(Rendered::Log(kind, payload.to_string()));
        }

        fn render_matrix(&mut self, matrix: &Matrix) {
            self.rendered.push(Rendered::Matrix(matrix.rows().to_vec()));
        }

        fn render_status(&mut self, state: ConnectionState) {
            self.rendered.push(Rendered::Status(state));
        }
    }

    const ENDPOINT: &str = "ws://localhost:4000/ws";

    fn manager_with(fail_open: bool) -> (ConnectionManager, Arc<Mutex<Vec<TransportCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let transport = MockTransport {
            calls: Arc::clone(&calls),
            fail_open,
        };
        let manager = ConnectionManager::new(Url::parse(ENDPOINT).unwrap(), Box::new(transport));
        (manager, calls)
    }

    fn event(connection: ConnectionId, kind: TransportEventKind) -> TransportEvent {
        TransportEvent::new(connection, kind)
    }

    fn connected() -> (
        ConnectionManager,
        Arc<Mutex<Vec<TransportCall>>>,
        RecordingSurface,
        Instant,
    ) {
        let (mut manager, calls) = manager_with(false);
        let mut surface = RecordingSurface::default();
        let now = Instant::now();
        manager.start_at(now, &mut surface);
        manager.handle_event_at(event(1, TransportEventKind::Opened), now, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connected);
        (manager, calls, surface, now)
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let (manager, calls) = manager_with(false);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_deadline(), None);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_start_opens_transport_and_connects() {
        let (mut manager, calls) = manager_with(false);
        let mut surface = RecordingSurface::default();
        let now = Instant::now();

        manager.start_at(now, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![TransportCall::Open(ENDPOINT.to_string(), 1)]
        );

        manager.handle_event_at(event(1, TransportEventKind::Opened), now, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(
            surface.statuses(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert_eq!(
            surface.logs(LogKind::System),
            vec!["Connection established.".to_string()]
        );
    }

    #[test]
    fn test_start_is_noop_unless_disconnected() {
        let (mut manager, calls, mut surface, now) = connected();
        manager.start_at(now, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_close_schedules_exactly_one_reconnect() {
        let (mut manager, calls, mut surface, now) = connected();

        manager.handle_event_at(event(1, TransportEventKind::Closed), now, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            manager.reconnect_deadline(),
            Some(now + Duration::from_secs(3))
        );
        assert_eq!(
            surface.logs(LogKind::System).last().map(String::as_str),
            Some("Connection closed. Retrying in 3s...")
        );

        // A duplicate close does not reschedule
        let later = now + Duration::from_secs(1);
        manager.handle_event_at(event(1, TransportEventKind::Closed), later, &mut surface);
        assert_eq!(
            manager.reconnect_deadline(),
            Some(now + Duration::from_secs(3))
        );

        // Before the deadline nothing happens
        manager.tick(now + Duration::from_millis(2999), &mut surface);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(calls.lock().unwrap().len(), 1);

        // At the deadline a single new connection is opened
        manager.tick(now + Duration::from_secs(3), &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.reconnect_deadline(), None);
        assert_eq!(
            calls.lock().unwrap().last(),
            Some(&TransportCall::Open(ENDPOINT.to_string(), 2))
        );

        manager.tick(now + Duration::from_secs(10), &mut surface);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_connect_retries_with_flat_delay() {
        let (manager, _calls) = manager_with(false);
        let manager_delay = Duration::from_millis(500);
        let mut manager = manager.with_reconnect_delay(manager_delay);
        let mut surface = RecordingSurface::default();
        let mut now = Instant::now();

        for attempt in 1..=4u64 {
            manager.start_at(now, &mut surface);
            manager.handle_event_at(
                event(attempt, TransportEventKind::Error("refused".to_string())),
                now,
                &mut surface,
            );
            // Errors alone never change state
            assert_eq!(manager.state(), ConnectionState::Connecting);

            manager.handle_event_at(event(attempt, TransportEventKind::Closed), now, &mut surface);
            assert_eq!(manager.state(), ConnectionState::Disconnected);
            assert_eq!(manager.reconnect_deadline(), Some(now + manager_delay));
            assert_eq!(manager.failed_attempts(), attempt as u32);
            now += manager_delay;
        }

        manager.start_at(now, &mut surface);
        manager.handle_event_at(event(5, TransportEventKind::Opened), now, &mut surface);
        assert_eq!(manager.failed_attempts(), 0);
        assert_eq!(surface.logs(LogKind::Error).len(), 4);
    }

    #[test]
    fn test_open_failure_is_treated_as_close() {
        let (mut manager, _calls) = manager_with(true);
        let mut surface = RecordingSurface::default();
        let now = Instant::now();

        manager.start_at(now, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            manager.reconnect_deadline(),
            Some(now + DEFAULT_RECONNECT_DELAY)
        );
        assert_eq!(
            surface.statuses(),
            vec![ConnectionState::Connecting, ConnectionState::Disconnected]
        );
        assert_eq!(surface.logs(LogKind::Error).len(), 1);
    }

    #[test]
    fn test_send_while_disconnected_is_rejected() {
        let (mut manager, calls) = manager_with(false);
        let payload = prepare_query("X = 1").unwrap();

        let result = manager.send(&payload);
        assert!(matches!(result, Err(ConnectionError::NotConnected)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_while_connecting_is_rejected() {
        let (mut manager, calls) = manager_with(false);
        let mut surface = RecordingSurface::default();
        manager.start(&mut surface);

        let result = manager.submit("X = 1", &mut surface);
        assert!(matches!(result, Err(ConnectionError::NotConnected)));
        assert!(!calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, TransportCall::Send(_))));
        assert!(surface.logs(LogKind::Sent).is_empty());
    }

    #[test]
    fn test_submit_writes_payload_and_logs_it() {
        let (mut manager, calls, mut surface, _now) = connected();

        let payload = manager.submit("X = 1", &mut surface).unwrap();
        assert_eq!(payload.map(|p| p.code).as_deref(), Some("X = 1."));
        assert_eq!(
            calls.lock().unwrap().last(),
            Some(&TransportCall::Send(r#"{"code":"X = 1."}"#.to_string()))
        );
        assert_eq!(
            surface.logs(LogKind::Sent),
            vec![r#"{"code":"X = 1."}"#.to_string()]
        );
    }

    #[test]
    fn test_submit_blank_input_sends_nothing() {
        let (mut manager, calls, mut surface, _now) = connected();
        assert!(manager.submit("   ", &mut surface).unwrap().is_none());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_matrix_message_is_rendered() {
        let (mut manager, _calls, mut surface, now) = connected();
        let message = r#"[{"functor":"=","args":["M",{"functor":"matriz","args":[2,[[1,2],[3,4]]]}]}]"#;

        manager.handle_event_at(
            event(1, TransportEventKind::Message(message.to_string())),
            now,
            &mut surface,
        );

        assert_eq!(surface.logs(LogKind::Received).len(), 1);
        assert!(surface
            .logs(LogKind::System)
            .contains(&"Found matrix for variable 'M'.".to_string()));
        assert_eq!(
            surface.matrices(),
            vec![vec![
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "4".to_string()],
            ]]
        );
    }

    #[test]
    fn test_non_json_message_is_reported_and_connection_kept() {
        let (mut manager, _calls, mut surface, now) = connected();

        manager.handle_event_at(
            event(1, TransportEventKind::Message("hello there".to_string())),
            now,
            &mut surface,
        );

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(
            surface.logs(LogKind::Error),
            vec!["Received non-JSON message: hello there".to_string()]
        );
        assert!(surface.logs(LogKind::Received).is_empty());
    }

    #[test]
    fn test_non_array_json_is_a_decode_diagnostic() {
        let (mut manager, _calls, mut surface, now) = connected();

        manager.handle_event_at(
            event(1, TransportEventKind::Message(r#"{"error":"syntax"}"#.to_string())),
            now,
            &mut surface,
        );

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(surface.logs(LogKind::Received).len(), 1);
        assert_eq!(surface.logs(LogKind::Error).len(), 1);
        assert!(surface.matrices().is_empty());
    }

    #[test]
    fn test_custom_matrix_functor() {
        let (manager, _calls, mut surface, now) = connected();
        let mut manager = manager.with_matrix_functor("grid");
        let message = r#"[{"functor":"=","args":["G",{"functor":"grid","args":[0,[["a"]]]}]}]"#;

        manager.handle_event_at(
            event(1, TransportEventKind::Message(message.to_string())),
            now,
            &mut surface,
        );
        assert_eq!(surface.matrices(), vec![vec![vec!["a".to_string()]]]);
    }

    #[test]
    fn test_stale_events_are_ignored() {
        let (mut manager, _calls, mut surface, now) = connected();
        manager.handle_event_at(event(1, TransportEventKind::Closed), now, &mut surface);

        let later = now + Duration::from_secs(3);
        manager.tick(later, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connecting);

        // A late close from the first connection must not knock out the second
        manager.handle_event_at(event(1, TransportEventKind::Closed), later, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.reconnect_deadline(), None);

        manager.handle_event_at(event(2, TransportEventKind::Opened), later, &mut surface);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_messages_outside_connected_are_dropped() {
        let (mut manager, _calls) = manager_with(false);
        let mut surface = RecordingSurface::default();
        let now = Instant::now();
        manager.start_at(now, &mut surface);

        manager.handle_event_at(
            event(1, TransportEventKind::Message("[]".to_string())),
            now,
            &mut surface,
        );
        assert!(surface.logs(LogKind::Received).is_empty());
    }

    #[test]
    fn test_shutdown_cancels_reconnect_and_silences_events() {
        let (mut manager, calls, mut surface, now) = connected();
        manager.handle_event_at(event(1, TransportEventKind::Closed), now, &mut surface);
        assert!(manager.reconnect_deadline().is_some());

        manager.shutdown();
        assert!(manager.is_shut_down());
        assert_eq!(manager.reconnect_deadline(), None);
        assert_eq!(calls.lock().unwrap().last(), Some(&TransportCall::Close));

        let rendered_before = surface.rendered.len();
        manager.tick(now + Duration::from_secs(60), &mut surface);
        manager.handle_event_at(event(1, TransportEventKind::Opened), now, &mut surface);
        manager.start_at(now, &mut surface);
        assert_eq!(surface.rendered.len(), rendered_before);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_superseded_matrices_are_logged() {
        let (mut manager, _calls, mut surface, now) = connected();
        let message = r#"[
            {"functor":"=","args":["A",{"functor":"matriz","args":[1,[[1]]]}]},
            {"functor":"=","args":["B",{"functor":"matriz","args":[1,[[2]]]}]}
        ]"#;

        manager.handle_event_at(
            event(1, TransportEventKind::Message(message.to_string())),
            now,
            &mut surface,
        );

        assert_eq!(
            surface.logs(LogKind::System)[1..].to_vec(),
            vec![
                "Found matrix for variable 'A' (replaced by a later solution).".to_string(),
                "Found matrix for variable 'B'.".to_string(),
            ]
        );
        assert_eq!(surface.matrices(), vec![vec![vec!["2".to_string()]]]);
    }

    #[test]
    fn test_huge_reconnect_delay_does_not_overflow() {
        let (manager, _calls) = manager_with(false);
        let mut manager = manager.with_reconnect_delay(Duration::MAX);
        assert_eq!(manager.reconnect_delay(), MAX_RECONNECT_DELAY);

        let mut surface = RecordingSurface::default();
        let now = Instant::now();
        manager.start_at(now, &mut surface);
        manager.handle_event_at(event(1, TransportEventKind::Closed), now, &mut surface);

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_deadline(), Some(now + MAX_RECONNECT_DELAY));
        assert!(surface
            .logs(LogKind::System)
            .contains(&"Connection closed. Retrying in 86400s...".to_string()));
    }

    #[test]
    fn test_format_delay() {
        assert_eq!(format_delay(Duration::from_secs(3)), "3s");
        assert_eq!(format_delay(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_delay(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn test_connection_error_display() {
        assert_eq!(ConnectionError::NotConnected.to_string(), "Not connected");
        let err: ConnectionError = TransportError::NotOpen.into();
        assert_eq!(err.to_string(), "Transport error: No open connection");
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ConnectionState::Disconnected.label(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.label(), "Connecting");
        assert_eq!(ConnectionState::Connected.label(), "Connected");
    }
}
