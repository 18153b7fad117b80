//! Matriz Console - terminal client for a Prolog query server.
//!
//! This is the main entry point for the TUI application.
//! It loads the configuration, sets up logging and the terminal,
//! and runs the main event loop.

mod app;
mod state;
mod ui;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::panic;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matriz_console::config::Config;

use app::App;
use state::Action;

/// Global flag to track if terminal is in raw mode (for panic cleanup)
static TERMINAL_RAW: AtomicBool = AtomicBool::new(false);

/// RAII guard for terminal state management.
/// Ensures terminal is restored to normal state when dropped, even on panic or early return.
struct TerminalGuard;

impl TerminalGuard {
    /// Initialize terminal for TUI mode (raw mode, alternate screen).
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        TERMINAL_RAW.store(true, Ordering::SeqCst);

        // If execute! fails, we must restore terminal state before returning error
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            TERMINAL_RAW.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        TERMINAL_RAW.store(false, Ordering::SeqCst);
    }
}

/// Install a panic hook that restores terminal state before printing panic info.
fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Only cleanup if terminal was put in raw mode
        if TERMINAL_RAW.load(Ordering::SeqCst) {
            // Best effort cleanup - ignore errors
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            let _ = io::stdout().flush();
        }
        default_hook(panic_info);
    }));
}

/// Open the log file for appending, creating its directory if needed.
fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Route tracing output to the log file; the terminal belongs to the UI.
fn init_logging(config: &Config) {
    let (writer, open_error) = match open_log_file(&config.log_file) {
        Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), None),
        Err(e) => (BoxMakeWriter::new(io::sink), Some(e)),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "matriz=info,matriz_console=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();

    if let Some(e) = open_error {
        eprintln!("Warning: logging disabled: {:#}", e);
    }
}

/// Frame duration for ~60fps rendering
const FRAME_DURATION: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    // Install panic hook FIRST for terminal safety
    install_panic_hook();

    let config = Config::from_env().context("Invalid configuration")?;
    init_logging(&config);

    tracing::info!("Starting Matriz Console v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Query server endpoint: {}", config.endpoint);

    // WebSocket I/O runs on the runtime; the UI loop stays synchronous
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    // Setup terminal with RAII guard - ensures cleanup on any exit path
    let terminal_guard = TerminalGuard::new()?;

    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&config, runtime.handle().clone());

    // Run main loop - guard handles cleanup on success, error, or panic
    let result = run_app(&mut terminal, &mut app);

    app.shutdown();
    terminal.show_cursor()?;

    if let Err(e) = result {
        // Drop app first so the server process and socket are cleaned up
        drop(app);
        drop(terminal_guard);
        tracing::error!("Application error: {}", e);
        eprintln!("Error: {}", e);
        return Err(e);
    }

    tracing::info!("Matriz Console exited cleanly");
    Ok(())
}

/// Main application loop.
fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    app.start();

    loop {
        // Apply WebSocket events (non-blocking)
        app.poll_transport_events();

        // Fire due reconnects and watch the server process
        app.tick();

        // Check for error auto-clear
        app.maybe_clear_error();

        // Only redraw if state has changed (dirty-flag optimization)
        if app.take_needs_redraw() {
            terminal.draw(|f| ui::render(f, app))?;
        }

        // Poll for events with frame-rate limiting
        if event::poll(FRAME_DURATION)? {
            match event::read()? {
                Event::Key(key) => handle_key(app, key),
                Event::Resize(_, _) => app.mark_dirty(),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Map a key press to an action, or hand it to the query input.
///
/// While an error is shown, Esc dismisses it instead of clearing the input.
fn key_action(key: &KeyEvent, error_visible: bool) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => Some(Action::Quit),
        KeyCode::Char('l') if ctrl => Some(Action::LogClear),
        KeyCode::Enter if alt || shift => Some(Action::InsertNewline),
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Esc if error_visible => Some(Action::ErrorClear),
        KeyCode::Esc => Some(Action::ClearInput),
        KeyCode::PageUp => Some(Action::LogPageUp),
        KeyCode::PageDown => Some(Action::LogPageDown),
        KeyCode::Up if ctrl => Some(Action::LogScrollUp),
        KeyCode::Down if ctrl => Some(Action::LogScrollDown),
        KeyCode::End if ctrl => Some(Action::LogScrollBottom),
        _ => None,
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ignore release/repeat events reported by some terminals
    if key.kind != KeyEventKind::Press {
        return;
    }

    match key_action(&key, app.last_error.is_some()) {
        Some(action) => app.update(action),
        None => {
            if app.input.input(key) {
                app.on_input_change();
            }
        }
    }
}
