//! Supervisor for a locally spawned query server.
//!
//! The console can optionally start the query server itself. The process is
//! owned by [`ServerProcess`]; its stdout/stderr are forwarded line by line
//! to the tracing log from background reader threads, and the process is
//! killed when the supervisor is dropped.
//!
//! The connection manager knows nothing about this process. It only sees
//! the endpoint, which may stay unreachable until the server is up.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Which output stream a forwarded line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// A running query server process.
///
/// # Process Cleanup Safety
/// The child is killed and reaped on drop, so quitting the console never
/// leaves an orphaned server behind.
pub struct ServerProcess {
    child: Child,
    command: String,
    exit_status: Option<ExitStatus>,
}

impl ServerProcess {
    /// Spawn `command` (program followed by whitespace-separated arguments).
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty or the process cannot be started.
    pub fn spawn(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next().context("Server command is empty")?;

        info!("Starting query server: {}", command);

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn query server '{}'", command))?;

        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || forward_output(stdout, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || forward_output(stderr, OutputStream::Stderr));
        }

        info!("Query server started (pid {})", child.id());

        Ok(Self {
            child,
            command: command.to_string(),
            exit_status: None,
        })
    }

    /// OS process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Check whether the process has exited (non-blocking).
    ///
    /// Returns the exit status the first time an exit is observed and
    /// `None` on every other call.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.exit_status.is_some() {
            return None;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                info!("Query server exited with {}", status);
                self.exit_status = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to poll query server status: {}", e);
                None
            }
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if self.exit_status.is_some() {
            return;
        }

        info!("Terminating query server (pid {})", self.child.id());
        if let Err(e) = self.child.kill() {
            debug!("Kill failed (server may have exited): {}", e);
        }

        // Reap the child without blocking the UI for long
        for _ in 0..10 {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Query server exited with {}", status);
                    return;
                }
                Ok(None) => thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    warn!("Error waiting for query server: {}", e);
                    return;
                }
            }
        }
        warn!("Query server did not exit after kill");
    }
}

/// Forward each output line to the tracing log until the stream closes.
fn forward_output<R: Read>(reader: R, stream: OutputStream) {
    for line in BufReader::new(reader).lines() {
        match line {
            Ok(line) => match stream {
                OutputStream::Stdout => info!("Server stdout: {}", line),
                OutputStream::Stderr => warn!("Server stderr: {}", line),
            },
            Err(e) => {
                debug!("Stopped reading server {:?}: {}", stream, e);
                break;
            }
        }
    }
}
