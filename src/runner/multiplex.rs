//! Merges aider's stdout and stderr into one ordered event sequence
//!
//! ```text
//!   stdout ──► drain_pipe ──┐
//!                           ├──► lines channel ──► publisher ──► OutputEvent channel
//!   stderr ──► drain_pipe ──┘                       (aggregate, classify, exit status)
//! ```
//!
//! Each pipe has its own reader task, so a burst on one can never stall the other
//! and the child never blocks on a full pipe buffer.

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::classify::classify_failure;
use super::process::{ChildProcess, OutputPipe, ProcessHandle};
use super::types::{AiderResponse, Origin, OutputEvent};

const READ_CHUNK_BYTES: usize = 8 * 1024;
const CHANNEL_CAPACITY: usize = 256;

/// Incremental newline splitter over raw bytes.
///
/// Splitting happens before decoding so multi-byte characters that straddle a
/// read boundary are never mangled. A line ends at `\n` or `\r\n`; invalid UTF-8
/// is replaced, never an error.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    /// Feed a chunk, returning every line it completed (without the terminator)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(idx) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=idx).collect();
            let body = line[..idx].strip_suffix(b"\r").unwrap_or(&line[..idx]);
            lines.push(String::from_utf8_lossy(body).into_owned());
        }
        lines
    }

    /// Unterminated trailing data, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Full stdout/stderr text, one `\n`-terminated entry per line
#[derive(Debug, Default)]
struct Aggregate {
    stdout: String,
    stderr: String,
}

impl Aggregate {
    fn push(&mut self, origin: Origin, line: &str) {
        let target = match origin {
            Origin::Stdout => &mut self.stdout,
            Origin::Stderr => &mut self.stderr,
        };
        target.push_str(line);
        target.push('\n');
    }

    fn into_response(self, exit_code: Option<i32>) -> AiderResponse {
        let error = classify_failure(&self.stdout);
        AiderResponse {
            raw_stdout: self.stdout,
            raw_stderr: self.stderr,
            error,
            exit_code,
        }
    }
}

/// Read one pipe to EOF, forwarding complete lines as they arrive
async fn drain_pipe(origin: Origin, mut pipe: OutputPipe, tx: mpsc::Sender<(Origin, String)>) {
    let mut splitter = LineSplitter::default();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    if tx.send((origin, line)).await.is_err() {
                        debug!(origin = origin.as_str(), "Line receiver dropped, stopping reader");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(origin = origin.as_str(), error = %e, "Failed to read process output");
                if let Some(rest) = splitter.finish() {
                    let _ = tx.send((origin, rest)).await;
                }
                let note = format!("Error: Failed to process output: {}", e);
                let _ = tx.send((Origin::Stderr, note)).await;
                return;
            }
        }
    }

    if let Some(rest) = splitter.finish() {
        let _ = tx.send((origin, rest)).await;
    }
    debug!(origin = origin.as_str(), "Pipe drained");
}

/// Start draining `handle`.
///
/// Returns the event receiver and the publisher task. Dropping the receiver counts
/// as a client disconnect: the child is killed when `kill_on_disconnect` is set,
/// and in either case the pipes are drained to EOF and no further events are sent.
pub fn spawn_multiplexer(
    handle: ProcessHandle,
    kill_on_disconnect: bool,
) -> (mpsc::Receiver<OutputEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(publish(handle, tx, kill_on_disconnect));
    (rx, task)
}

async fn publish(
    handle: ProcessHandle,
    events: mpsc::Sender<OutputEvent>,
    kill_on_disconnect: bool,
) {
    let ProcessHandle {
        stdout,
        stderr,
        mut child,
    } = handle;

    let (line_tx, mut line_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let readers = [
        tokio::spawn(drain_pipe(Origin::Stdout, stdout, line_tx.clone())),
        tokio::spawn(drain_pipe(Origin::Stderr, stderr, line_tx)),
    ];

    let mut aggregate = Aggregate::default();
    let mut connected = true;

    loop {
        // a silent child must not hide a dropped receiver
        let next = if connected {
            tokio::select! {
                next = line_rx.recv() => next,
                _ = events.closed() => {
                    connected = false;
                    on_disconnect(&mut *child, kill_on_disconnect).await;
                    continue;
                }
            }
        } else {
            line_rx.recv().await
        };
        let Some((origin, line)) = next else {
            break;
        };

        aggregate.push(origin, &line);

        if !connected || line.trim().is_empty() {
            continue;
        }

        let event = OutputEvent::Line {
            origin,
            content: line,
        };
        if events.send(event).await.is_err() {
            connected = false;
            on_disconnect(&mut *child, kill_on_disconnect).await;
        }
    }

    let mut fault = None;
    for reader in readers {
        if let Err(e) = reader.await {
            fault = Some(format!("output reader failed: {}", e));
        }
    }

    let exit = child.wait().await;

    if !connected {
        debug!(?exit, "Run finished after client disconnect");
        return;
    }

    let terminal = match (fault, exit) {
        (Some(message), _) => OutputEvent::Failed(message),
        (None, Err(e)) => OutputEvent::Failed(format!("failed to wait for aider: {}", e)),
        (None, Ok(code)) => {
            debug!(exit_code = ?code, "aider exited");
            OutputEvent::Complete(aggregate.into_response(code))
        }
    };

    if events.send(terminal).await.is_err() {
        debug!("Client went away before the terminal event");
    }
}

async fn on_disconnect(child: &mut dyn ChildProcess, kill_on_disconnect: bool) {
    if !kill_on_disconnect {
        info!(pid = ?child.id(), "Client disconnected, letting aider run to completion");
        return;
    }

    info!(pid = ?child.id(), "Client disconnected, killing aider");
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill aider after disconnect");
    }
}
