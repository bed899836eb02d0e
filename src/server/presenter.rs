// src/server/presenter.rs
// Renders runner events as a JSON body or as an SSE stream

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AiderApiError, Result};
use crate::runner::{AiderResponse, ErrorPayload, OutputEvent, ProgressPayload};

pub const EVENT_PROGRESS: &str = "progress";
pub const EVENT_COMPLETE: &str = "complete";
pub const EVENT_ERROR: &str = "error";

const MISSING_TERMINAL: &str = "output pipeline ended without a result";

/// Lifecycle of one request as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Spawned,
    Streaming,
    Terminated,
}

/// Channel that yields a single, already-known terminal event
pub fn immediate(event: OutputEvent) -> mpsc::Receiver<OutputEvent> {
    let (tx, rx) = mpsc::channel(1);
    // capacity 1 and a fresh channel: cannot fail
    let _ = tx.try_send(event);
    rx
}

/// Buffered mode: wait for the terminal event
pub async fn collect_response(mut events: mpsc::Receiver<OutputEvent>) -> Result<AiderResponse> {
    while let Some(event) = events.recv().await {
        match event {
            OutputEvent::Line { .. } => {}
            OutputEvent::Complete(response) => return Ok(response),
            OutputEvent::Failed(message) => return Err(AiderApiError::Pipeline(message)),
        }
    }
    Err(AiderApiError::Pipeline(MISSING_TERMINAL.to_string()))
}

fn sse_event<T: Serialize>(name: &str, payload: &T) -> Event {
    let data = serde_json::to_string(payload).unwrap_or_default();
    Event::default().event(name).data(data)
}

/// SSE rendering of a single runner event
pub fn render_event(event: OutputEvent) -> Event {
    match event {
        OutputEvent::Line { origin, content } => {
            sse_event(EVENT_PROGRESS, &ProgressPayload { origin, content })
        }
        OutputEvent::Complete(response) => sse_event(EVENT_COMPLETE, &response),
        OutputEvent::Failed(error) => sse_event(EVENT_ERROR, &ErrorPayload { error }),
    }
}

/// Streaming mode: progress events as they arrive, then exactly one terminal event.
///
/// When the client disconnects the stream is dropped, which drops `events` and
/// tells the multiplexer to stop publishing.
pub fn event_stream(
    mut events: mpsc::Receiver<OutputEvent>,
    run_id: String,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    async_stream::stream! {
        let mut phase = RunPhase::Spawned;
        let mut progress = 0usize;

        while let Some(event) = events.recv().await {
            if phase == RunPhase::Spawned {
                phase = RunPhase::Streaming;
                debug!(run_id = %run_id, ?phase, "Streaming output");
            }

            let terminal = event.is_terminal();
            if let OutputEvent::Failed(ref message) = event {
                warn!(run_id = %run_id, error = %message, "Run failed");
            }
            if !terminal {
                progress += 1;
            }

            yield Ok(render_event(event));

            if terminal {
                phase = RunPhase::Terminated;
                break;
            }
        }

        if phase != RunPhase::Terminated {
            warn!(run_id = %run_id, "Runner closed without a terminal event");
            yield Ok(sse_event(EVENT_ERROR, &ErrorPayload { error: MISSING_TERMINAL.to_string() }));
        }

        info!(run_id = %run_id, progress_events = progress, "Stream finished");
    }
}

pub fn sse_response(
    events: mpsc::Receiver<OutputEvent>,
    run_id: String,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    Sse::new(event_stream(events, run_id)).keep_alive(KeepAlive::default())
}
