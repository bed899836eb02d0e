// src/server/handlers.rs
// HTTP handlers

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::presenter::{RunPhase, collect_response, immediate, sse_response};
use super::state::AppState;
use crate::error::{AiderApiError, Result};
use crate::runner::{
    AiderResponse, EditRequest, OutputEvent, build_invocation, resolve_working_dir,
    spawn_multiplexer,
};
use crate::staging::{materialize_files, validate_file_name};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "requests_served": state.requests_served(),
    }))
}

/// POST /run-aider
///
/// Streams SSE `progress`/`complete`/`error` events, or returns one JSON
/// `AiderResponse` when the request sets `stream: false`.
pub async fn run_aider(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EditRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| AiderApiError::InvalidRequest(e.body_text()))?;
    if request.message.trim().is_empty() {
        return Err(AiderApiError::InvalidRequest("message must not be empty".to_string()));
    }

    let run_id = Uuid::new_v4().to_string();
    let seq = state.next_request();
    let stream = request.stream.unwrap_or(state.settings.default_stream);

    info!(run_id = %run_id, seq, stream, phase = ?RunPhase::Idle, "Run requested");
    debug!(
        run_id = %run_id,
        message = %request.message,
        files = ?request.file_names(),
        root = %request.root.display(),
        "Run details"
    );

    for name in request.files.iter().flat_map(|files| files.keys()) {
        validate_file_name(name)?;
    }

    // a missing root fails the launch whether or not there is anything to stage
    let events = match resolve_working_dir(&request.root) {
        Ok(_) => {
            if let Some(files) = request.files.as_ref().filter(|f| !f.is_empty()) {
                materialize_files(&request.root, files).await?;
            }
            start_run(&state, &request, &run_id)
        }
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Working directory unavailable");
            launch_failure(e.to_string())
        }
    };

    if stream {
        return Ok(sse_response(events, run_id).into_response());
    }

    let response = collect_response(events).await?;
    info!(run_id = %run_id, error = ?response.error, phase = ?RunPhase::Terminated, "Run complete");
    Ok(Json(response).into_response())
}

/// Launch aider for `request`. A launch failure becomes an immediate, well-formed result.
fn start_run(state: &AppState, request: &EditRequest, run_id: &str) -> mpsc::Receiver<OutputEvent> {
    let spec = build_invocation(&state.settings.aider_bin, request);
    debug!(run_id = %run_id, command = %spec.display(), "Executing command");

    match state.launcher.launch(spec, &request.root) {
        Ok(handle) => {
            let pid = handle.child.id();
            info!(run_id = %run_id, pid = ?pid, phase = ?RunPhase::Spawned, "aider started");
            let (events, _task) = spawn_multiplexer(handle, state.settings.kill_on_disconnect);
            events
        }
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Failed to start aider");
            let reason = match e {
                AiderApiError::Launch { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            launch_failure(reason)
        }
    }
}

fn launch_failure(reason: String) -> mpsc::Receiver<OutputEvent> {
    immediate(OutputEvent::Complete(AiderResponse::launch_failure(reason)))
}
