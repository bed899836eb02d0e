//! Request, response and event types for a single aider run

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

/// One edit request as posted to `/run-aider`
#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    /// Natural-language instruction passed to aider via `--message`
    pub message: String,
    /// File name -> content. Names are relative to `root`.
    #[serde(default)]
    pub files: Option<HashMap<String, String>>,
    #[serde(default = "default_true")]
    pub auto_commits: bool,
    #[serde(default = "default_true")]
    pub dirty_commits: bool,
    #[serde(default)]
    pub dry_run: bool,
    /// Directory aider runs in
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Delivery mode. `None` means the server's configured default.
    #[serde(default)]
    pub stream: Option<bool>,
}

impl EditRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            files: None,
            auto_commits: true,
            dirty_commits: true,
            dry_run: false,
            root: default_root(),
            stream: None,
        }
    }

    /// File names in a stable order, so the argument vector is deterministic
    pub fn file_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .files
            .as_ref()
            .map(|files| files.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }
}

/// Terminal result of a run.
///
/// Serialized field names are part of the public contract and must not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiderResponse {
    #[serde(rename = "raw-stdout")]
    pub raw_stdout: String,
    #[serde(rename = "raw-stderr")]
    pub raw_stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Exit status of the child, when it exited normally. Never feeds `error`.
    #[serde(rename = "exit-code", default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl AiderResponse {
    /// Result reported when the child could not be started at all
    pub fn launch_failure(reason: impl std::fmt::Display) -> Self {
        Self {
            raw_stdout: String::new(),
            raw_stderr: format!("Error: Failed to start aider process: {}\n", reason),
            error: None,
            exit_code: None,
        }
    }
}

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Stdout,
    Stderr,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Stdout => "stdout",
            Origin::Stderr => "stderr",
        }
    }
}

/// Events produced by the output multiplexer, in arrival order.
///
/// The sequence always ends with exactly one `Complete` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Line { origin: Origin, content: String },
    Complete(AiderResponse),
    Failed(String),
}

impl OutputEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutputEvent::Complete(_) | OutputEvent::Failed(_))
    }
}

/// Payload of an SSE `progress` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(rename = "type")]
    pub origin: Origin,
    pub content: String,
}

/// Payload of an SSE `error` event and of HTTP error bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}
