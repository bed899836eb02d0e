//! Interactive chat client for a running aider API server
//!
//! Reads files once at startup, then sends every line typed at the prompt to
//! `/run-aider` together with those files. Streaming mode prints output as the
//! server pushes it; buffered mode prints the final result in sections.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::{Value, json};
use tracing::debug;

use crate::runner::{AiderResponse, ErrorPayload, Origin, ProgressPayload};
use crate::server::presenter::{EVENT_COMPLETE, EVENT_ERROR, EVENT_PROGRESS};

/// One thing to print, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Printed {
    Out(String),
    Err(String),
}

impl Printed {
    fn emit(&self) {
        match self {
            Printed::Out(text) => println!("{}", text),
            Printed::Err(text) => eprintln!("{}", text),
        }
    }
}

/// Read the files named on the command line, keyed by the name as given
pub fn load_files(paths: &[PathBuf]) -> Result<HashMap<String, String>> {
    let mut files = HashMap::new();
    for path in paths {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Error reading {}", path.display()))?;
        files.insert(path.to_string_lossy().into_owned(), content);
    }
    Ok(files)
}

/// Sections printed for a buffered response
pub fn format_buffered(response: &AiderResponse) -> Vec<Printed> {
    let mut out = Vec::new();
    if !response.raw_stdout.is_empty() {
        out.push(Printed::Out("STDOUT:".to_string()));
        out.push(Printed::Out(response.raw_stdout.clone()));
    }
    if !response.raw_stderr.is_empty() {
        out.push(Printed::Out("STDERR:".to_string()));
        out.push(Printed::Out(response.raw_stderr.clone()));
    }
    if let Some(error) = &response.error {
        out.push(Printed::Out("ERROR:".to_string()));
        out.push(Printed::Out(error.clone()));
    }
    out
}

/// Interpret one SSE message. Returns what to print and whether the run is over.
pub fn format_stream_event(event: &str, data: &str) -> Result<(Vec<Printed>, bool)> {
    match event {
        EVENT_PROGRESS => {
            let progress: ProgressPayload =
                serde_json::from_str(data).context("malformed progress event")?;
            let printed = match progress.origin {
                Origin::Stdout => Printed::Out(progress.content),
                Origin::Stderr => Printed::Err(format!("STDERR: {}", progress.content)),
            };
            Ok((vec![printed], false))
        }
        EVENT_COMPLETE => {
            let response: AiderResponse =
                serde_json::from_str(data).context("malformed complete event")?;
            let printed = response
                .error
                .map(|error| vec![Printed::Err(format!("ERROR: {}", error))])
                .unwrap_or_default();
            Ok((printed, true))
        }
        EVENT_ERROR => {
            let message = serde_json::from_str::<ErrorPayload>(data)
                .map(|payload| payload.error)
                .unwrap_or_else(|_| "Unknown error".to_string());
            Ok((vec![Printed::Err(format!("ERROR: {}", message))], true))
        }
        other => {
            debug!(event = other, "Ignoring unknown event");
            Ok((Vec::new(), false))
        }
    }
}

/// HTTP side of the chat session
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    files: HashMap<String, String>,
    stream: bool,
}

impl ChatClient {
    pub fn new(host: &str, port: u16, files: HashMap<String, String>, stream: bool) -> Self {
        // a wildcard bind address is not something a client can connect to
        let host = match host {
            "0.0.0.0" | "::" => "localhost",
            other => other,
        };
        Self {
            http: reqwest::Client::new(),
            url: format!("http://{}:{}/run-aider", host, port),
            files,
            stream,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn payload(&self, message: &str) -> Value {
        json!({
            "message": message,
            "files": self.files,
            "auto_commits": true,
            "dirty_commits": true,
            "dry_run": false,
            "stream": self.stream,
        })
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        if self.stream {
            self.send_streaming(message).await
        } else {
            self.send_buffered(message).await
        }
    }

    async fn send_buffered(&self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&self.payload(message))
            .send()
            .await?
            .error_for_status()?;
        let result: AiderResponse = response.json().await?;

        for printed in format_buffered(&result) {
            printed.emit();
        }
        Ok(())
    }

    async fn send_streaming(&self, message: &str) -> Result<()> {
        let request = self
            .http
            .post(&self.url)
            .header("Accept", "text/event-stream")
            .json(&self.payload(message));

        let mut es = EventSource::new(request).context("Failed to create EventSource")?;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    let (printed, done) = format_stream_event(&msg.event, &msg.data)?;
                    for p in &printed {
                        p.emit();
                    }
                    if done {
                        break;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    es.close();
                    return Err(anyhow::anyhow!("Error communicating with API: {}", e));
                }
            }
        }

        es.close();
        Ok(())
    }
}

/// Prompt loop. Ctrl+C or Ctrl+D ends the session.
pub async fn run(client: ChatClient) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
    }

    println!("Chat session started. Type your messages (Ctrl+C to exit)");
    let mut names: Vec<&String> = client.files.keys().collect();
    names.sort();
    if names.is_empty() {
        println!("Files being edited: none");
    } else {
        println!("Files being edited: {:?}", names);
    }
    println!("Use Up/Down arrows for history");

    loop {
        match editor.readline("\n> ") {
            Ok(line) => {
                let message = line.trim();
                if message.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);

                if let Err(e) = client.send(message).await {
                    eprintln!("Error: {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\nExiting chat session");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = editor.save_history(&history_path);
    Ok(())
}

fn history_path() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".aider_chat_history")
}
