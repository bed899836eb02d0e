//! aider runner
//!
//! Turns one [`EditRequest`] into one aider process and a stream of output events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  build_invocation()                          │
//! │  • EditRequest -> argv (pure)                │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │  ProcessLauncher::launch()                   │
//! │  • spawns aider in the request's root        │
//! │  • hands back stdout, stderr, child control  │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │  spawn_multiplexer()                         │
//! │  • one reader task per pipe                  │
//! │  • Line events in arrival order              │
//! │  • Complete(AiderResponse) | Failed          │
//! │  • classify_failure() on the full stdout     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let spec = build_invocation(&settings.aider_bin, &request);
//! let handle = SystemLauncher::new().launch(spec, &request.root)?;
//! let (mut events, _task) = spawn_multiplexer(handle, true);
//!
//! while let Some(event) = events.recv().await {
//!     // OutputEvent::Line { .. } ... then exactly one terminal event
//! }
//! ```

mod classify;
mod command;
mod multiplex;
mod process;
pub mod types;

pub use classify::{
    GENERIC_ERROR, MODEL_OR_KEY_SUFFIX, MODELS_AND_KEYS_MARKER, TROUBLESHOOTING_MARKER,
    classify_failure,
};
pub use command::{InvocationSpec, build_invocation};
pub use multiplex::{LineSplitter, spawn_multiplexer};
pub use process::{
    ChildProcess, OutputPipe, ProcessHandle, ProcessLauncher, SystemLauncher, resolve_working_dir,
};
pub use types::{AiderResponse, EditRequest, ErrorPayload, Origin, OutputEvent, ProgressPayload};
