// src/server/state.rs
// Shared server state

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Settings;
use crate::runner::{ProcessLauncher, SystemLauncher};

/// Shared application state. Nothing in here changes per request except the counter.
#[derive(Clone)]
pub struct AppState {
    /// Settings resolved at startup
    pub settings: Arc<Settings>,

    /// Starts aider processes
    pub launcher: Arc<dyn ProcessLauncher>,

    requests: Arc<AtomicU64>,
}

impl AppState {
    /// State backed by the real aider binary
    pub fn new(settings: Settings) -> Self {
        Self::with_launcher(settings, Arc::new(SystemLauncher::new()))
    }

    pub fn with_launcher(settings: Settings, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            settings: Arc::new(settings),
            launcher,
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count a new run, returning its sequence number (starting at 1)
    pub fn next_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn requests_served(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
