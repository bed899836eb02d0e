//! Content-based failure detection on aider's stdout
//!
//! aider can exit 0 and still have failed; the only reliable signal is the
//! troubleshooting link it prints. Exit codes are deliberately not consulted.

/// Printed by aider whenever it hits an error it cannot recover from
pub const TROUBLESHOOTING_MARKER: &str = "https://aider.chat/docs/troubleshooting";

/// Printed alongside the troubleshooting link when the model or API key is bad
pub const MODELS_AND_KEYS_MARKER: &str = "models-and-keys.html";

pub const GENERIC_ERROR: &str = "something went wrong";
pub const MODEL_OR_KEY_SUFFIX: &str = ", AI key or model not found";

/// Derive the `error` summary for a finished run from its full stdout
pub fn classify_failure(stdout: &str) -> Option<String> {
    if !stdout.contains(TROUBLESHOOTING_MARKER) {
        return None;
    }

    let mut summary = GENERIC_ERROR.to_string();
    if stdout.contains(MODELS_AND_KEYS_MARKER) {
        summary.push_str(MODEL_OR_KEY_SUFFIX);
    }
    Some(summary)
}
