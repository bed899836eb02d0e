//! Argument vector construction for aider

use std::path::{Path, PathBuf};

use super::types::EditRequest;

/// Flags appended to every invocation: no model warnings, auto-confirm prompts
const FIXED_FLAGS: &[&str] = &["--no-show-model-warnings", "--yes"];

/// A fully-built aider command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl InvocationSpec {
    /// Command line rendered for logs
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn toggle(enabled: bool, on: &str, off: &str) -> String {
    let flag = if enabled { on } else { off };
    flag.to_string()
}

/// A file name as a positional argument; `./` keeps a leading `-` from reading as an option
fn file_arg(name: &str) -> String {
    if name.starts_with('-') {
        format!("./{}", name)
    } else {
        name.to_string()
    }
}

/// Build the invocation for `request`. Never fails; the request is validated upstream.
pub fn build_invocation(program: &Path, request: &EditRequest) -> InvocationSpec {
    let mut args = vec![
        "--message".to_string(),
        request.message.clone(),
        toggle(request.auto_commits, "--auto-commits", "--no-auto-commits"),
        toggle(request.dirty_commits, "--dirty-commits", "--no-dirty-commits"),
        toggle(request.dry_run, "--dry-run", "--no-dry-run"),
    ];
    args.extend(FIXED_FLAGS.iter().map(|flag| flag.to_string()));
    args.extend(request.file_names().into_iter().map(file_arg));

    InvocationSpec {
        program: program.to_path_buf(),
        args,
    }
}
