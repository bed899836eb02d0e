//! Child process management for aider runs
//!
//! The rest of the pipeline only sees [`ProcessLauncher`] and [`ProcessHandle`],
//! so tests can substitute a scripted process for the real binary.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::debug;

use super::command::InvocationSpec;
use crate::error::{AiderApiError, Result};

/// One of the child's output pipes
pub type OutputPipe = Box<dyn AsyncRead + Send + Unpin>;

/// Lifecycle control over a started process
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, if there is one
    fn id(&self) -> Option<u32>;

    /// Wait for exit. `None` when the process was terminated by a signal.
    async fn wait(&mut self) -> io::Result<Option<i32>>;

    async fn kill(&mut self) -> io::Result<()>;
}

/// A started process with its output pipes detached
pub struct ProcessHandle {
    pub stdout: OutputPipe,
    pub stderr: OutputPipe,
    pub child: Box<dyn ChildProcess>,
}

/// Starts one process per invocation
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, spec: InvocationSpec, cwd: &Path) -> Result<ProcessHandle>;
}

struct TokioChild {
    inner: Child,
}

#[async_trait]
impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.inner.id()
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.inner.wait().await?;
        Ok(status.code())
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.inner.kill().await
    }
}

/// Launches the real binary with tokio, inheriting the server's environment
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
    }
}

/// Absolute form of `cwd`; it must be an existing directory
pub fn resolve_working_dir(cwd: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(cwd)?;
    if !absolute.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("working directory {} does not exist", absolute.display()),
        ));
    }
    Ok(absolute)
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, spec: InvocationSpec, cwd: &Path) -> Result<ProcessHandle> {
        let launch_err = |source: io::Error| AiderApiError::Launch {
            program: spec.program.clone(),
            source,
        };

        let cwd = resolve_working_dir(cwd).map_err(launch_err)?;

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_err)?;

        let missing = |name: &str| {
            launch_err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("{} was not captured", name),
            ))
        };
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        debug!(pid = ?child.id(), cwd = %cwd.display(), "Spawned aider process");

        Ok(ProcessHandle {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            child: Box::new(TokioChild { inner: child }),
        })
    }
}
