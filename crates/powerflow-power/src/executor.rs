//! Power CLI execution
//!
//! Runs `<power-cli> <operation> <driver> [--flag=value ...]` as a child
//! process. Arguments are always passed as a vector, never through a shell.
//! Standard output of a successful run is the reported power state.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::context::ActivityContext;
use crate::error::{CommandFailureInfo, ExecutionError, ResolutionError, Result};
use crate::types::Operation;

/// Name of the power CLI looked up on the search path
pub const DEFAULT_POWER_CLI: &str = "maas.power";

/// Something that can run a power operation and report the resulting state
///
/// [`PowerCli`] is the real implementation. Anything else is a test double.
#[async_trait]
pub trait PowerExecutor: Send + Sync {
    /// Run `operation` for `driver` with the given flags
    ///
    /// Returns the reported power state, trimmed of surrounding whitespace.
    async fn execute(
        &self,
        ctx: &ActivityContext,
        operation: Operation,
        driver: &str,
        flags: &[String],
    ) -> Result<String>;
}

/// Executor backed by the external power CLI
#[derive(Debug, Clone)]
pub struct PowerCli {
    /// Executable name, or a path if it contains a separator
    program: String,

    /// Directories to search instead of `$PATH`
    search_path: Option<OsString>,
}

impl Default for PowerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerCli {
    /// Create an executor for the default power CLI
    pub fn new() -> Self {
        Self::with_program(DEFAULT_POWER_CLI)
    }

    /// Create an executor for a specific executable name or path
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            search_path: None,
        }
    }

    /// Search these directories (`PATH` syntax) instead of the process `PATH`
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Locate the power CLI executable
    pub fn resolve(&self) -> std::result::Result<PathBuf, ResolutionError> {
        let not_found = |reason: &str| ResolutionError {
            name: self.program.clone(),
            reason: reason.to_string(),
        };

        if self.program.is_empty() {
            return Err(not_found("empty executable name"));
        }

        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return if is_executable(program) {
                Ok(program.to_path_buf())
            } else {
                Err(not_found("not an executable file"))
            };
        }

        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
            .ok_or_else(|| not_found("PATH is not set"))?;

        std::env::split_paths(&search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(|| not_found("executable file not found in search path"))
    }
}

#[async_trait]
impl PowerExecutor for PowerCli {
    async fn execute(
        &self,
        ctx: &ActivityContext,
        operation: Operation,
        driver: &str,
        flags: &[String],
    ) -> Result<String> {
        let program = self.resolve().map_err(|e| {
            error!(error = %e, "error looking up power CLI executable");
            e
        })?;

        let command = describe_command(&program, operation, driver, flags);

        if ctx.is_cancelled() {
            return Err(ExecutionError::Cancelled {
                command,
                stdout: String::new(),
            }
            .into());
        }

        info!(
            cli = %program.display(),
            operation = %operation,
            driver = %driver,
            flags = flags.len(),
            "executing power CLI"
        );

        let mut child = Command::new(&program)
            .arg(operation.as_str())
            .arg(driver)
            .args(flags)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ExecutionError::Start {
                command: command.clone(),
                err,
            })?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let outcome = {
            let run = async {
                let (status, out, err) = tokio::join!(
                    child.wait(),
                    drain_pipe(stdout_pipe.as_mut(), &mut stdout_buf),
                    drain_pipe(stderr_pipe.as_mut(), &mut stderr_buf),
                );
                out?;
                err?;
                status
            };

            tokio::select! {
                res = run => Outcome::Finished(res),
                _ = tokio::time::sleep(ctx.timeout()) => Outcome::TimedOut,
                _ = ctx.cancellation().cancelled() => Outcome::Cancelled,
            }
        };

        let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();

        let status = match outcome {
            Outcome::Finished(Ok(status)) => status,
            Outcome::Finished(Err(err)) => {
                error!(command = %command, error = %err, "error reading power CLI output");
                return Err(ExecutionError::Io { command, err }.into());
            }
            Outcome::TimedOut => {
                kill(&mut child).await;
                error!(command = %command, timeout = ?ctx.timeout(), stdout = %stdout, "power CLI timed out");
                return Err(ExecutionError::Timeout {
                    command,
                    timeout: ctx.timeout(),
                    stdout,
                }
                .into());
            }
            Outcome::Cancelled => {
                kill(&mut child).await;
                warn!(command = %command, "power CLI cancelled");
                return Err(ExecutionError::Cancelled { command, stdout }.into());
            }
        };

        if !stdout.is_empty() {
            debug!(stdout = %stdout, "power CLI stdout");
        }
        if !stderr.is_empty() {
            debug!(stderr = %stderr, "power CLI stderr");
        }

        if !status.success() {
            error!(
                code = status.code().unwrap_or(-1),
                stdout = %stdout,
                stderr = %stderr,
                "error executing power command"
            );
            return Err(ExecutionError::CommandFailure(Box::new(CommandFailureInfo {
                command,
                status,
                stdout,
                stderr,
            }))
            .into());
        }

        Ok(stdout.trim().to_string())
    }
}

enum Outcome {
    Finished(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Read a pipe to EOF, keeping whatever arrived if the read is abandoned
async fn drain_pipe<R>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(());
    };

    let mut chunk = [0u8; 4096];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn kill(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "power CLI already exited");
    }
}

/// Printable command line with flag values left out (they carry credentials)
fn describe_command(program: &Path, operation: Operation, driver: &str, flags: &[String]) -> String {
    let mut parts = vec![
        program.display().to_string(),
        operation.to_string(),
        driver.to_string(),
    ];
    parts.extend(flags.iter().map(|flag| match flag.split_once('=') {
        Some((name, _)) => format!("{}=…", name),
        None => flag.clone(),
    }));
    parts.join(" ")
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
