//! External command execution.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::error::{ConversionError, Result};

/// Default limit on one external tool run.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with `code` and printed `stdout`.
    pub fn exited(code: i32, stdout: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs external programs for the PDF processor.
///
/// Implementations block until the program exits.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// # Errors
    ///
    /// When the program could not be started or overran its time limit. A
    /// non-zero exit is reported through [`CommandOutput::code`].
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Log-safe description of a command line. Arguments may hold passwords,
/// so only their number is shown.
pub(crate) fn describe(program: &str, args: &[String]) -> String {
    format!("{} ({} args)", program, args.len())
}

/// Spawns real processes, killing any that outlive `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TOOL_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain a child pipe on its own thread so a chatty tool cannot fill the
/// pipe buffer and block before it exits.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        log::trace!("🔩 Running {}", describe(program, args));
        let started = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                log::error!("❌ Failed to start {}: {}", program, e);
                ConversionError::Processing(format!("failed to start {}: {}", program, e))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                log::error!("⏱️ {} killed after {:?}", program, self.timeout);
                return Err(ConversionError::Processing(format!(
                    "{} timed out after {:?}",
                    program, self.timeout
                )));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConversionError::Processing(format!(
                    "failed to wait for {}: {}",
                    program, e
                )));
            }
        };

        let output = CommandOutput {
            code: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };
        log::trace!("{} exited with {:?} in {:?}", program, output.code, started.elapsed());
        Ok(output)
    }
}
