//! Command executor for running hook tasks and version-control helpers
//!
//! Everything parboil launches as a subprocess goes through a
//! [`CommandExecutor`], which keeps task execution and git invocations
//! replaceable in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// How a command is spelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// A single string interpreted by the platform shell
    Shell(String),
    /// Program and arguments, executed directly without a shell
    Argv(Vec<String>),
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Shell(cmd) => write!(f, "{cmd}"),
            CommandLine::Argv(argv) => write!(f, "{}", shell_words::join(argv)),
        }
    }
}

/// A fully described subprocess invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: CommandLine,
    pub working_dir: Option<PathBuf>,
    /// Variables layered over the inherited process environment
    pub env: BTreeMap<String, String>,
    /// Discard standard output
    pub quiet: bool,
    /// Kill the process if it runs longer than this
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            working_dir: None,
            env: BTreeMap::new(),
            quiet: false,
            timeout: None,
        }
    }

    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandLine::Argv(argv.into_iter().map(Into::into).collect()))
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandResult {
    /// Check if the command was successful
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for executing external commands
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the invocation to completion.
    ///
    /// Returns an error only if the process could not be started or did not
    /// finish within its timeout.
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<CommandResult>;
}

/// Default command executor using tokio::process
#[derive(Debug, Default, Clone)]
pub struct ShellCommandExecutor;

impl ShellCommandExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Shared handle for use in projects and repositories
    pub fn shared() -> Arc<dyn CommandExecutor> {
        Arc::new(Self)
    }

    fn build(invocation: &Invocation) -> std::io::Result<Command> {
        let mut command = match &invocation.command {
            CommandLine::Shell(line) => {
                let (shell, flag) = if cfg!(target_os = "windows") {
                    ("cmd", "/C")
                } else {
                    ("sh", "-c")
                };
                let mut command = Command::new(shell);
                command.arg(flag).arg(line);
                command
            }
            CommandLine::Argv(argv) => {
                let (program, args) = argv.split_first().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
                })?;
                let mut command = Command::new(program);
                command.args(args);
                command
            }
        };

        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }
        command.envs(&invocation.env);
        if invocation.quiet {
            command.stdout(Stdio::null());
        }
        command.kill_on_drop(true);
        Ok(command)
    }
}

#[async_trait]
impl CommandExecutor for ShellCommandExecutor {
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<CommandResult> {
        debug!(command = %invocation.command, cwd = ?invocation.working_dir, "Executing command");
        let mut command = Self::build(invocation)?;
        let mut child = command.spawn()?;

        let status = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    child.kill().await?;
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("timed out after {}s", limit.as_secs()),
                    ));
                }
            },
            None => child.wait().await?,
        };

        Ok(CommandResult {
            exit_code: status.code(),
        })
    }
}

/// Handler used by [`MockCommandExecutor`] to simulate a command
pub type MockHandler = Box<dyn Fn(&Invocation) -> std::io::Result<CommandResult> + Send + Sync>;

/// Command executor that records invocations instead of running them.
///
/// Commands succeed by default. A handler can simulate side effects, e.g. a
/// `git clone` that populates the target directory from a local fixture.
#[derive(Default)]
pub struct MockCommandExecutor {
    calls: Mutex<Vec<Invocation>>,
    handler: Option<MockHandler>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Invocation) -> std::io::Result<CommandResult> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Some(Box::new(handler)),
        }
    }

    /// Invocations received so far
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandExecutor for MockCommandExecutor {
    async fn execute(&self, invocation: &Invocation) -> std::io::Result<CommandResult> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        match &self.handler {
            Some(handler) => handler(invocation),
            None => Ok(CommandResult { exit_code: Some(0) }),
        }
    }
}
