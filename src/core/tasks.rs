//! Hook tasks run before and after a project is compiled

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::core::error::{Error, Result};
use crate::core::renderer::Renderable;
use crate::core::shell::{CommandExecutor, CommandLine, Invocation};

/// The two points in a compile run where tasks are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hook {
    PreRun,
    PostRun,
}

impl Hook {
    /// Key used for this hook in the project descriptor
    pub fn as_str(self) -> &'static str {
        match self {
            Hook::PreRun => "pre-run",
            Hook::PostRun => "post-run",
        }
    }

    pub fn all() -> &'static [Hook] {
        &[Hook::PreRun, Hook::PostRun]
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Hook {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre-run" => Ok(Hook::PreRun),
            "post-run" => Ok(Hook::PostRun),
            _ => Err(Error::config(format!(
                "Unknown task hook '{s}'. Available hooks: pre-run, post-run"
            ))),
        }
    }
}

/// A single shell hook.
///
/// The command is stored unrendered. Callers render a clone right before
/// execution so the template survives across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub command: CommandLine,
    pub env: BTreeMap<String, String>,
    pub quiet: bool,
}

impl Task {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            env: BTreeMap::new(),
            quiet: false,
        }
    }

    /// A task interpreted by the platform shell
    pub fn shell(command: impl Into<String>) -> Self {
        Self::new(CommandLine::Shell(command.into()))
    }

    /// A task executed directly from an argument vector
    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandLine::Argv(argv.into_iter().map(Into::into).collect()))
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run the task in `working_dir`.
    ///
    /// A non-zero exit yields [`Error::TaskFailed`]; a failure to launch
    /// yields [`Error::TaskExecution`].
    pub async fn execute(&self, executor: &dyn CommandExecutor, working_dir: &Path) -> Result<()> {
        let invocation = Invocation {
            command: self.command.clone(),
            working_dir: Some(working_dir.to_path_buf()),
            env: self.env.clone(),
            quiet: self.quiet,
            timeout: None,
        };

        let result = executor
            .execute(&invocation)
            .await
            .map_err(|source| Error::TaskExecution {
                task: Box::new(self.clone()),
                source,
            })?;

        if result.is_success() {
            debug!(task = %self, "Task finished");
            Ok(())
        } else {
            Err(Error::TaskFailed {
                task: Box::new(self.clone()),
                code: result.exit_code,
            })
        }
    }
}

impl Renderable for Task {
    fn template_slots(&mut self) -> Vec<&mut String> {
        let mut slots: Vec<&mut String> = match &mut self.command {
            CommandLine::Shell(cmd) => vec![cmd],
            CommandLine::Argv(argv) => argv.iter_mut().collect(),
        };
        slots.extend(self.env.values_mut());
        slots
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)
    }
}
