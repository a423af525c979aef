//! Error handling for the parboil template library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! # Examples
//!
//! ```
//! use parboil::core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     Err(Error::config("unknown field type 'slider'"))
//! }
//!
//! assert!(might_fail().is_err());
//! ```

use thiserror::Error;

use crate::core::tasks::Task;

/// Result type for parboil operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for parboil operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A project descriptor, metadata file or install source is missing
    #[error("Project file not found: {0}")]
    ProjectFileNotFound(String),

    /// A template with the same name is already installed
    #[error("Template '{0}' already exists. Delete it first or retry the install with hard=true")]
    ProjectExists(String),

    /// Malformed or unresolvable template configuration
    #[error("Configuration error: {0}")]
    ProjectConfig(String),

    /// The named template is not installed
    #[error("No such template: {0}")]
    NoSuchTemplate(String),

    /// A hook ran but exited unsuccessfully
    #[error("Task failed with {}: {task}", .code.map_or_else(|| "no exit code".to_string(), |c| format!("exit code {c}")))]
    TaskFailed { task: Box<Task>, code: Option<i32> },

    /// A hook could not be started
    #[error("Failed to execute task {task}: {source}")]
    TaskExecution {
        task: Box<Task>,
        #[source]
        source: std::io::Error,
    },

    /// An external helper command (e.g. git) failed
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    /// A required field received no value
    #[error("No value given for required field '{0}'")]
    MissingValue(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ProjectConfig(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create a new file-not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::ProjectFileNotFound(msg.into())
    }

    /// Create a new external command error
    pub fn command<C: Into<String>, M: Into<String>>(command: C, message: M) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }

    /// The task that caused this error, if any
    pub fn task(&self) -> Option<&Task> {
        match self {
            Self::TaskFailed { task, .. } | Self::TaskExecution { task, .. } => Some(task),
            _ => None,
        }
    }
}
