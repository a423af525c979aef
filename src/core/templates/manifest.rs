//! Project descriptor format.
//!
//! Every template root carries a `parboil.json` describing its fields, per-file
//! options, hook tasks and static context. `parboil.yml` / `parboil.yaml` are
//! accepted as an alternative encoding, and install sources may still use the
//! legacy `project.json` name.
//!
//! ```json
//! {
//!     "fields": {
//!         "Name": "World",
//!         "License": ["MIT", "GPL"],
//!         "Tests": true
//!     },
//!     "files": {
//!         "README.md": "{{ Name | fileify }}.md",
//!         "LICENSE": { "overwrite": false }
//!     },
//!     "tasks": {
//!         "post-run": ["git init", ["git", "add", "."]]
//!     },
//!     "context": { "Year": "2024" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::debug;

use crate::core::error::{Error, Result};
use crate::core::shell::CommandLine;
use crate::core::tasks::{Hook, Task};

/// Name of the descriptor file in a template root
pub const DESCRIPTOR_FILE: &str = "parboil.json";

/// Alternative descriptor encodings, checked in order after [`DESCRIPTOR_FILE`]
pub const DESCRIPTOR_ALTERNATIVES: &[&str] = &["parboil.yml", "parboil.yaml"];

/// Descriptor name used by older templates
pub const LEGACY_DESCRIPTOR_FILE: &str = "project.json";

/// Parsed project descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Descriptor {
    /// Field definitions in declaration order
    #[serde(default)]
    pub fields: Map<String, Value>,

    /// Per-file options keyed by path relative to `template/` (or `includes/`)
    #[serde(default)]
    pub files: BTreeMap<String, FileDef>,

    /// Hook name to task definitions
    #[serde(default)]
    pub tasks: BTreeMap<String, HookDef>,

    /// Static context entries, rendered after all fields are resolved
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// A `files` entry: either an output filename or the full option object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileDef {
    Filename(String),
    Options(FileOptions),
}

impl From<FileDef> for FileOptions {
    fn from(def: FileDef) -> Self {
        match def {
            FileDef::Filename(filename) => FileOptions {
                filename: Some(filename),
                ..Default::default()
            },
            FileDef::Options(options) => options,
        }
    }
}

/// Options controlling how a single file is compiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOptions {
    /// Output path template, relative to the target directory
    #[serde(default)]
    pub filename: Option<String>,

    /// Render the content; otherwise the file is copied verbatim
    #[serde(default = "default_true")]
    pub render: bool,

    /// Force (`true`) or suppress (`false`) writing regardless of content
    #[serde(default)]
    pub keep: Option<bool>,

    /// Replace an existing output file
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            filename: None,
            render: true,
            keep: None,
            overwrite: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Tasks of one hook: a list of tasks or a single task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookDef {
    Many(Vec<TaskDef>),
    One(TaskDef),
}

/// A single task definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskDef {
    /// Shell command line
    Shell(String),
    /// Program and arguments
    Argv(Vec<String>),
    /// Explicit object form
    Full {
        cmd: CommandDef,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default)]
        quiet: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandDef {
    Shell(String),
    Argv(Vec<String>),
}

impl TaskDef {
    pub fn into_task(self) -> Result<Task> {
        let (command, env, quiet) = match self {
            TaskDef::Shell(cmd) => (CommandDef::Shell(cmd), BTreeMap::new(), false),
            TaskDef::Argv(argv) => (CommandDef::Argv(argv), BTreeMap::new(), false),
            TaskDef::Full { cmd, env, quiet } => (cmd, env, quiet),
        };

        let command = match command {
            CommandDef::Shell(cmd) if cmd.trim().is_empty() => {
                return Err(Error::config("Task command must not be empty"));
            }
            CommandDef::Argv(argv) if argv.is_empty() => {
                return Err(Error::config("Task argument list must not be empty"));
            }
            CommandDef::Shell(cmd) => CommandLine::Shell(cmd),
            CommandDef::Argv(argv) => CommandLine::Argv(argv),
        };

        Ok(Task {
            command,
            env,
            quiet,
        })
    }
}

impl Descriptor {
    /// Find the descriptor file in `dir`, including the legacy name
    pub fn locate(dir: &Path) -> Option<PathBuf> {
        std::iter::once(DESCRIPTOR_FILE)
            .chain(DESCRIPTOR_ALTERNATIVES.iter().copied())
            .chain(std::iter::once(LEGACY_DESCRIPTOR_FILE))
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the descriptor of the template rooted at `dir`.
    ///
    /// # Errors
    ///
    /// [`Error::ProjectFileNotFound`] if no descriptor exists,
    /// [`Error::ProjectConfig`] if it cannot be parsed.
    pub async fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = Self::locate(dir).ok_or_else(|| {
            Error::not_found(format!("No {DESCRIPTOR_FILE} found in {}", dir.display()))
        })?;

        debug!(descriptor = %path.display(), "Reading project descriptor");
        let content = fs::read_to_string(&path).await?;
        Self::parse(&path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml");

        let parsed: std::result::Result<Self, String> = if is_yaml {
            serde_yaml::from_str(content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(content).map_err(|e| e.to_string())
        };
        parsed.map_err(|e| {
            Error::config(format!("Malformed project file {}: {e}", path.display()))
        })
    }

    /// Task lists for both hooks, in declaration order
    pub fn hook_tasks(&self) -> Result<BTreeMap<Hook, Vec<Task>>> {
        let mut tasks: BTreeMap<Hook, Vec<Task>> =
            Hook::all().iter().map(|hook| (*hook, Vec::new())).collect();

        for (name, def) in &self.tasks {
            let hook: Hook = name.parse()?;
            let defs = match def.clone() {
                HookDef::Many(defs) => defs,
                HookDef::One(def) => vec![def],
            };
            let list = tasks.entry(hook).or_default();
            for def in defs {
                list.push(def.into_task()?);
            }
        }
        Ok(tasks)
    }

    /// File options with shorthands expanded
    pub fn file_options(&self) -> BTreeMap<String, FileOptions> {
        self.files
            .iter()
            .map(|(path, def)| (path.clone(), def.clone().into()))
            .collect()
    }
}

/// Rename a legacy `project.json` in an installed copy to the current name
pub async fn adopt_legacy_descriptor(dir: &Path) -> Result<()> {
    let legacy = dir.join(LEGACY_DESCRIPTOR_FILE);
    let current = dir.join(DESCRIPTOR_FILE);
    if legacy.is_file() && !current.exists() {
        debug!(template = %dir.display(), "Renaming legacy project descriptor");
        fs::rename(&legacy, &current).await?;
    }
    Ok(())
}
