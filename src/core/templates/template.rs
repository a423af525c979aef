//! A named template definition loaded from disk

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::manifest::{Descriptor, FileOptions, adopt_legacy_descriptor};
use super::metadata::{META_FILE, Metadata, SourceType, now};
use crate::core::error::{Error, Result};
use crate::core::fields::Field;
use crate::core::fs::{copy_dir_all, is_symlink, list_files, remove_tree, resolve};
use crate::core::shell::{CommandExecutor, Invocation};
use crate::core::tasks::{Hook, Task};

/// Upper bound for version-control commands
pub const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// A template below a repository root.
///
/// Constructing a `Template` does not touch the disk; call [`Template::load`]
/// to read the descriptor and metadata.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    path: PathBuf,
    repository_root: PathBuf,

    /// Fields in descriptor order
    pub fields: Vec<Field>,
    /// Per-file options keyed by relative input path
    pub files: BTreeMap<String, FileOptions>,
    /// Files below `template/`, sorted by relative path
    pub templates: Vec<String>,
    /// Files below `includes/`, sorted by relative path
    pub includes: Vec<String>,
    /// Static context entries
    pub context: Map<String, Value>,
    pub tasks: BTreeMap<Hook, Vec<Task>>,
    pub meta: Metadata,
}

impl Template {
    /// The template `name` installed in the repository at `repository_root`
    pub fn new(name: impl Into<String>, repository_root: impl AsRef<Path>) -> Self {
        let name = name.into();
        let repository_root = repository_root.as_ref().to_path_buf();
        let path = repository_root.join(&name);
        Self::with_root(name, path, repository_root)
    }

    /// A template at an arbitrary location, e.g. nested in another
    /// template's `includes/` directory
    pub fn with_root(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        repository_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            repository_root: repository_root.into(),
            fields: Vec::new(),
            files: BTreeMap::new(),
            templates: Vec::new(),
            includes: Vec::new(),
            context: Map::new(),
            tasks: BTreeMap::new(),
            meta: Metadata::default(),
        }
    }

    /// Create and load in one step
    pub async fn open(name: impl Into<String>, repository_root: impl AsRef<Path>) -> Result<Self> {
        let mut template = Self::new(name, repository_root);
        template.load().await?;
        Ok(template)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root directory. Symlinked templates resolve to the link target.
    pub fn root(&self) -> PathBuf {
        if self.is_symlinked() {
            resolve(&self.path).unwrap_or_else(|_| self.path.clone())
        } else {
            self.path.clone()
        }
    }

    /// Root directory as installed, without resolving symlinks
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository_root(&self) -> &Path {
        &self.repository_root
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root().join("template")
    }

    pub fn includes_dir(&self) -> PathBuf {
        self.root().join("includes")
    }

    pub fn meta_file(&self) -> PathBuf {
        self.root().join(META_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Whether the root holds a project descriptor
    pub fn is_project(&self) -> bool {
        self.exists() && Descriptor::locate(&self.path).is_some()
    }

    pub fn is_symlinked(&self) -> bool {
        is_symlink(&self.path)
    }

    /// Read the descriptor, file lists and metadata.
    ///
    /// Loading again replaces everything read before.
    pub async fn load(&mut self) -> Result<()> {
        let root = self.root();
        debug!(template = %self.name, root = %root.display(), "Loading template");

        let descriptor = Descriptor::load_from_dir(&root).await?;

        let fields = descriptor
            .fields
            .iter()
            .map(|(name, def)| Field::from_descriptor(name, def))
            .collect::<Result<Vec<_>>>()?;
        let tasks = descriptor.hook_tasks()?;

        self.fields = fields;
        self.tasks = tasks;
        self.files = descriptor.file_options();
        self.context = descriptor.context;
        self.templates = list_files(&root.join("template"))?;
        self.includes = list_files(&root.join("includes"))?;

        if let Some(meta) = Metadata::load(&root.join(META_FILE)).await? {
            self.meta = meta;
        }
        Ok(())
    }

    /// Write the metadata file
    pub async fn save(&self) -> Result<()> {
        self.meta.save(&self.meta_file()).await
    }

    /// Refresh the template from the source it was installed from.
    ///
    /// GitHub installs are pulled with `git pull --rebase`, local installs are
    /// deleted and copied again from the recorded source directory.
    ///
    /// # Errors
    ///
    /// [`Error::ProjectFileNotFound`] without a metadata file,
    /// [`Error::ProjectConfig`] if the source is unknown or gone.
    pub async fn update(&mut self, executor: &dyn CommandExecutor) -> Result<()> {
        let meta_file = self.meta_file();
        let Some(meta) = Metadata::load(&meta_file).await? else {
            return Err(Error::not_found(format!(
                "Template metafile {} does not exist. Can't read update information.",
                meta_file.display()
            )));
        };
        self.meta = meta;
        let root = self.root();

        match self.meta.source_type()? {
            Some(SourceType::Github) => {
                info!(template = %self.name, "Pulling template from remote");
                run_git(executor, ["pull", "--rebase"], Some(&root)).await?;
            }
            Some(SourceType::Local) => {
                let source = self
                    .meta
                    .source
                    .as_deref()
                    .map(PathBuf::from)
                    .filter(|source| source.is_dir())
                    .ok_or_else(|| {
                        Error::config("Original source directory no longer exists.")
                    })?;
                info!(template = %self.name, source = %source.display(), "Copying template from source");
                remove_tree(&root).await?;
                copy_dir_all(&source, &root).await?;
                adopt_legacy_descriptor(&root).await?;
            }
            None => return Err(Error::config("No source information found.")),
        }

        self.meta.updated = Some(now());
        self.save().await?;
        self.load().await
    }
}

/// Run a git command with the standard timeout
pub(crate) async fn run_git<const N: usize>(
    executor: &dyn CommandExecutor,
    args: [&str; N],
    cwd: Option<&Path>,
) -> Result<()> {
    let mut invocation =
        Invocation::argv(std::iter::once("git").chain(args)).timeout(GIT_TIMEOUT);
    if let Some(cwd) = cwd {
        invocation = invocation.current_dir(cwd);
    }
    let command = invocation.command.to_string();

    let result = executor
        .execute(&invocation)
        .await
        .map_err(|e| Error::command(&command, e.to_string()))?;
    if !result.is_success() {
        return Err(Error::command(
            &command,
            match result.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            },
        ));
    }
    Ok(())
}
