//! Catalog of installed templates
//!
//! A repository is a directory whose immediate subdirectories are templates.
//! Only subdirectories holding a project descriptor count as installed
//! templates; anything else in the directory is ignored.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!     <template-name>/
//!         parboil.json     descriptor
//!         .parboil         install metadata
//!         template/        files compiled into the output
//!         includes/        files addressable as `includes:<path>`
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info, warn};

use super::manifest::{Descriptor, adopt_legacy_descriptor};
use super::metadata::{Metadata, SourceType};
use super::template::{Template, run_git};
use crate::core::error::{Error, Result};
use crate::core::fs::{copy_dir_all, remove_tree, resolve, symlink_dir};
use crate::core::shell::{CommandExecutor, ShellCommandExecutor};

/// Options for installing templates
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Replace an already installed template of the same name
    pub hard: bool,
    /// The source is a folder of templates; install every subfolder
    pub is_repo: bool,
    /// Link to the source instead of copying it (local installs only)
    pub symlink: bool,
}

impl InstallOptions {
    pub fn hard(mut self, hard: bool) -> Self {
        self.hard = hard;
        self
    }

    pub fn repo(mut self, is_repo: bool) -> Self {
        self.is_repo = is_repo;
        self
    }

    pub fn symlink(mut self, symlink: bool) -> Self {
        self.symlink = symlink;
        self
    }
}

/// Installed templates below a root directory
pub struct Repository {
    root: PathBuf,
    templates: Vec<String>,
    executor: Arc<dyn CommandExecutor>,
}

impl Repository {
    /// Open the repository at `root`. The directory does not have to exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_executor(root, ShellCommandExecutor::shared())
    }

    /// Open the repository with a custom executor for git commands
    pub fn with_executor(root: impl Into<PathBuf>, executor: Arc<dyn CommandExecutor>) -> Self {
        let mut repository = Self {
            root: root.into(),
            templates: Vec::new(),
            executor,
        };
        repository.load();
        repository
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Rescan the root directory for templates
    pub fn load(&mut self) {
        debug!(root = %self.root.display(), "Loading repository");
        self.templates.clear();

        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && Descriptor::locate(&path).is_some() {
                self.templates
                    .push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        self.templates.sort();
        debug!(templates = ?self.templates, "Repository loaded");
    }

    /// Names of installed templates, sorted
    pub fn list(&self) -> &[String] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Whether a directory named `name` exists in the repository
    pub fn is_installed(&self, name: &str) -> bool {
        self.root.join(name).is_dir()
    }

    /// Handle for the template `name`; nothing is read from disk
    pub fn get_template(&self, name: &str) -> Template {
        Template::new(name, &self.root)
    }

    /// Load the installed template `name`
    pub async fn load_template(&self, name: &str) -> Result<Template> {
        if !self.is_installed(name) {
            return Err(Error::NoSuchTemplate(name.to_string()));
        }
        Template::open(name, &self.root).await
    }

    /// Handles for all installed templates, in name order.
    ///
    /// The handles are not loaded, so listing stays cheap and one broken
    /// descriptor does not hide the others. Call [`Template::load`] on
    /// each handle before reading its fields or metadata.
    pub fn templates(&self) -> impl Iterator<Item = Template> + '_ {
        self.templates.iter().map(|name| self.get_template(name))
    }

    /// Install a template from a local directory.
    ///
    /// With `is_repo`, every subfolder of `source` holding a descriptor is
    /// installed under its own name and `name` is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::ProjectFileNotFound`] if `source` is not a valid template
    /// - [`Error::ProjectExists`] if `name` is installed and `hard` is not set
    pub async fn install_from_directory(
        &mut self,
        name: &str,
        source: &Path,
        options: InstallOptions,
    ) -> Result<Vec<Template>> {
        info!(source = %source.display(), "Installing from directory");
        let result = self.install_local(name, source, options).await;
        self.load();
        result
    }

    /// Install a template by cloning a git repository.
    ///
    /// With `is_repo`, the repository is cloned to a temporary directory and
    /// each template subfolder is installed without source information.
    /// Templates that are already installed are skipped in that mode.
    pub async fn install_from_github(
        &mut self,
        name: &str,
        url: &str,
        options: InstallOptions,
    ) -> Result<Vec<Template>> {
        info!(url, "Installing from git repository");
        let result = if options.is_repo {
            self.install_github_repo(url, options).await
        } else {
            self.install_github_single(name, url, options).await
        };
        self.load();
        result
    }

    /// Remove an installed template
    pub async fn uninstall(&mut self, name: &str) -> Result<()> {
        if !self.is_installed(name) {
            return Err(Error::NoSuchTemplate(name.to_string()));
        }
        remove_tree(&self.root.join(name)).await?;
        info!(template = name, "Uninstalled template");
        self.load();
        Ok(())
    }

    async fn install_local(
        &mut self,
        name: &str,
        source: &Path,
        options: InstallOptions,
    ) -> Result<Vec<Template>> {
        if !source.is_dir() {
            return Err(Error::not_found(format!(
                "Source {} does not exist.",
                source.display()
            )));
        }
        let source = resolve(source)?;

        if !options.is_repo {
            let template = self.install_single(name, &source, options).await?;
            return Ok(vec![template]);
        }

        let mut installed = Vec::new();
        for child in subfolders(&source)? {
            if Descriptor::locate(&child).is_none() {
                debug!(folder = %child.display(), "Skipping folder without descriptor");
                continue;
            }
            let child_name = folder_name(&child);
            match self
                .install_single(&child_name, &child, options.repo(false))
                .await
            {
                Ok(template) => installed.push(template),
                Err(Error::ProjectFileNotFound(reason)) => {
                    warn!(folder = %child.display(), reason, "Subfolder is not a valid template");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(installed)
    }

    async fn install_single(
        &mut self,
        name: &str,
        source: &Path,
        options: InstallOptions,
    ) -> Result<Template> {
        if Descriptor::locate(source).is_none() {
            return Err(Error::not_found(format!(
                "The source {} does not contain a project descriptor.",
                source.display()
            )));
        }
        if !source.join("template").is_dir() {
            return Err(Error::not_found(format!(
                "The source {} does not contain a template directory.",
                source.display()
            )));
        }

        self.make_room(name, options.hard).await?;
        fs::create_dir_all(&self.root).await?;
        let target = self.root.join(name);

        if options.symlink {
            symlink_dir(source, &target).await?;
            info!(template = name, source = %source.display(), "Linked template");
            return Ok(self.get_template(name));
        }

        copy_dir_all(source, &target).await?;
        adopt_legacy_descriptor(&target).await?;

        let mut template = self.get_template(name);
        template.meta = Metadata::installed(SourceType::Local, source.display().to_string());
        template.save().await?;
        info!(template = name, source = %source.display(), "Installed template");
        Ok(template)
    }

    async fn install_github_single(
        &mut self,
        name: &str,
        url: &str,
        options: InstallOptions,
    ) -> Result<Vec<Template>> {
        self.make_room(name, options.hard).await?;
        fs::create_dir_all(&self.root).await?;

        let target = self.root.join(name);
        let target_str = target.display().to_string();
        if let Err(e) = run_git(self.executor.as_ref(), ["clone", url, target_str.as_str()], None).await {
            if target.exists() {
                remove_tree(&target).await?;
            }
            return Err(e);
        }

        let mut template = self.get_template(name);
        if !template.is_project() {
            remove_tree(&target).await?;
            return Err(Error::not_found(format!(
                "The repository {url} does not contain a project descriptor."
            )));
        }
        adopt_legacy_descriptor(&target).await?;

        template.meta = Metadata::installed(SourceType::Github, url);
        template.save().await?;
        info!(template = name, url, "Installed template");
        Ok(vec![template])
    }

    async fn install_github_repo(&mut self, url: &str, options: InstallOptions) -> Result<Vec<Template>> {
        let checkout = TempDir::new()?;
        let checkout_str = checkout.path().display().to_string();
        run_git(self.executor.as_ref(), ["clone", url, checkout_str.as_str()], None).await?;

        let mut installed = Vec::new();
        for child in subfolders(checkout.path())? {
            if Descriptor::locate(&child).is_none() {
                continue;
            }
            let child_name = folder_name(&child);
            match self
                .install_single(&child_name, &child, options.repo(false).symlink(false))
                .await
            {
                Ok(mut template) => {
                    template.meta.clear_source();
                    template.save().await?;
                    installed.push(template);
                }
                Err(Error::ProjectFileNotFound(reason)) => {
                    warn!(folder = %child.display(), reason, "Subfolder is not a valid template");
                }
                Err(Error::ProjectExists(existing)) => {
                    warn!(template = existing, "Template already installed, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(installed)
    }

    /// Fail on an existing install unless `hard`, in which case remove it
    async fn make_room(&self, name: &str, hard: bool) -> Result<()> {
        if !self.is_installed(name) {
            return Ok(());
        }
        if !hard {
            return Err(Error::ProjectExists(name.to_string()));
        }
        remove_tree(&self.root.join(name)).await?;
        debug!(template = name, "Deleted existing template");
        Ok(())
    }
}

/// Immediate subdirectories of `dir`, sorted by name
fn subfolders(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut folders: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    folders.sort();
    Ok(folders)
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
