//! Compiling a template into a target directory
//!
//! A [`Project`] binds one loaded [`Template`] to a target directory and a map
//! of prefilled values. [`Project::fill`] resolves the template's fields into
//! the project context, [`Project::compile`] runs the hook tasks and writes
//! the files.
//!
//! ```no_run
//! use parboil::core::project::Project;
//! use parboil::core::prompt::ConsolePrompter;
//! use parboil::core::templates::Repository;
//! use serde_json::Map;
//!
//! # async fn run() -> parboil::core::error::Result<()> {
//! let repository = Repository::new("/home/me/.config/parboil/templates");
//! let template = repository.load_template("hello").await?;
//!
//! let mut project = Project::new(template, "out", Map::new());
//! project.fill(&mut ConsolePrompter::new()).await?;
//! for result in project.compile().await? {
//!     println!("{} -> {}", result.source, result.target);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::{Map, Value, json};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::core::context::Context;
use crate::core::error::{Error, Result};
use crate::core::fields::{Effect, Field, Resolution};
use crate::core::fs::to_slash;
use crate::core::prompt::Prompter;
use crate::core::renderer::{INCLUDES_PREFIX, RenderVars, Renderer};
use crate::core::shell::{CommandExecutor, ShellCommandExecutor};
use crate::core::tasks::Hook;
use crate::core::templates::{Descriptor, Template};

/// Maximum nesting of subprojects
pub const MAX_DEPTH: usize = 16;

/// Something to compile, in order
pub enum Entry {
    /// A file below `template/`, or `includes:<path>` for an include
    File(String),
    /// A filled subproject compiled into the same target directory
    Subproject(Box<Project>),
}

/// What happened to one file during compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Written,
    /// The output exists and the file must not be overwritten
    SkippedExisting,
    /// The content (or the rendered output path) was empty
    SkippedEmpty,
    /// Processing failed; only reported when compiling with `keep_going`
    Failed(String),
}

/// Per-file compile result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub status: FileStatus,
    /// Input name as enumerated by the template
    pub source: String,
    /// Rendered output path relative to the target directory
    pub target: String,
}

impl FileResult {
    fn new(status: FileStatus, source: &str, target: impl Into<String>) -> Self {
        Self {
            status,
            source: source.to_string(),
            target: target.into(),
        }
    }

    /// True if the file was written
    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Written
    }
}

impl fmt::Display for FileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            FileStatus::Written => write!(f, "Created file {}", self.target),
            FileStatus::SkippedExisting => {
                write!(f, "Skipped file {} (file exists)", self.target)
            }
            FileStatus::SkippedEmpty => write!(f, "Skipped file {} (empty)", self.source),
            FileStatus::Failed(reason) => write!(f, "Failed file {}: {reason}", self.source),
        }
    }
}

/// One run of a template into a target directory
pub struct Project {
    template: Template,
    target_dir: PathBuf,
    prefilled: Map<String, Value>,
    context: Context,
    entries: Vec<Entry>,
    renderer: Renderer,
    executor: Arc<dyn CommandExecutor>,
    depth: usize,
    keep_going: bool,
}

impl Project {
    /// Bind a loaded template to `target_dir`
    pub fn new(
        template: Template,
        target_dir: impl Into<PathBuf>,
        prefilled: Map<String, Value>,
    ) -> Self {
        let target_dir = target_dir.into();
        let verbatim = template
            .files
            .iter()
            .filter(|(_, options)| !options.render)
            .map(|(file, _)| file.clone());
        let renderer =
            Renderer::new(template.name(), &template.root(), &target_dir).verbatim(verbatim);
        let entries = template
            .templates
            .iter()
            .cloned()
            .map(Entry::File)
            .collect();
        Self {
            template,
            target_dir,
            prefilled,
            context: Context::new(),
            entries,
            renderer,
            executor: ShellCommandExecutor::shared(),
            depth: 0,
            keep_going: false,
        }
    }

    /// Use `executor` for hook tasks, including those of subprojects
    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Report failing files and continue instead of aborting
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn prefilled(&self) -> &Map<String, Value> {
        &self.prefilled
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Resolve all fields in descriptor order, then the static context.
    pub fn fill<'a>(&'a mut self, prompter: &'a mut dyn Prompter) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            let mut fields = std::mem::take(&mut self.template.fields);
            let result = self.fill_fields(&mut fields, prompter).await;
            self.template.fields = fields;
            result?;
            self.fill_static_context()
        }
        .boxed_local()
    }

    async fn fill_fields(&mut self, fields: &mut [Field], prompter: &mut dyn Prompter) -> Result<()> {
        for field in fields.iter_mut() {
            let vars = RenderVars::new().with(
                "FIELD",
                json!({"name": field.name, "type": field.kind.tag()}),
            );
            self.renderer.render_obj(field, &self.context, &vars)?;

            if !field.is_enabled() {
                info!(field = %field.name, "Skipped field due to failed condition");
                continue;
            }

            let resolution = match self.prefilled.get(&field.name).cloned() {
                Some(value) => {
                    let value = match value {
                        Value::String(text) => Value::String(
                            self.renderer.render_string(&text, &self.context, &vars)?,
                        ),
                        other => other,
                    };
                    info!(field = %field.name, "Used prefilled value");
                    field.accept(value)
                }
                None => field.prompt(prompter)?,
            };
            self.apply(&field.name, resolution, prompter).await?;
        }
        Ok(())
    }

    async fn apply(&mut self, name: &str, resolution: Resolution, prompter: &mut dyn Prompter) -> Result<()> {
        self.context.insert(name, resolution.value);
        for (key, value) in resolution.vars {
            self.context.insert(key, value);
        }

        match resolution.effect {
            Some(Effect::Include { file, filename }) => self.include_file(&file, filename),
            Some(Effect::Subproject { template }) => {
                self.include_subproject(&template, prompter).await
            }
            None => Ok(()),
        }
    }

    fn include_file(&mut self, file: &str, filename: Option<String>) -> Result<()> {
        if !self.template.includes.iter().any(|f| f == file) {
            return Err(Error::config(format!(
                "Include file '{file}' not found in template '{}'",
                self.template.name()
            )));
        }
        debug!(file, "Including file");

        if let Some(filename) = filename {
            let options = self.template.files.entry(file.to_string()).or_default();
            options.filename = Some(filename);
        }
        self.entries
            .push(Entry::File(format!("{INCLUDES_PREFIX}{file}")));
        Ok(())
    }

    async fn include_subproject(&mut self, name: &str, prompter: &mut dyn Prompter) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::config(format!(
                "Subproject '{name}' exceeds the maximum nesting depth of {MAX_DEPTH}"
            )));
        }

        let mut template = self.locate_subtemplate(name);
        template.load().await?;
        info!(template = name, "Including subproject");

        let mut prefilled = self.prefilled.clone();
        prefilled.extend(self.context.flatten());

        let mut child = Project::new(template, self.target_dir.clone(), prefilled)
            .with_executor(Arc::clone(&self.executor))
            .keep_going(self.keep_going);
        child.depth = self.depth + 1;
        child.fill(prompter).await?;

        self.context.push_layer(child.context.flatten());
        self.entries.push(Entry::Subproject(Box::new(child)));
        Ok(())
    }

    /// Nested templates in `includes/<name>` win over installed siblings
    fn locate_subtemplate(&self, name: &str) -> Template {
        let nested = self.template.includes_dir().join(name);
        let repository_root = self.template.repository_root().to_path_buf();
        if Descriptor::locate(&nested).is_some() {
            Template::with_root(name, nested, repository_root)
        } else {
            Template::new(name, repository_root)
        }
    }

    fn fill_static_context(&mut self) -> Result<()> {
        let entries = self.template.context.clone();
        for (key, value) in entries {
            if self.context.contains_key(&key) {
                continue;
            }
            let value = match value {
                Value::String(text) => {
                    Value::String(self.renderer.render_string(&text, &self.context, &RenderVars::new())?)
                }
                other => other,
            };
            self.context.insert(key, value);
        }
        Ok(())
    }

    /// Write all files into the target directory.
    ///
    /// Runs `pre-run` tasks first and `post-run` tasks last. Subprojects are
    /// compiled in place and their results included. Files already written
    /// stay on disk when a later step fails.
    pub fn compile(&mut self) -> LocalBoxFuture<'_, Result<Vec<FileResult>>> {
        async move {
            fs::create_dir_all(&self.target_dir).await?;
            self.execute_tasks(Hook::PreRun).await?;

            let mut results = Vec::new();
            let mut entries = std::mem::take(&mut self.entries);
            let outcome = self.compile_entries(&mut entries, &mut results).await;
            self.entries = entries;
            outcome?;

            self.execute_tasks(Hook::PostRun).await?;
            Ok(results)
        }
        .boxed_local()
    }

    async fn compile_entries(&mut self, entries: &mut [Entry], results: &mut Vec<FileResult>) -> Result<()> {
        for entry in entries.iter_mut() {
            match entry {
                Entry::Subproject(child) => results.extend(child.compile().await?),
                Entry::File(name) => match self.compile_file(name).await {
                    Ok(result) => {
                        debug!(source = %result.source, status = ?result.status, "Compiled file");
                        results.push(result);
                    }
                    Err(e) if self.keep_going => {
                        warn!(file = %name, error = %e, "Failed to compile file");
                        results.push(FileResult::new(FileStatus::Failed(e.to_string()), name, ""));
                    }
                    Err(e) => return Err(e),
                },
            }
        }
        Ok(())
    }

    async fn compile_file(&mut self, name: &str) -> Result<FileResult> {
        let input = name.strip_prefix(INCLUDES_PREFIX).unwrap_or(name);
        let options = self.template.files.get(input).cloned().unwrap_or_default();
        let output = options.filename.clone().unwrap_or_else(|| input.to_string());

        let rel_dir = Path::new(input).parent().map(to_slash).unwrap_or_default();
        let abs_dir = if rel_dir.is_empty() {
            self.target_dir.clone()
        } else {
            self.target_dir.join(&rel_dir)
        };
        let out_name = self
            .target_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let vars = RenderVars::new()
            .boil("RELDIR", rel_dir)
            .boil("ABSDIR", abs_dir.display().to_string())
            .boil("OUTDIR", self.target_dir.display().to_string())
            .boil("OUTNAME", out_name);
        let target = self.renderer.render_string(&output, &self.context, &vars)?;
        let target = target.trim().to_string();
        if target.is_empty() {
            info!(file = name, "Skipped file with empty output path");
            return Ok(FileResult::new(FileStatus::SkippedEmpty, name, target));
        }

        let target_path = self.target_dir.join(&target);
        if target_path.exists() && !options.overwrite {
            info!(file = name, target = %target, "Skipped existing file");
            return Ok(FileResult::new(FileStatus::SkippedExisting, name, target));
        }

        let file_name = Path::new(&target)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let vars = vars.boil("FILENAME", file_name).boil("FILEPATH", target.clone());

        let content = if options.render {
            self.renderer
                .render_file(name, &self.context, &vars)?
                .into_bytes()
        } else {
            fs::read(self.renderer.source_path(name)).await?
        };

        let keep = options
            .keep
            .unwrap_or_else(|| !String::from_utf8_lossy(&content).trim().is_empty());
        if !keep {
            return Ok(FileResult::new(FileStatus::SkippedEmpty, name, target));
        }

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target_path, &content).await?;
        Ok(FileResult::new(FileStatus::Written, name, target))
    }

    /// Run the tasks of `hook` in the target directory.
    ///
    /// Each task is rendered from its definition right before it runs.
    pub async fn execute_tasks(&mut self, hook: Hook) -> Result<()> {
        let tasks = self.template.tasks.get(&hook).cloned().unwrap_or_default();
        let total = tasks.len();

        for (i, mut task) in tasks.into_iter().enumerate() {
            let vars = RenderVars::new()
                .boil("OUTDIR", self.target_dir.display().to_string())
                .with("TASK", json!({"hook": hook.as_str(), "index": i}));
            self.renderer.render_obj(&mut task, &self.context, &vars)?;

            info!("Running {hook} task {} of {total}: {task}", i + 1);
            task.execute(self.executor.as_ref(), &self.target_dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompt::ScriptedPrompter;
    use crate::core::shell::MockCommandExecutor;
    use tempfile::{TempDir, tempdir};
    use tracing_test::traced_test;

    async fn template(files: &[(&str, &str)], descriptor: Value) -> (TempDir, Template) {
        let repo = tempdir().unwrap();
        let root = repo.path().join("test");
        std::fs::create_dir_all(root.join("template")).unwrap();
        std::fs::write(root.join("parboil.json"), descriptor.to_string()).unwrap();
        for (path, content) in files {
            let path = root.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let template = Template::open("test", repo.path()).await.unwrap();
        (repo, template)
    }

    fn prefilled(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fill_prefilled_is_rendered() {
        let (_repo, template) = template(
            &[("template/a.txt", "x")],
            json!({"fields": {"First": "a", "Second": "b"}}),
        )
        .await;
        let mut project = Project::new(
            template,
            "/tmp/unused",
            prefilled(json!({"Second": "{{ First }}-2"})),
        );
        project
            .fill(&mut ScriptedPrompter::new(["one"]))
            .await
            .unwrap();
        assert_eq!(project.context().get("First"), Some(&json!("one")));
        assert_eq!(project.context().get("Second"), Some(&json!("one-2")));
        assert!(logs_contain("Used prefilled value"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fill_skips_failed_condition() {
        let (_repo, template) = template(
            &[],
            json!({"fields": {
                "Docs": false,
                "DocsTool": {"default": "mkdocs", "condition": "{{ Docs }}"}
            }}),
        )
        .await;
        let mut project = Project::new(template, "/tmp/unused", Map::new());
        let mut prompter = ScriptedPrompter::defaults();
        project.fill(&mut prompter).await.unwrap();
        assert_eq!(project.context().get("Docs"), Some(&json!(false)));
        assert!(project.context().get("DocsTool").is_none());
        assert_eq!(prompter.questions().len(), 1);
        assert!(logs_contain("Skipped field due to failed condition"));
    }

    #[tokio::test]
    async fn test_later_fields_see_earlier_values() {
        let (_repo, template) = template(
            &[],
            json!({"fields": {
                "Name": "World",
                "Module": "{{ Name | fileify }}"
            }}),
        )
        .await;
        let mut project = Project::new(template, "/tmp/unused", Map::new());
        project
            .fill(&mut ScriptedPrompter::new(["My Project", ""]))
            .await
            .unwrap();
        assert_eq!(project.context().get("Module"), Some(&json!("my_project")));
    }

    #[tokio::test]
    async fn test_static_context_does_not_override_fields() {
        let (_repo, template) = template(
            &[],
            json!({
                "fields": {"Name": "World"},
                "context": {"Name": "static", "Greeting": "Hello {{ Name }}", "Answer": 42}
            }),
        )
        .await;
        let mut project = Project::new(template, "/tmp/unused", Map::new());
        project.fill(&mut ScriptedPrompter::defaults()).await.unwrap();
        assert_eq!(project.context().get("Name"), Some(&json!("World")));
        assert_eq!(project.context().get("Greeting"), Some(&json!("Hello World")));
        assert_eq!(project.context().get("Answer"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_compile_options() {
        let (_repo, template) = template(
            &[
                ("template/empty.txt", "{% if false %}x{% endif %}  \n"),
                ("template/kept.txt", "   "),
                ("template/raw.txt", "{{ not rendered }}"),
                ("template/sub/{{ Name }}.txt", "{{ BOIL.RELDIR }}|{{ BOIL.FILENAME }}"),
            ],
            json!({
                "fields": {"Name": "World"},
                "files": {
                    "kept.txt": {"keep": true},
                    "raw.txt": {"render": false},
                    "sub/{{ Name }}.txt": "sub/{{ Name | lower }}.md"
                }
            }),
        )
        .await;

        let out = tempdir().unwrap();
        let mut project = Project::new(template, out.path(), Map::new());
        project.fill(&mut ScriptedPrompter::defaults()).await.unwrap();
        let results = project.compile().await.unwrap();

        let status = |source: &str| {
            results
                .iter()
                .find(|r| r.source == source)
                .map(|r| r.status.clone())
                .unwrap()
        };
        assert_eq!(status("empty.txt"), FileStatus::SkippedEmpty);
        assert_eq!(status("kept.txt"), FileStatus::Written);
        assert_eq!(status("raw.txt"), FileStatus::Written);
        assert!(!out.path().join("empty.txt").exists());
        assert_eq!(
            std::fs::read_to_string(out.path().join("raw.txt")).unwrap(),
            "{{ not rendered }}"
        );
        assert_eq!(
            std::fs::read_to_string(out.path().join("sub/world.md")).unwrap(),
            "sub|world.md"
        );
    }

    #[tokio::test]
    async fn test_boil_path_variables() {
        let (_repo, template) = template(
            &[(
                "template/docs/info.txt",
                "{{ BOIL.RELDIR }}|{{ BOIL.ABSDIR }}|{{ BOIL.OUTDIR }}|{{ BOIL.OUTNAME }}|\
                 {{ BOIL.FILENAME }}|{{ BOIL.FILEPATH }}|{{ BOIL.TPLNAME }}|{{ BOIL.RUNTIME }}",
            )],
            json!({"files": {"docs/info.txt": "docs/about.txt"}}),
        )
        .await;

        let out = tempdir().unwrap();
        let target = out.path().join("generated");
        let mut project = Project::new(template, &target, Map::new());
        project.fill(&mut ScriptedPrompter::defaults()).await.unwrap();
        project.compile().await.unwrap();

        let content = std::fs::read_to_string(target.join("docs/about.txt")).unwrap();
        let parts: Vec<&str> = content.split('|').collect();
        let runtime = std::env::current_exe().unwrap().display().to_string();
        assert_eq!(
            parts,
            [
                "docs",
                target.join("docs").display().to_string().as_str(),
                target.display().to_string().as_str(),
                "generated",
                "about.txt",
                "docs/about.txt",
                "test",
                runtime.as_str(),
            ]
        );
    }

    #[tokio::test]
    async fn test_render_error_propagates_or_is_reported() {
        let files = [
            ("template/a.txt", "{{ Missing.attribute }}"),
            ("template/b.txt", "fine"),
        ];

        let (_repo, tpl) = template(&files, json!({})).await;
        let out = tempdir().unwrap();
        let mut project = Project::new(tpl, out.path(), Map::new());
        project.fill(&mut ScriptedPrompter::defaults()).await.unwrap();
        assert!(project.compile().await.is_err());
        assert!(!out.path().join("b.txt").exists());

        let (_repo, tpl) = template(&files, json!({})).await;
        let out = tempdir().unwrap();
        let mut project = Project::new(tpl, out.path(), Map::new()).keep_going(true);
        project.fill(&mut ScriptedPrompter::defaults()).await.unwrap();
        let results = project.compile().await.unwrap();
        assert!(matches!(results[0].status, FileStatus::Failed(_)));
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_file_select_include_with_filename() {
        let (_repo, template) = template(
            &[
                ("template/main.txt", "main"),
                ("includes/licenses/mit.txt", "MIT {{ Year }}"),
                ("includes/licenses/gpl.txt", "GPL {{ Year }}"),
            ],
            json!({
                "fields": {
                    "Year": "2024",
                    "License": {"type": "file_select", "choices": ["licenses/mit.txt", "licenses/gpl.txt"], "filename": "LICENSE"}
                }
            }),
        )
        .await;
        let out = tempdir().unwrap();
        let mut project = Project::new(template, out.path(), Map::new());
        project
            .fill(&mut ScriptedPrompter::new(["", "2"]))
            .await
            .unwrap();
        let results = project.compile().await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].source, "includes:licenses/gpl.txt");
        assert_eq!(results[1].target, "LICENSE");
        assert_eq!(
            std::fs::read_to_string(out.path().join("LICENSE")).unwrap(),
            "GPL 2024"
        );
    }

    #[tokio::test]
    async fn test_tasks_run_in_target_with_rendered_commands() {
        let (_repo, template) = template(
            &[("template/a.txt", "a")],
            json!({
                "fields": {"Name": "World"},
                "tasks": {
                    "pre-run": ["echo {{ Name }}"],
                    "post-run": [["touch", "{{ Name }}.done"]]
                }
            }),
        )
        .await;
        let out = tempdir().unwrap();
        let executor = Arc::new(MockCommandExecutor::new());
        let mut project =
            Project::new(template, out.path(), Map::new()).with_executor(executor.clone());
        project.fill(&mut ScriptedPrompter::defaults()).await.unwrap();
        project.compile().await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].command.to_string(), "echo World");
        assert_eq!(calls[1].command.to_string(), "touch World.done");
        assert_eq!(calls[1].working_dir.as_deref(), Some(out.path()));
        // the definitions stay unrendered
        assert_eq!(
            project.template().tasks[&Hook::PreRun][0].to_string(),
            "echo {{ Name }}"
        );
    }

    #[tokio::test]
    async fn test_failing_task_aborts_compile() {
        let (_repo, template) = template(
            &[("template/a.txt", "a")],
            json!({"tasks": {"pre-run": ["exit 1"]}}),
        )
        .await;
        let out = tempdir().unwrap();
        let mut project = Project::new(template, out.path(), Map::new());
        project.fill(&mut ScriptedPrompter::defaults()).await.unwrap();
        let err = project.compile().await.unwrap_err();
        assert!(matches!(err, Error::TaskFailed { .. }));
        assert!(!out.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_subproject() {
        let (_repo, template) = template(
            &[],
            json!({"fields": {"Docs": {"type": "project", "template": "nowhere"}}}),
        )
        .await;
        let mut project = Project::new(template, "/tmp/unused", Map::new());
        let err = project
            .fill(&mut ScriptedPrompter::defaults())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ProjectFileNotFound(_)));
    }
}
