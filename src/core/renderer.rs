//! Tera-based renderer for template files, paths and templated attributes
//!
//! Each renderer serves one template. Files below the template's `template/`
//! directory are addressed by their relative path, files below `includes/` by
//! the same path prefixed with `includes:`. Both namespaces live in one Tera
//! instance so templates can `{% include %}` each other.
//!
//! Every render sees:
//! - the project context (all layers, higher priority winning),
//! - per-call extra variables,
//! - `ENV`: a snapshot of the process environment taken at construction,
//! - `PROJECT`: name, root and target directory of the project,
//! - `BOIL`: `TPLNAME`, `RUNTIME` and any per-file values such as `RELDIR`,
//!   `ABSDIR`, `OUTDIR`, `OUTNAME`, `FILENAME` and `FILEPATH`.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tera::Tera;
use tracing::debug;

use crate::core::context::Context;
use crate::core::error::{Error, Result};
use crate::core::fs::list_files;
use crate::core::utils::{fileify, slugify, to_roman};

/// Largest number the `roman` filter converts
const MAX_ROMAN: u64 = 3999;

/// Name prefix that selects the `includes/` namespace
pub const INCLUDES_PREFIX: &str = "includes:";

/// An object with templated string attributes.
///
/// The renderer renders every slot in order and writes the result back into
/// the same slot. Fields and tasks share this single re-rendering mechanism
/// regardless of how many templated attributes they have.
pub trait Renderable {
    fn template_slots(&mut self) -> Vec<&mut String>;
}

/// Per-call variables layered over the project context
#[derive(Debug, Clone, Default)]
pub struct RenderVars {
    pub boil: Map<String, Value>,
    pub extra: Map<String, Value>,
}

impl RenderVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the `BOIL` namespace
    pub fn boil(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.boil.insert(key.to_string(), value.into());
        self
    }

    /// Add a top-level variable
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Renders strings, files and renderable objects for one template
pub struct Renderer {
    tera: Tera,
    template_name: String,
    templates_dir: PathBuf,
    includes_dir: PathBuf,
    environ: Map<String, Value>,
    project: Value,
    runtime: String,
    /// Files copied byte for byte; never registered with Tera
    verbatim: BTreeSet<String>,
    loaded: bool,
}

impl Renderer {
    /// Create a renderer for the template rooted at `root`.
    ///
    /// Template files are registered on first use. A file that does not
    /// register cleanly (invalid UTF-8, syntax error, missing parent in an
    /// `extends` chain) is left out and cannot affect other renders;
    /// rendering it later reports the actual error.
    pub fn new(template_name: &str, root: &Path, target_dir: &Path) -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter("fileify", fileify_filter);
        tera.register_filter("slugify", slugify_filter);
        tera.register_filter("roman", roman_filter);

        let environ = std::env::vars()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let runtime = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Self {
            tera,
            template_name: template_name.to_string(),
            templates_dir: root.join("template"),
            includes_dir: root.join("includes"),
            environ,
            project: json!({
                "name": template_name,
                "root": root.display().to_string(),
                "target_dir": target_dir.display().to_string(),
            }),
            runtime,
            verbatim: BTreeSet::new(),
            loaded: false,
        }
    }

    /// Exclude files (paths relative to `template/` or `includes/`) from
    /// registration because they are copied without rendering
    pub fn verbatim<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.verbatim.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Path on disk of a template name, honouring the `includes:` prefix
    pub fn source_path(&self, name: &str) -> PathBuf {
        match name.strip_prefix(INCLUDES_PREFIX) {
            Some(include) => self.includes_dir.join(include),
            None => self.templates_dir.join(name),
        }
    }

    /// Render `text` as a template
    pub fn render_string(&mut self, text: &str, context: &Context, vars: &RenderVars) -> Result<String> {
        if !is_templated(text) {
            return Ok(text.to_string());
        }
        self.ensure_loaded();
        let ctx = self.tera_context(context, vars);
        self.tera
            .render_str(text, &ctx)
            .map_err(|e| Error::template(format!("Failed to render '{text}': {}", error_chain(&e))))
    }

    /// Render the file registered as `name` (a relative path, optionally
    /// prefixed with `includes:`)
    pub fn render_file(&mut self, name: &str, context: &Context, vars: &RenderVars) -> Result<String> {
        self.ensure_loaded();
        if !self.is_registered(name) {
            let path = self.source_path(name);
            debug!(template = name, path = %path.display(), "Loading template file on demand");
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::template(format!("Failed to read template file {}: {e}", path.display()))
            })?;
            self.register(name, &content).map_err(|e| {
                Error::template(format!("Failed to parse template '{name}': {}", error_chain(&e)))
            })?;
        }

        let ctx = self.tera_context(context, vars);
        self.tera
            .render(name, &ctx)
            .map_err(|e| Error::template(format!("Failed to render template '{name}': {}", error_chain(&e))))
    }

    /// Re-render every templated slot of `obj` in place
    pub fn render_obj(
        &mut self,
        obj: &mut dyn Renderable,
        context: &Context,
        vars: &RenderVars,
    ) -> Result<()> {
        for slot in obj.template_slots() {
            let rendered = self.render_string(slot, context, vars)?;
            *slot = rendered;
        }
        Ok(())
    }

    fn is_registered(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Tera keeps a template that fails to link, so registration happens on
    /// a copy that only replaces the live instance on success
    fn register(&mut self, name: &str, content: &str) -> tera::Result<()> {
        let mut candidate = self.tera.clone();
        candidate.add_raw_template(name, content)?;
        self.tera = candidate;
        Ok(())
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let mut names = Vec::new();
        match list_files(&self.templates_dir) {
            Ok(files) => names.extend(files),
            Err(e) => debug!(error = %e, "Failed to list template files"),
        }
        match list_files(&self.includes_dir) {
            Ok(files) => names.extend(files.into_iter().map(|f| format!("{INCLUDES_PREFIX}{f}"))),
            Err(e) => debug!(error = %e, "Failed to list include files"),
        }

        let mut sources = Vec::with_capacity(names.len());
        for name in names {
            let relative = name.strip_prefix(INCLUDES_PREFIX).unwrap_or(&name);
            if self.verbatim.contains(relative) {
                continue;
            }
            match std::fs::read_to_string(self.source_path(&name)) {
                Ok(content) => sources.push((name, content)),
                Err(_) => debug!(template = %name, "Skipping non-text template file"),
            }
        }

        // batch first so `extends` chains resolve in any order
        let mut batch = self.tera.clone();
        if batch.add_raw_templates(sources.clone()).is_ok() {
            self.tera = batch;
            return;
        }

        // one at a time; a child may need a parent registered in a later pass
        let mut pending = sources;
        loop {
            let before = pending.len();
            pending.retain(|(name, content)| self.register(name, content).is_err());
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }
        for (name, _) in &pending {
            debug!(template = %name, "Template file not registered");
        }
    }

    fn tera_context(&self, context: &Context, vars: &RenderVars) -> tera::Context {
        let mut ctx = tera::Context::new();
        for (key, value) in context.flatten() {
            ctx.insert(key, &value);
        }
        for (key, value) in &vars.extra {
            ctx.insert(key.as_str(), value);
        }

        let mut boil = vars.boil.clone();
        boil.insert("TPLNAME".into(), Value::String(self.template_name.clone()));
        boil.insert("RUNTIME".into(), Value::String(self.runtime.clone()));

        ctx.insert("BOIL", &boil);
        ctx.insert("ENV", &self.environ);
        ctx.insert("PROJECT", &self.project);
        ctx
    }
}

fn is_templated(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Tera nests the interesting part of an error in its sources
fn error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

fn fileify_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("fileify", "value", String, value);
    Ok(Value::String(fileify(&s)))
}

fn slugify_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("slugify", "value", String, value);
    Ok(Value::String(slugify(&s)))
}

fn roman_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let n = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .filter(|n| (1..=MAX_ROMAN).contains(n))
    .ok_or_else(|| {
        tera::Error::msg(format!(
            "Filter `roman` expects an integer between 1 and {MAX_ROMAN}, got {value}"
        ))
    })?;
    Ok(Value::String(to_roman(n)))
}
