//! boil CLI entrypoint
//! Parses command-line arguments and dispatches to the parboil core.
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use parboil::core::config::{Config, EnvConfigReader};
use parboil::core::project::{FileStatus, Project};
use parboil::core::prompt::{ConsolePrompter, Prompter, ScriptedPrompter};
use parboil::core::templates::{InstallOptions, Repository};
use parboil::core::utils::parse_answer;

/// `user/repo` shorthand for GitHub repositories
static GITHUB_SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("valid regex"));

const EXIT_FAILURE: u8 = 1;
const EXIT_NO_TEMPLATE: u8 = 2;

#[derive(Parser)]
#[command(name = "boil")]
#[command(author, version, about = "Generate projects from reusable boilerplate templates", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.config/parboil/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Template repository directory
    #[arg(long, global = true)]
    tpldir: Option<PathBuf>,

    /// Print debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List installed templates
    List {
        /// Print one template name per line
        #[arg(short, long)]
        plain: bool,
    },
    /// Install a template from a directory or a GitHub repository
    Install {
        /// Local directory, GitHub URL or `user/repo` with --download
        source: String,
        /// Name of the installed template; defaults to the last path segment
        template: Option<String>,
        /// Replace an installed template without asking
        #[arg(short, long)]
        force: bool,
        /// Clone the source with git
        #[arg(short, long)]
        download: bool,
        /// Treat the source as a folder of templates
        #[arg(short, long)]
        repo: bool,
        /// Link the source directory instead of copying it
        #[arg(short, long)]
        symlink: bool,
    },
    /// Remove an installed template
    Uninstall {
        template: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Update a template from the source it was installed from
    Update { template: String },
    /// Generate a project from a template
    Use {
        template: String,
        /// Output directory
        out: Option<PathBuf>,
        /// Clear the output directory first
        #[arg(long)]
        hard: bool,
        /// Prefill a field value
        #[arg(short = 'v', long = "value", num_args = 2, value_names = ["KEY", "VALUE"])]
        values: Vec<String>,
        /// Use defaults instead of prompting
        #[arg(long)]
        no_input: bool,
        /// Continue with the remaining files when a file fails
        #[arg(long)]
        keep_going: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::resolve(&EnvConfigReader, cli.config.as_deref(), cli.tpldir.as_deref())
        .context("Failed to load configuration")?;
    debug!(tpldir = %config.tpldir.display(), "Using template repository");
    let mut repository = Repository::new(&config.tpldir);

    match cli.command {
        Commands::List { plain } => list(&repository, plain).await,
        Commands::Install {
            source,
            template,
            force,
            download,
            repo,
            symlink,
        } => {
            let options = InstallOptions::default().repo(repo).symlink(symlink);
            install(&mut repository, &source, template, force, download, options).await
        }
        Commands::Uninstall { template, force } => {
            uninstall(&mut repository, &template, force).await
        }
        Commands::Update { template } => update(&repository, &template).await,
        Commands::Use {
            template,
            out,
            hard,
            values,
            no_input,
            keep_going,
        } => {
            let mut prefilled = config.prefilled.clone();
            prefilled.extend(parse_values(&values));
            let out = out.unwrap_or_else(|| PathBuf::from("."));
            use_template(&repository, &template, &out, hard, prefilled, no_input, keep_going).await
        }
    }
}

async fn list(repository: &Repository, plain: bool) -> anyhow::Result<ExitCode> {
    if !repository.exists() {
        eprintln!(
            "Template folder {} does not exist.",
            repository.root().display()
        );
        return Ok(ExitCode::from(EXIT_FAILURE));
    }

    if plain {
        for name in repository.list() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    if repository.is_empty() {
        println!("No templates installed.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Installed templates:");
    println!("  {:<24} {:<18} {:<18}", "NAME", "CREATED", "UPDATED");
    for mut template in repository.templates() {
        if let Err(e) = template.load().await {
            println!("  {:<24} (broken: {e})", template.name());
            continue;
        }
        if template.is_symlinked() {
            println!("  {:<24} {:<18} {:<18}", format!("*{}", template.name()), "-", "-");
            continue;
        }
        let created = template
            .meta
            .created_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let updated = template
            .meta
            .updated_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".into());
        println!("  {:<24} {created:<18} {updated:<18}", template.name());
    }
    Ok(ExitCode::SUCCESS)
}

async fn install(
    repository: &mut Repository,
    source: &str,
    template: Option<String>,
    force: bool,
    download: bool,
    mut options: InstallOptions,
) -> anyhow::Result<ExitCode> {
    let github = Url::parse(source)
        .ok()
        .filter(|url| url.host_str() == Some("github.com"));
    let download = download || github.is_some();

    let source = if download && github.is_none() && GITHUB_SHORTHAND.is_match(source) {
        format!("https://github.com/{source}.git")
    } else {
        source.to_string()
    };

    let name = match template {
        Some(name) => name,
        None => default_name(&source)
            .with_context(|| format!("Cannot derive a template name from {source}"))?,
    };

    if force {
        options = options.hard(true);
    } else if !options.is_repo && repository.is_installed(&name) {
        let question = format!("Template {name} already exists. Do you want to overwrite it?");
        if !confirm(&mut ConsolePrompter::new(), &question)? {
            println!("Aborted.");
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
        options = options.hard(true);
    }

    let installed = if download {
        info!(url = %source, "Installing from GitHub");
        repository
            .install_from_github(&name, &source, options)
            .await
            .with_context(|| format!("Failed to install {source}"))?
    } else {
        repository
            .install_from_directory(&name, Path::new(&source), options)
            .await
            .with_context(|| format!("Failed to install {source}"))?
    };

    if installed.is_empty() {
        println!("No templates installed from {source}.");
    }
    for template in installed {
        println!("Installed template {}", template.name());
    }
    Ok(ExitCode::SUCCESS)
}

async fn uninstall(repository: &mut Repository, name: &str, force: bool) -> anyhow::Result<ExitCode> {
    if !repository.is_installed(name) {
        eprintln!("Template {name} is not installed.");
        return Ok(ExitCode::from(EXIT_NO_TEMPLATE));
    }

    if !force {
        let question = format!("Do you really want to uninstall template {name}?");
        if !confirm(&mut ConsolePrompter::new(), &question)? {
            println!("Aborted.");
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    }

    repository
        .uninstall(name)
        .await
        .with_context(|| format!("Failed to uninstall {name}"))?;
    println!("Uninstalled template {name}");
    Ok(ExitCode::SUCCESS)
}

async fn update(repository: &Repository, name: &str) -> anyhow::Result<ExitCode> {
    if !repository.is_installed(name) {
        eprintln!("Template {name} is not installed.");
        return Ok(ExitCode::from(EXIT_NO_TEMPLATE));
    }

    let mut template = repository
        .load_template(name)
        .await
        .with_context(|| format!("Failed to load template {name}"))?;
    template
        .update(repository.executor().as_ref())
        .await
        .with_context(|| format!("Failed to update template {name}"))?;
    println!("Updated template {name}");
    Ok(ExitCode::SUCCESS)
}

async fn use_template(
    repository: &Repository,
    name: &str,
    out: &Path,
    hard: bool,
    prefilled: Map<String, Value>,
    no_input: bool,
    keep_going: bool,
) -> anyhow::Result<ExitCode> {
    if !repository.is_installed(name) {
        eprintln!("Template {name} is not installed.");
        return Ok(ExitCode::from(EXIT_NO_TEMPLATE));
    }

    let template = repository
        .load_template(name)
        .await
        .with_context(|| format!("Failed to load template {name}"))?;

    if hard && out.is_dir() {
        clear_dir(out)
            .await
            .with_context(|| format!("Failed to clear {}", out.display()))?;
    }

    let mut project = Project::new(template, out, prefilled)
        .with_executor(repository.executor())
        .keep_going(keep_going);

    let filled = if no_input {
        project.fill(&mut ScriptedPrompter::defaults()).await
    } else {
        project.fill(&mut ConsolePrompter::new()).await
    };
    filled.context("Failed to resolve template fields")?;

    let results = project
        .compile()
        .await
        .with_context(|| format!("Failed to compile template {name}"))?;

    for result in &results {
        println!("{result}");
    }
    if results
        .iter()
        .any(|r| matches!(r.status, FileStatus::Failed(_)))
    {
        return Ok(ExitCode::from(EXIT_FAILURE));
    }
    println!("Generated project from {name} in {}", out.display());
    Ok(ExitCode::SUCCESS)
}

/// Pairs of `-v KEY VALUE`
fn parse_values(values: &[String]) -> Map<String, Value> {
    values
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), Value::String(pair[1].clone())))
        .collect()
}

/// Last path or URL segment without a `.git` suffix
fn default_name(source: &str) -> Option<String> {
    let segment = source
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()?;
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

fn confirm(prompter: &mut dyn Prompter, question: &str) -> anyhow::Result<bool> {
    loop {
        match prompter.ask(question, Some("n"))? {
            None => return Ok(false),
            Some(answer) if answer.trim().is_empty() => return Ok(false),
            Some(answer) => match parse_answer(&answer) {
                Some(yes) => return Ok(yes),
                None => prompter.say("Please answer yes or no"),
            },
        }
    }
}

async fn clear_dir(dir: &Path) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}
