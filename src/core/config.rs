//! Runtime configuration
//!
//! Values are resolved from, lowest to highest precedence: built-in defaults,
//! the JSON config file, the environment and explicit overrides from the
//! command line.
//!
//! ```json
//! {
//!     "TPLDIR": "~/templates",
//!     "prefilled": { "Author": "Jane Doe" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::error::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "BOIL_CONFIG";
/// Environment variable naming the template repository
pub const TPLDIR_ENV: &str = "BOIL_TPLDIR";

/// Access to configuration from the environment
pub trait ConfigReader {
    fn config_file(&self) -> Option<String>;
    fn template_dir(&self) -> Option<String>;
}

/// Reads configuration from process environment variables
pub struct EnvConfigReader;

impl ConfigReader for EnvConfigReader {
    fn config_file(&self) -> Option<String> {
        std::env::var(CONFIG_ENV).ok().filter(|v| !v.is_empty())
    }

    fn template_dir(&self) -> Option<String> {
        std::env::var(TPLDIR_ENV).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed values for tests
#[derive(Debug, Default, Clone)]
pub struct StaticConfigReader {
    pub config_file: Option<String>,
    pub template_dir: Option<String>,
}

impl ConfigReader for StaticConfigReader {
    fn config_file(&self) -> Option<String> {
        self.config_file.clone()
    }

    fn template_dir(&self) -> Option<String> {
        self.template_dir.clone()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(rename = "TPLDIR", alias = "tpldir")]
    tpldir: Option<String>,
    #[serde(default)]
    prefilled: Map<String, Value>,
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the template repository
    pub tpldir: PathBuf,
    /// Values used instead of prompting for fields of the same name
    pub prefilled: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tpldir: config_dir().join("templates"),
            prefilled: Map::new(),
        }
    }
}

impl Config {
    /// Resolve the configuration.
    ///
    /// `config_file` and `tpldir` are explicit overrides (e.g. from the
    /// command line). An explicitly named config file must exist; the default
    /// one is optional.
    pub fn resolve(
        reader: &dyn ConfigReader,
        config_file: Option<&Path>,
        tpldir: Option<&Path>,
    ) -> Result<Self> {
        let mut config = Config::default();

        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| reader.config_file().map(|f| expand_home(&f)));
        let file = match explicit {
            Some(path) if !path.is_file() => {
                return Err(Error::not_found(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => Some(path),
            None => Some(default_config_file()).filter(|p| p.is_file()),
        };

        if let Some(path) = file {
            debug!(config = %path.display(), "Reading config file");
            let content = std::fs::read_to_string(&path)?;
            let parsed: ConfigFile = serde_json::from_str(&content).map_err(|e| {
                Error::config(format!("Malformed config file {}: {e}", path.display()))
            })?;
            if let Some(dir) = parsed.tpldir {
                config.tpldir = expand_home(&dir);
            }
            config.prefilled = parsed.prefilled;
        }

        if let Some(dir) = reader.template_dir() {
            config.tpldir = expand_home(&dir);
        }
        if let Some(dir) = tpldir {
            config.tpldir = dir.to_path_buf();
        }

        debug!(tpldir = %config.tpldir.display(), "Configuration resolved");
        Ok(config)
    }
}

/// `~/.config/parboil`
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("parboil")
}

/// `~/.config/parboil/config.json`
pub fn default_config_file() -> PathBuf {
    config_dir().join("config.json")
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.tpldir.ends_with(".config/parboil/templates"));
        assert!(config.prefilled.is_empty());
    }

    #[test]
    fn test_config_file_values() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(
            &file,
            json!({"TPLDIR": "/srv/templates", "prefilled": {"Author": "Jane"}}).to_string(),
        )
        .unwrap();

        let config = Config::resolve(&StaticConfigReader::default(), Some(&file), None).unwrap();
        assert_eq!(config.tpldir, PathBuf::from("/srv/templates"));
        assert_eq!(config.prefilled["Author"], json!("Jane"));
    }

    #[test]
    fn test_precedence() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, json!({"tpldir": "/from/file"}).to_string()).unwrap();

        let reader = StaticConfigReader {
            config_file: Some(file.display().to_string()),
            template_dir: Some("/from/env".into()),
        };
        let config = Config::resolve(&reader, None, None).unwrap();
        assert_eq!(config.tpldir, PathBuf::from("/from/env"));

        let config = Config::resolve(&reader, None, Some(Path::new("/from/cli"))).unwrap();
        assert_eq!(config.tpldir, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::resolve(
            &StaticConfigReader::default(),
            Some(Path::new("/nonexistent/parboil.json")),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ProjectFileNotFound(_)));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("config.json");
        std::fs::write(&file, "{ nope").unwrap();
        let err = Config::resolve(&StaticConfigReader::default(), Some(&file), None).unwrap_err();
        assert!(matches!(err, Error::ProjectConfig(_)));
    }
}
