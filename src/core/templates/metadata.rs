//! Install metadata stored next to each installed template

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;

use crate::core::error::{Error, Result};

/// Name of the metadata file in a template root
pub const META_FILE: &str = ".parboil";

/// Where an installed template was copied from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Local,
    Github,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Local => "local",
            SourceType::Github => "github",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(SourceType::Local),
            "github" => Ok(SourceType::Github),
            _ => Err(Error::config(format!("Unknown source type '{s}'"))),
        }
    }
}

/// Contents of the metadata file.
///
/// Times are seconds since the Unix epoch. Unknown keys are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub created: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    /// Metadata for a fresh install from `source`
    pub fn installed(source_type: SourceType, source: impl Into<String>) -> Self {
        Self {
            created: now(),
            source: Some(source.into()),
            source_type: Some(source_type.to_string()),
            ..Default::default()
        }
    }

    /// Parsed source type, `None` if absent
    pub fn source_type(&self) -> Result<Option<SourceType>> {
        self.source_type.as_deref().map(str::parse).transpose()
    }

    /// Forget where the template came from
    pub fn clear_source(&mut self) {
        self.source = None;
        self.source_type = None;
    }

    pub fn created_at(&self) -> Option<DateTime<Local>> {
        to_local(self.created)
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated.and_then(to_local)
    }

    /// Read a metadata file; `Ok(None)` if it does not exist
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await?;
        let meta = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!("Malformed metadata file {}: {e}", path.display()))
        })?;
        Ok(Some(meta))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

/// Current time in seconds since the Unix epoch
pub fn now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn to_local(timestamp: f64) -> Option<DateTime<Local>> {
    if timestamp <= 0.0 {
        return None;
    }
    let secs = timestamp.trunc() as i64;
    let nanos = (timestamp.fract() * 1e9) as u32;
    Local.timestamp_opt(secs, nanos).single()
}
