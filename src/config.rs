//! Configuration for a generation run — loadable from a `cser.toml` file
//! or assembled programmatically from CLI flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

/// An output backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Length-prefixed, presence-flagged big-endian binary format.
    Raw,
    /// Tag-based nested document format.
    Xml,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Backend::Raw),
            "xml" => Ok(Backend::Xml),
            other => Err(format!("unknown backend '{other}' (expected raw or xml)")),
        }
    }
}

/// Root configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Declaration source to parse. Standard input when absent.
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub output: OutputConfig,
    /// Files to `#include "..."` from the generated header.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Selected backends, in emission order. Defaults to raw.
    #[serde(default)]
    pub backends: Vec<Backend>,
    /// Root composite type names to generate serializers for.
    #[serde(default)]
    pub roots: Vec<String>,
}

impl Config {
    /// The backend selection, falling back to the raw backend when none
    /// was chosen.
    pub fn backends_or_default(&self) -> Vec<Backend> {
        if self.backends.is_empty() {
            vec![Backend::Raw]
        } else {
            self.backends.clone()
        }
    }
}

/// Output file settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Basename for the generated pair: `<basename>.h` and `<basename>.c`.
    #[serde(default = "default_basename")]
    pub basename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            basename: default_basename(),
        }
    }
}

fn default_basename() -> String {
    "out".to_string()
}

/// Load and parse a `cser.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}
