//! YAML configuration file discovery and merging with command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, bail};
use serde::Deserialize;

use crate::cli::InvokeArgs;

const CONFIG_NAMES: [&str; 2] = ["agent-invoke.yaml", ".agent-invoke.yaml"];

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_alias_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Human-readable duration such as `45s` or `2m`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// `.`, `$HOME` and `$HOME/.agent-invoke`, in search order.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.clone());
        dirs.push(home.join(".agent-invoke"));
    }
    dirs
}

/// Loads the explicit config file, or the first one found in `search_dirs`.
///
/// The undotted name is preferred over the dotted one across all
/// directories. Returns `None` when no implicit config exists.
pub fn load(
    explicit: Option<&Path>,
    search_dirs: &[PathBuf],
) -> anyhow::Result<Option<(PathBuf, FileConfig)>> {
    if let Some(path) = explicit {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        if !path.exists() {
            bail!("specified config file not found: {}", path.display());
        }
        let config = read(&path)?;
        return Ok(Some((path, config)));
    }

    for name in CONFIG_NAMES {
        for dir in search_dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                let config = read(&candidate)?;
                return Ok(Some((candidate, config)));
            }
        }
    }
    Ok(None)
}

fn read(path: &Path) -> anyhow::Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to read config file {}", path.display()))
}

impl FileConfig {
    /// Fills flags left unset from the file. Flags always win.
    pub fn apply_to(self, args: &mut InvokeArgs) -> anyhow::Result<()> {
        fill(&mut args.agent_id, self.agent_id);
        fill(&mut args.agent_alias_id, self.agent_alias_id);
        fill(&mut args.region, self.region);
        fill(&mut args.endpoint, self.endpoint);
        if args.timeout.is_none()
            && let Some(raw) = self.timeout.filter(|t| !t.trim().is_empty())
        {
            let timeout: Duration = humantime::parse_duration(raw.trim())
                .with_context(|| format!("invalid timeout '{raw}' in config file"))?;
            args.timeout = Some(timeout);
        }
        Ok(())
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().is_none_or(str::is_empty)
        && let Some(value) = value.filter(|v| !v.is_empty())
    {
        *slot = Some(value);
    }
}
