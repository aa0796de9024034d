//! Tool settings stored under `.grove/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::invariants::validate_repos_dir;
use crate::tree::DEFAULT_REPOS_DIR;

/// Workspace settings (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GroveSettings {
    /// Repos dir for manifests created on demand under a node.
    pub default_repos_dir: String,

    /// Entries shown by a non-recursive list before "…and N more".
    pub list_preview_limit: usize,

    pub git: GitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitSettings {
    /// Git binary to spawn.
    pub program: String,

    /// Wall-clock limit for one git subprocess, in seconds.
    pub timeout_secs: u64,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            timeout_secs: 10 * 60,
        }
    }
}

impl Default for GroveSettings {
    fn default() -> Self {
        Self {
            default_repos_dir: DEFAULT_REPOS_DIR.to_string(),
            list_preview_limit: 5,
            git: GitSettings::default(),
        }
    }
}

impl GroveSettings {
    pub fn validate(&self) -> Result<()> {
        validate_repos_dir(&self.default_repos_dir)
            .map_err(|reason| anyhow!("default_repos_dir: {reason}"))?;
        if self.list_preview_limit == 0 {
            return Err(anyhow!("list_preview_limit must be > 0"));
        }
        if self.git.program.trim().is_empty() {
            return Err(anyhow!("git.program must not be empty"));
        }
        if self.git.timeout_secs == 0 {
            return Err(anyhow!("git.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `GroveSettings::default()`.
pub fn load_settings(path: &Path) -> Result<GroveSettings> {
    if !path.exists() {
        let settings = GroveSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: GroveSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

/// Atomically write settings to disk (temp file + rename).
pub fn write_settings(path: &Path, settings: &GroveSettings) -> Result<()> {
    settings.validate()?;
    let mut buf = toml::to_string_pretty(settings).context("serialize settings toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
