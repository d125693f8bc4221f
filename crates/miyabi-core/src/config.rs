use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::scheduler::DEFAULT_POLL_INTERVAL;

const CONFIG_ENV_VAR: &str = "MIYABI_CONFIG";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// ANSI color in list output; defaults to terminal detection.
    #[serde(default)]
    pub color: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: Backend,

    /// Data directory; `~` expands to the home directory.
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerSection {
    pub poll_secs: Option<u64>,
}

impl Config {
    /// Resolution order: explicit flag, then `MIYABI_CONFIG`, then
    /// `~/.config/miyabi/config.toml`. A missing file means defaults; a file
    /// that exists but does not parse is an error.
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = resolve_config_path(override_path) else {
            warn!("no config path resolvable; using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!(config = %path.display(), "config file not found; using defaults");
            return Ok(Self::default());
        }

        info!(config = %path.display(), "loading config");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn poll_interval(&self) -> Duration {
        self.scheduler
            .poll_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }
}

fn resolve_config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = env_path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    dirs::config_dir().map(|dir| dir.join("miyabi").join(CONFIG_FILE))
}

pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(location) = &cfg.storage.location {
        expand_tilde(Path::new(location))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".miyabi"))
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::{Backend, Config};

    #[test]
    fn parses_full_config() {
        let cfg: Config = toml::from_str(
            r#"
            color = false

            [storage]
            backend = "remote"
            location = "~/tasks"

            [scheduler]
            poll_secs = 30
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.storage.backend, Backend::Remote);
        assert_eq!(cfg.storage.location.as_deref(), Some("~/tasks"));
        assert_eq!(cfg.poll_interval().as_secs(), 30);
        assert_eq!(cfg.color, Some(false));
    }

    #[test]
    fn empty_config_means_local_defaults() {
        let cfg: Config = toml::from_str("").expect("parse");
        assert_eq!(cfg.storage.backend, Backend::Local);
        assert_eq!(cfg.poll_interval().as_secs(), 5);
    }
}
