use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ipld::CliFlavor;

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for git-remote-ipld
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    /// `ipfs` executable to run `dag put` with
    #[serde(default = "defaults::default_ipfs_binary")]
    pub ipfs_binary: PathBuf,
    /// Multiaddr of the API to talk to, passed as `--api`
    #[serde(default)]
    pub ipfs_api: Option<String>,
    #[serde(default)]
    pub cli_flavor: CliFlavor,
    /// Ledger file; defaults to `<git-dir>/ipld/ledger`
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    /// Show a progress bar when stderr is a terminal
    #[serde(default = "defaults::default_progress")]
    pub progress: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            ipfs_binary: defaults::default_ipfs_binary(),
            ipfs_api: None,
            cli_flavor: CliFlavor::default(),
            ledger_path: None,
            progress: defaults::default_progress(),
        }
    }
}

impl PushConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        tracing::debug!("loading git-remote-ipld config from {:?}", config_path);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `GIT_IPLD_*` overrides, looking each variable up with `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(binary) = lookup("GIT_IPLD_IPFS_BINARY") {
            self.ipfs_binary = expand_tilde(&PathBuf::from(binary));
        }

        if let Some(api) = lookup("GIT_IPLD_IPFS_API") {
            self.ipfs_api = Some(api).filter(|api| !api.is_empty());
        }

        if let Some(flavor) = lookup("GIT_IPLD_CLI_FLAVOR") {
            self.cli_flavor = flavor
                .parse()
                .context("Failed to parse GIT_IPLD_CLI_FLAVOR")?;
        }

        if let Some(path) = lookup("GIT_IPLD_LEDGER") {
            self.ledger_path = Some(expand_tilde(&PathBuf::from(path)));
        }

        if let Some(progress) = lookup("GIT_IPLD_PROGRESS") {
            self.progress = parse_bool(&progress)
                .with_context(|| format!("Failed to parse GIT_IPLD_PROGRESS={:?}", progress))?;
        }
        Ok(())
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: PushConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.ipfs_binary = expand_tilde(&config.ipfs_binary);
        if let Some(ref ledger_path) = config.ledger_path {
            config.ledger_path = Some(expand_tilde(ledger_path));
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/git-remote-ipld/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    /// Ledger location for the repository at `git_dir`
    pub fn ledger_path_for(&self, git_dir: &Path) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| git_dir.join("ipld").join("ledger"))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {:?}", other),
    }
}

mod defaults {
    use std::path::PathBuf;

    pub(crate) fn default_ipfs_binary() -> PathBuf {
        PathBuf::from("ipfs")
    }

    pub(crate) fn default_progress() -> bool {
        true
    }
}
