use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::mail::IdentityConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where mailbox exports (mbox files, maildirs) live
    pub exports_dir: String,
    /// Where the store cache and result files are written
    pub cache_dir: String,
    pub identity: IdentityConfig,
    pub domain_rank: DomainRankConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DomainRankConfig {
    /// CSV of `rank,domain` lines (top sites list). Unset means unranked accounts.
    pub path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .map(|p| p.join("mailtrace").to_string_lossy().into_owned())
            .unwrap_or_else(|| "~/.cache/mailtrace".to_string());

        Self {
            exports_dir: "~/Mail/exports".to_string(),
            cache_dir,
            identity: IdentityConfig::default(),
            domain_rank: DomainRankConfig::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("mailtrace/config.toml"))
            .unwrap_or_else(|| PathBuf::from("~/.config/mailtrace/config.toml"))
    }

    /// Load from the default location; a missing file means defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn exports_path(&self) -> PathBuf {
        expand(&self.exports_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        expand(&self.cache_dir)
    }

    pub fn domain_rank_path(&self) -> Option<PathBuf> {
        self.domain_rank.path.as_deref().map(expand)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
