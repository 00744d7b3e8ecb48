use std::path::PathBuf;

use clap::Args;

use crate::Result;
use crate::config::Config;

/// Path flags shared by every binary
#[derive(Args, Debug, Default, Clone)]
pub struct PathArgs {
    /// Explicit config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory with mbox files and maildirs
    #[arg(long, global = true)]
    pub exports: Option<PathBuf>,

    /// Directory for the store cache and result files
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Ignore the store cache and parse the archive again
    #[arg(long, global = true)]
    pub rescan: bool,
}

impl PathArgs {
    /// Config from `--config` (or the default location) with path flags applied
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(exports) = &self.exports {
            config.exports_dir = exports.to_string_lossy().into_owned();
        }
        if let Some(cache) = &self.cache {
            config.cache_dir = cache.to_string_lossy().into_owned();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        paths: PathArgs,
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(
            &file,
            "exports_dir = \"/from/file\"\ncache_dir = \"/file/cache\"\n",
        )
        .unwrap();

        let cli = TestCli::try_parse_from([
            "test",
            "--config",
            file.to_str().unwrap(),
            "--cache",
            "/flag/cache",
            "--rescan",
        ])
        .unwrap();
        let config = cli.paths.load_config().unwrap();

        assert!(cli.paths.rescan);
        assert_eq!(config.exports_path(), PathBuf::from("/from/file"));
        assert_eq!(config.cache_path(), PathBuf::from("/flag/cache"));
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cli = TestCli::try_parse_from([
            "test",
            "--config",
            dir.path().join("absent.toml").to_str().unwrap(),
        ])
        .unwrap();

        let config = cli.paths.load_config().unwrap();
        assert!(!cli.paths.rescan);
        assert_eq!(config.identity, crate::mail::IdentityConfig::default());
    }
}
