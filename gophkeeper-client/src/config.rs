//! Client configuration.
//!
//! Flags take precedence over environment variables, environment over
//! defaults. The data directory is always `<base>/.gophkeeper`, with the
//! home directory as the default base.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "gophkeeper", about = "Gophkeeper password manager client")]
pub struct ClientConfig {
    /// Base directory under which gophkeeper keeps its data
    #[arg(long = "base-dir", env = "GOPHKEEPER_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Synchronization server address
    #[arg(
        short = 's',
        long = "server",
        env = "GOPHKEEPER_SYNC_SERVER_URL",
        default_value = "127.0.0.1:3333"
    )]
    pub sync_server_url: String,

    /// Log level
    #[arg(long, env = "GOPHKEEPER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Synchronization period in seconds
    #[arg(long, env = "GOPHKEEPER_SYNC_PERIOD", default_value_t = 30)]
    pub sync_period: u64,

    /// Use HTTPS, accepting a self-signed server certificate
    #[arg(short = 't', long, env = "ENABLE_HTTPS", default_value_t = false)]
    pub enable_https: bool,
}

impl ClientConfig {
    /// Resolve and create the data directory.
    pub fn resolve_base_dir(&self) -> Result<PathBuf, anyhow::Error> {
        let parent = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("could not determine the home directory"))?,
        };

        let dir = parent.join(".gophkeeper");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// The server base URL with a scheme chosen by the HTTPS flag. An
    /// explicit scheme in the configured value wins.
    pub fn server_url(&self) -> String {
        if self.sync_server_url.starts_with("http://")
            || self.sync_server_url.starts_with("https://")
        {
            return self.sync_server_url.clone();
        }

        let scheme = if self.enable_https { "https" } else { "http" };
        format!("{scheme}://{}", self.sync_server_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_follows_https_flag() {
        let mut cfg = ClientConfig::parse_from(["gophkeeper"]);
        assert_eq!(cfg.server_url(), "http://127.0.0.1:3333");

        cfg.enable_https = true;
        assert_eq!(cfg.server_url(), "https://127.0.0.1:3333");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let cfg = ClientConfig::parse_from([
            "gophkeeper",
            "--server",
            "https://keeper.example.com",
        ]);
        assert_eq!(cfg.server_url(), "https://keeper.example.com");
    }

    #[test]
    fn base_dir_gets_the_dot_directory_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ClientConfig::parse_from([
            "gophkeeper",
            "--base-dir",
            tmp.path().to_str().unwrap(),
        ]);

        let dir = cfg.resolve_base_dir().unwrap();
        assert_eq!(dir, tmp.path().join(".gophkeeper"));
        assert!(dir.is_dir());
    }
}
