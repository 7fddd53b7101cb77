use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::download::DownloadConfig;

/// Validated application configuration.
pub struct Config {
    pub site: String,
    pub email: String,
    pub password: String,
    pub directory: PathBuf,

    pub interval: Duration,
    /// `None` runs until interrupted.
    pub max_run_time: Option<Duration>,
    pub shutdown_grace: Duration,

    /// `None` when the report file server is disabled.
    pub port: Option<u16>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("site", &self.site)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("directory", &self.directory)
            .field("interval", &self.interval)
            .field("max_run_time", &self.max_run_time)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> anyhow::Result<Self> {
        if cli.email.trim().is_empty() {
            anyhow::bail!("An email is required. --email='x@yz.com'");
        }
        if cli.password.is_empty() {
            anyhow::bail!("A password is required. --password=mypassword");
        }
        if cli.interval.is_zero() {
            anyhow::bail!("--interval must be greater than zero");
        }

        let site = url::Url::parse(&cli.site)
            .with_context(|| format!("Invalid --site '{}'", cli.site))?;
        if !matches!(site.scheme(), "http" | "https") {
            anyhow::bail!("--site must be an http or https address, got '{}'", cli.site);
        }

        Ok(Self {
            site: cli.site.trim_end_matches('/').to_string(),
            email: cli.email,
            password: cli.password,
            directory: expand_tilde(&cli.directory),
            interval: cli.interval,
            max_run_time: (!cli.max_run_time.is_zero()).then_some(cli.max_run_time),
            shutdown_grace: cli.shutdown_grace,
            port: (!cli.no_web).then_some(cli.port),
        })
    }

    /// The part of the configuration each refresh needs.
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            site: self.site.clone(),
            username: self.email.clone(),
            password: self.password.clone(),
            directory: self.directory.clone(),
        }
    }
}

/// Create `directory` (and parents) if it does not exist yet.
pub async fn ensure_directory(directory: &Path) -> anyhow::Result<()> {
    match tokio::fs::metadata(directory).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => anyhow::bail!("{} exists but is not a directory", directory.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("{} does not exist. Creating it...", directory.display());
            tokio::fs::create_dir_all(directory)
                .await
                .with_context(|| format!("Failed to create {}", directory.display()))?;
            tracing::info!("Successfully created {}", directory.display());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", directory.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn make_cli(overrides: impl FnOnce(&mut crate::cli::Cli)) -> crate::cli::Cli {
        let mut cli =
            crate::cli::Cli::try_parse_from(["report-cacher", "-e", "u@example.com", "-p", "pw"])
                .unwrap();
        overrides(&mut cli);
        cli
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/reports");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("reports"));
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(expand_tilde("/srv/files"), PathBuf::from("/srv/files"));
        assert_eq!(expand_tilde("files"), PathBuf::from("files"));
    }

    #[test]
    fn test_from_cli_defaults() {
        let cfg = Config::from_cli(make_cli(|_| {})).unwrap();
        assert_eq!(cfg.site, "https://jonesboroughfarmersmkt.shopkeepapp.com");
        assert_eq!(cfg.max_run_time, Some(Duration::from_secs(180)));
        assert_eq!(cfg.port, Some(8085));
        assert_eq!(cfg.directory, PathBuf::from("files"));
    }

    #[test]
    fn test_from_cli_rejects_blank_credentials() {
        assert!(Config::from_cli(make_cli(|c| c.email = "  ".into())).is_err());
        assert!(Config::from_cli(make_cli(|c| c.password = String::new())).is_err());
    }

    #[test]
    fn test_from_cli_rejects_zero_interval() {
        let err = Config::from_cli(make_cli(|c| c.interval = Duration::ZERO)).unwrap_err();
        assert!(err.to_string().contains("--interval"));
    }

    #[test]
    fn test_from_cli_rejects_bad_site() {
        assert!(Config::from_cli(make_cli(|c| c.site = "not a url".into())).is_err());
        assert!(Config::from_cli(make_cli(|c| c.site = "ftp://shop.example.com".into())).is_err());
    }

    #[test]
    fn test_from_cli_zero_max_run_time_disables_cutoff() {
        let cfg = Config::from_cli(make_cli(|c| c.max_run_time = Duration::ZERO)).unwrap();
        assert_eq!(cfg.max_run_time, None);
    }

    #[test]
    fn test_from_cli_no_web() {
        let cfg = Config::from_cli(make_cli(|c| c.no_web = true)).unwrap();
        assert_eq!(cfg.port, None);
    }

    #[test]
    fn test_debug_redacts_password() {
        let cfg = Config::from_cli(make_cli(|c| c.password = "hunter2".into())).unwrap();
        assert!(!format!("{:?}", cfg).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_ensure_directory_creates_nested() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        ensure_directory(&nested).await.unwrap();
        assert!(nested.is_dir());
        // Idempotent
        ensure_directory(&nested).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_directory_rejects_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("files");
        std::fs::write(&file, b"").unwrap();
        assert!(ensure_directory(&file).await.is_err());
    }
}
