use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kcopy_engine::{default_download_dir, CopyConfig, Credentials, PdfSettings};
use log::LevelFilter;
use thiserror::Error;

pub const USERNAME_VAR: &str = "LEGACY_USERNAME";
pub const PASSWORD_VAR: &str = "LEGACY_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "kcopy")]
#[command(about = "Copy modules between legacy CMS servers and fetch collection PDFs")]
pub struct Cli {
    /// Where export bundles and PDFs are written.
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,

    /// chromedriver endpoint used for publishing.
    #[arg(long, global = true)]
    pub webdriver_url: Option<String>,

    #[arg(long, global = true)]
    pub page_load_timeout_secs: Option<u64>,

    #[arg(long, global = true, default_value = kcopy_logging::DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Download modules from one server and publish them on another.
    CopyModules {
        /// Run the browser without a window.
        #[arg(long)]
        headless: bool,
        from: String,
        to: String,
        #[arg(required = true)]
        module_ids: Vec<String>,
    },
    /// Wait for collection PDFs to be generated and download them.
    DownloadPdfs {
        server: String,
        #[arg(required = true)]
        collection_ids: Vec<String>,
    },
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(default_download_dir)
    }

    pub fn copy_config(&self) -> CopyConfig {
        let mut config = CopyConfig::default_with_download_dir(self.download_dir());
        if let Some(url) = &self.webdriver_url {
            config.browser.webdriver_url = url.clone();
        }
        if let Some(secs) = self.page_load_timeout_secs {
            config.browser.page_load_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn pdf_settings(&self) -> PdfSettings {
        PdfSettings::default_with_download_dir(self.download_dir())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVariable(&'static str),
}

/// Read the publishing credentials from the environment.
pub fn credentials_from_env() -> Result<Credentials, ConfigError> {
    credentials_from(|name| std::env::var(name).ok())
}

pub fn credentials_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let read = |name: &'static str| {
        lookup(name)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingVariable(name))
    };
    let username = read(USERNAME_VAR)?;
    let password = read(PASSWORD_VAR)?;
    Ok(Credentials::new(username, password))
}
