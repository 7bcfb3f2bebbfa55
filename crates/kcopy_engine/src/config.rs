use std::path::PathBuf;
use std::time::Duration;

use kcopy_core::DEFAULT_MAX_PUBLISH_ATTEMPTS;

use crate::fetch::FetchSettings;

/// Number of browser sessions allowed to run at the same time.
pub const DEFAULT_PUBLISH_WORKERS: usize = 5;

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Base URL of the WebDriver (chromedriver) endpoint.
    pub webdriver_url: String,
    /// Upper bound for every page transition.
    pub page_load_timeout: Duration,
    /// How often to re-check the page while waiting for it to load.
    pub poll_interval: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            page_load_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total publish confirmation submissions, first one included.
    pub max_attempts: u32,
    /// Delay before resubmission `n` is `backoff * (n - 1)`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * attempt.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_PUBLISH_ATTEMPTS,
            backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CopyConfig {
    pub download_dir: PathBuf,
    pub fetch: FetchSettings,
    pub browser: BrowserSettings,
    pub retry: RetryPolicy,
    pub publish_workers: usize,
}

impl CopyConfig {
    pub fn default_with_download_dir(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            fetch: FetchSettings::default(),
            browser: BrowserSettings::default(),
            retry: RetryPolicy::default(),
            publish_workers: DEFAULT_PUBLISH_WORKERS,
        }
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self::default_with_download_dir(default_download_dir())
    }
}

#[derive(Debug, Clone)]
pub struct PdfSettings {
    pub download_dir: PathBuf,
    pub fetch: FetchSettings,
    /// Wait between two checks of a collection that is not ready yet.
    pub poll_interval: Duration,
    /// Checks per collection before giving up.
    pub max_polls: u32,
    /// Append `-YYYYMMDD-HHMM` to the PDF file name.
    pub timestamp: bool,
}

impl PdfSettings {
    pub fn default_with_download_dir(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            fetch: FetchSettings::default(),
            poll_interval: Duration::from_secs(20),
            max_polls: 90,
            timestamp: true,
        }
    }
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self::default_with_download_dir(default_download_dir())
    }
}

/// The user's download directory, or `./downloads` when there is none.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("downloads")
    })
}
