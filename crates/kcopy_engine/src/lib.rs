//! kcopy engine: downloads, bundle repair, browser automation and the
//! copy pipeline that ties them together.
mod bundle;
mod config;
mod copy;
mod download;
mod driver;
mod fetch;
mod pages;
mod pdf;
mod persist;
mod title;
mod types;
mod webdriver;
mod workflow;

pub use bundle::{bundle_entries, BundleError, BundleFixer, MARKER_FILE};
pub use config::{
    default_download_dir, BrowserSettings, CopyConfig, PdfSettings, RetryPolicy,
    DEFAULT_PUBLISH_WORKERS,
};
pub use copy::{copy_modules, CopyOrchestrator, CopyRequest};
pub use download::{detail_url, export_url, ExportDownloader};
pub use driver::{BrowserLauncher, DriverError, LegacyUi, PublishSession, UiError};
pub use fetch::{FetchSettings, FetchedPage, Fetcher, ReqwestFetcher};
pub use pages::{LegacyPages, WebDriverLauncher};
pub use pdf::{
    collection_url, format_age, parse_completion_time, pdf_completion_time, PdfError, PdfPoller,
    PdfResult,
};
pub use persist::{ensure_output_dir, PersistError};
pub use title::{extract_title, TITLE_MARKER};
pub use types::{
    CopyError, Credentials, FailureKind, FetchError, ModuleExport, ModuleId, PublishOutcome,
    PublishResult,
};
pub use webdriver::{ElementRef, WebDriverSession};
pub use workflow::{publish_module, run_workflow, PublishContext};
