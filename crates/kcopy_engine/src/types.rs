use std::fmt;
use std::path::{Path, PathBuf};

use kcopy_core::PublishFailure;

use crate::driver::DriverError;
use crate::persist::PersistError;

pub type ModuleId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(url: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {}: {}", self.kind, self.url, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

/// Why one module could not be copied.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("no title found for {module_id} at {url}")]
    TitleNotFound { module_id: ModuleId, url: String },
    #[error("downloaded bundle {} is missing or empty", .path.display())]
    EmptyBundle { path: PathBuf },
    #[error("module {module_id} was requested more than once")]
    DuplicateModule { module_id: ModuleId },
    #[error("download directory: {0}")]
    Persist(#[from] PersistError),
    #[error("could not start browser session: {0}")]
    Session(#[from] DriverError),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishFailure),
    #[error("cancelled")]
    Cancelled,
    #[error("publish worker for {module_id} stopped before reporting")]
    WorkerLost { module_id: ModuleId },
}

/// A downloaded export bundle together with the title it will be published under.
///
/// Construction checks that the bundle exists and is non-empty and that the
/// title is non-empty; the value is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExport {
    source_url: String,
    module_id: ModuleId,
    title: String,
    local_bundle_path: PathBuf,
}

impl ModuleExport {
    pub fn new(
        source_url: impl Into<String>,
        module_id: impl Into<ModuleId>,
        title: impl Into<String>,
        local_bundle_path: impl Into<PathBuf>,
    ) -> Result<Self, CopyError> {
        let module_id = module_id.into();
        let source_url = source_url.into();
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CopyError::TitleNotFound {
                url: crate::download::detail_url(&source_url, &module_id),
                module_id,
            });
        }
        let local_bundle_path = local_bundle_path.into();
        let len = std::fs::metadata(&local_bundle_path)
            .map(|meta| meta.len())
            .unwrap_or(0);
        if len == 0 {
            return Err(CopyError::EmptyBundle {
                path: local_bundle_path,
            });
        }
        Ok(Self {
            source_url,
            module_id,
            title,
            local_bundle_path,
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn local_bundle_path(&self) -> &Path {
        &self.local_bundle_path
    }
}

#[derive(Debug)]
pub enum PublishOutcome {
    Published(String),
    Failed(CopyError),
}

#[derive(Debug)]
pub struct PublishResult {
    pub module_id: ModuleId,
    pub outcome: PublishOutcome,
}

impl PublishResult {
    pub fn published(module_id: impl Into<ModuleId>, url: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            outcome: PublishOutcome::Published(url.into()),
        }
    }

    pub fn failed(module_id: impl Into<ModuleId>, reason: CopyError) -> Self {
        Self {
            module_id: module_id.into(),
            outcome: PublishOutcome::Failed(reason),
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Published(_))
    }

    pub fn published_url(&self) -> Option<&str> {
        match &self.outcome {
            PublishOutcome::Published(url) => Some(url),
            PublishOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&CopyError> {
        match &self.outcome {
            PublishOutcome::Published(_) => None,
            PublishOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// Login credentials for the target server. Opaque strings; the password is
/// never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
