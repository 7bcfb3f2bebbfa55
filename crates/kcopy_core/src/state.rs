use std::path::{Path, PathBuf};

use crate::PublishFailure;

/// Total number of publish confirmation submissions before giving up.
pub const DEFAULT_MAX_PUBLISH_ATTEMPTS: u32 = 3;

/// Position in the publish sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    LoggedOut,
    LoggedIn,
    LicenseAccepted,
    MetadataFilled,
    BundleFixed,
    BundleUploaded,
    PublishRequested,
    RetryPublish,
    Published { url: String },
    Failed(PublishFailure),
}

impl WorkflowState {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowState::LoggedOut => "LoggedOut",
            WorkflowState::LoggedIn => "LoggedIn",
            WorkflowState::LicenseAccepted => "LicenseAccepted",
            WorkflowState::MetadataFilled => "MetadataFilled",
            WorkflowState::BundleFixed => "BundleFixed",
            WorkflowState::BundleUploaded => "BundleUploaded",
            WorkflowState::PublishRequested => "PublishRequested",
            WorkflowState::RetryPublish => "RetryPublish",
            WorkflowState::Published { .. } => "Published",
            WorkflowState::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Published { .. } | WorkflowState::Failed(_)
        )
    }
}

/// One module's publish workflow: the current state plus the inputs and
/// accumulated values (draft location, attempt counter) the transitions need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishWorkflow {
    state: WorkflowState,
    title: String,
    bundle: PathBuf,
    draft_url: Option<String>,
    attempts: u32,
    max_attempts: u32,
}

impl PublishWorkflow {
    pub fn new(title: impl Into<String>, bundle: impl Into<PathBuf>) -> Self {
        Self::with_max_attempts(title, bundle, DEFAULT_MAX_PUBLISH_ATTEMPTS)
    }

    /// `max_attempts` is clamped to at least one submission.
    pub fn with_max_attempts(
        title: impl Into<String>,
        bundle: impl Into<PathBuf>,
        max_attempts: u32,
    ) -> Self {
        Self {
            state: WorkflowState::LoggedOut,
            title: title.into(),
            bundle: bundle.into(),
            draft_url: None,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn bundle(&self) -> &Path {
        &self.bundle
    }

    pub fn draft_url(&self) -> Option<&str> {
        self.draft_url.as_deref()
    }

    /// Publish confirmation submissions made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `Some(Ok(url))` once published, `Some(Err(..))` once failed, `None` while running.
    pub fn outcome(&self) -> Option<Result<&str, &PublishFailure>> {
        match &self.state {
            WorkflowState::Published { url } => Some(Ok(url.as_str())),
            WorkflowState::Failed(failure) => Some(Err(failure)),
            _ => None,
        }
    }

    pub(crate) fn set_state(&mut self, state: WorkflowState) {
        self.state = state;
    }

    pub(crate) fn fail(&mut self, failure: PublishFailure) {
        self.state = WorkflowState::Failed(failure);
    }

    pub(crate) fn record_draft(&mut self, draft_url: String) {
        self.draft_url = Some(draft_url);
    }

    /// Counts one more confirmation submission and returns its number.
    pub(crate) fn next_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub(crate) fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}
