use std::path::PathBuf;

/// Observed result of performing an [`crate::Action`], fed back into [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Kicks off a fresh workflow.
    Started,
    /// The login form was submitted; `accepted` is false when the form rejected the credentials.
    LoginSubmitted { accepted: bool },
    /// The license form was accepted and the metadata form is showing.
    LicenseAccepted,
    /// Metadata was saved; the browser now sits on the draft module.
    MetadataSaved { draft_url: String },
    /// The bundle transform finished.
    BundleFixed { path: PathBuf },
    /// The import form accepted the archive.
    BundleUploaded,
    /// The publish request was submitted and the confirmation form is showing.
    PublishRequested,
    /// The page rendered after submitting the publish confirmation.
    ConfirmationRendered(Confirmation),
    /// Back navigation finished; the confirmation form is showing again.
    NavigatedBack,
    /// The step could not be performed.
    StepFailed(StepFailure),
    /// The run was interrupted.
    Cancelled,
}

impl Event {
    pub fn label(&self) -> &'static str {
        match self {
            Event::Started => "started",
            Event::LoginSubmitted { .. } => "login submitted",
            Event::LicenseAccepted => "license accepted",
            Event::MetadataSaved { .. } => "metadata saved",
            Event::BundleFixed { .. } => "bundle fixed",
            Event::BundleUploaded => "bundle uploaded",
            Event::PublishRequested => "publish requested",
            Event::ConfirmationRendered(_) => "confirmation rendered",
            Event::NavigatedBack => "navigated back",
            Event::StepFailed(_) => "step failed",
            Event::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The server rendered its transient site error page.
    SiteError,
    /// The published content page.
    Published { title: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// An expected element was absent from the rendered page.
    MissingElement { element: String },
    /// A page did not finish loading within the page-load timeout.
    Timeout { waiting_for: String },
    /// The local bundle transform failed.
    BundleFix(String),
    /// The browser session itself failed.
    Browser(String),
}
