use std::path::PathBuf;

/// The next step the runner has to perform against the browser (or disk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the login form and submit the session credentials.
    Login,
    /// Start module creation, tick the license checkbox and submit.
    AcceptLicense,
    /// Fill in the title field (everything else left at defaults) and submit.
    FillMetadata { title: String },
    /// Strip the marker file from the downloaded bundle.
    FixBundle { bundle: PathBuf },
    /// Select "zip" as import format, upload the bundle and submit.
    UploadBundle { bundle: PathBuf },
    /// Trigger publish and submit the publish request.
    RequestPublish,
    /// Submit the publish confirmation form. `attempt` starts at 1.
    ConfirmPublish { attempt: u32 },
    /// Go back one page so the confirmation can be resubmitted.
    NavigateBack,
}
