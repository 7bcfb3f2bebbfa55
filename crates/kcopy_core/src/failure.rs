use thiserror::Error;

/// Terminal failure of one module's publish workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishFailure {
    #[error("login rejected for the configured credentials")]
    Authentication,
    #[error("no {element} found while in state {step}; check that the account has publish permissions")]
    MissingElement {
        step: &'static str,
        element: String,
    },
    #[error("timed out waiting for {waiting_for} while in state {step}")]
    NavigationTimeout {
        step: &'static str,
        waiting_for: String,
    },
    #[error("site error persisted after {attempts} publish attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("published title {actual:?} does not match submitted title {expected:?}")]
    TitleMismatch { expected: String, actual: String },
    #[error("bundle fix failed: {0}")]
    BundleFix(String),
    #[error("browser failure: {0}")]
    Browser(String),
    #[error("unexpected event '{event}' in state {state}")]
    UnexpectedEvent {
        state: &'static str,
        event: &'static str,
    },
    #[error("cancelled")]
    Cancelled,
}
