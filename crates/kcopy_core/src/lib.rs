//! kcopy core: pure publish-workflow state machine.
mod action;
mod event;
mod failure;
mod state;
mod update;

pub use action::Action;
pub use event::{Confirmation, Event, StepFailure};
pub use failure::PublishFailure;
pub use state::{PublishWorkflow, WorkflowState, DEFAULT_MAX_PUBLISH_ATTEMPTS};
pub use update::update;
