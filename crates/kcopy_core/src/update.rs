use crate::{
    Action, Confirmation, Event, PublishFailure, PublishWorkflow, StepFailure, WorkflowState,
};

/// Pure transition function: applies an observed event to the workflow and
/// returns the actions the runner has to perform next.
///
/// Terminal workflows ignore further events. An event that does not belong
/// to the current state fails the workflow instead of being skipped, so the
/// sequence can only ever move forward (or loop through `RetryPublish`).
pub fn update(mut workflow: PublishWorkflow, event: Event) -> (PublishWorkflow, Vec<Action>) {
    if workflow.is_terminal() {
        return (workflow, Vec::new());
    }

    let step = workflow.state().label();
    let actions = match (workflow.state().clone(), event) {
        (_, Event::Cancelled) => {
            workflow.fail(PublishFailure::Cancelled);
            Vec::new()
        }
        (_, Event::StepFailed(failure)) => {
            workflow.fail(step_failure(step, failure));
            Vec::new()
        }
        (WorkflowState::LoggedOut, Event::Started) => vec![Action::Login],
        (WorkflowState::LoggedOut, Event::LoginSubmitted { accepted }) => {
            if accepted {
                workflow.set_state(WorkflowState::LoggedIn);
                vec![Action::AcceptLicense]
            } else {
                workflow.fail(PublishFailure::Authentication);
                Vec::new()
            }
        }
        (WorkflowState::LoggedIn, Event::LicenseAccepted) => {
            workflow.set_state(WorkflowState::LicenseAccepted);
            vec![Action::FillMetadata {
                title: workflow.title().to_string(),
            }]
        }
        (WorkflowState::LicenseAccepted, Event::MetadataSaved { draft_url }) => {
            workflow.record_draft(draft_url);
            workflow.set_state(WorkflowState::MetadataFilled);
            vec![Action::FixBundle {
                bundle: workflow.bundle().to_path_buf(),
            }]
        }
        (WorkflowState::MetadataFilled, Event::BundleFixed { path }) => {
            workflow.set_state(WorkflowState::BundleFixed);
            vec![Action::UploadBundle { bundle: path }]
        }
        (WorkflowState::BundleFixed, Event::BundleUploaded) => {
            workflow.set_state(WorkflowState::BundleUploaded);
            vec![Action::RequestPublish]
        }
        (WorkflowState::BundleUploaded, Event::PublishRequested) => {
            workflow.set_state(WorkflowState::PublishRequested);
            let attempt = workflow.next_attempt();
            vec![Action::ConfirmPublish { attempt }]
        }
        (WorkflowState::PublishRequested, Event::ConfirmationRendered(confirmation)) => {
            match confirmation {
                Confirmation::SiteError if workflow.can_retry() => {
                    workflow.set_state(WorkflowState::RetryPublish);
                    vec![Action::NavigateBack]
                }
                Confirmation::SiteError => {
                    let attempts = workflow.attempts();
                    workflow.fail(PublishFailure::RetriesExhausted { attempts });
                    Vec::new()
                }
                Confirmation::Published { title, url } => {
                    if title.trim() == workflow.title() {
                        workflow.set_state(WorkflowState::Published { url });
                    } else {
                        let expected = workflow.title().to_string();
                        workflow.fail(PublishFailure::TitleMismatch {
                            expected,
                            actual: title,
                        });
                    }
                    Vec::new()
                }
            }
        }
        (WorkflowState::RetryPublish, Event::NavigatedBack) => {
            workflow.set_state(WorkflowState::PublishRequested);
            let attempt = workflow.next_attempt();
            vec![Action::ConfirmPublish { attempt }]
        }
        (_, event) => {
            workflow.fail(PublishFailure::UnexpectedEvent {
                state: step,
                event: event.label(),
            });
            Vec::new()
        }
    };

    (workflow, actions)
}

fn step_failure(step: &'static str, failure: StepFailure) -> PublishFailure {
    match failure {
        StepFailure::MissingElement { element } => PublishFailure::MissingElement { step, element },
        StepFailure::Timeout { waiting_for } => {
            PublishFailure::NavigationTimeout { step, waiting_for }
        }
        StepFailure::BundleFix(reason) => PublishFailure::BundleFix(reason),
        StepFailure::Browser(reason) => PublishFailure::Browser(reason),
    }
}
