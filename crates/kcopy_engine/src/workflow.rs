use std::collections::VecDeque;
use std::thread;

use kcopy_core::{update, Action, Event, PublishFailure, PublishWorkflow, StepFailure};
use kcopy_logging::{kcopy_error, kcopy_info, kcopy_warn};
use tokio_util::sync::CancellationToken;

use crate::bundle::BundleFixer;
use crate::config::RetryPolicy;
use crate::driver::{BrowserLauncher, PublishSession};
use crate::{CopyError, Credentials, ModuleExport, PublishOutcome};

/// Everything one publish job needs besides the module itself.
#[derive(Clone)]
pub struct PublishContext {
    pub target_url: String,
    pub credentials: Credentials,
    pub headless: bool,
    pub fixer: BundleFixer,
    pub retry: RetryPolicy,
    pub cancel: CancellationToken,
}

/// Open a browser session, run the publish workflow for `export` and close
/// the session again, whatever the outcome. Blocking.
pub fn publish_module(
    launcher: &dyn BrowserLauncher,
    context: &PublishContext,
    export: &ModuleExport,
) -> PublishOutcome {
    if context.cancel.is_cancelled() {
        return PublishOutcome::Failed(CopyError::Cancelled);
    }
    kcopy_info!(
        "[{}] starting upload of {} to {}",
        export.module_id(),
        export.local_bundle_path().display(),
        context.target_url
    );

    let mut session = match PublishSession::open(
        launcher,
        &context.target_url,
        context.credentials.clone(),
        context.headless,
    ) {
        Ok(session) => session,
        Err(err) => {
            kcopy_error!("[{}] browser did not start: {}", export.module_id(), err);
            return PublishOutcome::Failed(CopyError::Session(err));
        }
    };

    // `session` is dropped (and the browser closed) when this returns.
    match run_workflow(&mut session, context, export) {
        Ok(url) => {
            kcopy_info!("[{}] published at {}", export.module_id(), url);
            PublishOutcome::Published(url)
        }
        Err(PublishFailure::Cancelled) => PublishOutcome::Failed(CopyError::Cancelled),
        Err(failure) => {
            kcopy_error!("[{}] publish failed: {}", export.module_id(), failure);
            PublishOutcome::Failed(CopyError::Publish(failure))
        }
    }
}

/// Drive the publish state machine to a terminal state over an open session.
pub fn run_workflow(
    session: &mut PublishSession,
    context: &PublishContext,
    export: &ModuleExport,
) -> Result<String, PublishFailure> {
    let module_id = export.module_id();
    let workflow = PublishWorkflow::with_max_attempts(
        export.title(),
        export.local_bundle_path(),
        context.retry.max_attempts,
    );

    let (mut workflow, actions) = update(workflow, Event::Started);
    let mut pending: VecDeque<Action> = actions.into();
    while let Some(action) = pending.pop_front() {
        let event = if context.cancel.is_cancelled() {
            kcopy_warn!("[{}] interrupted in state {}", module_id, workflow.state().label());
            Event::Cancelled
        } else {
            perform(session, context, module_id, action)
        };
        let (next, actions) = update(workflow, event);
        workflow = next;
        pending.extend(actions);
    }

    match workflow.outcome() {
        Some(Ok(url)) => Ok(url.to_string()),
        Some(Err(failure)) => Err(failure.clone()),
        None => Err(PublishFailure::UnexpectedEvent {
            state: workflow.state().label(),
            event: "none",
        }),
    }
}

fn perform(
    session: &mut PublishSession,
    context: &PublishContext,
    module_id: &str,
    action: Action,
) -> Event {
    let step = match action {
        Action::Login => {
            kcopy_info!(
                "[{}] logging into {} as {}",
                module_id,
                session.target_url(),
                session.credentials().username
            );
            let credentials = session.credentials().clone();
            session
                .ui()
                .login(&credentials)
                .map(|accepted| Event::LoginSubmitted { accepted })
        }
        Action::AcceptLicense => {
            kcopy_info!("[{}] accepting license agreement", module_id);
            session.ui().accept_license().map(|_| Event::LicenseAccepted)
        }
        Action::FillMetadata { title } => {
            kcopy_info!("[{}] creating module titled '{}'", module_id, title);
            session
                .ui()
                .fill_metadata(&title)
                .map(|draft_url| Event::MetadataSaved { draft_url })
        }
        Action::FixBundle { bundle } => {
            return match context.fixer.fix(&bundle) {
                Ok(path) => Event::BundleFixed { path },
                Err(err) => Event::StepFailed(StepFailure::BundleFix(err.to_string())),
            };
        }
        Action::UploadBundle { bundle } => {
            kcopy_info!("[{}] uploading {}", module_id, bundle.display());
            session
                .ui()
                .upload_bundle(&bundle)
                .map(|_| Event::BundleUploaded)
        }
        Action::RequestPublish => {
            kcopy_info!("[{}] requesting publish", module_id);
            session.ui().request_publish().map(|_| Event::PublishRequested)
        }
        Action::ConfirmPublish { attempt } => {
            let delay = context.retry.delay_before(attempt);
            if !delay.is_zero() {
                kcopy_warn!(
                    "[{}] retrying publish confirmation (attempt {}/{}) in {:?}",
                    module_id,
                    attempt,
                    context.retry.max_attempts,
                    delay
                );
                thread::sleep(delay);
            }
            kcopy_info!("[{}] confirming publish, attempt {}", module_id, attempt);
            session
                .ui()
                .confirm_publish()
                .map(Event::ConfirmationRendered)
        }
        Action::NavigateBack => session.ui().navigate_back().map(|_| Event::NavigatedBack),
    };

    step.unwrap_or_else(|err| Event::StepFailed(err.into()))
}
