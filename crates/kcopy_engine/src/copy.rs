use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use kcopy_logging::{kcopy_debug, kcopy_error, kcopy_info, kcopy_warn};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bundle::BundleFixer;
use crate::config::CopyConfig;
use crate::download::ExportDownloader;
use crate::driver::BrowserLauncher;
use crate::fetch::ReqwestFetcher;
use crate::pages::WebDriverLauncher;
use crate::persist::partial_path;
use crate::workflow::{publish_module, PublishContext};
use crate::{CopyError, Credentials, Fetcher, ModuleExport, ModuleId, PublishOutcome, PublishResult};

#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub from_url: String,
    pub to_url: String,
    pub module_ids: Vec<ModuleId>,
    pub headless: bool,
    pub credentials: Credentials,
}

/// Downloads modules from one server and publishes them on another.
pub struct CopyOrchestrator {
    config: CopyConfig,
    fetcher: Arc<dyn Fetcher>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl CopyOrchestrator {
    pub fn new(
        config: CopyConfig,
        fetcher: Arc<dyn Fetcher>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            config,
            fetcher,
            launcher,
        }
    }

    /// Orchestrator using reqwest for downloads and chromedriver for publishing.
    pub fn with_defaults(config: CopyConfig) -> Self {
        let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
        let launcher = Arc::new(WebDriverLauncher::new(config.browser.clone()));
        Self::new(config, fetcher, launcher)
    }

    /// Copy every requested module. Returns exactly one result per requested
    /// id, in request order; one module failing never stops the others.
    pub async fn copy_modules(
        &self,
        request: &CopyRequest,
        cancel: CancellationToken,
    ) -> Vec<PublishResult> {
        kcopy_info!(
            "copying {} module(s) from {} to {}",
            request.module_ids.len(),
            request.from_url,
            request.to_url
        );

        let downloads = self.download_all(request, &cancel).await;
        self.publish_all(request, downloads, cancel).await
    }

    /// Phase 1: all downloads concurrently, waiting for every one of them.
    async fn download_all(
        &self,
        request: &CopyRequest,
        cancel: &CancellationToken,
    ) -> Vec<(ModuleId, Result<ModuleExport, CopyError>)> {
        let downloader = ExportDownloader::new(
            Arc::clone(&self.fetcher),
            self.config.download_dir.clone(),
        );

        let downloader = &downloader;
        let mut seen = HashSet::new();
        let tasks = request.module_ids.iter().map(|module_id| {
            let first_request = seen.insert(module_id.clone());
            async move {
                if !first_request {
                    return (
                        module_id.clone(),
                        Err(CopyError::DuplicateModule {
                            module_id: module_id.clone(),
                        }),
                    );
                }
                let result = tokio::select! {
                    result = downloader.download_module(&request.from_url, module_id) => result,
                    _ = cancel.cancelled() => {
                        discard_partial(&downloader.bundle_path(module_id));
                        Err(CopyError::Cancelled)
                    }
                };
                if let Err(err) = &result {
                    kcopy_warn!("[{}] download failed: {}", module_id, err);
                }
                (module_id.clone(), result)
            }
        });
        join_all(tasks).await
    }

    /// Phase 2: one blocking publish job per downloaded module, at most
    /// `publish_workers` at a time.
    async fn publish_all(
        &self,
        request: &CopyRequest,
        downloads: Vec<(ModuleId, Result<ModuleExport, CopyError>)>,
        cancel: CancellationToken,
    ) -> Vec<PublishResult> {
        let context = PublishContext {
            target_url: request.to_url.clone(),
            credentials: request.credentials.clone(),
            headless: request.headless,
            fixer: BundleFixer::new(self.config.download_dir.clone()),
            retry: self.config.retry,
            cancel,
        };

        let workers = self.config.publish_workers.max(1);
        let permits = Arc::new(Semaphore::new(workers));
        kcopy_debug!("publishing on {} worker(s)", workers);

        let mut pending = Vec::with_capacity(downloads.len());
        for (module_id, download) in downloads {
            let export = match download {
                Ok(export) => export,
                Err(err) => {
                    pending.push(Pending::Done(PublishResult::failed(module_id, err)));
                    continue;
                }
            };
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                kcopy_error!("[{}] publish slots closed", module_id);
                let reason = CopyError::WorkerLost {
                    module_id: module_id.clone(),
                };
                pending.push(Pending::Done(PublishResult::failed(module_id, reason)));
                continue;
            };
            let launcher = Arc::clone(&self.launcher);
            let context = context.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                publish_module(launcher.as_ref(), &context, &export)
            });
            pending.push(Pending::Running(module_id, handle));
        }

        let mut results = Vec::with_capacity(pending.len());
        for entry in pending {
            let result = match entry {
                Pending::Done(result) => result,
                Pending::Running(module_id, done) => match done.await {
                    Ok(outcome) => PublishResult {
                        module_id,
                        outcome,
                    },
                    Err(err) => {
                        kcopy_error!("[{}] publish worker stopped: {}", module_id, err);
                        PublishResult {
                            outcome: PublishOutcome::Failed(CopyError::WorkerLost {
                                module_id: module_id.clone(),
                            }),
                            module_id,
                        }
                    }
                },
            };
            results.push(result);
        }

        let published = results.iter().filter(|r| r.is_published()).count();
        kcopy_info!("{} of {} module(s) published", published, results.len());
        results
    }
}

/// The dropped download never reaches its own cleanup.
fn discard_partial(bundle: &Path) {
    let partial = partial_path(bundle);
    match std::fs::remove_file(&partial) {
        Ok(()) => kcopy_debug!("removed {}", partial.display()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => kcopy_warn!("could not remove {}: {}", partial.display(), err),
    }
}

enum Pending {
    Done(PublishResult),
    Running(ModuleId, JoinHandle<PublishOutcome>),
}

/// Convenience wrapper around [`CopyOrchestrator::with_defaults`].
pub async fn copy_modules(
    config: CopyConfig,
    request: &CopyRequest,
    cancel: CancellationToken,
) -> Vec<PublishResult> {
    CopyOrchestrator::with_defaults(config)
        .copy_modules(request, cancel)
        .await
}
