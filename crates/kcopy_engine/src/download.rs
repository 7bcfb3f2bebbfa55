use std::path::PathBuf;
use std::sync::Arc;

use kcopy_logging::{kcopy_info, kcopy_warn};

use crate::persist::ensure_output_dir;
use crate::title::extract_title;
use crate::{CopyError, Fetcher, ModuleExport};

/// `{source_url}/content/{module_id}/latest`
pub fn detail_url(source_url: &str, module_id: &str) -> String {
    format!(
        "{}/content/{}/latest",
        source_url.trim_end_matches('/'),
        module_id
    )
}

/// `{source_url}/content/{module_id}/latest/module_export?format=zip`
pub fn export_url(source_url: &str, module_id: &str) -> String {
    format!(
        "{}/module_export?format=zip",
        detail_url(source_url, module_id)
    )
}

/// Downloads module export bundles into one directory, named `{module_id}.zip`.
///
/// Safe to share between concurrent downloads: each module writes its own
/// file and nothing else is mutated.
#[derive(Clone)]
pub struct ExportDownloader {
    fetcher: Arc<dyn Fetcher>,
    download_dir: PathBuf,
}

impl ExportDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, download_dir: PathBuf) -> Self {
        Self {
            fetcher,
            download_dir,
        }
    }

    pub fn download_dir(&self) -> &std::path::Path {
        &self.download_dir
    }

    pub fn bundle_path(&self, module_id: &str) -> PathBuf {
        self.download_dir.join(format!("{module_id}.zip"))
    }

    /// Fetch the title and the export bundle of one module. No retries.
    pub async fn download_module(
        &self,
        source_url: &str,
        module_id: &str,
    ) -> Result<ModuleExport, CopyError> {
        kcopy_info!("downloading module {} from {}", module_id, source_url);
        ensure_output_dir(&self.download_dir)?;

        let page_url = detail_url(source_url, module_id);
        let page = self.fetcher.get_text(&page_url).await?;
        let Some(title) = extract_title(&page.text) else {
            kcopy_warn!("no title marker on {}", page_url);
            return Err(CopyError::TitleNotFound {
                module_id: module_id.to_string(),
                url: page_url,
            });
        };

        let target = self.bundle_path(module_id);
        let bytes = self
            .fetcher
            .download(&export_url(source_url, module_id), &target)
            .await?;
        kcopy_info!(
            "module {} ('{}') downloaded: {} bytes at {}",
            module_id,
            title,
            bytes,
            target.display()
        );

        ModuleExport::new(source_url, module_id, title, target)
    }
}
