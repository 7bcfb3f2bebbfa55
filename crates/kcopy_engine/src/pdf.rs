use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use kcopy_logging::{kcopy_info, kcopy_warn};
use scraper::{Html, Selector};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::PdfSettings;
use crate::fetch::ReqwestFetcher;
use crate::persist::{ensure_output_dir, PersistError};
use crate::{FetchError, Fetcher};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("pdf for {collection_id} still not ready after {polls} checks")]
    NeverReady { collection_id: String, polls: u32 },
    #[error("download directory: {0}")]
    Persist(#[from] PersistError),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug)]
pub struct PdfResult {
    pub collection_id: String,
    pub outcome: Result<PathBuf, PdfError>,
}

/// `{server_url}/content/{collection_id}/latest/{endpoint}`
pub fn collection_url(server_url: &str, collection_id: &str, endpoint: &str) -> String {
    format!(
        "{}/content/{}/latest/{}",
        server_url.trim_end_matches('/'),
        collection_id,
        endpoint
    )
}

/// Completion time of the last PDF build, read from the third cell of the
/// print-tool status table. `None` while the PDF is still being generated.
pub fn pdf_completion_time(status_page: &str) -> Option<String> {
    let doc = Html::parse_document(status_page);
    let cell = Selector::parse("td").ok()?;
    doc.select(&cell)
        .nth(2)
        .map(|td| td.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

/// Parse a print-tool completion time. The server writes UTC as
/// `Universal`; explicit offsets are honoured.
pub fn parse_completion_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let naive_part = ["Universal", "UTC", "GMT"]
        .iter()
        .find_map(|zone| raw.strip_suffix(zone))
        .map(str::trim_end);

    if let Some(naive) = naive_part {
        return NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
            .map(|naive| naive.and_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y/%m/%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S%.f %z"]
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// `1h 02m 05s` style rendering of how old a PDF is.
pub fn format_age(age: TimeDelta) -> String {
    let total = age.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{sign}{hours}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{sign}{minutes}m {seconds:02}s")
    }
}

/// Polls collections until their PDF export is available and downloads it.
pub struct PdfPoller {
    fetcher: Arc<dyn Fetcher>,
    settings: PdfSettings,
}

impl PdfPoller {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: PdfSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn with_defaults(settings: PdfSettings) -> Self {
        let fetcher = Arc::new(ReqwestFetcher::new(settings.fetch.clone()));
        Self::new(fetcher, settings)
    }

    /// One result per collection, in request order.
    pub async fn download_pdfs(
        &self,
        server_url: &str,
        collection_ids: &[String],
        cancel: CancellationToken,
    ) -> Vec<PdfResult> {
        let tasks = collection_ids.iter().map(|collection_id| {
            let cancel = cancel.clone();
            async move {
                let outcome = tokio::select! {
                    outcome = self.download_when_ready(server_url, collection_id) => outcome,
                    _ = cancel.cancelled() => Err(PdfError::Cancelled),
                };
                if let Err(err) = &outcome {
                    kcopy_warn!("[{}] pdf download failed: {}", collection_id, err);
                }
                PdfResult {
                    collection_id: collection_id.clone(),
                    outcome,
                }
            }
        });
        join_all(tasks).await
    }

    async fn download_when_ready(
        &self,
        server_url: &str,
        collection_id: &str,
    ) -> Result<PathBuf, PdfError> {
        ensure_output_dir(&self.settings.download_dir)?;
        let status_url = collection_url(server_url, collection_id, "query_ptool");
        let started = Utc::now();

        for poll in 1..=self.settings.max_polls {
            let page = self.fetcher.get_text(&status_url).await?;
            if let Some(completed) = pdf_completion_time(&page.text) {
                match parse_completion_time(&completed) {
                    Some(at) => kcopy_info!(
                        "[{}] pdf completed at {} ({} old)",
                        collection_id,
                        at.to_rfc3339(),
                        format_age(started - at)
                    ),
                    None => kcopy_info!(
                        "[{}] pdf completed at '{}' (unrecognised time format)",
                        collection_id,
                        completed
                    ),
                }
                return self.download_pdf(server_url, collection_id).await;
            }
            if poll < self.settings.max_polls {
                kcopy_info!(
                    "[{}] pdf not ready at {}; checking again in {:?}",
                    collection_id,
                    status_url,
                    self.settings.poll_interval
                );
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        }

        Err(PdfError::NeverReady {
            collection_id: collection_id.to_string(),
            polls: self.settings.max_polls,
        })
    }

    async fn download_pdf(&self, server_url: &str, collection_id: &str) -> Result<PathBuf, PdfError> {
        let filename = if self.settings.timestamp {
            format!("{}-{}.pdf", collection_id, Local::now().format("%Y%m%d-%H%M"))
        } else {
            format!("{collection_id}.pdf")
        };
        let target = self.settings.download_dir.join(filename);
        kcopy_info!("[{}] downloading pdf to {}", collection_id, target.display());
        self.fetcher
            .download(&collection_url(server_url, collection_id, "pdf"), &target)
            .await?;
        Ok(target)
    }
}
