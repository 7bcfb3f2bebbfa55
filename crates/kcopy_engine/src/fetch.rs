use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use kcopy_logging::{kcopy_debug, kcopy_warn};
use tokio::io::AsyncWriteExt;

use crate::persist::partial_path;
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            redirect_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub text: String,
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return its body as text. Any non-200 status is an error.
    async fn get_text(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// GET `url` and stream the body into `target`, returning the byte count.
    ///
    /// The body is written to a `.part` sibling first and only renamed onto
    /// `target` once the stream ended cleanly.
    async fn download(&self, url: &str, target: &Path) -> Result<u64, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self, url: &str) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(url, FailureKind::Network, err.to_string()))
    }

    async fn get_ok(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(url, FailureKind::InvalidUrl, err.to_string()))?;
        let client = self.build_client(url)?;

        kcopy_debug!("GET {}", url);
        let response = client
            .get(parsed)
            .send()
            .await
            .map_err(|err| map_reqwest_error(url, err))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::new(
                url,
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn get_text(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.get_ok(url).await?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|err| map_reqwest_error(url, err))?;
        Ok(FetchedPage {
            url: url.to_string(),
            status,
            text,
        })
    }

    async fn download(&self, url: &str, target: &Path) -> Result<u64, FetchError> {
        let response = self.get_ok(url).await?;
        let partial = partial_path(target);

        let result = stream_to_file(url, response, &partial).await;
        let written = match result {
            Ok(written) => written,
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    kcopy_warn!("could not remove {}: {}", partial.display(), cleanup);
                }
                return Err(err);
            }
        };

        tokio::fs::rename(&partial, target)
            .await
            .map_err(|err| io_error(url, err))?;
        kcopy_debug!("wrote {} bytes to {}", written, target.display());
        Ok(written)
    }
}

async fn stream_to_file(
    url: &str,
    response: reqwest::Response,
    partial: &Path,
) -> Result<u64, FetchError> {
    // The handle is dropped (and closed) on every return path.
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|err| io_error(url, err))?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| map_reqwest_error(url, err))?;
        file.write_all(&chunk)
            .await
            .map_err(|err| io_error(url, err))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|err| io_error(url, err))?;
    Ok(written)
}

fn io_error(url: &str, err: std::io::Error) -> FetchError {
    FetchError::new(url, FailureKind::Io, err.to_string())
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(url, FailureKind::Timeout, err.to_string());
    }
    FetchError::new(url, FailureKind::Network, err.to_string())
}
