use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::error::{DownloadCause, TransferError, TransferResult};
use crate::core::progress::ProgressEmitter;

/// Streaming, single-attempt downloader.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Stream `url` into `dest`, overwriting it. Returns the bytes written.
    ///
    /// When the response declares a non-zero `Content-Length`, every chunk
    /// emits the floor percentage capped at 99, and 100 follows once the file
    /// is flushed. Without a length nothing is emitted. On error the partially
    /// written file is left for the caller to remove.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressEmitter,
    ) -> TransferResult<u64> {
        let failed = |cause: DownloadCause| TransferError::Download {
            url: url.to_string(),
            cause,
        };
        let write_failed = |source: std::io::Error| {
            failed(DownloadCause::Write {
                path: dest.to_path_buf(),
                source,
            })
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(write_failed)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(DownloadCause::Status(status.as_u16())));
        }

        let total_bytes = response.content_length().filter(|len| *len > 0);
        info!(
            "Downloading {} -> {:?} ({})",
            url,
            dest,
            total_bytes.map_or_else(|| "unknown size".to_string(), |n| format!("{n} bytes"))
        );

        let mut stream = response.bytes_stream();
        let mut received = 0_u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.into()))?;
            file.write_all(&chunk).await.map_err(write_failed)?;
            received += chunk.len() as u64;

            if let Some(total) = total_bytes {
                progress.emit(download_percent(received, total));
            }
        }

        file.flush().await.map_err(write_failed)?;
        // Release the handle before anyone reopens the archive (Windows locks it).
        drop(file);

        if total_bytes.is_some() {
            progress.emit(100);
        }

        debug!("Downloaded {} bytes from {}", received, url);
        Ok(received)
    }
}

/// In-flight percentage: floor of the received fraction, never 100 before the
/// stream has ended.
pub fn download_percent(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = u128::from(received) * 100 / u128::from(total);
    percent.min(99) as u8
}
