use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

use super::job::{TransferJob, TransferKind, DOWNLOAD_STAGE};
use super::service::TransferService;
use crate::core::archive::ArchiveOp;
use crate::core::error::{TransferError, TransferResult};

/// A game archive to fetch and unpack into `dest_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Key for the `download-progress` events of this job.
    pub id: String,
    pub url: String,
    pub dest_dir: PathBuf,
    pub file_name: String,
}

impl TransferService {
    /// Download the archive into the job's temp dir, then extract it into
    /// `dest_dir`. Extraction is not reported; the archive goes away with the
    /// temp dir. Returns the bytes downloaded.
    pub async fn download_and_extract(&self, request: DownloadRequest) -> TransferResult<u64> {
        if request.file_name.is_empty()
            || request.file_name.contains(['/', '\\'])
            || request.file_name == ".."
        {
            return Err(TransferError::InvalidRequest(format!(
                "'{}' is not a plain file name",
                request.file_name
            )));
        }

        let mut job = self.start_job(TransferKind::Download, Some(request.id.clone()));
        let result = self.run_download(&mut job, &request).await;
        job.finish(result).await
    }

    async fn run_download(
        &self,
        job: &mut TransferJob,
        request: &DownloadRequest,
    ) -> TransferResult<u64> {
        let archive = job.prepare().await?.join(&request.file_name);
        let engine = self.engine_for(&archive, ArchiveOp::Extract)?;

        job.begin_stage(DOWNLOAD_STAGE);
        let bytes = self
            .downloader()
            .download_file(&request.url, &archive, job.emitter_mut())
            .await?;

        info!(
            "Extracting {:?} into {:?} with {}",
            archive,
            request.dest_dir,
            engine.name()
        );
        tokio::fs::create_dir_all(&request.dest_dir)
            .await
            .map_err(TransferError::io(&request.dest_dir))?;
        engine.extract(&archive, &request.dest_dir).await?;

        Ok(bytes)
    }
}
