use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job::{TransferJob, TransferKind, COMPRESS_STAGE, COPY_STAGE};
use super::service::{validate_destination, TransferService};
use crate::core::archive::{ArchiveEngine, ArchiveOp, CompressOptions, PROGRESS_BUFFER};
use crate::core::error::{TransferError, TransferResult};
use crate::core::game::{validate_games, write_manifest, GameMetadata};
use crate::core::install::{stage_game, CopyStrategy};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedGame {
    pub id: String,
    pub strategy: CopyStrategy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub archive: PathBuf,
    pub games: Vec<ExportedGame>,
}

impl TransferService {
    /// Bundle `games` into `archive`: manifest plus one directory per id, then
    /// compress. The archive is either complete or absent when this returns.
    pub async fn export_games(
        &self,
        games: &[GameMetadata],
        archive: &Path,
    ) -> TransferResult<ExportSummary> {
        validate_games(games)?;
        validate_destination(archive).await?;
        let engine = self.engine_for(archive, ArchiveOp::Compress)?;

        info!("Exporting {} game(s) to {:?}", games.len(), archive);
        let mut job = self.start_job(TransferKind::Export, None);
        let partial = partial_path(archive);

        let result = self
            .run_export(&mut job, engine, games, archive, &partial)
            .await;
        if result.is_err() {
            discard_partial(&partial).await;
        }
        job.finish(result).await
    }

    async fn run_export(
        &self,
        job: &mut TransferJob,
        engine: Arc<dyn ArchiveEngine>,
        games: &[GameMetadata],
        archive: &Path,
        partial: &Path,
    ) -> TransferResult<ExportSummary> {
        let bundle = job.prepare().await?.to_path_buf();
        write_manifest(&bundle, games).await?;

        job.begin_stage(COPY_STAGE);
        job.report(COPY_STAGE, 0.0);
        let exported = self.copy_games(job, games, &bundle).await?;

        job.begin_stage(COMPRESS_STAGE);
        let (tx, mut rx) = mpsc::channel::<u8>(PROGRESS_BUFFER);
        let compress = engine.compress(partial, &bundle, CompressOptions::default(), tx);
        let forward = async {
            while let Some(percent) = rx.recv().await {
                job.report(COMPRESS_STAGE, f64::from(percent));
            }
        };
        let (compressed, ()) = tokio::join!(compress, forward);
        compressed?;

        commit_archive(partial, archive).await?;
        job.complete_stage(COMPRESS_STAGE);

        Ok(ExportSummary {
            archive: archive.to_path_buf(),
            games: exported,
        })
    }

    /// One concurrent copy per game. Every copy runs to completion before the
    /// first error (if any) is returned, so nothing still writes into the
    /// bundle once cleanup starts.
    async fn copy_games(
        &self,
        job: &mut TransferJob,
        games: &[GameMetadata],
        bundle: &Path,
    ) -> TransferResult<Vec<ExportedGame>> {
        let threshold = self.config().large_install_threshold_bytes;
        let mut pending: FuturesUnordered<_> = games
            .iter()
            .map(|game| async move {
                let strategy = stage_game(game, bundle, threshold).await;
                (game.id.clone(), strategy)
            })
            .collect();

        let total = games.len();
        let mut exported = Vec::with_capacity(total);
        let mut first_error = None;

        while let Some((id, outcome)) = pending.next().await {
            match outcome {
                Ok(strategy) => {
                    exported.push(ExportedGame { id, strategy });
                    let done = exported.len() as f64 * 100.0 / total as f64;
                    job.report(COPY_STAGE, done);
                }
                Err(e) => {
                    warn!("Copying game '{}' failed: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(exported),
        }
    }
}

/// Sibling path the packer writes to before the archive is committed. The
/// extension is kept last so extension-sniffing packers pick the same format.
fn partial_path(archive: &Path) -> PathBuf {
    let token = Uuid::new_v4().simple().to_string();
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match archive.extension() {
        Some(ext) => format!(".{stem}.{}.partial.{}", &token[..8], ext.to_string_lossy()),
        None => format!(".{stem}.{}.partial", &token[..8]),
    };
    archive.with_file_name(name)
}

async fn commit_archive(partial: &Path, archive: &Path) -> TransferResult<()> {
    if tokio::fs::metadata(archive).await.is_ok() {
        tokio::fs::remove_file(archive)
            .await
            .map_err(TransferError::io(archive))?;
    }
    tokio::fs::rename(partial, archive)
        .await
        .map_err(TransferError::io(archive))?;
    debug!("Committed {:?}", archive);
    Ok(())
}

async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => debug!("Removed partial archive {:?}", partial),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial archive {:?}: {}", partial, e),
    }
}
