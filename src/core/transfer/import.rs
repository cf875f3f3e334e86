use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::job::{TransferJob, TransferKind, EXTRACT_STAGE};
use super::service::TransferService;
use crate::core::archive::{ArchiveEngine, ArchiveOp};
use crate::core::error::{TransferError, TransferResult};
use crate::core::game::{read_manifest, GameMetadata, MANIFEST_FILE};
use crate::core::install::{move_dir, remove_dir_if_exists};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Entries exactly as the bundle's manifest lists them.
    pub manifest: Vec<GameMetadata>,
    /// The same entries with `execution_path` pointing into `dest_root`.
    pub installed: Vec<GameMetadata>,
}

impl TransferService {
    /// Unpack a bundle and install each game it carries at `dest_root/<id>`.
    pub async fn import_games(
        &self,
        archive: &Path,
        dest_root: &Path,
    ) -> TransferResult<ImportSummary> {
        match tokio::fs::metadata(archive).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return Err(TransferError::InvalidRequest(format!(
                    "bundle {archive:?} does not exist"
                )));
            }
        }
        let engine = self.engine_for(archive, ArchiveOp::Extract)?;

        info!("Importing {:?} into {:?}", archive, dest_root);
        let mut job = self.start_job(TransferKind::Import, None);
        let result = run_import(&mut job, engine.as_ref(), archive, dest_root).await;
        job.finish(result).await
    }
}

async fn run_import(
    job: &mut TransferJob,
    engine: &dyn ArchiveEngine,
    archive: &Path,
    dest_root: &Path,
) -> TransferResult<ImportSummary> {
    let staging = job.prepare().await?.to_path_buf();
    job.begin_stage(EXTRACT_STAGE);
    job.report(EXTRACT_STAGE, 0.0);

    engine.extract(archive, &staging).await?;
    let manifest = read_manifest(&staging).await?;
    let installed = install_games(&staging, dest_root, &manifest).await?;

    job.complete_stage(EXTRACT_STAGE);
    Ok(ImportSummary {
        manifest,
        installed,
    })
}

/// Move every game out of `staging` into `dest_root/<id>`. Either all games
/// land or none do: on a failed move the targets already moved are removed.
async fn install_games(
    staging: &Path,
    dest_root: &Path,
    manifest: &[GameMetadata],
) -> TransferResult<Vec<GameMetadata>> {
    let manifest_path = staging.join(MANIFEST_FILE);
    let mut planned: Vec<(PathBuf, PathBuf, GameMetadata)> = Vec::with_capacity(manifest.len());
    for game in manifest {
        let source = staging.join(&game.id);
        if !tokio::fs::metadata(&source)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(TransferError::manifest(
                &manifest_path,
                format!("bundle has no folder for game '{}'", game.id),
            ));
        }
        let executable = game
            .executable_name()
            .map_err(|e| TransferError::manifest(&manifest_path, e.to_string()))?;
        let target = dest_root.join(&game.id);
        if tokio::fs::metadata(&target).await.is_ok() {
            return Err(TransferError::InvalidRequest(format!(
                "game '{}' is already installed at {:?}",
                game.id, target
            )));
        }

        let mut moved = game.clone();
        moved.execution_path = target.join(executable);
        planned.push((source, target, moved));
    }

    tokio::fs::create_dir_all(dest_root)
        .await
        .map_err(TransferError::io(dest_root))?;

    let mut landed: Vec<PathBuf> = Vec::with_capacity(planned.len());
    let mut installed = Vec::with_capacity(planned.len());
    for (source, target, moved) in planned {
        if let Err(e) = move_dir(&source, &target).await {
            // A partial copy may sit at the failing target too.
            landed.push(target);
            roll_back(&landed).await;
            return Err(e);
        }
        debug!("Installed '{}' at {:?}", moved.id, target);
        landed.push(target);
        installed.push(moved);
    }
    Ok(installed)
}

async fn roll_back(targets: &[PathBuf]) {
    for target in targets {
        match remove_dir_if_exists(target).await {
            Ok(_) => debug!("Rolled back {:?}", target),
            Err(e) => warn!("Failed to roll back {:?}: {}", target, e),
        }
    }
}
