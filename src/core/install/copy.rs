use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::size::size_of;
use crate::core::error::{TransferError, TransferResult};
use crate::core::game::GameMetadata;

/// How much of an install goes into an export bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStrategy {
    /// The whole install directory.
    FullTree,
    /// Only the primary executable. Used for installs at or above the threshold.
    ExecutableOnly,
}

impl CopyStrategy {
    pub fn choose(install_size: u64, threshold: u64) -> Self {
        if install_size < threshold {
            CopyStrategy::FullTree
        } else {
            CopyStrategy::ExecutableOnly
        }
    }
}

/// Copy one game into `bundle_root/<id>` according to its install size.
pub async fn stage_game(
    game: &GameMetadata,
    bundle_root: &Path,
    threshold: u64,
) -> TransferResult<CopyStrategy> {
    let install_dir = game.install_dir()?;
    let install_size = size_of(install_dir).await?;
    let strategy = CopyStrategy::choose(install_size, threshold);
    let target = bundle_root.join(&game.id);

    match strategy {
        CopyStrategy::FullTree => {
            copy_dir_recursive(install_dir, &target).await?;
        }
        CopyStrategy::ExecutableOnly => {
            let file_name = game.executable_name()?;
            tokio::fs::create_dir_all(&target)
                .await
                .map_err(TransferError::io(&target))?;
            let dest = target.join(file_name);
            tokio::fs::copy(&game.execution_path, &dest)
                .await
                .map_err(TransferError::io(&game.execution_path))?;
        }
    }

    info!(
        "Staged game '{}' ({} bytes) as {:?}",
        game.id, install_size, strategy
    );
    Ok(strategy)
}

/// Copy directories and regular files from `source` into `destination`.
/// Returns the number of files copied.
pub async fn copy_dir_recursive(source: &Path, destination: &Path) -> TransferResult<u64> {
    let mut copied = 0_u64;
    let mut stack: Vec<(PathBuf, PathBuf)> =
        vec![(source.to_path_buf(), destination.to_path_buf())];

    while let Some((src_dir, dst_dir)) = stack.pop() {
        tokio::fs::create_dir_all(&dst_dir)
            .await
            .map_err(TransferError::io(&dst_dir))?;

        let mut entries = tokio::fs::read_dir(&src_dir)
            .await
            .map_err(TransferError::io(&src_dir))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(TransferError::io(&src_dir))?
        {
            let src_path = entry.path();
            let dst_path = dst_dir.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(TransferError::io(&src_path))?;

            if file_type.is_dir() {
                stack.push((src_path, dst_path));
            } else if file_type.is_file() {
                tokio::fs::copy(&src_path, &dst_path)
                    .await
                    .map_err(TransferError::io(&src_path))?;
                copied += 1;
            }
        }
    }

    debug!("Copied {} files {:?} -> {:?}", copied, source, destination);
    Ok(copied)
}

/// Move a directory, falling back to copy + delete across filesystems.
pub async fn move_dir(source: &Path, destination: &Path) -> TransferResult<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(TransferError::io(parent))?;
    }

    match tokio::fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                "Rename {:?} -> {:?} failed ({}), copying instead",
                source, destination, e
            );
            copy_dir_recursive(source, destination).await?;
            remove_dir_if_exists(source).await?;
            Ok(())
        }
    }
}

/// Recursive delete that treats an absent directory as success.
/// Returns whether anything was removed.
pub async fn remove_dir_if_exists(path: &Path) -> TransferResult<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(TransferError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
