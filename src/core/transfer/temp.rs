use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::job::TransferKind;
use crate::core::error::{TransferError, TransferResult};
use crate::core::install::remove_dir_if_exists;

/// Scratch directory owned by exactly one job.
///
/// The path is allocated up front but only created on demand. Removal happens
/// at most once; if the owner never gets that far (panic, dropped future) the
/// `Drop` impl removes it synchronously.
#[derive(Debug)]
pub struct TempWorkspace {
    path: PathBuf,
    created: bool,
    removed: bool,
}

impl TempWorkspace {
    pub fn allocate(root: &Path, kind: TransferKind) -> Self {
        let name = format!(
            "{}-{}-{}",
            kind.label(),
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            Uuid::new_v4().simple()
        );
        Self {
            path: root.join(name),
            created: false,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory. The final component uses `create_dir`, so a name
    /// collision fails rather than sharing another job's directory.
    pub async fn create(&mut self) -> TransferResult<&Path> {
        if !self.created {
            if let Some(root) = self.path.parent() {
                tokio::fs::create_dir_all(root)
                    .await
                    .map_err(TransferError::io(root))?;
            }
            tokio::fs::create_dir(&self.path)
                .await
                .map_err(TransferError::io(&self.path))?;
            self.created = true;
            debug!("Created temp workspace {:?}", self.path);
        }
        Ok(&self.path)
    }

    /// Remove the directory if this workspace created it. Later calls are no-ops.
    pub async fn remove(&mut self) -> TransferResult<()> {
        if !self.created || self.removed {
            return Ok(());
        }
        self.removed = true;
        remove_dir_if_exists(&self.path).await?;
        debug!("Removed temp workspace {:?}", self.path);
        Ok(())
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if self.created && !self.removed {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove abandoned temp dir {:?}: {}", self.path, e);
                }
            }
        }
    }
}
