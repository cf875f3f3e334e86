// ─── Archive Engine ───
// Extract/compress behind one async trait. Each call owns its work for its
// whole lifetime: a child process or a blocking task, with progress flowing
// back on a bounded channel that closes when the call returns.

mod seven_zip;
mod zip_engine;

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::error::{TransferError, TransferResult};

pub use self::seven_zip::{parse_progress_line, ProgressParser, SevenZip};
pub use self::zip_engine::ZipEngine;

/// Capacity of the per-call progress channel.
pub const PROGRESS_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Descend into subdirectories of the source.
    pub recursive: bool,
    /// Replace an existing archive instead of failing.
    pub overwrite: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOp {
    Extract,
    Compress,
}

#[async_trait]
pub trait ArchiveEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Unpack every entry of `archive` under `output_dir`. Partial output may
    /// remain on failure; cleaning it up is the caller's job.
    async fn extract(&self, archive: &Path, output_dir: &Path) -> TransferResult<()>;

    /// Pack the contents of `source_dir` (the glob `source_dir/*`) into
    /// `archive`, sending percentages exactly as the packer reports them.
    async fn compress(
        &self,
        archive: &Path,
        source_dir: &Path,
        options: CompressOptions,
        progress: mpsc::Sender<u8>,
    ) -> TransferResult<()>;
}

/// Make room for a new archive at `archive`, honouring the overwrite flag.
pub(crate) async fn prepare_destination(archive: &Path, overwrite: bool) -> TransferResult<()> {
    match tokio::fs::metadata(archive).await {
        Ok(_) if !overwrite => {
            return Err(TransferError::Compress {
                archive: archive.to_path_buf(),
                reason: "archive already exists".to_string(),
            });
        }
        Ok(_) => {
            tokio::fs::remove_file(archive)
                .await
                .map_err(TransferError::io(archive))?;
        }
        Err(_) => {}
    }

    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(TransferError::io(parent))?;
    }
    Ok(())
}

/// Whether `archive` should be handled by the in-process zip engine.
pub fn is_zip(archive: &Path) -> bool {
    archive
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}
