use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::job::{TransferJob, TransferKind};
use crate::core::archive::{is_zip, ArchiveEngine, ArchiveOp, SevenZip, ZipEngine};
use crate::core::config::TransferConfig;
use crate::core::downloader::Downloader;
use crate::core::error::{TransferError, TransferResult};
use crate::core::http::build_http_client;
use crate::core::progress::ProgressHub;

/// Entry point for every orchestrated transfer.
///
/// Holds the process-wide immutable pieces: configuration, the HTTP client,
/// the 7-Zip binary resolved at startup and the progress listener registry.
pub struct TransferService {
    config: TransferConfig,
    downloader: Downloader,
    seven_zip: Option<Arc<SevenZip>>,
    engine_override: Option<Arc<dyn ArchiveEngine>>,
    progress: Arc<ProgressHub>,
}

impl TransferService {
    pub fn new(config: TransferConfig) -> TransferResult<Self> {
        let client = build_http_client(&config)?;
        let seven_zip = match SevenZip::locate(config.seven_zip_path.as_deref()) {
            Ok(engine) => Some(Arc::new(engine)),
            Err(e) => {
                warn!("7-Zip unavailable, only .zip bundles will work: {}", e);
                None
            }
        };

        info!(
            "Transfer service ready (temp root {:?}, large install threshold {} bytes)",
            config.temp_root(),
            config.large_install_threshold_bytes
        );

        Ok(Self {
            config,
            downloader: Downloader::new(client),
            seven_zip,
            engine_override: None,
            progress: Arc::new(ProgressHub::new()),
        })
    }

    /// Route every archive through `engine` regardless of extension.
    pub fn with_engine(mut self, engine: Arc<dyn ArchiveEngine>) -> Self {
        self.engine_override = Some(engine);
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn progress(&self) -> &Arc<ProgressHub> {
        &self.progress
    }

    pub(crate) fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub(crate) fn start_job(&self, kind: TransferKind, id: Option<String>) -> TransferJob {
        let emitter = self.progress.emitter(kind.channel(), id);
        TransferJob::new(kind, &self.config.temp_root(), emitter)
    }

    /// Pick the engine for `archive`: `.zip` stays in-process, everything else
    /// goes to 7-Zip.
    pub fn engine_for(&self, archive: &Path, op: ArchiveOp) -> TransferResult<Arc<dyn ArchiveEngine>> {
        if let Some(engine) = &self.engine_override {
            return Ok(Arc::clone(engine));
        }
        if is_zip(archive) {
            return Ok(Arc::new(ZipEngine));
        }
        if let Some(seven_zip) = &self.seven_zip {
            return Ok(Arc::clone(seven_zip) as Arc<dyn ArchiveEngine>);
        }

        let reason = "7-Zip is not available; install it or set GAMESHELF_7Z".to_string();
        Err(match op {
            ArchiveOp::Extract => TransferError::Extract {
                archive: archive.to_path_buf(),
                reason,
            },
            ArchiveOp::Compress => TransferError::Compress {
                archive: archive.to_path_buf(),
                reason,
            },
        })
    }
}

/// The destination's parent must be an existing directory and the destination
/// itself must not be a directory.
pub(crate) async fn validate_destination(archive: &Path) -> TransferResult<()> {
    if archive.file_name().is_none() {
        return Err(TransferError::InvalidRequest(format!(
            "{archive:?} is not a file path"
        )));
    }

    let parent = match archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };
    match tokio::fs::metadata(&parent).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            return Err(TransferError::InvalidRequest(format!(
                "destination folder {parent:?} does not exist"
            )));
        }
    }

    if let Ok(meta) = tokio::fs::metadata(archive).await {
        if meta.is_dir() {
            return Err(TransferError::InvalidRequest(format!(
                "destination {archive:?} is a directory"
            )));
        }
    }
    Ok(())
}
