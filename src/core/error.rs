use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failed transfer, surfaced to the UI alongside
/// the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferErrorKind {
    Download,
    Extract,
    Compress,
    Size,
    Manifest,
    Io,
    InvalidRequest,
    Launch,
}

/// Underlying reason a download failed.
#[derive(Debug, Error)]
pub enum DownloadCause {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("write to {path:?} failed: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Central error type for the transfer pipeline.
/// Every orchestrated operation returns `Result<T, TransferError>`.
#[derive(Debug, Error)]
pub enum TransferError {
    // ── Network ─────────────────────────────────────────
    #[error("Download of {url} failed: {cause}")]
    Download {
        url: String,
        #[source]
        cause: DownloadCause,
    },

    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Extracting {archive:?} failed: {reason}")]
    Extract { archive: PathBuf, reason: String },

    #[error("Compressing into {archive:?} failed: {reason}")]
    Compress { archive: PathBuf, reason: String },

    // ── Filesystem ──────────────────────────────────────
    #[error("Cannot measure install size at {path:?}: {source}")]
    Size {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Manifest error at {path:?}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Requests ────────────────────────────────────────
    #[error("Invalid transfer request: {0}")]
    InvalidRequest(String),

    #[error("Failed to launch {path:?}: {source}")]
    Launch {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type TransferResult<T> = Result<T, TransferError>;

impl TransferError {
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            TransferError::Download { .. } | TransferError::HttpClient(_) => {
                TransferErrorKind::Download
            }
            TransferError::Extract { .. } => TransferErrorKind::Extract,
            TransferError::Compress { .. } => TransferErrorKind::Compress,
            TransferError::Size { .. } => TransferErrorKind::Size,
            TransferError::Manifest { .. } => TransferErrorKind::Manifest,
            TransferError::Io { .. } => TransferErrorKind::Io,
            TransferError::InvalidRequest(_) => TransferErrorKind::InvalidRequest,
            TransferError::Launch { .. } => TransferErrorKind::Launch,
        }
    }

    /// Build a mapper for `map_err` that tags an IO failure with its path.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> TransferError + '_ {
        move |source| TransferError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn manifest(path: &Path, reason: impl Into<String>) -> TransferError {
        TransferError::Manifest {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(source: std::io::Error) -> Self {
        TransferError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(e: serde_json::Error) -> Self {
        TransferError::Io {
            path: PathBuf::new(),
            source: e.into(),
        }
    }
}

// ── Serialization for Tauri IPC ─────────────────────────
// Commands hand errors to the webview as `{ kind, message }`.
impl Serialize for TransferError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("TransferError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
