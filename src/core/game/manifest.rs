// ─── Bundle manifest ───
// `config.json` at the bundle root: a JSON array of GameMetadata. Written
// before any bulk copy so an interrupted export still describes itself.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::model::{validate_games, GameMetadata};
use crate::core::error::{TransferError, TransferResult};

pub const MANIFEST_FILE: &str = "config.json";

pub async fn write_manifest(dir: &Path, games: &[GameMetadata]) -> TransferResult<PathBuf> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(games)
        .map_err(|e| TransferError::manifest(&path, e.to_string()))?;

    tokio::fs::write(&path, json)
        .await
        .map_err(TransferError::io(&path))?;

    debug!("Wrote manifest with {} games to {:?}", games.len(), path);
    Ok(path)
}

/// Read and validate the manifest of an extracted bundle.
///
/// Ids come from an untrusted archive, so they are checked before anyone joins
/// them onto a path.
pub async fn read_manifest(dir: &Path) -> TransferResult<Vec<GameMetadata>> {
    let path = dir.join(MANIFEST_FILE);

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TransferError::manifest(&path, "bundle has no manifest"));
        }
        Err(e) => return Err(TransferError::manifest(&path, e.to_string())),
    };

    let games: Vec<GameMetadata> =
        serde_json::from_str(&raw).map_err(|e| TransferError::manifest(&path, e.to_string()))?;

    validate_games(&games).map_err(|e| TransferError::manifest(&path, e.to_string()))?;

    debug!("Read manifest with {} games from {:?}", games.len(), path);
    Ok(games)
}
