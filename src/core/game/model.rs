use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{TransferError, TransferResult};

/// One installed title as the library knows it.
///
/// `execution_path` points at the launchable file; its parent directory is the
/// install directory. Fields the core does not use (display name, artwork, …)
/// ride along in `extra` so manifests round-trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub id: String,
    pub execution_path: PathBuf,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameMetadata {
    pub fn new(id: impl Into<String>, execution_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            execution_path: execution_path.into(),
            extra: Map::new(),
        }
    }

    pub fn install_dir(&self) -> TransferResult<&Path> {
        self.execution_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .ok_or_else(|| {
                TransferError::InvalidRequest(format!(
                    "game '{}' has no install directory ({:?})",
                    self.id, self.execution_path
                ))
            })
    }

    pub fn executable_name(&self) -> TransferResult<&OsStr> {
        self.execution_path.file_name().ok_or_else(|| {
            TransferError::InvalidRequest(format!(
                "game '{}' has no executable file name ({:?})",
                self.id, self.execution_path
            ))
        })
    }

    /// The id names a bundle subdirectory, so it must be one plain path component.
    pub fn has_safe_id(&self) -> bool {
        let mut components = Path::new(&self.id).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !self.id.contains(['/', '\\'])
    }
}

/// Reject empty batches, unsafe ids and duplicate ids.
pub fn validate_games(games: &[GameMetadata]) -> TransferResult<()> {
    if games.is_empty() {
        return Err(TransferError::InvalidRequest(
            "no games selected".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(games.len());
    for game in games {
        if !game.has_safe_id() {
            return Err(TransferError::InvalidRequest(format!(
                "game id '{}' cannot be used as a folder name",
                game.id
            )));
        }
        if !seen.insert(game.id.as_str()) {
            return Err(TransferError::InvalidRequest(format!(
                "game id '{}' appears more than once",
                game.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{
            "id": "celeste",
            "execution_path": "/games/celeste/Celeste.exe",
            "name": "Celeste",
            "playtime": 42
        }"#;
        let game: GameMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(game.extra["name"], "Celeste");

        let back: GameMetadata =
            serde_json::from_str(&serde_json::to_string(&game).unwrap()).unwrap();
        assert_eq!(back, game);
    }

    #[test]
    fn install_dir_is_parent_of_executable() {
        let game = GameMetadata::new("g1", "/games/g1/bin/run.exe");
        assert_eq!(game.install_dir().unwrap(), Path::new("/games/g1/bin"));
        assert_eq!(game.executable_name().unwrap(), "run.exe");

        let bare = GameMetadata::new("g2", "run.exe");
        assert!(bare.install_dir().is_err());
    }

    #[test]
    fn unsafe_ids_are_rejected() {
        for id in ["", ".", "..", "../escape", "a/b", "a\\b", "/abs"] {
            assert!(!GameMetadata::new(id, "/g/x.exe").has_safe_id(), "{id}");
        }
        assert!(GameMetadata::new("hollow-knight", "/g/x.exe").has_safe_id());
    }

    #[test]
    fn validate_games_rejects_empty_and_duplicates() {
        assert!(validate_games(&[]).is_err());

        let dupes = vec![
            GameMetadata::new("g1", "/a/g1.exe"),
            GameMetadata::new("g1", "/b/g1.exe"),
        ];
        let err = validate_games(&dupes).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
