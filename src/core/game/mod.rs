mod manifest;
mod model;

pub use manifest::{read_manifest, write_manifest, MANIFEST_FILE};
pub use model::{validate_games, GameMetadata};
