#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gameshelf_lib::core::config::TransferConfig;
use gameshelf_lib::core::game::GameMetadata;
use gameshelf_lib::core::progress::{ProgressChannel, ProgressEvent};
use gameshelf_lib::core::transfer::TransferService;

/// Threshold used by tests in place of the real 2 GiB one.
pub const SMALL_THRESHOLD: u64 = 1024;

pub fn test_config(root: &Path) -> TransferConfig {
    TransferConfig {
        temp_root: Some(root.join("tmp")),
        large_install_threshold_bytes: SMALL_THRESHOLD,
        http_timeout_secs: 5,
        ..TransferConfig::default()
    }
}

pub fn service(root: &Path) -> TransferService {
    TransferService::new(test_config(root)).expect("service starts")
}

/// Collect every event delivered on `channel`.
pub fn record(service: &TransferService, channel: ProgressChannel) -> Arc<Mutex<Vec<ProgressEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    service.progress().subscribe(
        channel,
        Arc::new(move |_: ProgressChannel, event: &ProgressEvent| {
            sink.lock().unwrap().push(event.clone());
        }),
    );
    seen
}

pub fn percents(events: &Mutex<Vec<ProgressEvent>>) -> Vec<u8> {
    events.lock().unwrap().iter().map(|e| e.percent).collect()
}

pub fn assert_non_decreasing_to_100(values: &[u8]) {
    assert!(!values.is_empty(), "no progress events");
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
    assert_eq!(values.last(), Some(&100), "{values:?}");
}

/// True when no job left anything behind under the temp root.
pub fn temp_root_is_empty(root: &Path) -> bool {
    match std::fs::read_dir(root.join("tmp")) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Install a game under `root/library/<id>` with `<id>.exe` plus `files`
/// (relative path, size in bytes).
pub fn install_game(root: &Path, id: &str, files: &[(&str, usize)]) -> GameMetadata {
    let install_dir = root.join("library").join(id);
    std::fs::create_dir_all(&install_dir).unwrap();
    let exe = install_dir.join(format!("{id}.exe"));
    std::fs::write(&exe, format!("MZ-{id}")).unwrap();

    for (relative, size) in files {
        let path = install_dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![7u8; *size]).unwrap();
    }

    let mut game = GameMetadata::new(id, exe);
    game.extra
        .insert("title".into(), serde_json::Value::String(format!("Game {id}")));
    game
}

pub fn sorted_by_id(mut games: Vec<GameMetadata>) -> Vec<GameMetadata> {
    games.sort_by(|a, b| a.id.cmp(&b.id));
    games
}

pub fn file_names(dir: &Path) -> Vec<PathBuf> {
    let mut names: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| PathBuf::from(e.unwrap().file_name()))
        .collect();
    names.sort();
    names
}
