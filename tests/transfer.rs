mod common;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gameshelf_lib::core::archive::{ArchiveEngine, CompressOptions, ZipEngine};
use gameshelf_lib::core::error::{TransferError, TransferErrorKind, TransferResult};
use gameshelf_lib::core::game::{read_manifest, GameMetadata};
use gameshelf_lib::core::install::CopyStrategy;
use gameshelf_lib::core::progress::ProgressChannel;
use tokio::sync::mpsc;

use common::*;

/// Packer that reports a little progress, leaves junk at the archive path and
/// then fails.
struct BrokenPacker;

#[async_trait]
impl ArchiveEngine for BrokenPacker {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn extract(&self, archive: &Path, _output_dir: &Path) -> TransferResult<()> {
        Err(TransferError::Extract {
            archive: archive.to_path_buf(),
            reason: "unsupported".into(),
        })
    }

    async fn compress(
        &self,
        archive: &Path,
        _source_dir: &Path,
        _options: CompressOptions,
        progress: mpsc::Sender<u8>,
    ) -> TransferResult<()> {
        let _ = progress.send(10).await;
        std::fs::write(archive, b"half an archive").unwrap();
        Err(TransferError::Compress {
            archive: archive.to_path_buf(),
            reason: "disk full".into(),
        })
    }
}

/// g1 fits under the threshold, g2 does not.
fn scenario_games(root: &Path) -> Vec<GameMetadata> {
    vec![
        install_game(root, "g1", &[("assets/a.pak", 100), ("readme.txt", 20)]),
        install_game(root, "g2", &[("assets/huge.pak", 4 * SMALL_THRESHOLD as usize)]),
    ]
}

#[tokio::test]
async fn export_then_import_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let games = scenario_games(root.path());
    let out_dir = root.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();
    let archive = out_dir.join("bundle.zip");

    let service = service(root.path());
    let exported = record(&service, ProgressChannel::Export);
    let summary = service.export_games(&games, &archive).await.unwrap();

    assert_eq!(summary.archive, archive);
    let mut strategies: Vec<(String, CopyStrategy)> = summary
        .games
        .iter()
        .map(|g| (g.id.clone(), g.strategy))
        .collect();
    strategies.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        strategies,
        vec![
            ("g1".to_string(), CopyStrategy::FullTree),
            ("g2".to_string(), CopyStrategy::ExecutableOnly),
        ]
    );
    assert_eq!(file_names(&out_dir), vec![Path::new("bundle.zip").to_path_buf()]);
    assert_non_decreasing_to_100(&percents(&exported));
    assert!(temp_root_is_empty(root.path()));

    // The bundle itself: manifest plus one folder per id.
    let unpacked = root.path().join("unpacked");
    ZipEngine.extract(&archive, &unpacked).await.unwrap();
    assert_eq!(
        sorted_by_id(read_manifest(&unpacked).await.unwrap()),
        sorted_by_id(games.clone())
    );
    assert!(unpacked.join("g1/assets/a.pak").is_file());
    assert!(unpacked.join("g1/readme.txt").is_file());
    assert_eq!(file_names(&unpacked.join("g2")), vec![Path::new("g2.exe").to_path_buf()]);

    let imported = record(&service, ProgressChannel::Import);
    let dest_root = root.path().join("restored");
    let result = service.import_games(&archive, &dest_root).await.unwrap();

    assert_eq!(sorted_by_id(result.manifest), sorted_by_id(games.clone()));
    let installed = sorted_by_id(result.installed);
    assert_eq!(installed[0].execution_path, dest_root.join("g1").join("g1.exe"));
    assert_eq!(installed[1].execution_path, dest_root.join("g2").join("g2.exe"));
    assert_eq!(installed[0].extra, games[0].extra);
    assert_eq!(std::fs::read(dest_root.join("g1/g1.exe")).unwrap(), b"MZ-g1");
    assert_eq!(std::fs::read(dest_root.join("g1/assets/a.pak")).unwrap().len(), 100);
    assert!(!dest_root.join("g2/assets").exists());

    let import_percents = percents(&imported);
    assert_eq!(import_percents.first(), Some(&0));
    assert_non_decreasing_to_100(&import_percents);
    assert!(temp_root_is_empty(root.path()));
}

#[tokio::test]
async fn export_overwrites_existing_archive() {
    let root = tempfile::tempdir().unwrap();
    let games = vec![install_game(root.path(), "solo", &[])];
    let archive = root.path().join("bundle.zip");
    std::fs::write(&archive, b"stale").unwrap();

    service(root.path()).export_games(&games, &archive).await.unwrap();

    let unpacked = root.path().join("unpacked");
    ZipEngine.extract(&archive, &unpacked).await.unwrap();
    assert!(unpacked.join("solo/solo.exe").is_file());
}

#[tokio::test]
async fn one_failing_copy_fails_the_export() {
    let root = tempfile::tempdir().unwrap();
    let mut games: Vec<GameMetadata> = (0..4)
        .map(|i| install_game(root.path(), &format!("ok{i}"), &[("data.bin", 64)]))
        .collect();
    games.push(GameMetadata::new(
        "ghost",
        root.path().join("library/ghost/ghost.exe"),
    ));

    let out_dir = root.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();
    let archive = out_dir.join("bundle.zip");

    let err = service(root.path())
        .export_games(&games, &archive)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), TransferErrorKind::Size);
    assert!(file_names(&out_dir).is_empty());
    assert!(temp_root_is_empty(root.path()));
}

#[tokio::test]
async fn failed_compression_leaves_no_archive() {
    let root = tempfile::tempdir().unwrap();
    let games = scenario_games(root.path());
    let out_dir = root.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();
    let archive = out_dir.join("bundle.7z");

    let service = service(root.path()).with_engine(Arc::new(BrokenPacker));
    let events = record(&service, ProgressChannel::Export);
    let err = service.export_games(&games, &archive).await.unwrap_err();

    assert_eq!(err.kind(), TransferErrorKind::Compress);
    assert!(file_names(&out_dir).is_empty(), "{:?}", file_names(&out_dir));
    assert!(temp_root_is_empty(root.path()));

    let seen = percents(&events);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert!(!seen.contains(&100), "{seen:?}");
}

#[tokio::test]
async fn export_rejects_bad_requests() {
    let root = tempfile::tempdir().unwrap();
    let service = service(root.path());
    let game = install_game(root.path(), "g1", &[]);

    let empty = service
        .export_games(&[], &root.path().join("bundle.zip"))
        .await
        .unwrap_err();
    assert_eq!(empty.kind(), TransferErrorKind::InvalidRequest);

    let duplicate = service
        .export_games(&[game.clone(), game.clone()], &root.path().join("bundle.zip"))
        .await
        .unwrap_err();
    assert_eq!(duplicate.kind(), TransferErrorKind::InvalidRequest);

    let missing_parent = service
        .export_games(&[game.clone()], &root.path().join("nowhere/bundle.zip"))
        .await
        .unwrap_err();
    assert_eq!(missing_parent.kind(), TransferErrorKind::InvalidRequest);

    let mut escaping = game;
    escaping.id = "../evil".into();
    let unsafe_id = service
        .export_games(&[escaping], &root.path().join("bundle.zip"))
        .await
        .unwrap_err();
    assert_eq!(unsafe_id.kind(), TransferErrorKind::InvalidRequest);
    assert!(temp_root_is_empty(root.path()));
}

#[tokio::test]
async fn import_without_manifest_fails_and_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let source = root.path().join("bundle");
    std::fs::create_dir_all(source.join("g1")).unwrap();
    std::fs::write(source.join("g1/g1.exe"), b"MZ").unwrap();
    let archive = root.path().join("bundle.zip");
    let (tx, _rx) = mpsc::channel(64);
    ZipEngine
        .compress(&archive, &source, CompressOptions::default(), tx)
        .await
        .unwrap();

    let dest_root = root.path().join("restored");
    let err = service(root.path())
        .import_games(&archive, &dest_root)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), TransferErrorKind::Manifest);
    assert!(!dest_root.join("g1").exists());
    assert!(temp_root_is_empty(root.path()));
}

#[tokio::test]
async fn import_with_bad_entry_installs_nothing() {
    let root = tempfile::tempdir().unwrap();
    let source = root.path().join("bundle");
    std::fs::create_dir_all(source.join("g1")).unwrap();
    std::fs::create_dir_all(source.join("g2")).unwrap();
    std::fs::write(source.join("g1/g1.exe"), b"MZ-g1").unwrap();
    std::fs::write(source.join("g2/g2.exe"), b"MZ-g2").unwrap();
    std::fs::write(
        source.join("config.json"),
        r#"[{"id":"g1","execution_path":"/g/g1/g1.exe"},{"id":"g2","execution_path":".."}]"#,
    )
    .unwrap();
    let archive = root.path().join("bundle.zip");
    let (tx, _rx) = mpsc::channel(64);
    ZipEngine
        .compress(&archive, &source, CompressOptions::default(), tx)
        .await
        .unwrap();

    let service = service(root.path());
    let dest_root = root.path().join("restored");

    for _ in 0..2 {
        let err = service.import_games(&archive, &dest_root).await.unwrap_err();
        assert_eq!(err.kind(), TransferErrorKind::Manifest, "{err}");
        let leftovers = std::fs::read_dir(&dest_root)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
        assert!(temp_root_is_empty(root.path()));
    }
}

#[tokio::test]
async fn import_refuses_to_overwrite_installed_games() {
    let root = tempfile::tempdir().unwrap();
    let games = scenario_games(root.path());
    let archive = root.path().join("bundle.zip");
    let service = service(root.path());
    service.export_games(&games, &archive).await.unwrap();

    let dest_root = root.path().join("restored");
    std::fs::create_dir_all(dest_root.join("g2")).unwrap();

    let err = service.import_games(&archive, &dest_root).await.unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::InvalidRequest);
    assert!(!dest_root.join("g1").exists());
    assert!(temp_root_is_empty(root.path()));
}

#[tokio::test]
async fn failed_extraction_is_extract_error() {
    let root = tempfile::tempdir().unwrap();
    let archive = root.path().join("bundle.7z");
    std::fs::write(&archive, b"whatever").unwrap();

    let service = service(root.path()).with_engine(Arc::new(BrokenPacker));
    let err = service
        .import_games(&archive, &root.path().join("restored"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), TransferErrorKind::Extract);
    assert!(temp_root_is_empty(root.path()));
}
