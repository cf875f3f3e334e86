use std::fs::File;
use std::path::{Path, PathBuf};

use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ArchiveEngine, CompressOptions};
use crate::core::error::{TransferError, TransferResult};

/// In-process zip packer for `.zip` bundles, running on the blocking pool.
///
/// Compression progress is the share of files written so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipEngine;

#[async_trait]
impl ArchiveEngine for ZipEngine {
    fn name(&self) -> &'static str {
        "zip"
    }

    async fn extract(&self, archive: &Path, output_dir: &Path) -> TransferResult<()> {
        let archive_path = archive.to_path_buf();
        let output = output_dir.to_path_buf();

        tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &output))
            .await
            .map_err(|e| TransferError::Extract {
                archive: archive.to_path_buf(),
                reason: format!("extract task failed: {e}"),
            })?
    }

    async fn compress(
        &self,
        archive: &Path,
        source_dir: &Path,
        options: CompressOptions,
        progress: mpsc::Sender<u8>,
    ) -> TransferResult<()> {
        super::prepare_destination(archive, options.overwrite).await?;

        let archive_path = archive.to_path_buf();
        let source = source_dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            compress_blocking(&archive_path, &source, options.recursive, &progress)
        })
        .await
        .map_err(|e| TransferError::Compress {
            archive: archive.to_path_buf(),
            reason: format!("compress task failed: {e}"),
        })?
    }
}

fn extract_blocking(archive: &Path, output_dir: &Path) -> TransferResult<()> {
    let extract_err = |reason: String| TransferError::Extract {
        archive: archive.to_path_buf(),
        reason,
    };

    std::fs::create_dir_all(output_dir).map_err(TransferError::io(output_dir))?;

    let file = File::open(archive).map_err(|e| extract_err(format!("cannot open: {e}")))?;
    let mut zip = ZipArchive::new(file).map_err(|e| extract_err(e.to_string()))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| extract_err(e.to_string()))?;
        let name = entry.name().to_string();
        let Some(relative) = entry.enclosed_name() else {
            return Err(extract_err(format!(
                "entry '{name}' escapes the output directory"
            )));
        };
        let out_path = output_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(TransferError::io(&out_path))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(TransferError::io(parent))?;
        }

        let mut out_file = File::create(&out_path).map_err(TransferError::io(&out_path))?;
        std::io::copy(&mut entry, &mut out_file)
            .map_err(|e| extract_err(format!("{name}: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let perms = std::fs::Permissions::from_mode(mode & 0o7777);
                if let Err(e) = std::fs::set_permissions(&out_path, perms) {
                    warn!("Could not restore mode {:o} on {:?}: {}", mode, out_path, e);
                }
            }
        }
    }

    debug!("Extracted {} entries from {:?}", zip.len(), archive);
    Ok(())
}

fn compress_blocking(
    archive: &Path,
    source_dir: &Path,
    recursive: bool,
    progress: &mpsc::Sender<u8>,
) -> TransferResult<()> {
    let compress_err = |reason: String| TransferError::Compress {
        archive: archive.to_path_buf(),
        reason,
    };

    let (dirs, files) = collect_entries(source_dir, recursive)?;

    let file = File::create(archive).map_err(TransferError::io(archive))?;
    let mut writer = ZipWriter::new(file);
    for dir in &dirs {
        writer
            .add_directory(zip_name(dir), entry_options())
            .map_err(|e| compress_err(e.to_string()))?;
    }

    let total = files.len();
    for (index, relative) in files.iter().enumerate() {
        let full = source_dir.join(relative);
        let metadata = std::fs::metadata(&full).map_err(TransferError::io(&full))?;

        #[allow(unused_mut)]
        let mut options = entry_options().large_file(metadata.len() >= u64::from(u32::MAX));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(metadata.permissions().mode());
        }

        writer
            .start_file(zip_name(relative), options)
            .map_err(|e| compress_err(e.to_string()))?;
        let mut input = File::open(&full).map_err(TransferError::io(&full))?;
        std::io::copy(&mut input, &mut writer)
            .map_err(|e| compress_err(format!("{}: {e}", relative.display())))?;

        let percent = ((index + 1) * 100 / total).min(99) as u8;
        let _ = progress.blocking_send(percent);
    }

    writer.finish().map_err(|e| compress_err(e.to_string()))?;
    let _ = progress.blocking_send(100);

    debug!("Wrote {} files into {:?}", total, archive);
    Ok(())
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Relative directory and file paths under `root`, sorted.
fn collect_entries(root: &Path, recursive: bool) -> TransferResult<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    let mut stack = vec![PathBuf::new()];

    while let Some(relative) = stack.pop() {
        let current = root.join(&relative);
        let entries = std::fs::read_dir(&current).map_err(TransferError::io(&current))?;

        for entry in entries {
            let entry = entry.map_err(TransferError::io(&current))?;
            let file_type = entry.file_type().map_err(TransferError::io(&entry.path()))?;
            let child = relative.join(entry.file_name());

            if file_type.is_dir() && recursive {
                dirs.push(child.clone());
                stack.push(child);
            } else if file_type.is_file() {
                files.push(child);
            }
        }
    }

    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

/// Zip entry names always use forward slashes.
fn zip_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree(root: &Path) -> PathBuf {
        let source = root.join("bundle");
        std::fs::create_dir_all(source.join("g1/assets")).unwrap();
        std::fs::create_dir_all(source.join("g2")).unwrap();
        std::fs::create_dir_all(source.join("empty")).unwrap();
        std::fs::write(source.join("config.json"), b"[]").unwrap();
        std::fs::write(source.join("g1/g1.exe"), b"MZ-one").unwrap();
        std::fs::write(source.join("g1/assets/a.pak"), vec![3u8; 2048]).unwrap();
        std::fs::write(source.join("g2/g2.exe"), b"MZ-two").unwrap();
        source
    }

    async fn drain(mut rx: mpsc::Receiver<u8>) -> Vec<u8> {
        let mut seen = Vec::new();
        while let Some(p) = rx.recv().await {
            seen.push(p);
        }
        seen
    }

    #[tokio::test]
    async fn compress_then_extract_reproduces_tree() {
        let dir = tempfile::tempdir().unwrap();
        let source = sample_tree(dir.path());
        let archive = dir.path().join("out.zip");

        let (tx, rx) = mpsc::channel(64);
        ZipEngine
            .compress(&archive, &source, CompressOptions::default(), tx)
            .await
            .unwrap();
        let seen = drain(rx).await;
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.last(), Some(&100));

        let out = dir.path().join("out");
        ZipEngine.extract(&archive, &out).await.unwrap();
        assert_eq!(std::fs::read(out.join("g1/g1.exe")).unwrap(), b"MZ-one");
        assert_eq!(std::fs::read(out.join("g1/assets/a.pak")).unwrap().len(), 2048);
        assert_eq!(std::fs::read(out.join("g2/g2.exe")).unwrap(), b"MZ-two");
        assert!(out.join("empty").is_dir());
    }

    #[tokio::test]
    async fn compress_respects_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let source = sample_tree(dir.path());
        let archive = dir.path().join("out.zip");
        std::fs::write(&archive, b"old").unwrap();

        let (tx, _rx) = mpsc::channel(64);
        let keep = CompressOptions {
            overwrite: false,
            ..CompressOptions::default()
        };
        let err = ZipEngine
            .compress(&archive, &source, keep, tx)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Compress { .. }));
        assert_eq!(std::fs::read(&archive).unwrap(), b"old");
    }

    #[tokio::test]
    async fn non_recursive_compress_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let source = sample_tree(dir.path());
        let archive = dir.path().join("flat.zip");

        let (tx, _rx) = mpsc::channel(64);
        let flat = CompressOptions {
            recursive: false,
            ..CompressOptions::default()
        };
        ZipEngine.compress(&archive, &source, flat, tx).await.unwrap();

        let out = dir.path().join("flat");
        ZipEngine.extract(&archive, &out).await.unwrap();
        assert!(out.join("config.json").is_file());
        assert!(!out.join("g1").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn extract_restores_unix_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let source = sample_tree(dir.path());
        let exe = source.join("g1/g1.exe");
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::set_permissions(
            source.join("g2/g2.exe"),
            std::fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        let archive = dir.path().join("modes.zip");
        let (tx, _rx) = mpsc::channel(64);
        ZipEngine
            .compress(&archive, &source, CompressOptions::default(), tx)
            .await
            .unwrap();

        let out = dir.path().join("out");
        ZipEngine.extract(&archive, &out).await.unwrap();
        let mode = |p: &str| std::fs::metadata(out.join(p)).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode("g1/g1.exe"), 0o755);
        assert_eq!(mode("g2/g2.exe"), 0o644);
    }

    #[tokio::test]
    async fn extracting_garbage_is_extract_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = ZipEngine
            .extract(&archive, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Extract { .. }));
    }
}
