use std::path::Path;

use crate::core::error::{TransferError, TransferResult};

/// Recursive size of every regular file under `dir`.
///
/// Symlinks are not followed. Any directory that cannot be read, including a
/// missing root, is a `Size` error.
pub async fn size_of(dir: &Path) -> TransferResult<u64> {
    let size_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| TransferError::Size { path, source }
    };

    let root = tokio::fs::metadata(dir).await.map_err(size_err(dir))?;
    if !root.is_dir() {
        return Err(TransferError::Size {
            path: dir.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "install path is not a directory",
            ),
        });
    }

    let mut total_size = 0_u64;
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .map_err(size_err(&current))?;

        while let Some(entry) = entries.next_entry().await.map_err(size_err(&current))? {
            let file_type = entry.file_type().await.map_err(size_err(&entry.path()))?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                let metadata = entry.metadata().await.map_err(size_err(&entry.path()))?;
                total_size = total_size.saturating_add(metadata.len());
            }
        }
    }

    Ok(total_size)
}
