use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{ArchiveEngine, CompressOptions};
use crate::core::error::{TransferError, TransferResult};

/// Binary names tried on `PATH`, standalone builds first.
const CANDIDATE_BINARIES: [&str; 3] = ["7za", "7zz", "7z"];

/// External 7-Zip process wrapper. One child process per call.
#[derive(Debug, Clone)]
pub struct SevenZip {
    binary: PathBuf,
}

impl SevenZip {
    /// Resolve the binary once: the configured path if any, else a `PATH` lookup.
    pub fn locate(configured: Option<&Path>) -> TransferResult<Self> {
        if let Some(path) = configured {
            return Self::from_binary(path.to_path_buf());
        }

        for name in CANDIDATE_BINARIES {
            if let Ok(found) = which::which(name) {
                return Self::from_binary(found);
            }
        }

        Err(TransferError::Io {
            path: PathBuf::from(CANDIDATE_BINARIES[0]),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no 7-Zip binary found on PATH",
            ),
        })
    }

    /// Validate `binary` and make sure it can be executed.
    pub fn from_binary(binary: PathBuf) -> TransferResult<Self> {
        let metadata = std::fs::metadata(&binary).map_err(TransferError::io(&binary))?;
        if !metadata.is_file() {
            return Err(TransferError::Io {
                path: binary,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "7-Zip path is not a file",
                ),
            });
        }

        ensure_executable(&binary, &metadata)?;
        info!("Using 7-Zip binary at {:?}", binary);
        Ok(Self { binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

/// Bundled binaries can lose their execute bit when unpacked; restore it.
#[cfg(unix)]
fn ensure_executable(binary: &Path, metadata: &std::fs::Metadata) -> TransferResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = metadata.permissions();
    if perms.mode() & 0o111 != 0 {
        return Ok(());
    }
    perms.set_mode(0o755);
    std::fs::set_permissions(binary, perms).map_err(TransferError::io(binary))?;
    debug!("Marked {:?} executable", binary);
    Ok(())
}

#[cfg(not(unix))]
fn ensure_executable(_binary: &Path, _metadata: &std::fs::Metadata) -> TransferResult<()> {
    Ok(())
}

#[async_trait]
impl ArchiveEngine for SevenZip {
    fn name(&self) -> &'static str {
        "7-zip"
    }

    async fn extract(&self, archive: &Path, output_dir: &Path) -> TransferResult<()> {
        let extract_err = |reason: String| TransferError::Extract {
            archive: archive.to_path_buf(),
            reason,
        };

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(TransferError::io(output_dir))?;

        let mut output_flag = OsString::from("-o");
        output_flag.push(output_dir);

        debug!("7-Zip extract {:?} -> {:?}", archive, output_dir);
        let output = Command::new(&self.binary)
            .arg("x")
            .arg(archive)
            .arg(output_flag)
            .arg("-y")
            .arg("-bd")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| extract_err(format!("failed to start {:?}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(extract_err(failure_reason(output.status, &output.stderr)));
        }
        Ok(())
    }

    async fn compress(
        &self,
        archive: &Path,
        source_dir: &Path,
        options: CompressOptions,
        progress: mpsc::Sender<u8>,
    ) -> TransferResult<()> {
        let compress_err = |reason: String| TransferError::Compress {
            archive: archive.to_path_buf(),
            reason,
        };

        super::prepare_destination(archive, options.overwrite).await?;

        let mut command = Command::new(&self.binary);
        command.arg("a").arg("-y").arg("-bsp1").arg("-bso0").arg("-bse2");
        if options.recursive {
            command.arg("-r");
        }
        command
            .arg(archive)
            .arg(source_dir.join("*"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("7-Zip compress {:?} -> {:?}", source_dir, archive);
        let mut child = command
            .spawn()
            .map_err(|e| compress_err(format!("failed to start {:?}: {e}", self.binary)))?;

        let stderr_task = tokio::spawn(read_all(child.stderr.take()));

        if let Some(mut stdout) = child.stdout.take() {
            let mut parser = ProgressParser::default();
            let mut last_sent = None;
            let mut buf = [0_u8; 4096];
            loop {
                let read = stdout
                    .read(&mut buf)
                    .await
                    .map_err(|e| compress_err(format!("reading progress: {e}")))?;
                if read == 0 {
                    break;
                }
                for percent in parser.feed(&buf[..read]) {
                    forward(&progress, &mut last_sent, percent).await;
                }
            }
            if let Some(percent) = parser.finish() {
                forward(&progress, &mut last_sent, percent).await;
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| compress_err(format!("waiting for 7-Zip: {e}")))?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(compress_err(failure_reason(status, &stderr)));
        }
        Ok(())
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buf).await;
    }
    buf
}

async fn forward(progress: &mpsc::Sender<u8>, last_sent: &mut Option<u8>, percent: u8) {
    if *last_sent == Some(percent) {
        return;
    }
    *last_sent = Some(percent);
    // A closed receiver only means nobody is watching.
    let _ = progress.send(percent).await;
}

fn failure_reason(status: ExitStatus, stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        format!("7-Zip exited with {status}")
    } else {
        format!("7-Zip exited with {status}: {text}")
    }
}

/// Incremental parser for 7-Zip's `-bsp1` progress stream.
///
/// Updates are separated by carriage returns, newlines or backspaces and start
/// with a right-aligned `NN%`.
#[derive(Debug, Default)]
pub struct ProgressParser {
    pending: String,
}

impl ProgressParser {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut percents = Vec::new();
        while let Some(pos) = self.pending.find(['\r', '\n', '\u{8}']) {
            let segment: String = self.pending.drain(..=pos).collect();
            percents.extend(parse_progress_line(&segment));
        }
        percents
    }

    pub fn finish(&mut self) -> Option<u8> {
        let rest = std::mem::take(&mut self.pending);
        parse_progress_line(&rest)
    }
}

pub fn parse_progress_line(line: &str) -> Option<u8> {
    let (number, _) = line.trim().split_once('%')?;
    let value: u8 = number.trim().parse().ok()?;
    (value <= 100).then_some(value)
}
