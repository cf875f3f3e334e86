// ─── Game Launch ───
// Starts an installed game detached from the launcher.

use std::path::Path;
use std::process::{Command, Stdio};

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tracing::{debug, info, warn};

use crate::core::error::{TransferError, TransferResult};

/// Spawn `execution_path` with its install directory as working directory and
/// return the child's pid. The launcher does not wait for the game.
pub fn launch_game(execution_path: &Path) -> TransferResult<u32> {
    let launch_failed = |source: std::io::Error| TransferError::Launch {
        path: execution_path.to_path_buf(),
        source,
    };

    if !execution_path.is_file() {
        return Err(launch_failed(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "executable not found",
        )));
    }

    let mut cmd = Command::new(execution_path);
    if let Some(dir) = execution_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    configure_platform_spawn(&mut cmd);

    let mut child = cmd.spawn().map_err(launch_failed)?;
    let pid = child.id();
    info!("Launched {:?} (pid {})", execution_path, pid);

    // Reap the child once it exits.
    let label = execution_path.display().to_string();
    std::thread::spawn(move || match child.wait() {
        Ok(status) => debug!("{} exited with {}", label, status),
        Err(e) => warn!("Waiting on {} failed: {}", label, e),
    });

    Ok(pid)
}

fn configure_platform_spawn(cmd: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        const DETACHED_PROCESS: u32 = 0x00000008;
        cmd.creation_flags(DETACHED_PROCESS);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}
