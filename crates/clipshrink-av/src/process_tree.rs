//! Process-tree control.
//!
//! Encoders may fork helpers, so stopping one means stopping everything it
//! started. On Unix the encoder is made a process-group leader and the whole
//! group is signalled; on Windows `taskkill /T` walks the tree.

use crate::ProcessHandle;
use std::io;
use tokio::process::Command;

/// Configure `cmd` so the spawned process can later be terminated as a tree.
pub fn spawn_as_group_leader(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    cmd
}

/// Request termination of the process tree rooted at `handle`.
#[cfg(unix)]
pub fn terminate(handle: &ProcessHandle) -> io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(handle.pid())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    tracing::debug!("Sending SIGTERM to process group {}", pgid);
    killpg(Pid::from_raw(pgid), Signal::SIGTERM).map_err(io::Error::from)
}

/// Request termination of the process tree rooted at `handle`.
#[cfg(windows)]
pub fn terminate(handle: &ProcessHandle) -> io::Result<()> {
    use std::process::Stdio;

    let pid = handle.pid().to_string();
    tracing::debug!("Running taskkill for process tree {}", pid);
    let status = std::process::Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {}", status)))
    }
}

/// Request termination of the process tree rooted at `handle`.
#[cfg(not(any(unix, windows)))]
pub fn terminate(_handle: &ProcessHandle) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process-tree termination is not supported on this platform",
    ))
}
