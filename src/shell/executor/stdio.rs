use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use log::warn;
use nix::unistd;

use super::error::ExecError;

/// Scoped rewiring of the calling process's standard-stream slots for a
/// builtin stage. The original descriptors are saved on install and put
/// back on drop, so a builtin inside a pipeline or redirection cannot
/// corrupt the shell's own I/O.
pub struct StdioGuard {
    saved_stdin: Option<OwnedFd>,
    saved_stdout: Option<OwnedFd>,
}

impl StdioGuard {
    pub fn install(stdin: Option<RawFd>, stdout: Option<RawFd>) -> Result<Self, ExecError> {
        // Anything buffered at the Rust level belongs to the old slot.
        let _ = io::stdout().flush();

        let mut guard = StdioGuard {
            saved_stdin: None,
            saved_stdout: None,
        };
        if let Some(fd) = stdin {
            guard.saved_stdin = Some(save_slot(libc::STDIN_FILENO)?);
            unistd::dup2(fd, libc::STDIN_FILENO).map_err(ExecError::Stdio)?;
        }
        if let Some(fd) = stdout {
            guard.saved_stdout = Some(save_slot(libc::STDOUT_FILENO)?);
            unistd::dup2(fd, libc::STDOUT_FILENO).map_err(ExecError::Stdio)?;
        }
        Ok(guard)
    }
}

fn save_slot(slot: RawFd) -> Result<OwnedFd, ExecError> {
    let saved = unistd::dup(slot).map_err(ExecError::Stdio)?;
    // dup just handed us sole ownership of this descriptor
    Ok(unsafe { OwnedFd::from_raw_fd(saved) })
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        if let Some(saved) = self.saved_stdout.take() {
            if let Err(err) = unistd::dup2(saved.as_raw_fd(), libc::STDOUT_FILENO) {
                warn!("failed to restore stdout: {}", err);
            }
        }
        if let Some(saved) = self.saved_stdin.take() {
            if let Err(err) = unistd::dup2(saved.as_raw_fd(), libc::STDIN_FILENO) {
                warn!("failed to restore stdin: {}", err);
            }
        }
        // the saved descriptors close as the OwnedFds drop
    }
}
