use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::unistd::{self, ForkResult, Pid};

use crate::shell::parser::Command;

use super::error::{ExecError, ExitStatus};

/// Forks a child for one external stage, rewires its standard streams to
/// the resolved pipeline endpoints and replaces its image. Pipe ends are
/// opened close-on-exec, so the dup2'd copies on the standard slots are
/// the only ones that survive the exec.
pub fn launch(
    command: &Command,
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
) -> Result<Pid, ExecError> {
    // allocate the argv before forking
    let argv = command
        .args
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<Vec<CString>, _>>()?;

    let _ = io::stdout().flush();
    match unsafe { unistd::fork() }.map_err(ExecError::Fork)? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            let status = match exec_child(&argv, stdin, stdout) {
                Ok(never) => match never {},
                Err(Errno::ENOENT) => {
                    let _ = writeln!(io::stderr(), "{}: command not found", command.executable);
                    ExitStatus::NOT_FOUND
                }
                Err(err) => {
                    let _ = writeln!(io::stderr(), "{}: {}", command.executable, err.desc());
                    ExitStatus::NOT_EXECUTABLE
                }
            };
            // never unwind into the parent's control flow
            unsafe { libc::_exit(status.code()) }
        }
    }
}

fn exec_child(
    argv: &[CString],
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
) -> nix::Result<Infallible> {
    if let Some(fd) = stdin {
        unistd::dup2(fd, libc::STDIN_FILENO)?;
    }
    if let Some(fd) = stdout {
        unistd::dup2(fd, libc::STDOUT_FILENO)?;
    }
    let program: &CStr = &argv[0];
    unistd::execvp(program, argv)
}
