use std::fmt;
use std::io;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Exit status of one pipeline stage or of a whole command line.
/// Children killed by a signal map to `128 + signal`, children whose
/// image replacement failed exit with 127 (not found) or 126 (not
/// runnable).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    pub const FAILURE: ExitStatus = ExitStatus(1);
    pub const NOT_EXECUTABLE: ExitStatus = ExitStatus(126);
    pub const NOT_FOUND: ExitStatus = ExitStatus(127);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn from_signal(signal: Signal) -> Self {
        ExitStatus(128 + signal as i32)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builtin failures: wrong usage or a failed OS call. Both are reported
/// to stderr and turn into a failure status; the command line carries on.
#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("{0}: {1}")]
    Usage(&'static str, &'static str),
    #[error("{cmd}: {msg}", cmd = .0, msg = .1.desc())]
    Sys(&'static str, Errno),
    #[error("{0}: {1}")]
    Io(&'static str, io::Error),
}

/// Failures that prevent constructing or finishing a command line.
/// Everything else (a stage that cannot exec, a builtin that fails) is
/// reported in place and only observed through exit-status gating.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to create pipe: {}", .0.desc())]
    Pipe(Errno),
    #[error("failed to fork: {}", .0.desc())]
    Fork(Errno),
    #[error("failed to wait for child: {}", .0.desc())]
    Wait(Errno),
    #[error("failed to rewire standard streams: {}", .0.desc())]
    Stdio(Errno),
    #[error("{path}: {source}")]
    Redirect { path: String, source: io::Error },
    #[error("invalid argument: {0}")]
    Nul(#[from] std::ffi::NulError),
}
