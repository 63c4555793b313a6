use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use crate::shell::parser::RedirectionTarget;

use super::error::ExecError;

/// The line's resolved output target, held open for the duration of one
/// command line and closed when dropped. Only the terminal pipeline stage
/// is wired to it; every other stage writes to its successor pipe.
pub struct Redirection {
    file: Option<File>,
}

impl Redirection {
    pub fn open(target: &RedirectionTarget) -> Result<Self, ExecError> {
        let file = match target {
            RedirectionTarget::Inherit => None,
            RedirectionTarget::Truncate(path) => Some(
                open_options()
                    .truncate(true)
                    .open(expand(path))
                    .map_err(|source| ExecError::Redirect {
                        path: path.clone(),
                        source,
                    })?,
            ),
            RedirectionTarget::Append(path) => Some(
                open_options()
                    .append(true)
                    .open(expand(path))
                    .map_err(|source| ExecError::Redirect {
                        path: path.clone(),
                        source,
                    })?,
            ),
        };
        Ok(Self { file })
    }

    /// Descriptor for the terminal stage's stdout, or `None` to inherit.
    pub fn target_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(|file| file.as_raw_fd())
    }
}

fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    options
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}
