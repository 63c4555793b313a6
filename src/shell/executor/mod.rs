mod builtins;
mod error;
mod executor;
mod launcher;
mod redirect;
mod stdio;

pub use error::{ExecError, ExitStatus};
pub use executor::Executor;

#[cfg(test)]
pub(crate) mod test_support {
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};

    static PROCESS_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    // fd 1, the fd table and the working directory are process-wide;
    // tests that touch any of them run one at a time
    pub fn process_lock() -> MutexGuard<'static, ()> {
        PROCESS_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
