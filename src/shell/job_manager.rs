use std::fmt;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::shell::executor::ExitStatus;

/// Registry of background children, keyed by pid. Polled before each
/// prompt via `reap_ready`, so no terminated child outlives its entry in
/// the process table.
pub struct JobManager {
    jobs: Vec<Job>,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub pid: Pid,
    pub index: usize,
    pub command: String,
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Done(ExitStatus),
    Killed(Signal),
}

#[derive(Debug, Clone)]
pub struct FinishedJob {
    pub job: Job,
    pub outcome: JobOutcome,
}

impl JobManager {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn find_available_index(&self) -> usize {
        let mut index = 1;
        while self.jobs.iter().any(|job| job.index == index) {
            index += 1;
        }
        index
    }

    pub fn enqueue(&mut self, pid: Pid, command: String) -> usize {
        let index = self.find_available_index();
        debug!("background job [{}] {} started: {}", index, pid, command);
        self.jobs.push(Job {
            pid,
            index,
            command,
        });
        index
    }

    /// Collects every background child that has terminated, without
    /// blocking on the ones that have not.
    pub fn reap_ready(&mut self) -> Vec<FinishedJob> {
        let mut finished = Vec::new();
        let mut i = 0;
        while i < self.jobs.len() {
            match waitpid(self.jobs[i].pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => {
                    let job = self.jobs.remove(i);
                    finished.push(FinishedJob {
                        job,
                        outcome: JobOutcome::Done(ExitStatus(code)),
                    });
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    let job = self.jobs.remove(i);
                    finished.push(FinishedJob {
                        job,
                        outcome: JobOutcome::Killed(signal),
                    });
                }
                // still running (or stopped); leave it alone
                Ok(_) => i += 1,
                Err(Errno::ECHILD) => {
                    warn!("lost track of background job {}", self.jobs[i].pid);
                    self.jobs.remove(i);
                }
                Err(err) => {
                    warn!(
                        "failed to poll background job {}: {}",
                        self.jobs[i].pid, err
                    );
                    i += 1;
                }
            }
        }
        finished
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FinishedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match &self.outcome {
            JobOutcome::Done(status) if status.is_success() => "done".to_string(),
            JobOutcome::Done(status) => format!("exit {}", status),
            JobOutcome::Killed(signal) => format!("killed ({})", signal),
        };
        write!(
            f,
            "[{}] {} {} {}",
            self.job.index, self.job.pid, outcome, self.job.command
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_start_at_one_and_fill_gaps() {
        let mut jobs = JobManager::new();
        assert_eq!(jobs.enqueue(Pid::from_raw(1111), "a &".to_string()), 1);
        assert_eq!(jobs.enqueue(Pid::from_raw(2222), "b &".to_string()), 2);
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_reap_drops_stale_entries() {
        // pids that are certainly not our children
        let mut jobs = JobManager::new();
        jobs.enqueue(Pid::from_raw(1), "init &".to_string());
        let finished = jobs.reap_ready();
        assert!(finished.is_empty());
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_finished_job_display() {
        let finished = FinishedJob {
            job: Job {
                pid: Pid::from_raw(4242),
                index: 1,
                command: "sleep 10 &".to_string(),
            },
            outcome: JobOutcome::Done(ExitStatus::SUCCESS),
        };
        assert_eq!(finished.to_string(), "[1] 4242 done sleep 10 &");

        let finished = FinishedJob {
            outcome: JobOutcome::Done(ExitStatus(2)),
            ..finished
        };
        assert_eq!(finished.to_string(), "[1] 4242 exit 2 sleep 10 &");
    }
}
