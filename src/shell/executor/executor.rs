use std::io::{self, Write};
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use log::debug;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::shell::job_manager::{FinishedJob, JobManager};
use crate::shell::parser::{Command, CommandLine, Expr};

use super::builtins;
use super::error::{ExecError, ExitStatus};
use super::launcher;
use super::redirect::Redirection;
use super::stdio::StdioGuard;

/// Realizes one parsed command line as processes and builtin calls.
///
/// Pipeline stages run concurrently as forked children; builtins run in
/// this process behind a scoped stdio rewiring. Foreground lines are fully
/// reaped before this returns; background lines run in a detached subshell
/// tracked by the job registry.
pub struct Executor {
    jobs: JobManager,
}

impl Executor {
    pub fn new(jobs: JobManager) -> Self {
        Self { jobs }
    }

    pub fn execute(&mut self, line: &CommandLine) -> Result<ExitStatus, ExecError> {
        debug!("executing: {}", line);
        if line.background {
            self.execute_background(line)
        } else {
            run_chain(line)
        }
    }

    /// Collects finished background children; called before each prompt.
    pub fn reap_background(&mut self) -> Vec<FinishedJob> {
        self.jobs.reap_ready()
    }

    // The whole chain runs in one forked subshell which exits with the
    // chain's terminal status; the parent only registers that pid. Builtin
    // side effects (cd, exit) stay inside the subshell, as they would in a
    // conventional shell's `... &`.
    fn execute_background(&mut self, line: &CommandLine) -> Result<ExitStatus, ExecError> {
        let _ = io::stdout().flush();
        match unsafe { unistd::fork() }.map_err(ExecError::Fork)? {
            ForkResult::Parent { child } => {
                self.jobs.enqueue(child, line.to_string());
                Ok(ExitStatus::SUCCESS)
            }
            ForkResult::Child => {
                let status = run_chain(line).unwrap_or_else(|err| {
                    let _ = writeln!(io::stderr(), "minnow: {}", err);
                    ExitStatus::FAILURE
                });
                // leave without touching the interactive state inherited
                // from the parent
                unsafe { libc::_exit(status.code()) }
            }
        }
    }
}

enum Gate {
    And,
    Or,
}

// One pipeline: a maximal run of commands joined by pipes, plus the gate
// separating it from the previous segment.
struct Segment<'a> {
    gate: Option<Gate>,
    commands: Vec<&'a Command>,
}

fn split_segments(exprs: &[Expr]) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut gate = None;
    let mut commands: Vec<&Command> = Vec::new();
    for expr in exprs {
        match expr {
            Expr::Command(command) => commands.push(command),
            Expr::Pipe => {}
            Expr::And => segments.push(Segment {
                gate: mem::replace(&mut gate, Some(Gate::And)),
                commands: mem::take(&mut commands),
            }),
            Expr::Or => segments.push(Segment {
                gate: mem::replace(&mut gate, Some(Gate::Or)),
                commands: mem::take(&mut commands),
            }),
        }
    }
    segments.push(Segment { gate, commands });
    segments
}

fn run_chain(line: &CommandLine) -> Result<ExitStatus, ExecError> {
    // the line's target is opened up front and stays open until the line
    // is done; only the terminal stage is wired to it
    let redirection = Redirection::open(&line.redirect)?;
    let segments = split_segments(&line.exprs);
    let last = segments.len() - 1;

    let mut status = ExitStatus::SUCCESS;
    for (i, segment) in segments.iter().enumerate() {
        let run = match segment.gate {
            None => true,
            Some(Gate::And) => status.is_success(),
            Some(Gate::Or) => !status.is_success(),
        };
        if !run {
            // a skipped segment leaves the gate status untouched
            continue;
        }
        let sink = if i == last {
            redirection.target_fd()
        } else {
            None
        };
        status = run_pipeline(&segment.commands, sink)?;
    }
    Ok(status)
}

fn run_pipeline(commands: &[&Command], sink: Option<RawFd>) -> Result<ExitStatus, ExecError> {
    let Some(last) = commands.len().checked_sub(1) else {
        return Ok(ExitStatus::SUCCESS);
    };

    let mut children: Vec<Pid> = Vec::new();
    // terminal stage's status when it was decided in-process (builtin ran,
    // or the stage could not even be spawned)
    let mut direct_status: Option<ExitStatus> = None;
    let mut prev_read: Option<OwnedFd> = None;
    let mut abort: Option<ExecError> = None;

    for (i, command) in commands.iter().enumerate() {
        let (next_read, write_end) = if i < last {
            match unistd::pipe2(OFlag::O_CLOEXEC) {
                Ok((read, write)) => (Some(read), Some(write)),
                Err(err) => {
                    abort = Some(ExecError::Pipe(err));
                    break;
                }
            }
        } else {
            (None, None)
        };

        let stdin_fd = prev_read.take();
        let stdin_raw = stdin_fd.as_ref().map(|fd| fd.as_raw_fd());
        let stdout_raw = write_end
            .as_ref()
            .map(|fd| fd.as_raw_fd())
            .or(if i == last { sink } else { None });

        let stage_status = if let Some(handler) = builtins::lookup(&command.executable) {
            Some(run_builtin(handler, command, stdin_raw, stdout_raw))
        } else {
            match launcher::launch(command, stdin_raw, stdout_raw) {
                Ok(pid) => {
                    children.push(pid);
                    None
                }
                Err(err) => {
                    // the stage fails alone; already-spawned siblings keep
                    // running
                    let _ = writeln!(io::stderr(), "minnow: {}", err);
                    Some(ExitStatus::FAILURE)
                }
            }
        };
        if i == last {
            direct_status = stage_status;
        }

        // this stage's endpoints have been duplicated where they belong;
        // dropping the parent's copies is what lets EOF travel
        drop(stdin_fd);
        drop(write_end);
        prev_read = next_read;
    }
    drop(prev_read);

    let mut status = direct_status.unwrap_or(ExitStatus::SUCCESS);
    let last_child = children.last().copied();
    for pid in &children {
        match wait_child(*pid) {
            Ok(child_status) => {
                if direct_status.is_none() && Some(*pid) == last_child {
                    status = child_status;
                }
            }
            Err(err) if abort.is_none() => abort = Some(err),
            Err(_) => {}
        }
    }

    match abort {
        Some(err) => Err(err),
        None => Ok(status),
    }
}

fn run_builtin(
    handler: builtins::Handler,
    command: &Command,
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
) -> ExitStatus {
    let guard = match StdioGuard::install(stdin, stdout) {
        Ok(guard) => guard,
        Err(err) => {
            let _ = writeln!(io::stderr(), "minnow: {}", err);
            return ExitStatus::FAILURE;
        }
    };
    let result = handler(&command.args);
    drop(guard);
    match result {
        Ok(status) => status,
        Err(err) => {
            let _ = writeln!(io::stderr(), "{}", err);
            ExitStatus::FAILURE
        }
    }
}

fn wait_child(pid: Pid) -> Result<ExitStatus, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(ExitStatus::from_signal(signal)),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(ExecError::Wait(err)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::executor::test_support::process_lock;
    use crate::shell::job_manager::JobOutcome;
    use crate::shell::parser::Parser;
    use std::fs;
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};

    fn parse(input: &str) -> CommandLine {
        Parser::new(input).parse_line().unwrap()
    }

    fn execute(input: &str) -> Result<ExitStatus, ExecError> {
        Executor::new(JobManager::new()).execute(&parse(input))
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_echo_redirect_truncate() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let status = execute(&format!("echo hello world > {}", path.display())).unwrap();
        assert!(status.is_success());
        assert_eq!(read(&path), "hello world\n");
    }

    #[test]
    fn test_truncate_keeps_only_second_run() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        execute(&format!("echo first > {}", path.display())).unwrap();
        execute(&format!("echo second > {}", path.display())).unwrap();
        assert_eq!(read(&path), "second\n");
    }

    #[test]
    fn test_append_concatenates_runs() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        execute(&format!("echo first >> {}", path.display())).unwrap();
        execute(&format!("echo second >> {}", path.display())).unwrap();
        assert_eq!(read(&path), "first\nsecond\n");
    }

    #[test]
    fn test_builtin_feeds_external_through_pipe() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let status = execute(&format!("echo hello | cat > {}", path.display())).unwrap();
        assert!(status.is_success());
        assert_eq!(read(&path), "hello\n");
    }

    #[test]
    fn test_external_pipeline_preserves_byte_stream() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let line = format!(
            "sh -c 'printf zig; printf zag' | cat | cat > {}",
            path.display()
        );
        let status = execute(&line).unwrap();
        assert!(status.is_success());
        assert_eq!(read(&path), "zigzag");
    }

    #[test]
    fn test_and_gates_on_failure() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let status = execute(&format!("false && echo x > {}", path.display())).unwrap();
        assert!(!status.is_success());
        // the line's target is still opened, but the gated stage never ran
        assert_eq!(read(&path), "");
    }

    #[test]
    fn test_or_runs_on_failure() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let status = execute(&format!("false || echo x > {}", path.display())).unwrap();
        assert!(status.is_success());
        assert_eq!(read(&path), "x\n");
    }

    #[test]
    fn test_gate_chain_reaches_fallback() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let status = execute(&format!("false && echo a || echo b > {}", path.display())).unwrap();
        assert!(status.is_success());
        assert_eq!(read(&path), "b\n");
    }

    #[test]
    fn test_external_exit_status_is_observed() {
        let _lock = process_lock();
        let status = execute("sh -c 'exit 7'").unwrap();
        assert_eq!(status, ExitStatus(7));
    }

    #[test]
    fn test_command_not_found_is_127() {
        let _lock = process_lock();
        let status = execute("definitely-not-a-command-here").unwrap();
        assert_eq!(status, ExitStatus(127));
    }

    #[test]
    fn test_not_executable_is_126() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        fs::write(&path, "not a program\n").unwrap();
        let status = execute(&path.display().to_string()).unwrap();
        assert_eq!(status, ExitStatus(126));
    }

    #[test]
    fn test_cd_then_pwd_reports_new_directory() {
        let _lock = process_lock();
        let original = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = fs::canonicalize(dir.path()).unwrap();
        let out = dir.path().join("out.txt");

        let status = execute(&format!("cd {}", target.display())).unwrap();
        assert!(status.is_success());
        execute(&format!("pwd > {}", out.display())).unwrap();
        assert_eq!(read(&out), format!("{}\n", target.display()));

        std::env::set_current_dir(original).unwrap();
    }

    #[test]
    fn test_cd_arity_error_fails_but_does_not_abort() {
        let _lock = process_lock();
        let status = execute("cd").unwrap();
        assert_eq!(status, ExitStatus::FAILURE);
        let status = execute("cd a b").unwrap();
        assert_eq!(status, ExitStatus::FAILURE);
    }

    #[test]
    fn test_redirect_open_failure_is_reported() {
        let _lock = process_lock();
        let result = execute("echo hi > /no/such/dir/out.txt");
        assert!(matches!(result, Err(ExecError::Redirect { .. })));
    }

    #[test]
    fn test_no_descriptor_leaks_across_a_line() {
        let _lock = process_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let open_fds = || {
            let mut fds: Vec<String> = fs::read_dir("/proc/self/fd")
                .unwrap()
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            fds.sort();
            fds
        };

        let before = open_fds();
        execute(&format!("echo a | cat | cat > {}", path.display())).unwrap();
        let after = open_fds();
        assert_eq!(before, after);
    }

    #[test]
    fn test_background_line_does_not_block() {
        let _lock = process_lock();
        let mut executor = Executor::new(JobManager::new());

        let start = Instant::now();
        let status = executor.execute(&parse("sleep 1 &")).unwrap();
        assert!(status.is_success());
        assert!(start.elapsed() < Duration::from_millis(800));
        assert_eq!(executor.jobs.len(), 1);

        // a foreground line runs without waiting on the background child
        let status = executor.execute(&parse("true")).unwrap();
        assert!(status.is_success());

        // the child is eventually reaped; no process-table entry survives
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut finished = Vec::new();
        while finished.is_empty() && Instant::now() < deadline {
            finished = executor.reap_background();
            thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(finished.len(), 1);
        assert!(executor.jobs.is_empty());
    }

    #[test]
    fn test_background_chain_gates_inside_subshell() {
        let _lock = process_lock();
        let mut executor = Executor::new(JobManager::new());
        executor
            .execute(&parse("false || sh -c 'exit 3' &"))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut finished = Vec::new();
        while finished.is_empty() && Instant::now() < deadline {
            finished = executor.reap_background();
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(finished.len(), 1);
        assert!(matches!(
            finished[0].outcome,
            JobOutcome::Done(ExitStatus(3))
        ));
    }

    #[test]
    fn test_background_cd_is_confined_to_the_subshell() {
        let _lock = process_lock();
        let original = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut executor = Executor::new(JobManager::new());

        executor
            .execute(&parse(&format!("cd {} &", dir.path().display())))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while executor.reap_background().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }

        assert_eq!(std::env::current_dir().unwrap(), original);
    }
}
