//! Process launcher (§4.4): turns a planned pipeline into running processes,
//! wired with the right file descriptors and process-group membership, and
//! registers the result in the job table.
//!
//! Grounded on `james-shell::executor`'s staged shape (resolve everything
//! that can fail before forking anything), but built on `sys`'s raw `libc`
//! calls rather than `std::process::Command`, since the job leader here must
//! itself fork further grandchildren for a multi-segment pipeline and fold
//! their exit statuses (§4.4 step 3) — something `Command` cannot express.

use std::time::Duration;

use crate::builtins;
use crate::jobs::JobState;
use crate::plan::{Pipeline, Segment};
use crate::signals;
use crate::sys;

pub struct LaunchRequest<'a> {
    pub pipeline: &'a Pipeline,
    pub background: bool,
    pub cmdline: &'a str,
}

/// Which standard stream a process-substitution fd should be wired onto.
#[derive(Clone, Copy)]
pub enum StdioOverride {
    Stdin(std::os::unix::io::RawFd),
    Stdout(std::os::unix::io::RawFd),
}

/// Run one planned pipeline to completion (background jobs return as soon as
/// they are registered; foreground jobs block here until they stop or exit).
pub fn launch(req: LaunchRequest<'_>) -> Result<(), String> {
    let pipeline = req.pipeline;

    if pipeline.segments.len() == 1 && builtins::is_builtin(&pipeline.segments[0].argv[0]) {
        return builtins::run(&pipeline.segments[0]);
    }

    let initial_state = if req.background { JobState::Bg } else { JobState::Fg };

    // §4.6: mask child-exit from just before fork to just after the job is
    // registered, so a very short-lived job can't be reaped before it exists
    // in the table.
    signals::block_sigchld();

    let leader_pid = match spawn_pipeline(pipeline, None) {
        Ok(pid) => pid,
        Err(e) => {
            signals::unblock_sigchld();
            return Err(e);
        }
    };

    let jid = crate::jobs::with_global(|table| table.add(leader_pid, initial_state, req.cmdline.to_string()));
    signals::unblock_sigchld();

    let Some(jid) = jid else {
        return Err("tsh: job table full".to_string());
    };

    if req.background {
        announce_background(jid, leader_pid, req.cmdline);
        return Ok(());
    }

    wait_for_foreground(leader_pid);
    Ok(())
}

/// Forks the job-leader process for a pipeline and returns its pid to the
/// caller without waiting on or registering it. Used both by `launch`
/// (which then adds a job-table entry) and by the substitution executor
/// (§4.3), which deliberately does neither — an inner `<(...)`/`>(...)`
/// pipeline is not a user-visible job.
pub fn spawn_pipeline(
    pipeline: &Pipeline,
    stdio_override: Option<StdioOverride>,
) -> Result<libc::pid_t, String> {
    match unsafe { sys::fork() } {
        Ok(0) => run_leader_child(pipeline, stdio_override),
        Ok(pid) => Ok(pid),
        Err(e) => Err(format!("tsh: fork: {e}")),
    }
}

/// Runs only in the forked job-leader child; never returns.
fn run_leader_child(pipeline: &Pipeline, stdio_override: Option<StdioOverride>) -> ! {
    signals::unblock_sigchld();
    let _ = sys::setpgid(0, 0);
    apply_stdio_override(stdio_override);

    if pipeline.segments.len() == 1 {
        exec_single(&pipeline.segments[0]);
    }
    run_multi_segment_leader(pipeline);
}

fn apply_stdio_override(stdio_override: Option<StdioOverride>) {
    match stdio_override {
        Some(StdioOverride::Stdin(fd)) => {
            let _ = sys::dup2(fd, sys::STDIN_FD);
            sys::close(fd);
        }
        Some(StdioOverride::Stdout(fd)) => {
            let _ = sys::dup2(fd, sys::STDOUT_FD);
            sys::close(fd);
        }
        None => {}
    }
}

fn exec_single(segment: &Segment) -> ! {
    apply_redirections(segment);
    let err = sys::execvp(&segment.argv[0], &segment.argv);
    report_exec_failure(&segment.argv[0], &err);
    sys::exit_now(1);
}

/// Forks one grandchild per segment, wires the inter-segment pipes, waits
/// for all of them, and exits with the OR-fold of their *decoded* exit
/// codes — never the raw `wait` status words (§9: avoids conflating
/// stop/signal bits with a zero exit code, unlike the source this was
/// distilled from).
fn run_multi_segment_leader(pipeline: &Pipeline) -> ! {
    let n = pipeline.segments.len();
    let mut pipe_fds = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        match sys::pipe() {
            Ok(p) => pipe_fds.push(p),
            Err(e) => {
                sys::write_raw(sys::STDERR_FD, format!("tsh: pipe: {e}\n").as_bytes());
                sys::exit_now(1);
            }
        }
    }

    let mut grandchildren = Vec::with_capacity(n);
    for (i, segment) in pipeline.segments.iter().enumerate() {
        match unsafe { sys::fork() } {
            Ok(0) => run_grandchild(segment, i, n, &pipe_fds),
            Ok(pid) => grandchildren.push(pid),
            Err(e) => {
                sys::write_raw(sys::STDERR_FD, format!("tsh: fork: {e}\n").as_bytes());
                sys::exit_now(1);
            }
        }
    }

    for &(r, w) in &pipe_fds {
        sys::close(r);
        sys::close(w);
    }

    let mut folded = 0;
    for pid in grandchildren {
        match sys::waitpid_blocking(pid) {
            Ok(sys::WaitStatus::Exited { code, .. }) => folded |= code,
            Ok(sys::WaitStatus::Signaled { signal, .. }) => folded |= 128 + signal,
            _ => {}
        }
    }
    sys::exit_now(folded);
}

fn run_grandchild(segment: &Segment, index: usize, total: usize, pipe_fds: &[(i32, i32)]) -> ! {
    if index > 0 {
        let (read_end, _) = pipe_fds[index - 1];
        let _ = sys::dup2(read_end, sys::STDIN_FD);
    }
    if index + 1 < total {
        let (_, write_end) = pipe_fds[index];
        let _ = sys::dup2(write_end, sys::STDOUT_FD);
    }
    for &(r, w) in pipe_fds {
        sys::close(r);
        sys::close(w);
    }

    apply_redirections(segment);
    let err = sys::execvp(&segment.argv[0], &segment.argv);
    report_exec_failure(&segment.argv[0], &err);
    sys::exit_now(1);
}

/// Applies `<`/`>` targets over stdin/stdout. Fatal to the caller on open
/// failure (§4.4: "failure to open is fatal to the child").
fn apply_redirections(segment: &Segment) {
    if let Some(path) = &segment.stdin_path {
        match sys::open_read(path) {
            Ok(fd) => {
                let _ = sys::dup2(fd, sys::STDIN_FD);
                sys::close(fd);
            }
            Err(e) => {
                sys::write_raw(sys::STDERR_FD, format!("tsh: {path}: {e}\n").as_bytes());
                sys::exit_now(1);
            }
        }
    }
    if let Some(path) = &segment.stdout_path {
        match sys::open_write_truncate(path, 0o644) {
            Ok(fd) => {
                let _ = sys::dup2(fd, sys::STDOUT_FD);
                sys::close(fd);
            }
            Err(e) => {
                sys::write_raw(sys::STDERR_FD, format!("tsh: {path}: {e}\n").as_bytes());
                sys::exit_now(1);
            }
        }
    }
}

fn report_exec_failure(argv0: &str, err: &std::io::Error) {
    if err.raw_os_error() == Some(libc::ENOENT) {
        sys::write_raw(sys::STDERR_FD, format!("{argv0}: Command not found.\n").as_bytes());
    } else {
        sys::write_raw(sys::STDERR_FD, format!("tsh: {argv0}: {err}\n").as_bytes());
    }
}

fn announce_background(jid: u32, pid: libc::pid_t, cmdline: &str) {
    let line = format!("[{jid}] ({pid}) {cmdline}\n");
    sys::write_raw(sys::STDOUT_FD, line.as_bytes());
}

/// Cooperative foreground wait (§4.4 step 5, §5): the shell never blocks in
/// `waitpid` itself, since that is the signal handler's job. It just polls
/// the job table between short sleeps until the job is no longer `Fg`.
pub fn wait_for_foreground(pid: libc::pid_t) {
    loop {
        let still_fg = crate::jobs::with_global(|table| {
            matches!(table.by_pid(pid), Some(job) if job.state == JobState::Fg)
        });
        if !still_fg {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
