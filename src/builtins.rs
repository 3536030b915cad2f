//! Builtins (§4.7): commands executed in the shell process itself rather
//! than forked, because they need to mutate shell-owned state (the working
//! directory, the job table, the history ring, the bookmark map).

use std::env;
use std::path::Path;

use crate::jobs::{self, JobState};
use crate::launch;
use crate::plan::Segment;
use crate::sys;

const NAMES: &[&str] = &["quit", "exit", "jobs", "cd", "bg", "fg", "fc", "bm", "&"];

pub fn is_builtin(name: &str) -> bool {
    NAMES.contains(&name)
}

/// Run a builtin in the shell process. Honors the segment's own
/// redirections for output (§4.7: "builtins honor the caller-supplied I/O
/// fds"), same as any other command segment.
pub fn run(segment: &Segment) -> Result<(), String> {
    let out_fd = match &segment.stdout_path {
        Some(path) => sys::open_write_truncate(path, 0o644).map_err(|e| format!("tsh: {path}: {e}"))?,
        None => sys::STDOUT_FD,
    };
    let result = dispatch(segment, out_fd);
    if segment.stdout_path.is_some() {
        sys::close(out_fd);
    }
    result
}

fn dispatch(segment: &Segment, out_fd: std::os::unix::io::RawFd) -> Result<(), String> {
    match segment.argv[0].as_str() {
        "quit" | "exit" => std::process::exit(1),
        "jobs" => {
            jobs::with_global(|table| jobs::write_listing(table, out_fd));
            Ok(())
        }
        "cd" => cd(segment.argv.get(1).map(String::as_str)),
        "bg" => bg_fg(segment.argv.get(1), JobState::Bg),
        "fg" => bg_fg(segment.argv.get(1), JobState::Fg),
        "fc" => crate::history::run_fc(&segment.argv[1..]),
        "bm" => crate::bookmarks::run_bm(&segment.argv[1..], out_fd),
        "&" => Ok(()),
        other => Err(format!("tsh: {other}: builtin not implemented")),
    }
}

fn cd(target: Option<&str>) -> Result<(), String> {
    let home = sys::home_dir().unwrap_or_default();
    let path = target.unwrap_or(&home);
    let p = Path::new(path);
    match env::set_current_dir(p) {
        Ok(()) => Ok(()),
        Err(e) => match e.raw_os_error() {
            Some(code) if code == libc::ENOENT => Err(format!("cd: {path}: No such file or directory")),
            Some(code) if code == libc::ENOTDIR => Err(format!("cd: {path}: Not a directory")),
            _ => Err(format!("cd: {path}: {e}")),
        },
    }
}

/// Resolve a `%jid` or bare-pid argument to a pid, per §4.7.
fn resolve_job_arg(arg: Option<&String>) -> Result<libc::pid_t, String> {
    let arg = arg.ok_or_else(|| "tsh: argument must be a PID or %jobid".to_string())?;
    if let Some(jid_str) = arg.strip_prefix('%') {
        let jid: u32 = jid_str.parse().map_err(|_| format!("tsh: {arg}: no such job"))?;
        return jobs::with_global(|table| {
            table.by_jid(jid).map(|j| j.pid).ok_or_else(|| format!("tsh: {arg}: no such job"))
        });
    }
    arg.parse().map_err(|_| "tsh: argument must be a PID or %jobid".to_string())
}

fn bg_fg(arg: Option<&String>, target_state: JobState) -> Result<(), String> {
    let pid = resolve_job_arg(arg)?;

    let found = jobs::with_global(|table| {
        if let Some(job) = table.by_pid_mut(pid) {
            job.state = target_state;
            Some(job.jid)
        } else {
            None
        }
    });
    let Some(jid) = found else {
        return Err(format!("tsh: ({pid}): No such process"));
    };

    sys::kill(-pid, libc::SIGCONT).map_err(|e| format!("tsh: kill: {e}"))?;

    match target_state {
        JobState::Bg => {
            let cmdline = jobs::with_global(|table| {
                table.by_pid(pid).map(|j| j.cmdline.clone()).unwrap_or_default()
            });
            sys::write_raw(sys::STDOUT_FD, format!("[{jid}] ({pid}) {cmdline}\n").as_bytes());
            Ok(())
        }
        JobState::Fg => {
            launch::wait_for_foreground(pid);
            Ok(())
        }
        JobState::St => unreachable!("bg_fg only called with Bg or Fg"),
    }
}
