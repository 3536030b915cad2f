//! Signal core (§4.6): handler installation, the masking critical-section
//! primitive, and the handler bodies themselves.
//!
//! Grounded on `job_control.rs`'s low-level `libc` usage and the original
//! `sigutil.c`'s `bind_signal`/`mask_signal`/`send_signal` shape, reworked
//! to be allocation-free inside the handlers (`fmtbuf::FmtBuf` instead of
//! `format!`, `sys::write_raw` instead of `println!`) per §4.6's
//! signal-handler-safety requirement.

use std::io;
use std::mem::MaybeUninit;

use crate::fmtbuf::FmtBuf;
use crate::jobs::{self, JobState};
use crate::sys::{self, WaitStatus};

/// Install handlers for `SIGINT`, `SIGTSTP`, `SIGCHLD`, `SIGQUIT` (§4.6).
pub fn install() -> io::Result<()> {
    bind(libc::SIGINT, sigint_handler)?;
    bind(libc::SIGTSTP, sigtstp_handler)?;
    bind(libc::SIGCHLD, sigchld_handler)?;
    bind(libc::SIGQUIT, sigquit_handler)?;
    Ok(())
}

fn bind(signum: libc::c_int, handler: extern "C" fn(libc::c_int)) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = MaybeUninit::zeroed().assume_init();
        action.sa_sigaction = handler as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = libc::SA_RESTART;
        if libc::sigaction(signum, &action, std::ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn sigchld_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = MaybeUninit::zeroed().assume_init();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGCHLD);
        set
    }
}

fn mask(how: libc::c_int) {
    let set = sigchld_set();
    unsafe {
        libc::sigprocmask(how, &set, std::ptr::null_mut());
    }
}

/// Run `f` with `SIGCHLD` blocked for its duration — the critical section
/// the launcher brackets around `fork` + job registration (§4.6) so a very
/// short-lived child can't be reaped before it is registered.
pub fn critical_section<R>(f: impl FnOnce() -> R) -> R {
    mask(libc::SIG_BLOCK);
    let result = f();
    mask(libc::SIG_UNBLOCK);
    result
}

pub fn block_sigchld() {
    mask(libc::SIG_BLOCK);
}

pub fn unblock_sigchld() {
    mask(libc::SIG_UNBLOCK);
}

/// `SIGQUIT`: the shell exits with status 1 after printing a termination
/// notice (§4.6).
extern "C" fn sigquit_handler(_sig: libc::c_int) {
    sys::write_raw(sys::STDERR_FD, b"tsh: terminating after receipt of SIGQUIT\n");
    sys::exit_now(1);
}

/// `SIGTSTP` (Ctrl-Z at the shell's own terminal): forward to the
/// foreground job's process group. The actual state transition to `St` and
/// its announcement happen when `SIGCHLD` reports the child as stopped
/// (below) — that is the authoritative point at which the OS has actually
/// suspended the job, and funnels both this path and a directly-delivered
/// stop through one piece of code instead of the original's two call sites
/// racing to print the same line twice.
extern "C" fn sigtstp_handler(_sig: libc::c_int) {
    jobs::with_global(|table| {
        let pid = table.fgpid();
        if pid != 0 {
            let _ = sys::kill(-pid, libc::SIGTSTP);
        }
    });
}

/// `SIGINT` (Ctrl-C at the shell's own terminal): forward to the foreground
/// job's process group and remove the job immediately (§4.6).
extern "C" fn sigint_handler(_sig: libc::c_int) {
    jobs::with_global(|table| {
        let pid = table.fgpid();
        if pid == 0 {
            return;
        }
        announce_terminated(table, pid, libc::SIGINT);
        table.delete(pid);
        let _ = sys::kill(-pid, libc::SIGINT);
    });
}

fn announce_terminated(table: &jobs::JobTable, pid: libc::pid_t, signal: libc::c_int) {
    if let Some(jid) = table.pid2jid(pid) {
        let mut line: FmtBuf<128> = FmtBuf::new();
        line.push_str("Jobs [")
            .push_i32(jid as i32)
            .push_str("] (")
            .push_i32(pid as i32)
            .push_str(") terminated by signal ")
            .push_i32(signal)
            .push_str("\n");
        sys::write_raw(sys::STDOUT_FD, line.as_bytes());
    }
}

fn announce_stopped(table: &jobs::JobTable, pid: libc::pid_t, signal: libc::c_int) {
    if let Some(jid) = table.pid2jid(pid) {
        let mut line: FmtBuf<128> = FmtBuf::new();
        line.push_str("Job [")
            .push_i32(jid as i32)
            .push_str("] (")
            .push_i32(pid as i32)
            .push_str(") stopped by signal ")
            .push_i32(signal)
            .push_str("\n");
        sys::write_raw(sys::STDOUT_FD, line.as_bytes());
    }
}

/// `SIGCHLD`: drains every ready child status report non-blockingly (§4.6).
extern "C" fn sigchld_handler(_sig: libc::c_int) {
    loop {
        let outcome = sys::waitpid_nonblocking_any();
        match outcome {
            Ok(WaitStatus::NoChange) => break,
            Ok(WaitStatus::Stopped { pid, signal }) => {
                jobs::with_global(|table| {
                    announce_stopped(table, pid, signal);
                    if let Some(job) = table.by_pid_mut(pid) {
                        job.state = JobState::St;
                    }
                });
            }
            Ok(WaitStatus::Signaled { pid, signal }) if signal == libc::SIGINT => {
                jobs::with_global(|table| {
                    announce_terminated(table, pid, signal);
                    table.delete(pid);
                });
            }
            Ok(WaitStatus::Signaled { .. }) => {
                // Any other terminating signal is unexpected for a job this
                // shell is tracking directly (§4.6: "unexpected signals are
                // surfaced as fatal errors"). The job is still reaped so it
                // doesn't become a second zombie after the shell exits.
                sys::write_raw(sys::STDERR_FD, b"tsh: sigchld_handler: uncaught signal\n");
                sys::exit_now(1);
            }
            Ok(WaitStatus::Exited { pid, .. }) => {
                jobs::with_global(|table| {
                    table.delete(pid);
                });
            }
            Err(_) => {
                sys::write_raw(sys::STDERR_FD, b"tsh: sigchld_handler: waitpid error\n");
                sys::exit_now(1);
            }
        }
    }
}
