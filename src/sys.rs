//! Thin wrappers over the raw POSIX primitives the launcher and signal core
//! need directly (`fork`, `pipe`, `dup2`, `execvp`, `waitpid`, `setpgid`).
//!
//! `std::process::Command` cannot express this crate's job-leader shape: a
//! forked child that itself forks further grandchildren and aggregates their
//! exit statuses before exiting (§4.4). So the launcher drops to `libc`
//! directly, in the style of `hniksic-rust-subprocess::posix`.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;

fn check(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 { Err(io::Error::last_os_error()) } else { Ok(rc) }
}

/// `fork(2)`. Returns 0 in the child, the child's pid in the parent.
///
/// # Safety
/// After a fork, only async-signal-safe operations are well-defined until
/// `execvp`/`_exit`. Callers must not allocate through paths that could
/// deadlock on a lock held by another (now-nonexistent) thread; this shell
/// is single-threaded, so ordinary allocation is safe in practice, matching
/// `job_control.rs`'s treatment of the post-fork child.
pub unsafe fn fork() -> io::Result<libc::pid_t> {
    check(unsafe { libc::fork() })
}

pub fn pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0 as libc::c_int; 2];
    check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    Ok((fds[0], fds[1]))
}

pub fn dup2(old: RawFd, new: RawFd) -> io::Result<()> {
    check(unsafe { libc::dup2(old, new) })?;
    Ok(())
}

pub fn close(fd: RawFd) {
    unsafe { libc::close(fd) };
}

pub fn open_read(path: &str) -> io::Result<RawFd> {
    let c = CString::new(path).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    check(unsafe { libc::open(c.as_ptr(), libc::O_RDONLY) })
}

pub fn open_write_truncate(path: &str, mode: libc::mode_t) -> io::Result<RawFd> {
    let c = CString::new(path).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    check(unsafe {
        libc::open(c.as_ptr(), libc::O_CREAT | libc::O_TRUNC | libc::O_WRONLY, mode as libc::c_uint)
    })
}

/// `execvp(3)`: never returns on success.
pub fn execvp(program: &str, args: &[String]) -> io::Error {
    let Ok(c_program) = CString::new(program) else {
        return io::Error::from(io::ErrorKind::InvalidInput);
    };
    let c_args: Vec<CString> = match args.iter().map(|a| CString::new(a.as_str())).collect() {
        Ok(v) => v,
        Err(_) => return io::Error::from(io::ErrorKind::InvalidInput),
    };
    let mut argv: Vec<*const libc::c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
    argv.push(ptr::null());

    unsafe { libc::execvp(c_program.as_ptr(), argv.as_ptr()) };
    io::Error::last_os_error()
}

/// Exit the current process without running destructors (post-fork, async-signal-safe).
pub fn exit_now(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

pub fn setpgid(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    let rc = unsafe { libc::setpgid(pid, pgid) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Already exec'd or gone; best-effort is fine, matching job_control.rs.
        Some(code) if code == libc::EACCES || code == libc::ESRCH => Ok(()),
        _ => Err(err),
    }
}

pub fn getpid() -> libc::pid_t {
    unsafe { libc::getpid() }
}

/// Resolve the invoking user's home directory via the user database
/// (`getpwuid(getuid())->pw_dir`), not `$HOME` directly — matching
/// `original_source/tsh/bookmark.c::get_home_dir()`, which never reads the
/// environment. Returns `None` if the current uid has no passwd entry or
/// the entry has no home directory set.
pub fn home_dir() -> Option<String> {
    let pw = unsafe { libc::getpwuid(libc::getuid()) };
    if pw.is_null() {
        return None;
    }
    let dir = unsafe { (*pw).pw_dir };
    if dir.is_null() {
        return None;
    }
    let c_str = unsafe { std::ffi::CStr::from_ptr(dir) };
    c_str.to_str().ok().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Send `sig` to process or process group `pid` (negative for a group).
/// `ESRCH` (already gone) is treated as success.
pub fn kill(pid: libc::pid_t, sig: libc::c_int) -> io::Result<()> {
    let rc = unsafe { libc::kill(pid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

pub enum WaitStatus {
    /// No child changed state (only returned for `WNOHANG` polls).
    NoChange,
    Exited { pid: libc::pid_t, code: i32 },
    Signaled { pid: libc::pid_t, signal: i32 },
    Stopped { pid: libc::pid_t, signal: i32 },
}

/// Decode a raw `wait(2)` status word into exit code / signal-termination
/// shell semantics (128+signal for signalled exits), matching `status.rs`.
pub fn decode_exit_code(raw_status: libc::c_int) -> i32 {
    if unsafe { libc::WIFEXITED(raw_status) } {
        unsafe { libc::WEXITSTATUS(raw_status) }
    } else if unsafe { libc::WIFSIGNALED(raw_status) } {
        128 + unsafe { libc::WTERMSIG(raw_status) }
    } else {
        1
    }
}

/// Blocking `waitpid(pid, WUNTRACED)` — used by the grandchild reaper inside
/// a job leader, which does block (it has nothing else to do but aggregate
/// its own pipeline's exit statuses).
pub fn waitpid_blocking(pid: libc::pid_t) -> io::Result<WaitStatus> {
    loop {
        let mut raw = 0;
        let rc = unsafe { libc::waitpid(pid, &mut raw, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        return Ok(classify(rc, raw));
    }
}

/// Non-blocking `waitpid(-1, WUNTRACED | WNOHANG)` — the core of the
/// `SIGCHLD` handler's reaping loop (§4.6). Returns `NoChange` once there is
/// nothing left to report; `ECHILD` (no children at all) is folded into
/// `NoChange` rather than an error, matching the original `sigchld_handler`.
pub fn waitpid_nonblocking_any() -> io::Result<WaitStatus> {
    let mut raw = 0;
    let rc = unsafe { libc::waitpid(-1, &mut raw, libc::WUNTRACED | libc::WNOHANG) };
    if rc == 0 {
        return Ok(WaitStatus::NoChange);
    }
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ECHILD) {
            return Ok(WaitStatus::NoChange);
        }
        return Err(err);
    }
    Ok(classify(rc, raw))
}

fn classify(pid: libc::pid_t, raw: libc::c_int) -> WaitStatus {
    if unsafe { libc::WIFSTOPPED(raw) } {
        WaitStatus::Stopped { pid, signal: unsafe { libc::WSTOPSIG(raw) } }
    } else if unsafe { libc::WIFSIGNALED(raw) } {
        WaitStatus::Signaled { pid, signal: unsafe { libc::WTERMSIG(raw) } }
    } else {
        WaitStatus::Exited { pid, code: decode_exit_code(raw) }
    }
}

/// Write a byte slice directly with `write(2)`, bypassing any buffered,
/// allocating I/O layer. The only output primitive safe to call from a
/// signal handler (§4.6).
pub fn write_raw(fd: RawFd, bytes: &[u8]) {
    let mut off = 0;
    while off < bytes.len() {
        let rc = unsafe {
            libc::write(fd, bytes[off..].as_ptr() as *const libc::c_void, bytes.len() - off)
        };
        if rc <= 0 {
            break;
        }
        off += rc as usize;
    }
}

pub const STDOUT_FD: RawFd = libc::STDOUT_FILENO;
pub const STDERR_FD: RawFd = libc::STDERR_FILENO;
pub const STDIN_FD: RawFd = libc::STDIN_FILENO;
