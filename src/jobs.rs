//! Job table (§4.5): fixed-capacity array of live jobs, plus the
//! process-wide cell that lets both the REPL and the signal handlers reach
//! it (§9 "Globally accessible job table").

use std::cell::UnsafeCell;
use std::sync::OnceLock;

pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Fg,
    Bg,
    St,
}

impl JobState {
    pub fn label(self) -> &'static str {
        match self {
            JobState::Fg => "Foreground",
            JobState::Bg => "Running",
            JobState::St => "Stopped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub jid: u32,
    pub pid: libc::pid_t,
    pub state: JobState,
    pub cmdline: String,
}

/// Fixed-size array of `Option<Job>`, scanned linearly (§4.5, §9: "bounded
/// concurrency, cache-friendly, simple invariants" — and crucially, no heap
/// growth, so it is safe to mutate from the `SIGCHLD` handler).
pub struct JobTable {
    slots: Vec<Option<Job>>,
    next_jid: u32,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![None; capacity.max(1)], next_jid: 1 }
    }

    /// (I1)/(I4): assigns the next monotonic jid. Fails if `pid<1` or the
    /// table is full.
    pub fn add(&mut self, pid: libc::pid_t, state: JobState, cmdline: String) -> Option<u32> {
        if pid < 1 {
            return None;
        }
        let jid = self.next_jid;
        let slot = self.slots.iter_mut().find(|s| s.is_none())?;
        *slot = Some(Job { jid, pid, state, cmdline });
        self.next_jid += 1;
        Some(jid)
    }

    /// Removes the job with this pid, if any, and restores (I4):
    /// `nextjid = max(live jid) + 1`.
    pub fn delete(&mut self, pid: libc::pid_t) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|s| matches!(s, Some(j) if j.pid == pid))
        else {
            return false;
        };
        *slot = None;
        self.next_jid = self.max_jid() + 1;
        true
    }

    fn max_jid(&self) -> u32 {
        self.slots.iter().flatten().map(|j| j.jid).max().unwrap_or(0)
    }

    /// (I2): at most one job may be `Fg`.
    pub fn fgpid(&self) -> libc::pid_t {
        self.slots
            .iter()
            .flatten()
            .find(|j| j.state == JobState::Fg)
            .map(|j| j.pid)
            .unwrap_or(0)
    }

    pub fn by_pid_mut(&mut self, pid: libc::pid_t) -> Option<&mut Job> {
        self.slots.iter_mut().flatten().find(|j| j.pid == pid)
    }

    pub fn by_pid(&self, pid: libc::pid_t) -> Option<&Job> {
        self.slots.iter().flatten().find(|j| j.pid == pid)
    }

    pub fn by_jid(&self, jid: u32) -> Option<&Job> {
        self.slots.iter().flatten().find(|j| j.jid == jid)
    }

    pub fn pid2jid(&self, pid: libc::pid_t) -> Option<u32> {
        self.by_pid(pid).map(|j| j.jid)
    }

    /// Live jobs in jid order, for `jobs`/tests.
    pub fn list_sorted(&self) -> Vec<&Job> {
        let mut v: Vec<&Job> = self.slots.iter().flatten().collect();
        v.sort_by_key(|j| j.jid);
        v
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }
}

/// Emits `[jid] (pid) <state-word> cmdline\n` for every live job to `fd`.
pub fn write_listing(table: &JobTable, fd: std::os::unix::io::RawFd) {
    for job in table.list_sorted() {
        let line = format!("[{}] ({}) {} {}\n", job.jid, job.pid, job.state.label(), job.cmdline);
        crate::sys::write_raw(fd, line.as_bytes());
    }
}

// ── Process-wide job table cell ──
//
// The shell is single-threaded; the only "other" execution context is a
// signal handler running on the same thread's stack. A `Mutex` would risk
// deadlock if a handler fires while the main thread holds the lock, so
// instead exclusive access is guaranteed by masking SIGCHLD around every
// main-thread critical section that touches the table (§4.6) — the cell
// itself just needs `Sync` to live in a `static`.
struct GlobalCell(UnsafeCell<JobTable>);
unsafe impl Sync for GlobalCell {}

static GLOBAL: OnceLock<GlobalCell> = OnceLock::new();

pub fn init_global(capacity: usize) {
    let _ = GLOBAL.set(GlobalCell(UnsafeCell::new(JobTable::new(capacity))));
}

/// Run `f` against the global job table.
///
/// # Safety contract
/// Callers on the main thread must mask `SIGCHLD` (via
/// `signals::critical_section`) before calling this if the critical section
/// spans more than one statement (e.g. fork + register), so a handler
/// invocation can't interleave. The `SIGCHLD` handler itself calls this
/// directly since it never needs to coordinate with itself (signals of the
/// same kind are blocked for the handler's own duration by `sigaction`'s
/// implicit mask).
pub fn with_global<R>(f: impl FnOnce(&mut JobTable) -> R) -> R {
    let cell = GLOBAL.get_or_init(|| GlobalCell(UnsafeCell::new(JobTable::new(DEFAULT_CAPACITY))));
    // SAFETY: see module-level contract above.
    unsafe { f(&mut *cell.0.get()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_assigns_monotonic_jid() {
        let mut t = JobTable::new(4);
        assert_eq!(t.add(100, JobState::Bg, "a".into()), Some(1));
        assert_eq!(t.add(101, JobState::Bg, "b".into()), Some(2));
    }

    #[test]
    fn add_rejects_invalid_pid() {
        let mut t = JobTable::new(4);
        assert_eq!(t.add(0, JobState::Bg, "a".into()), None);
    }

    #[test]
    fn table_full_rejects_add() {
        let mut t = JobTable::new(1);
        assert!(t.add(1, JobState::Bg, "a".into()).is_some());
        assert!(t.add(2, JobState::Bg, "b".into()).is_none());
    }

    #[test]
    fn delete_recomputes_next_jid() {
        let mut t = JobTable::new(4);
        t.add(1, JobState::Bg, "a".into());
        t.add(2, JobState::Bg, "b".into());
        t.add(3, JobState::Bg, "c".into());
        assert!(t.delete(2)); // removes jid 2, live jids now {1,3}
        assert!(t.delete(3)); // removes jid 3, live jids now {1}
        let jid = t.add(4, JobState::Bg, "d".into()).unwrap();
        assert_eq!(jid, 2); // max(live)+1 == 1+1
    }

    #[test]
    fn fgpid_reports_unique_foreground_job() {
        let mut t = JobTable::new(4);
        t.add(1, JobState::Bg, "a".into());
        assert_eq!(t.fgpid(), 0);
        t.add(2, JobState::Fg, "b".into());
        assert_eq!(t.fgpid(), 2);
    }

    #[test]
    fn pid2jid_round_trips() {
        let mut t = JobTable::new(4);
        let jid = t.add(42, JobState::Bg, "sleep 5".into()).unwrap();
        assert_eq!(t.pid2jid(42), Some(jid));
        assert_eq!(t.pid2jid(99), None);
    }

    #[test]
    fn delete_unknown_pid_is_noop() {
        let mut t = JobTable::new(4);
        t.add(1, JobState::Bg, "a".into());
        assert!(!t.delete(999));
        assert_eq!(t.list_sorted().len(), 1);
    }
}
