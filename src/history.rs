//! History ring (§3, §4.7): a bounded circular buffer of command-line
//! strings backing the `fc` builtin.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::OnceLock;

pub const DEFAULT_CAPACITY: usize = 64;

struct History {
    entries: VecDeque<(u64, String)>,
    capacity: usize,
    next_index: u64,
}

impl History {
    fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::new(), capacity: capacity.max(1), next_index: 0 }
    }

    fn push(&mut self, line: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((self.next_index, line));
        self.next_index += 1;
    }

    /// Entries with logical index in `[lo, hi]`, oldest first. Indices
    /// outside the retained window are silently clipped.
    fn slice(&self, lo: u64, hi: u64) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(idx, _)| *idx >= lo && *idx <= hi)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

static GLOBAL: OnceLock<Mutex<History>> = OnceLock::new();

fn global() -> &'static Mutex<History> {
    GLOBAL.get_or_init(|| Mutex::new(History::new(DEFAULT_CAPACITY)))
}

/// Record one successfully-parsed, non-`fc` line (§4.8).
pub fn record(line: &str) {
    global().lock().unwrap().push(line.to_string());
}

/// `fc A B`: re-executes the history slice `[current - max(A,B), current -
/// min(A,B)]` in order (§4.7). `A`/`B` are given as the builtin's first and
/// second arguments; a single argument repeats it (re-executing just that
/// one line).
pub fn run_fc(args: &[String]) -> Result<(), String> {
    if args.is_empty() {
        return Err("tsh: fc: usage: fc A [B]".to_string());
    }
    let a: u64 = args[0].parse().map_err(|_| format!("tsh: fc: {}: not a number", args[0]))?;
    let b: u64 = match args.get(1) {
        Some(s) => s.parse().map_err(|_| format!("tsh: fc: {s}: not a number"))?,
        None => a,
    };

    let lines = {
        let history = global().lock().unwrap();
        let current = history.next_index;
        let lo = current.saturating_sub(a.max(b));
        let hi = current.saturating_sub(a.min(b));
        history.slice(lo, hi)
    };

    for line in lines {
        crate::repl::execute_line(&line, false);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_picks_correct_window() {
        let mut h = History::new(8);
        for i in 0..5 {
            h.push(format!("cmd{i}"));
        }
        // current = 5; fc 3 1 => [5-3, 5-1] = [2,4] => cmd2, cmd3, cmd4
        let lo = 5u64.saturating_sub(3);
        let hi = 5u64.saturating_sub(1);
        assert_eq!(h.slice(lo, hi), vec!["cmd2", "cmd3", "cmd4"]);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = History::new(2);
        h.push("a".into());
        h.push("b".into());
        h.push("c".into());
        assert_eq!(h.slice(0, 10), vec!["b", "c"]);
    }

    #[test]
    fn single_argument_repeats_one_line() {
        let mut h = History::new(8);
        h.push("only".into());
        let current = h.next_index;
        assert_eq!(h.slice(current - 1, current - 1), vec!["only"]);
    }
}
