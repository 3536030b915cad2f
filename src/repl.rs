//! REPL driver (§4.8): reads lines from stdin or a script file, dispatches
//! each through substitution resolution, pipeline planning, and the
//! launcher.

use std::io::{self, BufRead, Write};

use crate::launch::{self, LaunchRequest};
use crate::plan;
use crate::subst;
use crate::token::{self, Token};

pub struct ReplOptions {
    pub prompt: bool,
    /// Echo each line before evaluating it (set when reading from a script
    /// file rather than an interactive terminal; §4.8).
    pub echo: bool,
}

/// Drive the REPL over `input` until EOF, returning the process exit status
/// (§6: 0 on clean EOF).
pub fn run<R: BufRead>(mut input: R, opts: &ReplOptions) -> i32 {
    let mut line = String::new();
    loop {
        if opts.prompt {
            print_prompt();
        }

        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => return 0, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("tsh: read error: {e}");
                return 1;
            }
        }

        let trimmed = line.trim_end_matches('\n');
        if opts.echo {
            println!("{trimmed}");
        }

        execute_line(trimmed, true);
    }
}

fn print_prompt() {
    let cwd = std::env::current_dir().map(|p| p.display().to_string()).unwrap_or_default();
    print!("{cwd} $ ");
    let _ = io::stdout().flush();
}

/// Run one line through the full tokenize -> substitute -> plan -> launch
/// pipeline. `record_history` is false when this line is being replayed by
/// `fc`, so replays don't grow the ring themselves (§4.7/§4.8).
pub fn execute_line(line: &str, record_history: bool) {
    let tokenized = token::tokenize(line);
    if tokenized.tokens.is_empty() {
        // Blank line, or a bare trailing "&" with nothing else: a no-op
        // (§4.1, §4.7).
        return;
    }

    let is_fc = matches!(tokenized.tokens.first(), Some(Token::Word(w)) if w == "fc");
    if record_history && !is_fc {
        crate::history::record(line);
    }

    let (resolved_tokens, kept_fds) = match subst::resolve(tokenized.tokens) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let pipeline = match plan::plan(&resolved_tokens) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            for fd in kept_fds {
                crate::sys::close(fd);
            }
            return;
        }
    };

    let cmdline = if tokenized.background { strip_background_marker(line) } else { line };

    let result = launch::launch(LaunchRequest {
        pipeline: &pipeline,
        background: tokenized.background,
        cmdline,
    });

    // The outer pipeline's own fork has now happened (or failed to), so any
    // fd this line kept open for a process substitution's benefit is no
    // longer needed here (§4.3).
    for fd in kept_fds {
        crate::sys::close(fd);
    }

    if let Err(e) = result {
        eprintln!("{e}");
    }
}

/// Strip the trailing `&` background marker from a line, for
/// display/job-table purposes. Only the marker character itself is
/// removed — the space that separated it from the command is left in
/// place (§8 scenario 2: the announcement line for `sleep 5 &` is
/// `[1] (pid) sleep 5 `, not `[1] (pid) sleep 5`).
fn strip_background_marker(line: &str) -> &str {
    line.strip_suffix('&').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_only_the_ampersand_character() {
        assert_eq!(strip_background_marker("sleep 5 &"), "sleep 5 ");
    }

    #[test]
    fn leaves_line_unchanged_when_no_marker_present() {
        assert_eq!(strip_background_marker("sleep 5"), "sleep 5");
    }
}
