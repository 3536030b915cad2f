//! Process substitution executor (§4.3): resolves `<(...)`/`>(...)` tokens
//! before the outer pipeline is planned, by recursively spawning an inner
//! pipeline and replacing the substitution with a `/proc/<pid>/fd/<n>`
//! path token.

use std::os::unix::io::RawFd;

use crate::launch::{self, StdioOverride};
use crate::plan;
use crate::sys;
use crate::token::Token;

enum Marker {
    /// `<(...)`: the inner pipeline's stdout feeds the substitution; the
    /// outer command reads the emitted path.
    In,
    /// `>(...)`: the inner pipeline's stdin is fed by the substitution; the
    /// outer command writes to the emitted path.
    Out,
}

/// Resolve every `<(...)`/`>(...)` span in `tokens`.
///
/// Returns the flattened token stream plus the set of fds this process must
/// keep open until the *outer* pipeline has been forked (the synthesized
/// `/proc/<this-pid>/fd/<n>` path is only valid for a process that inherits
/// this fd table — i.e. the outer command, after its own `fork`, which
/// copies these fd numbers unchanged). The caller is responsible for
/// closing them once that fork has happened (§4.3: "the parent process
/// does not close its retained fd before spawning the outer command").
///
/// A stream with no substitution tokens is returned unchanged (§9: the
/// source this was distilled from exits the whole command even when
/// nothing needed substituting; this does not).
pub fn resolve(tokens: Vec<Token>) -> Result<(Vec<Token>, Vec<RawFd>), String> {
    if !tokens.iter().any(|t| matches!(t, Token::SubIn | Token::SubOut)) {
        return Ok((tokens, Vec::new()));
    }

    let mut stack: Vec<(Marker, Vec<Token>)> = Vec::new();
    let mut output: Vec<Token> = Vec::new();
    let mut kept_fds = Vec::new();

    for tok in tokens {
        match tok {
            Token::SubIn => stack.push((Marker::In, Vec::new())),
            Token::SubOut => stack.push((Marker::Out, Vec::new())),
            Token::SubEnd => {
                let (marker, inner) = stack.pop().ok_or("tsh: unbalanced substitution")?;
                let (path_token, kept_fd) = resolve_one(marker, inner)?;
                kept_fds.push(kept_fd);
                match stack.last_mut() {
                    Some((_, buf)) => buf.push(path_token),
                    None => output.push(path_token),
                }
            }
            other => match stack.last_mut() {
                Some((_, buf)) => buf.push(other),
                None => output.push(other),
            },
        }
    }

    if !stack.is_empty() {
        return Err("tsh: unbalanced substitution".to_string());
    }

    Ok((output, kept_fds))
}

/// Launch the inner pipeline for one resolved `<(...)`/`>(...)` span.
/// Returns the path token that should replace it, and the fd this process
/// must keep open on the caller's behalf.
fn resolve_one(marker: Marker, inner_tokens: Vec<Token>) -> Result<(Token, RawFd), String> {
    let inner_pipeline = plan::plan(&inner_tokens)?;

    let (read_fd, write_fd) = sys::pipe().map_err(|e| format!("tsh: pipe: {e}"))?;

    // `<(...)`: the inner pipeline writes, so it gets `write_fd` as its own
    // stdout; this process keeps `read_fd` open and hands the outer command
    // a path to read from. `>(...)` is the mirror image.
    let (kept_fd, override_for_child) = match marker {
        Marker::In => (read_fd, StdioOverride::Stdout(write_fd)),
        Marker::Out => (write_fd, StdioOverride::Stdin(read_fd)),
    };

    match launch::spawn_pipeline(&inner_pipeline, Some(override_for_child)) {
        Ok(_inner_leader_pid) => {}
        Err(e) => {
            sys::close(read_fd);
            sys::close(write_fd);
            return Err(e);
        }
    }

    // This runs in the parent only — `spawn_pipeline` never returns here in
    // the forked leader. The leader's copy of `kept_fd`, inherited across
    // its own fork and never explicitly closed there, is harmless: it is
    // simply an extra reference to the same pipe that keeps it alive until
    // every reader/writer is done with it.
    let path = format!("/proc/{}/fd/{kept_fd}", sys::getpid());
    Ok((Token::Word(path), kept_fd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    #[test]
    fn passthrough_when_no_substitution() {
        let line = tokenize("echo hi");
        let (resolved, kept) = resolve(line.tokens.clone()).unwrap();
        assert_eq!(resolved, line.tokens);
        assert!(kept.is_empty());
    }

    #[test]
    fn unbalanced_sub_end_is_error() {
        let tokens = vec![Token::Word("cat".into()), Token::SubEnd];
        assert!(resolve(tokens).is_err());
    }

    #[test]
    fn unclosed_marker_is_error() {
        let tokens = vec![Token::Word("cat".into()), Token::SubIn, Token::Word("echo".into())];
        assert!(resolve(tokens).is_err());
    }
}
