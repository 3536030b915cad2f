use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .arg("-p")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn simple_foreground_command_runs() {
    let output = run_shell(&["echo hello"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
}

#[test]
fn pipeline_connects_stdout_to_stdin() {
    let output = run_shell(&["echo hello | tr a-z A-Z"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "HELLO\n");
}

#[test]
fn three_stage_pipeline() {
    let output = run_shell(&["printf 'b\\na\\nc\\n' | sort | tr a-z A-Z"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "A\nB\nC\n");
}

#[test]
fn output_redirection_writes_to_file() {
    let dir = std::env::temp_dir().join(format!("tsh-test-out-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let target = dir.join("out.txt");

    let output = run_shell(&[&format!("echo redirected > {}", target.display())]);
    assert!(output.status.success() || output.status.code() == Some(0));

    let written = fs::read_to_string(&target).unwrap();
    assert_eq!(written, "redirected\n");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn input_redirection_feeds_stdin() {
    let dir = std::env::temp_dir().join(format!("tsh-test-in-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let source = dir.join("in.txt");
    fs::write(&source, "line one\nline two\n").unwrap();

    let output = run_shell(&[&format!("wc -l < {}", source.display())]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim().starts_with('2'), "stdout was: {stdout}");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn command_not_found_reports_and_continues() {
    let output = run_shell(&["this-command-does-not-exist-xyz", "echo still-alive"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stderr.contains("Command not found"), "stderr was: {stderr}");
    assert!(stdout.contains("still-alive"));
}

#[test]
fn process_substitution_provides_a_readable_path() {
    let output = run_shell(&["cat <(echo substituted)"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "substituted\n");
}

#[test]
fn missing_redirection_target_is_a_parse_error() {
    let output = run_shell(&["echo hi >", "echo still-alive"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stderr.contains("missing target"));
    assert!(stdout.contains("still-alive"));
}
