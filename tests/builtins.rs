use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell_with_home(lines: &[&str], home: &std::path::Path) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .arg("-p")
        .env("HOME", home)
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

fn temp_home(label: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("tsh-test-home-{label}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn cd_with_no_argument_goes_home() {
    let home = temp_home("cd-default");
    let output = run_shell_with_home(&["cd", "pwd"], &home);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim().ends_with(home.file_name().unwrap().to_str().unwrap()));
    fs::remove_dir_all(&home).ok();
}

#[test]
fn cd_missing_path_reports_error() {
    let home = temp_home("cd-missing");
    let output = run_shell_with_home(&["cd /no/such/path/xyz"], &home);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No such file or directory"), "stderr was: {stderr}");
    fs::remove_dir_all(&home).ok();
}

#[test]
fn bm_add_then_alias_changes_directory() {
    let home = temp_home("bm");
    let target = home.join("project");
    fs::create_dir_all(&target).unwrap();

    let output = run_shell_with_home(
        &[&format!("bm add proj {}", target.display()), "bm proj", "pwd"],
        &home,
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("project"), "stdout was: {stdout}");

    let bookmarks_file = fs::read_to_string(home.join(".tshinfo")).unwrap();
    assert!(bookmarks_file.contains("proj"));
    assert!(bookmarks_file.contains(&target.display().to_string()));

    fs::remove_dir_all(&home).ok();
}

#[test]
fn bm_rm_removes_alias() {
    let home = temp_home("bm-rm");
    let output = run_shell_with_home(&["bm add x /tmp", "bm rm x", "bm x"], &home);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no such bookmark"), "stderr was: {stderr}");
    fs::remove_dir_all(&home).ok();
}

#[test]
fn fc_replays_a_prior_line() {
    let home = temp_home("fc");
    let output = run_shell_with_home(&["echo first", "echo second", "fc 1 1"], &home);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let occurrences = stdout.matches("second").count();
    assert_eq!(occurrences, 2, "stdout was: {stdout}");
    fs::remove_dir_all(&home).ok();
}
