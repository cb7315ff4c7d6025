//! Black-box CLI tests: spawn the built binary against a temp source file
//! and check its exit code and output, grounded on the teacher's own
//! `Command::new(env!("CARGO_BIN_EXE_..."))` + `tempfile` pattern.

use std::fs;
use std::process::Command;

use tempfile::tempdir;

fn write_source(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write source");
    path
}

#[test]
fn clean_source_regenerates_sqlite_to_stdout() {
    let dir = tempdir().expect("temp dir");
    let input = write_source(
        &dir,
        "t.sql",
        "CREATE TABLE t (id INT NOT NULL PRIMARY KEY, v TEXT); CREATE PROC p () BEGIN SELECT * FROM t; END;",
    );

    let output = Command::new(env!("CARGO_BIN_EXE_sqlplc"))
        .args(["--in", input.to_str().expect("input path")])
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert!(stdout.contains("SELECT id, v FROM t"), "{}", stdout);
}

#[test]
fn codegen_out_writes_to_the_given_file() {
    let dir = tempdir().expect("temp dir");
    let input = write_source(&dir, "t.sql", "CREATE TABLE t (id INT NOT NULL PRIMARY KEY); SELECT id FROM t;");
    let out_path = dir.path().join("out.sql");

    let status = Command::new(env!("CARGO_BIN_EXE_sqlplc"))
        .args(["--in", input.to_str().expect("input path"), "--cg", out_path.to_str().expect("out path")])
        .status()
        .expect("run CLI");

    assert!(status.success());
    let written = fs::read_to_string(&out_path).expect("output file exists");
    assert!(written.contains("SELECT id FROM t"), "{}", written);
}

#[test]
fn semantic_error_exits_nonzero_and_reports_to_stderr() {
    let dir = tempdir().expect("temp dir");
    let input = write_source(&dir, "t.sql", "SELECT id FROM missing;");

    let output = Command::new(env!("CARGO_BIN_EXE_sqlplc"))
        .args(["--in", input.to_str().expect("input path")])
        .output()
        .expect("run CLI");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("missing"), "{}", stderr);
}

#[test]
fn missing_input_file_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_sqlplc"))
        .args(["--in", "does-not-exist.sql"])
        .output()
        .expect("run CLI");

    assert!(!output.status.success());
}
