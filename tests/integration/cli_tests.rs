//! CLI integration tests.
//!
//! Runs the built binary against fixture modules.

use std::path::Path;
use std::process::{Command, Output};

use immutablecheck::exit_code;

use crate::common::Fixture;

fn run_cli(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_immutablecheck"))
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .env_remove("FORCE_COLOR")
        .args(args)
        .output()
        .expect("run immutablecheck")
}

fn stderr_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_text_output_and_exit_status() {
    let fixture = Fixture::school();
    let output = run_cli(fixture.root(), &["./..."]);

    assert_eq!(output.status.code(), Some(exit_code::DIAGNOSTICS));
    assert!(output.stdout.is_empty());
    let lines = stderr_lines(&output);
    assert_eq!(
        lines,
        vec![
            "main.go:9:2: assignment to immutable field Id",
            "main.go:11:2: assignment to immutable field Age",
            "main.go:24:2: assignment to immutable field Teachers",
            "main.go:33:2: assignment to immutable field Teachers",
            "main.go:35:2: modifying immutable field Teachers (map/slice index)",
        ]
    );
}

#[test]
fn test_clean_package_exits_zero() {
    let fixture = Fixture::new();
    fixture.write("app/app.go", "package app\n\ntype T struct{ X int }\n\nfunc f(t *T) { t.X = 1 }\n");
    let output = run_cli(fixture.root(), &["./app"]);
    assert_eq!(output.status.code(), Some(exit_code::CLEAN));
}

#[test]
fn test_json_output() {
    let fixture = Fixture::school();
    let output = run_cli(fixture.root(), &["--format", "json", "."]);

    assert_eq!(output.status.code(), Some(exit_code::DIAGNOSTICS));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let diagnostics = value["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 5);
    assert_eq!(diagnostics[4]["kind"], "index_mutate");
    assert_eq!(diagnostics[4]["field"], "Teachers");
}

#[test]
fn test_github_output() {
    let fixture = Fixture::school();
    let output = run_cli(fixture.root(), &["--format", "github", "."]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("::error file=main.go,line=9,col=2,title=immutablecheck::"));
}

#[test]
fn test_syntax_error_exits_one() {
    let fixture = Fixture::new();
    fixture.write("app/bad.go", "package app\n\nfunc (\n");
    let output = run_cli(fixture.root(), &["./app"]);

    assert_eq!(output.status.code(), Some(exit_code::LOAD_ERROR));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("app/bad.go:"));
    assert!(stderr.contains("syntax error"));
}

#[test]
fn test_invalid_config_exits_two() {
    let fixture = Fixture::school();
    fixture.write(".git/HEAD", "ref: refs/heads/main\n");
    fixture.write(".immutablecheck.toml", "[descriptor]\noption_number = 19500\n");
    let output = run_cli(fixture.root(), &["."]);
    assert_eq!(output.status.code(), Some(exit_code::CONFIG_ERROR));
}

#[test]
fn test_config_file_is_discovered() {
    let fixture = Fixture::school();
    fixture.write(".git/HEAD", "ref: refs/heads/main\n");
    fixture.write(".immutablecheck.toml", "[generated]\npackage_names = []\npath_suffixes = []\n");
    let output = run_cli(fixture.root(), &["."]);
    assert_eq!(output.status.code(), Some(exit_code::CLEAN));

    // CLI flags override the file.
    let output = run_cli(fixture.root(), &["--generated-package", "pb", "."]);
    assert_eq!(output.status.code(), Some(exit_code::DIAGNOSTICS));
}

#[test]
fn test_dump_descriptor() {
    let fixture = Fixture::school();
    let output = run_cli(
        fixture.root(),
        &["--dump-descriptor", "pb/descriptor/all.protos.pb"],
    );
    assert_eq!(output.status.code(), Some(exit_code::CLEAN));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["Person"], serde_json::json!(["id", "age"]));
    assert_eq!(value["TeacherTeam"], serde_json::json!(["teachers"]));
    assert!(value.get("Missing").is_none());
}

#[test]
fn test_missing_pattern_is_usage_error() {
    let fixture = Fixture::new();
    let output = run_cli(fixture.root(), &[]);
    assert_eq!(output.status.code(), Some(2));
}
