//! CLI tests for the `argot check` and `argot dump` subcommands.

use std::fs;
use std::process::Command;

use assert_cmd::cargo;

fn argot_cmd() -> Command {
    Command::new(cargo::cargo_bin!("argot"))
}

fn write_grammar(name: &str, content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write grammar json");
    (dir, path.to_string_lossy().to_string())
}

const USER_GRAMMAR: &str = r#"{
  "fields": [
    { "ident": "verbose", "kind": "bool", "tags": { "short": "v" } },
    { "ident": "user", "tags": { "role": "command" }, "record": { "fields": [
      { "ident": "create", "tags": { "role": "command" }, "record": { "fields": [
        { "ident": "id", "kind": "int", "tags": { "role": "arg" } },
        { "ident": "first", "tags": { "role": "arg" } },
        { "ident": "last", "tags": { "role": "arg" } }
      ] } }
    ] } }
  ]
}"#;

#[test]
fn check_reports_node_and_field_counts() {
    let (_dir, path) = write_grammar("app.json", USER_GRAMMAR);
    let output = argot_cmd()
        .args(["check", "--grammar", &path])
        .output()
        .expect("run check");
    assert!(
        output.status.success(),
        "expected check to succeed, stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("grammar OK (3 nodes, 4 fields)"),
        "unexpected check output: {stdout}"
    );
}

#[test]
fn check_json_envelope() {
    let (_dir, path) = write_grammar("app.json", USER_GRAMMAR);
    let output = argot_cmd()
        .args(["check", "--grammar", &path, "--output", "json"])
        .output()
        .expect("run check json");
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid check json");
    assert_eq!(json["ok"], true);
    assert_eq!(json["nodes"], 3);
    assert_eq!(json["fields"], 4);
}

#[test]
fn check_reports_build_errors_with_exit_one() {
    let bad = r#"{ "fields": [ { "ident": "flag" }, { "ident": "flag" } ] }"#;
    let (_dir, path) = write_grammar("bad.json", bad);
    let output = argot_cmd()
        .args(["check", "--grammar", &path, "--output", "json"])
        .output()
        .expect("run check on bad grammar");
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid error json");
    assert_eq!(json["ok"], false);
    assert_eq!(json["stage"], "build");
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("duplicate flag --flag"),
        "unexpected error payload: {json}"
    );
}

#[test]
fn check_requires_the_grammar_flag() {
    let output = argot_cmd().args(["check"]).output().expect("run check");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("missing flags: --grammar"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn unknown_subcommand_is_rejected_by_the_cli_grammar() {
    let output = argot_cmd().args(["frobnicate"]).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unexpected argument frobnicate"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn dump_emits_the_node_tree() {
    let (_dir, path) = write_grammar("app.json", USER_GRAMMAR);
    let output = argot_cmd()
        .args(["dump", "--grammar", &path])
        .output()
        .expect("run dump");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid dump json");
    assert_eq!(json["nodes"][0]["name"], "app");
    assert_eq!(json["nodes"][1]["name"], "user");
    assert_eq!(json["nodes"][2]["name"], "create");
    assert_eq!(json["fields"].as_array().unwrap().len(), 4);
}
