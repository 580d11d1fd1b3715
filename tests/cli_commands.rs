use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;

const CELLS: &str = "\
# %% [settings]
*** Settings ***

Library  Collections

# %% [keywords]
*** Keywords ***

Head
    [Arguments]  ${list}
    ${value}=  Get from list  ${list}  0
    [Return]  ${value}

# %% [tasks]
*** Tasks ***

Get head
    ${array}=  Create list  1  2  3  4  5
    ${head}=  Head  ${array}
    Should be equal  ${head}  1
";

fn robotkernel(dir: &Path) -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("robotkernel");
    let mut cmd = Command::new(bin);
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .args(["--config", "missing.yaml", "--log-level", "warn"]);
    cmd
}

#[test]
fn run_executes_cells_in_one_session() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lab.robot"), CELLS).unwrap();

    let assert = robotkernel(dir.path())
        .args(["--output", "json", "run", "lab.robot"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let outcomes: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["cell"], "lab:settings");
    assert!(outcomes.iter().all(|outcome| outcome["reply"]["status"] == "ok"));

    let messages = outcomes[2]["messages"].as_array().unwrap();
    let result = messages
        .iter()
        .find(|message| message["msg_type"] == "execute_result")
        .expect("execute result");
    assert_eq!(result["data"]["text/plain"], "1");
}

#[test]
fn failing_cells_fail_the_command() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("broken.robot"),
        "*** Tasks ***\nBroken\n    Fail  boom\n",
    )
    .unwrap();

    let assert = robotkernel(dir.path())
        .args(["run", "broken.robot"])
        .assert()
        .failure();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    assert!(stdout.contains("[!] broken:1"));
}

#[test]
fn complete_uses_setup_cells() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lab.robot"), CELLS).unwrap();

    let assert = robotkernel(dir.path())
        .args(["complete", "coll", "--setup", "lab.robot"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    assert!(stdout.lines().any(|line| line == "Collections.Get From List"));
}

#[test]
fn inspect_prints_documentation() {
    let dir = tempfile::tempdir().unwrap();

    let assert = robotkernel(dir.path())
        .args(["--output", "json", "inspect", "Log To Console"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let reply: Value = serde_json::from_str(stdout.trim()).expect("json reply");
    assert_eq!(reply["found"], true);
    assert!(reply["data"]["text/markdown"].is_string());
}

#[test]
fn config_validate_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("bad.yaml"),
        "artifacts:\n  max_image_width: 0\n",
    )
    .unwrap();

    let bin = assert_cmd::cargo::cargo_bin!("robotkernel");
    Command::new(bin)
        .current_dir(dir.path())
        .args(["--config", "bad.yaml", "config", "validate"])
        .assert()
        .failure();

    robotkernel(dir.path())
        .args(["config", "validate"])
        .assert()
        .success();
}

#[test]
fn info_prints_build_metadata() {
    let dir = tempfile::tempdir().unwrap();

    let assert = robotkernel(dir.path()).arg("info").assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    assert!(stdout.contains("Git Commit:"));
    assert!(stdout.contains("- Collections ("));
}
