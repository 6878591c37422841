use assert_cmd::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const KEY_VAR: &str = "CASEFORGE_SMOKE_KEY";

fn caseforge() -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("caseforge");
    let mut cmd = Command::new(bin);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> String {
    let path = dir.join("caseforge.yaml");
    fs::write(&path, body).unwrap();
    path.to_str().unwrap().to_string()
}

fn compile_config(dir: &Path) -> String {
    write_config(
        dir,
        &format!(
            "llm:\n  endpoint: http://127.0.0.1:9\n  api_key_env: {KEY_VAR}\noutput:\n  dir: {}\n",
            dir.join("out").display()
        ),
    )
}

#[test]
fn config_validate_accepts_partial_file() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "login:\n  app_url: https://app.example.com/login\n  account: qa@example.com\n",
    );

    let assert = caseforge()
        .args(["--config", &config, "config", "validate"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("is valid"), "stdout: {stdout}");
}

#[test]
fn config_validate_rejects_unparseable_yaml() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "login: [unterminated\n");

    caseforge()
        .args(["--config", &config, "config", "validate"])
        .assert()
        .failure();
}

#[test]
fn config_validate_rejects_bad_selector() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "login:\n  dashboard_selector: \"aria:button\"\n");

    let assert = caseforge()
        .args(["--config", &config, "config", "validate"])
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("dashboard_selector"), "stderr: {stderr}");
}

#[test]
fn config_show_prints_effective_markers() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");

    let assert = caseforge()
        .args(["--config", missing.to_str().unwrap(), "config", "show"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("### TEST CASES:"), "stdout: {stdout}");
    assert!(stdout.contains("AZURE_OPENAI_KEY"), "stdout: {stdout}");
}

#[test]
fn compile_without_markers_fails_before_any_request() {
    let dir = tempdir().unwrap();
    let config = compile_config(dir.path());
    let doc = dir.path().join("doc.md");
    fs::write(&doc, "# Release notes\n\nNothing to test here.\n").unwrap();

    let assert = caseforge()
        .env(KEY_VAR, "dummy")
        .args([
            "--config",
            &config,
            "compile",
            "--input",
            doc.to_str().unwrap(),
        ])
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("test case section not found"), "stderr: {stderr}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn compile_requires_api_key_variable() {
    let dir = tempdir().unwrap();
    let config = compile_config(dir.path());
    let doc = dir.path().join("doc.md");
    fs::write(&doc, "### TEST CASES:\nsomething\n---\n").unwrap();

    let assert = caseforge()
        .env_remove(KEY_VAR)
        .args([
            "--config",
            &config,
            "compile",
            "--input",
            doc.to_str().unwrap(),
        ])
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains(KEY_VAR), "stderr: {stderr}");
}

#[test]
fn run_requires_login_settings() {
    let dir = tempdir().unwrap();
    let config = compile_config(dir.path());

    let assert = caseforge()
        .env(KEY_VAR, "dummy")
        .args(["--config", &config, "run"])
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("login.app_url"), "stderr: {stderr}");
}
