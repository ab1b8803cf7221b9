//! End-to-end tests for the `sleuth` binary.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn sleuth() -> Command {
    let mut cmd = Command::cargo_bin("sleuth").unwrap();
    for var in [
        "OPENAI_API_KEY",
        "SLEUTH_API_KEY",
        "TAVILY_API_KEY",
        "SLEUTH_MODEL",
        "SLEUTH_PROMPT_DIR",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_lists_commands() {
    sleuth()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("init-prompts"));
}

#[test]
fn version_flag() {
    sleuth()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn ask_without_api_key_fails() {
    sleuth()
        .args(["ask", "What is new in Rust?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn ask_without_search_key_fails() {
    sleuth()
        .env("OPENAI_API_KEY", "sk-test")
        .args(["ask", "What is new in Rust?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TAVILY_API_KEY"));
}

#[test]
fn ask_rejects_blank_message() {
    sleuth()
        .args(["ask", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty"));
}

#[test]
fn ask_requires_message() {
    sleuth().arg("ask").assert().failure();
}

#[test]
fn init_prompts_writes_templates() {
    let dir = tempfile::tempdir().unwrap();

    sleuth()
        .args(["init-prompts", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 5 prompt template(s)"));

    assert!(dir.path().join("system.md").exists());
    assert!(dir.path().join("synthesis.md").exists());

    sleuth()
        .args(["--format", "json", "init-prompts", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 0"));
}
