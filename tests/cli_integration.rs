//! Integration tests for the DocVault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Passwords are supplied through `DOCVAULT_PASSWORD` /
//! `DOCVAULT_NEW_PASSWORD` so nothing prompts.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Helper: get a Command pointing at the docvault binary, running in `dir`
/// with `password` in the environment.
fn docvault(dir: &TempDir, password: &str) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("docvault").expect("binary should exist");
    cmd.current_dir(dir.path())
        .env("DOCVAULT_PASSWORD", password)
        .env_remove("DOCVAULT_NEW_PASSWORD")
        .env_remove("DOCVAULT_LOG")
        .write_stdin("");
    cmd
}

/// A temp dir holding an initialized vault with one secret.
fn seeded() -> TempDir {
    let tmp = TempDir::new().unwrap();
    docvault(&tmp, "correct-horse").arg("init").assert().success();
    docvault(&tmp, "correct-horse")
        .args(["add", "github", "tok_abc123", "--username", "octocat"])
        .assert()
        .success();
    tmp
}

#[test]
fn help_flag_shows_usage() {
    #[allow(deprecated)]
    Command::cargo_bin("docvault")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Passphrase-protected secret vault"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("change-password"))
        .stdout(predicate::str::contains("shell"));
}

#[test]
fn no_args_shows_help() {
    #[allow(deprecated)]
    Command::cargo_bin("docvault")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn init_writes_document_in_default_location() {
    let tmp = TempDir::new().unwrap();
    docvault(&tmp, "correct-horse")
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Vault created"));

    let doc = tmp.child(".docvault/vault.json");
    doc.assert(predicate::path::exists());
    doc.assert(predicate::str::contains("secrets-verification"));
    doc.assert(predicate::str::contains("\"3.0\""));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let tmp = seeded();
    docvault(&tmp, "another-horse")
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    docvault(&tmp, "another-horse")
        .args(["init", "--force"])
        .assert()
        .success();
    docvault(&tmp, "another-horse")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 secret(s)"));
}

#[test]
fn init_rejects_short_password() {
    let tmp = TempDir::new().unwrap();
    docvault(&tmp, "short")
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 8"));
}

#[test]
fn add_then_get() {
    let tmp = seeded();
    docvault(&tmp, "correct-horse")
        .args(["get", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tok_abc123"));
    docvault(&tmp, "correct-horse")
        .args(["get", "github", "--field", "username"])
        .assert()
        .success()
        .stdout(predicate::str::contains("octocat"));

    let raw = std::fs::read_to_string(tmp.child(".docvault/vault.json").path()).unwrap();
    assert!(!raw.contains("tok_abc123"));
}

#[test]
fn piped_value_is_read_from_stdin() {
    let tmp = seeded();
    docvault(&tmp, "correct-horse")
        .args(["add", "aws"])
        .write_stdin("AKIA-from-stdin\n")
        .assert()
        .success();
    docvault(&tmp, "correct-horse")
        .args(["get", "aws"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AKIA-from-stdin"));
}

#[test]
fn wrong_password_is_reported() {
    let tmp = seeded();
    docvault(&tmp, "wrong-horse")
        .args(["get", "github"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid password"))
        .stdout(predicate::str::contains("tok_abc123").not());
}

#[test]
fn list_needs_no_password() {
    let tmp = seeded();
    docvault(&tmp, "")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("github"));
}

#[test]
fn update_and_delete() {
    let tmp = seeded();
    docvault(&tmp, "correct-horse")
        .args(["update", "github", "tok_new"])
        .assert()
        .success();
    docvault(&tmp, "correct-horse")
        .args(["get", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tok_new"));

    docvault(&tmp, "correct-horse")
        .args(["delete", "github", "--force"])
        .assert()
        .success();
    docvault(&tmp, "correct-horse")
        .args(["get", "github"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn duplicate_add_fails() {
    let tmp = seeded();
    docvault(&tmp, "correct-horse")
        .args(["add", "github", "again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn change_password_rekeys() {
    let tmp = seeded();
    docvault(&tmp, "correct-horse")
        .arg("change-password")
        .env("DOCVAULT_NEW_PASSWORD", "new-pass-1")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 secret(s) re-encrypted"));

    docvault(&tmp, "correct-horse")
        .args(["get", "github"])
        .assert()
        .failure();
    docvault(&tmp, "new-pass-1")
        .args(["get", "github"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tok_abc123"));
}

#[test]
fn status_reports_format() {
    let tmp = TempDir::new().unwrap();
    docvault(&tmp, "")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No vault"));

    let tmp = seeded();
    docvault(&tmp, "")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"format:\s+3\.0").unwrap())
        .stdout(predicate::str::is_match(r"secrets:\s+1").unwrap());
}

#[test]
fn file_flag_selects_document() {
    let tmp = TempDir::new().unwrap();
    docvault(&tmp, "correct-horse")
        .args(["--file", "team.json", "init"])
        .assert()
        .success();
    tmp.child("team.json").assert(predicate::path::exists());
    tmp.child(".docvault/vault.json")
        .assert(predicate::path::missing());
}

#[test]
fn timed_get_still_prints_value() {
    let tmp = seeded();
    tmp.child(".docvault.toml")
        .write_str("auto_hide_seconds = 1\n")
        .unwrap();
    docvault(&tmp, "correct-horse")
        .args(["get", "github", "--timed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tok_abc123"))
        .stdout(predicate::str::contains("hidden after 1s"));
}

#[test]
fn bad_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".docvault.toml")
        .write_str("kdf_iterations = 10\n")
        .unwrap();
    docvault(&tmp, "correct-horse")
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("kdf_iterations"));
}

#[test]
fn shell_keeps_session_across_lines() {
    let tmp = seeded();
    docvault(&tmp, "")
        .arg("shell")
        .write_stdin("get github\nunlock correct-horse\nget github\nadd aws AKIA 123\nexit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("locked"))
        .stdout(predicate::str::contains("tok_abc123"));

    docvault(&tmp, "correct-horse")
        .args(["get", "aws"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AKIA 123"));
}

#[test]
fn shell_enforces_lockout() {
    let tmp = seeded();
    let script = "unlock bad-pass-1\n".repeat(5) + "unlock correct-horse\nexit\n";
    docvault(&tmp, "")
        .arg("shell")
        .write_stdin(script)
        .assert()
        .success()
        .stderr(predicate::str::contains("Too many attempts"));
}
