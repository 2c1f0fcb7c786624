//! CLI integration tests
//!
//! Drive the binary through failures that never reach the network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// The binary with a private, empty config directory and no inherited settings
fn adrunbook(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("adrunbook").unwrap();
    cmd.env_clear().arg("--config-dir").arg(config_dir.path());
    cmd
}

#[test]
fn test_help_lists_runbooks() {
    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create-user"))
        .stdout(predicate::str::contains("sync-directory"));
}

#[test]
fn test_empty_username_is_validation_error() {
    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .args(["unlock-user", "--username", ""])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Validation error"))
        .stderr(predicate::str::contains("username"));
}

#[test]
fn test_missing_create_user_fields_are_listed() {
    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .args(["create-user", "--username", "jdoe", "--password", "Passw0rd!"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("firstname"))
        .stderr(predicate::str::contains("lastname"));
}

#[test]
fn test_invalid_group_scope_is_validation_error() {
    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .args([
            "create-group",
            "--group-name",
            "Marketing",
            "--path",
            "OU=Groups,DC=corp,DC=example,DC=com",
            "--group-scope",
            "Worldwide",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Validation error"));
}

#[test]
fn test_unconfigured_domain_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .args(["unlock-user", "--username", "john"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_domain_controller_is_named() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("automation.toml"),
        r#"[variables]
DomainName = "corp.example.com"

[credentials.DomainCredentials]
username = "CORP\\svc-runbook"
password = "secret"
"#,
    )
    .unwrap();

    adrunbook(&dir)
        .args(["remove-user", "--username", "john"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("DomainController"));
}

#[test]
fn test_sync_without_server_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .arg("sync-azure-ad")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("SyncServerName"));
}

#[test]
fn test_config_set_then_show() {
    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .args(["config", "set", "DomainName", "corp.example.com"])
        .assert()
        .success();
    adrunbook(&dir)
        .args([
            "config",
            "set-credential",
            "DomainCredentials",
            "--username",
            "CORP\\svc-runbook",
            "--password",
            "hunter2",
        ])
        .assert()
        .success();

    assert!(dir.path().join("automation.toml").exists());

    adrunbook(&dir)
        .args(["config", "show", "--file-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("corp.example.com"))
        .stdout(predicate::str::contains("CORP\\svc-runbook"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_env_overrides_config_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".env"),
        "DOMAIN_NAME=corp.example.com\nDOMAIN_CONTROLLER=dc01.corp.example.com\n",
    )
    .unwrap();

    adrunbook(&dir)
        .env("ADRUNBOOK_DOMAIN_NAME", "override.example.com")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("override.example.com"))
        .stdout(predicate::str::contains("dc01.corp.example.com"));
}

#[test]
fn test_malformed_config_file_does_not_mask_validation() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("automation.toml"), "[variables\nbroken").unwrap();

    adrunbook(&dir)
        .args(["unlock-user", "--username", ""])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Validation error"));
}

#[test]
fn test_malformed_config_file_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("automation.toml"), "[variables\nbroken").unwrap();

    adrunbook(&dir)
        .args(["unlock-user", "--username", "john"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Configuration error"));
}

#[cfg(unix)]
#[test]
fn test_non_utf8_environment_is_ignored() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    adrunbook(&dir)
        .env("SOME_UNRELATED", OsStr::from_bytes(b"\xff\xfe"))
        .args(["unlock-user", "--username", ""])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Validation error"));

    adrunbook(&dir)
        .env("SOME_UNRELATED", OsStr::from_bytes(b"\xff\xfe"))
        .args(["unlock-user", "--username", "john"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}
