use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

use super::migrator_cmd;

#[test]
#[serial]
fn test_version() {
    let home = TempDir::new().unwrap();
    migrator_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("vault-migrator "));
}

#[test]
#[serial]
fn test_help_lists_flags() {
    let home = TempDir::new().unwrap();
    migrator_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--export-paths"))
        .stdout(predicate::str::contains("--ignore-errors"));
}

#[test]
#[serial]
fn test_missing_token() {
    let home = TempDir::new().unwrap();
    let output = migrator_cmd(&home).arg("--export").output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("You need to set vault-token"));
}

#[test]
#[serial]
fn test_token_read_from_home() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join(".vault-token"), "s.disk\n").unwrap();

    // Gets past the token check and stops at the mode check.
    migrator_cmd(&home)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("either import or export"));
}

#[test]
#[serial]
fn test_token_from_env() {
    let home = TempDir::new().unwrap();
    migrator_cmd(&home)
        .env("VAULT_TOKEN", "s.env")
        .assert()
        .failure()
        .stderr(predicate::str::contains("either import or export"));
}

#[test]
#[serial]
fn test_import_and_export_are_exclusive() {
    let home = TempDir::new().unwrap();
    migrator_cmd(&home)
        .args(["--vault-token", "t", "--import", "--export"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("either import or export"));
}

#[test]
#[serial]
fn test_export_refuses_existing_file() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("vault.yaml"), "keys: []\n").unwrap();

    migrator_cmd(&home)
        .args(["--vault-token", "t", "--export"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("exists, stopping now"));

    assert_eq!(
        fs::read_to_string(home.path().join("vault.yaml")).unwrap(),
        "keys: []\n"
    );
}

#[test]
#[serial]
fn test_import_requires_file() {
    let home = TempDir::new().unwrap();
    migrator_cmd(&home)
        .args(["--vault-token", "t", "--import", "-f", "missing.yaml"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
#[serial]
fn test_empty_export_path_rejected() {
    let home = TempDir::new().unwrap();
    migrator_cmd(&home)
        .args(["--vault-token", "t", "--export", "--export-paths", "secret,/"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Invalid export path"));

    assert!(!home.path().join("vault.yaml").exists());
}
