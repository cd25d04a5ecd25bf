use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

use super::{install_fake_vault, migrator_cmd_with_vault, vault_log};

/// Logs the payload and Vault environment of every call, then succeeds.
const RECORDING_VAULT: &str = r#"if [ "$1" = "write" ]; then
  printf 'BODY ' >> "$LOG"
  cat >> "$LOG"
  echo >> "$LOG"
fi
echo "ENV $VAULT_ADDR $VAULT_TOKEN" >> "$LOG"
"#;

#[test]
#[serial]
fn test_import_writes_and_deletes() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, RECORDING_VAULT);
    fs::write(
        home.path().join("vault.yaml"),
        "keys:\n  - key: secret/x\n    values:\n      k: v\n  - key: secret/y\n    state: absent\n",
    )
    .unwrap();

    migrator_cmd_with_vault(&home, &bin)
        .args([
            "--import",
            "--vault-token",
            "s.import",
            "--vault-addr",
            "http://vault.test:8200",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 secret(s) written, 1 deleted, 0 skipped."));

    let log = vault_log(&bin);
    assert!(log.contains("ARGS write secret/x -"), "{}", log);
    assert!(log.contains(r#"BODY {"data":{"k":"v"}}"#), "{}", log);
    assert!(log.contains("ARGS delete secret/y"), "{}", log);
    assert!(log.contains("ENV http://vault.test:8200 s.import"), "{}", log);
    assert_eq!(log.matches("ARGS ").count(), 2);
}

#[test]
#[serial]
fn test_import_expands_env_template() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, RECORDING_VAULT);
    fs::write(
        home.path().join("secrets.yaml"),
        "keys:\n  - key: secret/db\n    values:\n      \
         password: {{ env \"DB_PASS\" }}\n      \
         user: {{ env \"DB_USER\" \"admin\" }}\n",
    )
    .unwrap();

    migrator_cmd_with_vault(&home, &bin)
        .env("DB_PASS", "s3cret")
        .env_remove("DB_USER")
        .args(["--import", "-f", "secrets.yaml", "--vault-token", "t"])
        .assert()
        .success();

    let log = vault_log(&bin);
    assert!(
        log.contains(r#"BODY {"data":{"password":"s3cret","user":"admin"}}"#),
        "{}",
        log
    );
}

#[test]
#[serial]
fn test_import_template_error_before_backend() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, RECORDING_VAULT);
    fs::write(home.path().join("vault.yaml"), "keys: {{ unknown \"X\" }}\n").unwrap();

    migrator_cmd_with_vault(&home, &bin)
        .args(["--import", "--vault-token", "t"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Template error"));

    assert!(vault_log(&bin).is_empty());
}

#[test]
#[serial]
fn test_import_format_error_before_backend() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, RECORDING_VAULT);
    fs::write(home.path().join("vault.yaml"), "secrets:\n  - key: a\n").unwrap();

    migrator_cmd_with_vault(&home, &bin)
        .args(["--import", "--vault-token", "t"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Format error"));

    assert!(vault_log(&bin).is_empty());
}

const FAILING_WRITE_VAULT: &str = r#"if [ "$2" = "secret/a" ]; then
  echo "Error writing data to secret/a: Code: 500" >&2
  exit 1
fi
cat > /dev/null
"#;

fn write_three_records(home: &TempDir) {
    fs::write(
        home.path().join("vault.yaml"),
        "keys:\n  - key: secret/a\n    values: {k: 1}\n  - key: secret/b\n    values: {k: 2}\n",
    )
    .unwrap();
}

#[test]
#[serial]
fn test_import_write_failure_aborts() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, FAILING_WRITE_VAULT);
    write_three_records(&home);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--import", "--vault-token", "t"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("secret/a"));

    assert!(!vault_log(&bin).contains("secret/b"));
}

#[test]
#[serial]
fn test_import_write_failure_ignored() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, FAILING_WRITE_VAULT);
    write_three_records(&home);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--import", "--ignore-errors", "--vault-token", "t"])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 secret(s) written, 0 deleted, 1 skipped."));

    assert!(vault_log(&bin).contains("ARGS write secret/b -"));
}
