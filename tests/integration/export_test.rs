use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;
use vault_migrator::record::RecordSet;

use super::{install_fake_vault, migrator_cmd_with_vault, vault_log};

/// A tree holding `secret/a` and `secret/b/c`.
const TREE_VAULT: &str = r#"case "$1 $3" in
  "list secret/") echo '["a","b/"]' ;;
  "list secret/b/") echo '["c"]' ;;
  "read secret/a") echo '{"request_id":"r1","data":{"user":"admin"}}' ;;
  "read secret/b/c") echo '{"request_id":"r2","data":{"token":"t0k3n","ttl":30}}' ;;
  *) echo "No value found at $3" >&2; exit 2 ;;
esac
"#;

/// Same tree, but reading `secret/a` is denied.
const DENIED_LEAF_VAULT: &str = r#"case "$1 $3" in
  "list secret/") echo '["a","b/"]' ;;
  "list secret/b/") echo '["c"]' ;;
  "read secret/a") echo "Error reading secret/a: permission denied" >&2; exit 2 ;;
  "read secret/b/c") echo '{"data":{"token":"t0k3n"}}' ;;
  *) echo "No value found at $3" >&2; exit 2 ;;
esac
"#;

fn exported_keys(home: &TempDir) -> Vec<String> {
    let text = fs::read_to_string(home.path().join("vault.yaml")).unwrap();
    RecordSet::parse(&text)
        .unwrap()
        .iter()
        .map(|r| r.key.clone())
        .collect()
}

#[test]
#[serial]
fn test_export_tree() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, TREE_VAULT);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--export", "--vault-token", "t"])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 secret(s) exported"));

    assert_eq!(exported_keys(&home), vec!["secret/a", "secret/b/c"]);

    let text = fs::read_to_string(home.path().join("vault.yaml")).unwrap();
    assert!(text.contains("token: t0k3n"));
    assert!(!text.contains("request_id"));

    let log = vault_log(&bin);
    assert!(log.contains("ARGS list -format=json secret/"));
    assert!(log.contains("ARGS read -format=json secret/b/c"));
}

#[test]
#[serial]
fn test_export_selected_path() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, TREE_VAULT);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--export", "--export-paths", "/secret/b", "--vault-token", "t"])
        .assert()
        .success();

    assert_eq!(exported_keys(&home), vec!["secret/b/c"]);
}

#[test]
#[serial]
fn test_export_unknown_root_writes_empty_set() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, TREE_VAULT);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--export", "--export-paths", "kv", "--vault-token", "t"])
        .assert()
        .success();

    assert!(exported_keys(&home).is_empty());
}

#[test]
#[serial]
fn test_export_read_failure_writes_nothing() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, DENIED_LEAF_VAULT);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--export", "--vault-token", "t"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("permission denied"));

    assert!(!home.path().join("vault.yaml").exists());
}

#[test]
#[serial]
fn test_export_read_failure_ignored() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, DENIED_LEAF_VAULT);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--export", "--ignore-errors", "--vault-token", "t"])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 skipped"));

    assert_eq!(exported_keys(&home), vec!["secret/b/c"]);
}

#[test]
#[serial]
fn test_export_verbose_logs_each_read() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, TREE_VAULT);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--export", "-v", "--vault-token", "t"])
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"))
        .stderr(predicate::str::contains(
            "Successfully read data from key 'secret/a'",
        ));
}

#[test]
#[serial]
fn test_export_quiet_by_default() {
    let home = TempDir::new().unwrap();
    let bin = install_fake_vault(&home, TREE_VAULT);

    migrator_cmd_with_vault(&home, &bin)
        .args(["--export", "--vault-token", "t"])
        .assert()
        .success()
        .stderr(predicate::str::contains("INFO"))
        .stderr(predicate::str::contains("DEBUG").not())
        .stderr(predicate::str::contains("Successfully read data").not());
}
