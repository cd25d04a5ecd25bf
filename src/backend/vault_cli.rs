use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{MigratorError, Result};
use crate::record::Values;

use super::{Op, SecretBackend};

/// Backend that drives the HashiCorp Vault CLI.
///
/// Address and token are handed to each `vault` invocation through
/// `VAULT_ADDR` / `VAULT_TOKEN`, so transport, TLS and retry settings are
/// whatever the installed client does with its usual environment.
#[derive(Debug)]
pub struct VaultCli {
    program: String,
    address: String,
    token: SecretString,
}

impl VaultCli {
    /// Create a client for `address`, verifying the `vault` binary runs.
    pub fn connect(address: &str, token: SecretString) -> Result<Self> {
        Self::with_program("vault", address, token)
    }

    pub fn with_program(program: &str, address: &str, token: SecretString) -> Result<Self> {
        let client = Self {
            program: program.to_string(),
            address: address.to_string(),
            token,
        };
        client.check_installed()?;
        Ok(client)
    }

    fn check_installed(&self) -> Result<()> {
        match self.command().arg("version").output() {
            Ok(output) if output.status.success() => Ok(()),
            _ => Err(MigratorError::Config(format!(
                "HashiCorp Vault CLI '{}' not found. \
                 Install from https://www.vaultproject.io/downloads",
                self.program
            ))),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("VAULT_ADDR", &self.address)
            .env("VAULT_TOKEN", self.token.expose_secret());
        cmd
    }

    /// Run one `vault` subcommand. Returns `Ok(None)` when Vault reports
    /// that nothing exists at `path`.
    fn run(
        &self,
        op: Op,
        path: &str,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>> {
        let mut cmd = self.command();
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            let message = format!("failed to run `{}`: {}", self.program, e);
            MigratorError::backend(op, path, message)
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A client that exits early closes the pipe; its status and
            // stderr below say why.
            match pipe.write_all(input) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(MigratorError::backend(
                        op,
                        path,
                        format!("failed to send payload: {}", e),
                    ));
                }
                _ => {}
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            let message = format!("failed to wait for `{}`: {}", self.program, e);
            MigratorError::backend(op, path, message)
        })?;

        if output.status.success() {
            return Ok(Some(output.stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(output.status.code(), &stderr) {
            debug!("Vault reports no value at '{}'", path);
            return Ok(None);
        }

        Err(MigratorError::backend(op, path, describe_failure(&stderr)))
    }
}

impl SecretBackend for VaultCli {
    fn read(&self, path: &str) -> Result<Option<Values>> {
        match self.run(Op::Read, path, &["read", "-format=json", path], None)? {
            Some(stdout) => parse_read_output(&stdout)
                .map(Some)
                .map_err(|msg| MigratorError::backend(Op::Read, path, msg)),
            None => Ok(None),
        }
    }

    fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        match self.run(Op::List, path, &["list", "-format=json", path], None)? {
            Some(stdout) => parse_list_output(&stdout)
                .map(Some)
                .map_err(|msg| MigratorError::backend(Op::List, path, msg)),
            None => Ok(None),
        }
    }

    fn write(&self, path: &str, payload: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| MigratorError::backend(Op::Write, path, e.to_string()))?;
        // A trailing `-` makes `vault write` read the JSON body from stdin.
        self.run(Op::Write, path, &["write", path, "-"], Some(&body))?
            .ok_or_else(|| MigratorError::backend(Op::Write, path, "no such path"))?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.run(Op::Delete, path, &["delete", path], None)?
            .ok_or_else(|| MigratorError::backend(Op::Delete, path, "no such path"))?;
        Ok(())
    }
}

/// `vault read` / `vault list` exit with status 2 and this message when the
/// path holds nothing.
fn is_not_found(code: Option<i32>, stderr: &str) -> bool {
    code == Some(2) && stderr.contains("No value found at")
}

fn describe_failure(stderr: &str) -> String {
    if stderr.contains("permission denied") || stderr.contains("missing client token") {
        return format!(
            "permission denied (check --vault-token / VAULT_TOKEN): {}",
            stderr.trim()
        );
    }
    stderr.trim().to_string()
}

/// Extract the secret data from `vault read -format=json` output.
fn parse_read_output(stdout: &[u8]) -> std::result::Result<Values, String> {
    let response: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| format!("failed to parse vault output: {}", e))?;

    match response.get("data") {
        Some(serde_json::Value::Object(map)) => Ok(map.clone()),
        Some(serde_json::Value::Null) | None => Ok(Values::new()),
        Some(other) => Err(format!("unexpected data field in vault output: {}", other)),
    }
}

/// Extract child names from `vault list -format=json` output, which is
/// either a bare array or an object carrying a `keys` array.
fn parse_list_output(stdout: &[u8]) -> std::result::Result<Vec<String>, String> {
    let response: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| format!("failed to parse vault output: {}", e))?;

    let keys = match &response {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(obj) => match obj.get("keys") {
            Some(serde_json::Value::Array(items)) => items,
            Some(serde_json::Value::Null) | None => return Ok(Vec::new()),
            Some(other) => return Err(format!("unexpected keys field in vault output: {}", other)),
        },
        serde_json::Value::Null => return Ok(Vec::new()),
        other => return Err(format!("unexpected vault list output: {}", other)),
    };

    keys.iter()
        .map(|k| {
            k.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("non-string key in vault list output: {}", k))
        })
        .collect()
}
