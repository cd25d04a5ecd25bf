use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::warn;

use crate::error::{MigratorError, Result};

pub const DEFAULT_FILE: &str = "vault.yaml";
pub const DEFAULT_EXPORT_PATH: &str = "secret";
pub const DEFAULT_VAULT_ADDR: &str = "https://127.0.0.1:8200";
const TOKEN_FILE: &str = ".vault-token";

/// Direction of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Import,
    Export,
}

/// What to do when a backend call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort on the first backend error.
    #[default]
    FailFast,
    /// Log backend errors and skip the affected record or subtree.
    Skip,
}

impl ErrorPolicy {
    pub fn from_ignore_errors(ignore_errors: bool) -> Self {
        if ignore_errors {
            ErrorPolicy::Skip
        } else {
            ErrorPolicy::FailFast
        }
    }

    /// Returns `Ok(())` when the caller should carry on past `err`.
    /// Non-backend errors are never skipped.
    pub fn absorb(&self, err: MigratorError) -> Result<()> {
        if *self == ErrorPolicy::Skip && err.is_backend() {
            warn!("{}", err);
            return Ok(());
        }
        Err(err)
    }
}

/// Unvalidated startup options, as collected from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub file: String,
    pub import: bool,
    pub export: bool,
    pub export_paths: Vec<String>,
    pub ignore_errors: bool,
    pub vault_addr: String,
    pub vault_token: Option<String>,
    pub verbose: bool,
}

/// Validated, immutable settings for one run.
#[derive(Debug)]
pub struct Settings {
    pub file: PathBuf,
    pub mode: Mode,
    pub export_paths: Vec<String>,
    pub error_policy: ErrorPolicy,
    pub vault_addr: String,
    pub vault_token: SecretString,
    pub verbose: bool,
}

impl Settings {
    /// Validate `opts`, falling back to the token file under `home` when no
    /// token was given. Nothing here talks to the backend.
    pub fn resolve(opts: Options, home: Option<&Path>) -> Result<Self> {
        let token = opts
            .vault_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| home.and_then(token_from_disk))
            .ok_or_else(|| MigratorError::Config("You need to set vault-token".into()))?;

        if opts.file.is_empty() {
            return Err(MigratorError::Config("You need to specify a file".into()));
        }

        let mode = match (opts.import, opts.export) {
            (true, false) => Mode::Import,
            (false, true) => Mode::Export,
            _ => {
                return Err(MigratorError::Config(
                    "You need to either import or export".into(),
                ))
            }
        };

        let file = PathBuf::from(&opts.file);
        match mode {
            Mode::Export if file.exists() => {
                return Err(MigratorError::Config(format!(
                    "Output file {} exists, stopping now.",
                    file.display()
                )));
            }
            Mode::Import if !file.exists() => {
                return Err(MigratorError::Config(format!(
                    "Input file {} does not exist, stopping now.",
                    file.display()
                )));
            }
            _ => {}
        }

        if mode == Mode::Export {
            if opts.export_paths.is_empty() {
                return Err(MigratorError::Config(
                    "You need to specify at least one export path".into(),
                ));
            }
            if let Some(bad) = opts
                .export_paths
                .iter()
                .find(|p| p.trim_matches('/').is_empty())
            {
                return Err(MigratorError::Config(format!(
                    "Invalid export path '{}'",
                    bad
                )));
            }
        }

        Ok(Self {
            file,
            mode,
            export_paths: opts.export_paths,
            error_policy: ErrorPolicy::from_ignore_errors(opts.ignore_errors),
            vault_addr: opts.vault_addr,
            vault_token: SecretString::new(token),
            verbose: opts.verbose,
        })
    }
}

/// Read the token `vault login` leaves in `~/.vault-token`.
pub fn token_from_disk(home: &Path) -> Option<String> {
    let data = fs::read_to_string(home.join(TOKEN_FILE)).ok()?;
    let token = data.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
