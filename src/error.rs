use thiserror::Error;

use crate::backend::Op;

#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Unable to read {0}: no secret found")]
    SecretNotFound(String),

    #[error("Error during {op} of '{path}': {message}")]
    Backend {
        op: Op,
        path: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigratorError {
    pub fn backend(op: Op, path: &str, message: impl Into<String>) -> Self {
        MigratorError::Backend {
            op,
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Whether `--ignore-errors` may skip this error instead of aborting.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            MigratorError::SecretNotFound(_) | MigratorError::Backend { .. }
        )
    }

    /// Return a typed exit code for this error category.
    pub fn exit_code(&self) -> i32 {
        match self {
            MigratorError::Config(_) => 2,
            MigratorError::Template(_) => 3,
            MigratorError::Format(_) => 3,
            MigratorError::SecretNotFound(_) => 4,
            MigratorError::Backend { .. } => 4,
            MigratorError::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, MigratorError>;
