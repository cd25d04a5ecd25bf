pub mod memory;
pub mod vault_cli;

use std::fmt;

use crate::error::Result;
use crate::record::Values;

pub use memory::MemoryBackend;
pub use vault_cli::VaultCli;

/// Backend operation, used to label errors and injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    List,
    Write,
    Delete,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Read => "read",
            Op::List => "list",
            Op::Write => "write",
            Op::Delete => "delete",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hierarchical secret store addressed by `/`-separated paths.
///
/// Paths ending in `/` are directory nodes and are listed; all other paths
/// are leaves and are read. Every call is a blocking round trip.
pub trait SecretBackend {
    /// Read the data stored at a leaf. `Ok(None)` means nothing is stored there.
    fn read(&self, path: &str) -> Result<Option<Values>>;

    /// List the children of a directory node. Child names that are
    /// themselves directories end in `/`. `Ok(None)` means no children.
    fn list(&self, path: &str) -> Result<Option<Vec<String>>>;

    /// Write a raw payload to a path.
    fn write(&self, path: &str, payload: &serde_json::Value) -> Result<()>;

    /// Delete the data stored at a path.
    fn delete(&self, path: &str) -> Result<()>;
}
