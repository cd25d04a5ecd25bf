//! Recursive export of backend subtrees into a [`RecordSet`].

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::backend::SecretBackend;
use crate::config::ErrorPolicy;
use crate::error::{MigratorError, Result};
use crate::record::{Record, RecordSet};

const SEPARATOR: char = '/';

/// Outcome of an export walk.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub records: RecordSet,
    /// Leaves or directories skipped under [`ErrorPolicy::Skip`].
    pub skipped: usize,
}

/// Walks backend path prefixes depth-first, reading every leaf.
pub struct Exporter<'a, B: SecretBackend + ?Sized> {
    backend: &'a B,
    policy: ErrorPolicy,
}

impl<'a, B: SecretBackend + ?Sized> Exporter<'a, B> {
    pub fn new(backend: &'a B, policy: ErrorPolicy) -> Self {
        Self { backend, policy }
    }

    /// Export every leaf below each root, roots in the given order and each
    /// subtree in the order the backend lists it.
    pub fn export<S: AsRef<str>>(&self, roots: &[S]) -> Result<ExportReport> {
        let mut walk = Walk::default();

        for root in roots {
            let path = normalize_root(root.as_ref());
            debug!("Exporting subtree '{}'", path);
            self.visit(&path, &mut walk)?;
        }

        info!(
            "{} secret(s) exported, {} skipped.",
            walk.report.records.len(),
            walk.report.skipped
        );
        Ok(walk.report)
    }

    fn visit(&self, path: &str, walk: &mut Walk) -> Result<()> {
        if path.ends_with(SEPARATOR) {
            self.visit_directory(path, walk)
        } else {
            self.visit_leaf(path, walk)
        }
    }

    fn visit_directory(&self, path: &str, walk: &mut Walk) -> Result<()> {
        let children = match self.backend.list(path) {
            Ok(children) => children.unwrap_or_default(),
            Err(e) => return walk.skip(self.policy, e),
        };

        for child in children {
            self.visit(&format!("{}{}", path, child), walk)?;
        }
        Ok(())
    }

    fn visit_leaf(&self, path: &str, walk: &mut Walk) -> Result<()> {
        if walk.seen.contains(path) {
            debug!("Skipping '{}', already exported", path);
            return Ok(());
        }

        let values = match self.backend.read(path) {
            Ok(Some(values)) => values,
            Ok(None) => {
                let err = MigratorError::SecretNotFound(path.to_string());
                return walk.skip(self.policy, err);
            }
            Err(e) => return walk.skip(self.policy, e),
        };

        walk.seen.insert(path.to_string());
        walk.report.records.push(Record::present(path, values));
        debug!("Successfully read data from key '{}'", path);
        Ok(())
    }
}

#[derive(Default)]
struct Walk {
    report: ExportReport,
    seen: HashSet<String>,
}

impl Walk {
    fn skip(&mut self, policy: ErrorPolicy, err: MigratorError) -> Result<()> {
        policy.absorb(err)?;
        self.report.skipped += 1;
        Ok(())
    }
}

/// Serialize `records` into a new file, readable by the owner only.
/// Fails if the file already exists.
pub fn write_file(path: &Path, records: &RecordSet) -> Result<()> {
    let data = records.to_yaml()?;

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data.as_bytes())?;
    Ok(())
}

/// Strip one leading separator and make sure the root is listed, not read.
pub fn normalize_root(root: &str) -> String {
    let path = root.strip_prefix(SEPARATOR).unwrap_or(root);
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{}{}", path, SEPARATOR)
    }
}
