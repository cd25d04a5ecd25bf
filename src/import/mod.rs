//! Applying a [`RecordSet`] to a backend.

use std::fs;
use std::path::Path;

use serde_json::json;
use tracing::{debug, info};

use crate::backend::SecretBackend;
use crate::config::ErrorPolicy;
use crate::error::{MigratorError, Result};
use crate::record::{Record, RecordSet, RecordState};
use crate::template;

/// Read an import file, expand its `env` actions and parse the records.
pub fn read_file(path: &Path) -> Result<RecordSet> {
    let raw = fs::read(path)?;
    let text = String::from_utf8(raw).map_err(|_| {
        MigratorError::Format(format!("{} is not valid UTF-8", path.display()))
    })?;
    let expanded = template::expand(&text)?;
    RecordSet::parse(&expanded)
}

/// Counts from an import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub written: usize,
    pub deleted: usize,
    pub skipped: usize,
}

/// Applies records one by one, in file order, with no rollback.
pub struct Importer<'a, B: SecretBackend + ?Sized> {
    backend: &'a B,
    policy: ErrorPolicy,
}

impl<'a, B: SecretBackend + ?Sized> Importer<'a, B> {
    pub fn new(backend: &'a B, policy: ErrorPolicy) -> Self {
        Self { backend, policy }
    }

    /// Write or delete every record. Under [`ErrorPolicy::FailFast`] the
    /// first backend error aborts the run, leaving earlier records applied.
    pub fn import(&self, records: &RecordSet) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for record in records {
            match self.apply(record) {
                Ok(RecordState::Absent) => report.deleted += 1,
                Ok(RecordState::Present) => report.written += 1,
                Err(e) => {
                    self.policy.absorb(e)?;
                    report.skipped += 1;
                }
            }
        }

        info!(
            "{} secret(s) written, {} deleted, {} skipped.",
            report.written, report.deleted, report.skipped
        );
        Ok(report)
    }

    fn apply(&self, record: &Record) -> Result<RecordState> {
        match record.state {
            RecordState::Absent => {
                self.backend.delete(&record.key)?;
                debug!("Successfully deleted key '{}'", record.key);
            }
            RecordState::Present => {
                let payload = json!({ "data": record.values.clone().unwrap_or_default() });
                self.backend.write(&record.key, &payload)?;
                debug!("Successfully wrote data to key '{}'", record.key);
            }
        }
        Ok(record.state)
    }
}
