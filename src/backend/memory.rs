use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use crate::error::{MigratorError, Result};
use crate::record::Values;

use super::{Op, SecretBackend};

/// A backend call, as recorded by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Read(String),
    List(String),
    Write(String, serde_json::Value),
    Delete(String),
}

/// In-memory secret tree.
///
/// Listings are derived from the stored leaf paths in sorted order. Writes
/// store the payload object verbatim; deleting a missing path succeeds.
/// Failures can be injected per operation and path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    secrets: RefCell<BTreeMap<String, Values>>,
    failures: RefCell<HashSet<(Op, String)>>,
    calls: RefCell<Vec<Call>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryBackend::insert`].
    pub fn with_secret(self, path: &str, values: Values) -> Self {
        self.insert(path, values);
        self
    }

    pub fn insert(&self, path: &str, values: Values) {
        self.secrets.borrow_mut().insert(path.to_string(), values);
    }

    pub fn get(&self, path: &str) -> Option<Values> {
        self.secrets.borrow().get(path).cloned()
    }

    /// Make every `op` on `path` fail with a backend error.
    pub fn fail_on(&self, op: Op, path: &str) {
        self.failures.borrow_mut().insert((op, path.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, op: Op, path: &str, call: Call) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.failures.borrow().contains(&(op, path.to_string())) {
            return Err(MigratorError::backend(op, path, "injected failure"));
        }
        Ok(())
    }
}

impl SecretBackend for MemoryBackend {
    fn read(&self, path: &str) -> Result<Option<Values>> {
        self.record(Op::Read, path, Call::Read(path.to_string()))?;
        Ok(self.get(path))
    }

    fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        self.record(Op::List, path, Call::List(path.to_string()))?;

        let mut children: Vec<String> = Vec::new();
        for key in self.secrets.borrow().keys() {
            let Some(rest) = key.strip_prefix(path) else {
                continue;
            };
            let child = match rest.find('/') {
                Some(idx) => &rest[..=idx],
                None => rest,
            };
            if !child.is_empty() && !children.iter().any(|c| c == child) {
                children.push(child.to_string());
            }
        }

        if children.is_empty() {
            Ok(None)
        } else {
            Ok(Some(children))
        }
    }

    fn write(&self, path: &str, payload: &serde_json::Value) -> Result<()> {
        self.record(Op::Write, path, Call::Write(path.to_string(), payload.clone()))?;
        match payload {
            serde_json::Value::Object(map) => {
                self.insert(path, map.clone());
                Ok(())
            }
            other => Err(MigratorError::backend(
                Op::Write,
                path,
                format!("payload must be an object, got {}", other),
            )),
        }
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.record(Op::Delete, path, Call::Delete(path.to_string()))?;
        self.secrets.borrow_mut().remove(path);
        Ok(())
    }
}
