//! The file format exchanged by import and export.
//!
//! A file holds a single top-level `keys` list; each entry names a backend
//! path, an optional desired state, and the secret's field values:
//!
//! ```yaml
//! keys:
//!   - key: secret/app/db
//!     values:
//!       password: hunter2
//!   - key: secret/app/legacy
//!     state: absent
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, Result};

/// Field name to value mapping stored at one backend path.
pub type Values = serde_json::Map<String, serde_json::Value>;

/// Desired state of a record on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "Option<String>")]
pub enum RecordState {
    #[default]
    Present,
    Absent,
}

impl RecordState {
    pub fn is_present(&self) -> bool {
        *self == RecordState::Present
    }
}

impl TryFrom<Option<String>> for RecordState {
    type Error = String;

    fn try_from(raw: Option<String>) -> std::result::Result<Self, Self::Error> {
        match raw.as_deref() {
            None | Some("") | Some("present") => Ok(RecordState::Present),
            Some("absent") => Ok(RecordState::Absent),
            Some(other) => Err(format!(
                "unknown state '{}', expected 'present' or 'absent'",
                other
            )),
        }
    }
}

/// One secret entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    pub key: String,
    #[serde(default, skip_serializing_if = "RecordState::is_present")]
    pub state: RecordState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Values>,
}

impl Record {
    pub fn present(key: impl Into<String>, values: Values) -> Self {
        Self {
            key: key.into(),
            state: RecordState::Present,
            values: Some(values),
        }
    }

    pub fn absent(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: RecordState::Absent,
            values: None,
        }
    }
}

/// Ordered list of records, in discovery or declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSet {
    pub keys: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.keys.push(record);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.keys.iter()
    }

    /// Parse an (already preprocessed) import file.
    pub fn parse(text: &str) -> Result<Self> {
        let set: RecordSet =
            serde_yaml::from_str(text).map_err(|e| MigratorError::Format(e.to_string()))?;

        for (idx, record) in set.keys.iter().enumerate() {
            if record.key.is_empty() {
                return Err(MigratorError::Format(format!(
                    "keys[{}]: key must not be empty",
                    idx
                )));
            }
            if record.state.is_present() && record.values.is_none() {
                return Err(MigratorError::Format(format!(
                    "keys[{}] ('{}'): values are required unless state is absent",
                    idx, record.key
                )));
            }
        }

        Ok(set)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| MigratorError::Format(e.to_string()))
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(keys: Vec<Record>) -> Self {
        Self { keys }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}
