//! vault-migrator: move HashiCorp Vault secrets to and from a YAML file.
//!
//! Export walks backend path prefixes depth-first and collects every leaf
//! into a [`record::RecordSet`]; import applies a record set to the backend
//! as writes and deletes. Both run sequentially, either aborting on the first
//! backend error or skipping it, per [`config::ErrorPolicy`].
//!
//! # Quick start
//!
//! ```
//! use vault_migrator::backend::MemoryBackend;
//! use vault_migrator::config::ErrorPolicy;
//! use vault_migrator::export::Exporter;
//!
//! let mut values = serde_json::Map::new();
//! values.insert("password".into(), "hunter2".into());
//! let backend = MemoryBackend::new().with_secret("secret/app/db", values);
//!
//! let report = Exporter::new(&backend, ErrorPolicy::FailFast).export(&["secret"])?;
//! assert_eq!(report.records.keys[0].key, "secret/app/db");
//! # Ok::<(), vault_migrator::error::MigratorError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod record;
pub mod template;
