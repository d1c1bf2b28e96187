//! Namespaced key-value persistence.
//!
//! Mirrors the flash preferences API the dongle firmware persists into:
//! a namespace (`devstore`, `SEC`, `BLE`, ...) holds typed values under
//! short keys. Every `set` is a commit; there are no multi-key transactions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is corrupt: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

type Namespaces = BTreeMap<String, BTreeMap<String, Value>>;

pub trait KeyValueStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;

    fn set(&mut self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;

    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), StoreError>;

    /// Drop every key in a namespace.
    fn clear(&mut self, namespace: &str) -> Result<(), StoreError>;

    /// Namespace name to its keys and values, for listings.
    fn dump(&self) -> Vec<(String, Vec<(String, Value)>)>;

    fn get_int(&self, namespace: &str, key: &str) -> Option<i64> {
        match self.get(namespace, key)? {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    fn get_str(&self, namespace: &str, key: &str) -> Option<String> {
        match self.get(namespace, key)? {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    fn get_bool(&self, namespace: &str, key: &str) -> Option<bool> {
        match self.get(namespace, key)? {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn set_int(&mut self, namespace: &str, key: &str, value: i64) -> Result<(), StoreError> {
        self.set(namespace, key, Value::Int(value))
    }

    fn set_str(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.set(namespace, key, Value::Str(value.to_string()))
    }

    fn set_bool(&mut self, namespace: &str, key: &str, value: bool) -> Result<(), StoreError> {
        self.set(namespace, key, Value::Bool(value))
    }
}

fn dump_namespaces(data: &Namespaces) -> Vec<(String, Vec<(String, Value)>)> {
    data.iter()
        .map(|(ns, entries)| {
            let entries = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (ns.clone(), entries)
        })
        .collect()
}

/// In-memory store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Namespaces>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.data.lock().get(namespace)?.get(key).cloned()
    }

    fn set(&mut self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.data
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), StoreError> {
        if let Some(ns) = self.data.lock().get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    fn clear(&mut self, namespace: &str) -> Result<(), StoreError> {
        self.data.lock().remove(namespace);
        Ok(())
    }

    fn dump(&self) -> Vec<(String, Vec<(String, Value)>)> {
        dump_namespaces(&self.data.lock())
    }
}

/// Store persisted as one JSON document, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Namespaces,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Format {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No store at {}, starting empty", path.display());
                Namespaces::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.data).map_err(|source| {
            StoreError::Format {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.data.get(namespace)?.get(key).cloned()
    }

    fn set(&mut self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.data
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.commit()
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), StoreError> {
        let removed = self
            .data
            .get_mut(namespace)
            .and_then(|ns| ns.remove(key))
            .is_some();
        if removed {
            self.commit()?;
        }
        Ok(())
    }

    fn clear(&mut self, namespace: &str) -> Result<(), StoreError> {
        if self.data.remove(namespace).is_some() {
            info!("Cleared namespace {namespace}");
            self.commit()?;
        }
        Ok(())
    }

    fn dump(&self) -> Vec<(String, Vec<(String, Value)>)> {
        dump_namespaces(&self.data)
    }
}
