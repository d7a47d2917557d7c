pub mod disk;
pub mod memory;

use anyhow::{Context, Result};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use serde_json::Value;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, warn};

/// Name of the application-wide settings collection.
pub const APP_COLLECTION: &str = "app";

/// One write in a [`SettingsCollection::apply`] batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    Put(String, Value),
    Remove(String),
}

/// A flat, typed key/value settings namespace.
///
/// Values are stored as JSON. `apply` and `try_put` report storage errors;
/// `put` and `remove` only log them.
pub trait SettingsCollection: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    /// Applies every change, or none of them when the write fails.
    fn apply(&self, changes: Vec<SettingChange>) -> Result<()>;
    fn keys(&self) -> Vec<String>;
    fn clear(&self);

    fn try_put(&self, key: &str, value: Value) -> Result<()> {
        self.apply(vec![SettingChange::Put(key.to_string(), value)])
    }

    fn put(&self, key: &str, value: Value) {
        if let Err(e) = self.try_put(key, value) {
            warn!("Settings put error for key {key}: {e:#}");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.apply(vec![SettingChange::Remove(key.to_string())]) {
            warn!("Settings remove error for key {key}: {e:#}");
        }
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn put_string(&self, key: &str, value: &str) {
        self.put(key, Value::String(value.to_string()));
    }

    fn put_int(&self, key: &str, value: i64) {
        self.put(key, Value::from(value));
    }

    fn put_bool(&self, key: &str, value: bool) {
        self.put(key, Value::Bool(value));
    }
}

/// Opens settings collections by name, backed by fjall partitions when a
/// keyspace is available and by memory otherwise.
pub struct SettingsStore {
    collections: RwLock<HashMap<String, Arc<dyn SettingsCollection>>>,
    keyspace: Option<Arc<Keyspace>>,
}

impl SettingsStore {
    pub fn open(data_path: &Path) -> Result<Self> {
        let settings_dir = data_path.join("settings");
        let keyspace = fjall::Config::new(&settings_dir)
            .open()
            .with_context(|| format!("Failed to open settings at {}", settings_dir.display()))?;
        debug!("Opened settings keyspace at {}", settings_dir.display());

        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: Some(Arc::new(keyspace)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }

    pub fn collection(&self, name: &str) -> Result<Arc<dyn SettingsCollection>> {
        if let Some(existing) = self
            .collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Ok(existing.clone());
        }

        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = collections.get(name) {
            return Ok(existing.clone());
        }

        let collection: Arc<dyn SettingsCollection> = match &self.keyspace {
            Some(keyspace) => {
                let partition = keyspace
                    .open_partition(name, PartitionCreateOptions::default())
                    .with_context(|| format!("Failed to open settings partition {name}"))?;
                Arc::new(DiskCollection::new(keyspace.clone(), partition))
            }
            None => Arc::new(MemoryCollection::new()),
        };
        debug!("Opened settings collection {name}");
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    pub fn app(&self) -> Result<Arc<dyn SettingsCollection>> {
        self.collection(APP_COLLECTION)
    }

    pub fn widget(&self, id: u32) -> Result<Arc<dyn SettingsCollection>> {
        self.collection(&widget_collection_name(id))
    }
}

pub fn widget_collection_name(id: u32) -> String {
    format!("widget_{id}")
}
