use crate::store::{SettingChange, SettingsCollection};
use anyhow::Result;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Settings collection persisted in a fjall partition.
pub struct DiskCollection {
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }

    fn sync(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn try_get(&self, key: &str) -> Result<Option<Value>> {
        match self.partition.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn try_keys(&self) -> Result<Vec<String>> {
        self.partition
            .keys()
            .map(|key| Ok(String::from_utf8(key?.to_vec())?))
            .collect()
    }
}

impl SettingsCollection for DiskCollection {
    fn get(&self, key: &str) -> Option<Value> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Settings get error for key {key}: {e}");
                None
            }
        }
    }

    fn apply(&self, changes: Vec<SettingChange>) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for change in &changes {
            match change {
                SettingChange::Put(key, value) => {
                    batch.insert(&self.partition, key.as_str(), serde_json::to_vec(value)?)
                }
                SettingChange::Remove(key) => batch.remove(&self.partition, key.as_str()),
            }
        }
        batch.commit()?;
        self.sync()?;
        debug!(changes = changes.len(), "Settings APPLY");
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.try_keys().unwrap_or_else(|e| {
            warn!("Settings key listing error: {e}");
            Vec::new()
        })
    }

    fn clear(&self) {
        for key in self.keys() {
            if let Err(e) = self.partition.remove(key.as_str()) {
                warn!("Settings clear error for key {key}: {e}");
            }
        }
        if let Err(e) = self.sync() {
            warn!("Settings clear sync error: {e}");
        }
        debug!("Settings CLEAR");
    }
}
