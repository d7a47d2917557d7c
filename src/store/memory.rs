use crate::store::{SettingChange, SettingsCollection};
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

/// Settings collection kept in process memory.
#[derive(Default)]
pub struct MemoryCollection {
    inner: RwLock<BTreeMap<String, Value>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsCollection for MemoryCollection {
    fn get(&self, key: &str) -> Option<Value> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(key).cloned()
    }

    fn apply(&self, changes: Vec<SettingChange>) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        for change in changes {
            match change {
                SettingChange::Put(key, value) => {
                    debug!("Settings PUT for key: {key}");
                    map.insert(key, value);
                }
                SettingChange::Remove(key) => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.keys().cloned().collect()
    }

    fn clear(&self) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.clear();
        debug!("Settings CLEAR");
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let collection = MemoryCollection::new();
        assert!(collection.get("widgetSize").is_none());

        collection.put_int("widgetSize", 3);
        assert_eq!(collection.get_int("widgetSize"), Some(3));

        collection.remove("widgetSize");
        assert!(collection.get("widgetSize").is_none());
    }

    #[test]
    fn test_clear() {
        let collection = MemoryCollection::new();
        collection.put_string("Stock1", "AAPL");
        collection.put_string("Stock2", "MSFT");
        assert_eq!(collection.keys(), vec!["Stock1", "Stock2"]);

        collection.clear();
        assert!(collection.keys().is_empty());
    }
}
