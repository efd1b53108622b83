//! Settings Storage Abstraction
//!
//! Key-value preference storage provided by the host:
//! - iOS: UserDefaults
//! - Android: SharedPreferences / DataStore
//! - Desktop: Config files or OS-specific preferences
//! - Web: localStorage / IndexedDB
//!
//! The core only reads and writes small scalar values here (for example the
//! persisted playback volume). It never owns the storage format.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// Settings storage trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_volume(store: &dyn SettingsStore) -> Result<()> {
///     store.set_f64("playback.volume", 0.8).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store a floating-point value
    async fn set_f64(&self, key: &str, value: f64) -> Result<()>;

    /// Retrieve a floating-point value
    async fn get_f64(&self, key: &str) -> Result<Option<f64>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    String(String),
    Bool(bool),
    Float(f64),
}

/// In-memory settings store.
///
/// Used by hosts that do not persist preferences and by tests. Values are
/// typed: reading a key with the wrong getter yields
/// [`BridgeError::TypeMismatch`].
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, StoredValue>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mismatch(key: &str, expected: &str) -> BridgeError {
        BridgeError::TypeMismatch {
            key: key.to_string(),
            expected: expected.to_string(),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), StoredValue::String(value.to_string()));
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.values.read().get(key) {
            None => Ok(None),
            Some(StoredValue::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(Self::mismatch(key, "string")),
        }
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), StoredValue::Bool(value));
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.values.read().get(key) {
            None => Ok(None),
            Some(StoredValue::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(Self::mismatch(key, "bool")),
        }
    }

    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), StoredValue::Float(value));
        Ok(())
    }

    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.values.read().get(key) {
            None => Ok(None),
            Some(StoredValue::Float(value)) => Ok(Some(*value)),
            Some(_) => Err(Self::mismatch(key, "f64")),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.read().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySettingsStore::new();
        store.set_f64("playback.volume", 0.4).await.unwrap();

        assert_eq!(store.get_f64("playback.volume").await.unwrap(), Some(0.4));
        assert!(store.has_key("playback.volume").await.unwrap());

        store.delete("playback.volume").await.unwrap();
        assert_eq!(store.get_f64("playback.volume").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_type_mismatch() {
        let store = MemorySettingsStore::new();
        store.set_string("theme", "dark").await.unwrap();

        let err = store.get_bool("theme").await.unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { .. }));
    }
}
