//! Persistent string key-value storage used by the client.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use haven_shared::ChatError;
use haven_store::{Database, StoreError};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ChatError>;
    fn remove(&self, key: &str) -> Result<(), ChatError>;
}

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        let entries = self.entries.lock().map_err(|e| lock_poisoned(&e))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let mut entries = self.entries.lock().map_err(|e| lock_poisoned(&e))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChatError> {
        let mut entries = self.entries.lock().map_err(|e| lock_poisoned(&e))?;
        entries.remove(key);
        Ok(())
    }
}

/// Storage backed by the `client_storage` table of a local SQLite file.
pub struct SqliteStorage {
    db: Mutex<Database>,
}

impl SqliteStorage {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the default database in the platform data directory.
    pub fn open_default() -> Result<Self, ChatError> {
        Ok(Self::new(Database::new().map_err(storage_error)?))
    }

    pub fn open_at(path: &Path) -> Result<Self, ChatError> {
        Ok(Self::new(Database::open_at(path).map_err(storage_error)?))
    }
}

impl KeyValueStore for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        let db = self.db.lock().map_err(|e| lock_poisoned(&e))?;
        db.storage_get(key).map_err(storage_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let db = self.db.lock().map_err(|e| lock_poisoned(&e))?;
        db.storage_set(key, value).map_err(storage_error)
    }

    fn remove(&self, key: &str) -> Result<(), ChatError> {
        let db = self.db.lock().map_err(|e| lock_poisoned(&e))?;
        db.storage_remove(key).map(|_| ()).map_err(storage_error)
    }
}

fn storage_error(e: StoreError) -> ChatError {
    ChatError::Storage(e.to_string())
}

fn lock_poisoned(e: &dyn std::fmt::Display) -> ChatError {
    ChatError::Storage(format!("Lock poisoned: {e}"))
}
