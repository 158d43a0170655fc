use std::collections::HashMap;
use std::sync::Mutex;

use walletgate_core::{PortError, StoragePort};

/// Process-local storage for tests and native binaries.
#[derive(Default)]
pub struct MemoryStorageAdapter {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorageAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoragePort for MemoryStorageAdapter {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PortError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// `window.localStorage` backed storage. Private browsing can make the
/// storage object itself unavailable; that surfaces as a transport error
/// and the caller degrades to a session without persistence.
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
pub struct LocalStorageAdapter;

#[cfg(target_arch = "wasm32")]
impl LocalStorageAdapter {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> Result<web_sys::Storage, PortError> {
        web_sys::window()
            .ok_or_else(|| PortError::Transport("missing window".to_owned()))?
            .local_storage()
            .map_err(|e| PortError::Transport(format!("localStorage unavailable: {e:?}")))?
            .ok_or_else(|| PortError::Transport("localStorage disabled".to_owned()))
    }
}

#[cfg(target_arch = "wasm32")]
impl StoragePort for LocalStorageAdapter {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| PortError::Transport(format!("localStorage read failed: {e:?}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| PortError::Transport(format!("localStorage write failed: {e:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), PortError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| PortError::Transport(format!("localStorage remove failed: {e:?}")))
    }
}
