use std::sync::Arc;

use crate::ports::{PortError, StoragePort};

/// Storage key for the last connected wallet id. A hint for the
/// reconnection flow, never proof of an active session.
pub const LAST_WALLET_KEY: &str = "walletgate.last-wallet";

#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn StoragePort>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    pub fn last_wallet(&self) -> Option<String> {
        self.storage
            .get(LAST_WALLET_KEY)
            .ok()
            .flatten()
            .filter(|id| !id.is_empty())
    }

    pub fn remember(&self, wallet_id: &str) -> Result<(), PortError> {
        self.storage.set(LAST_WALLET_KEY, wallet_id)
    }

    pub fn clear(&self) -> Result<(), PortError> {
        self.storage.remove(LAST_WALLET_KEY)
    }
}
