use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Adapter-boundary failure. Classified into `WalletError` before it
/// crosses into caller-visible results.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("provider rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvmProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(String),
    Disconnect,
}

/// EIP-1193 style provider. `selected_address`/`has_flag` read the
/// synchronous fields of the injected object; the async methods map onto
/// `request({method})`. The provider is a shared, externally-owned
/// resource: values may change between two calls in one sequence.
#[async_trait]
pub trait EvmProviderPort: Send + Sync {
    fn selected_address(&self) -> Result<Option<String>, PortError>;
    fn has_flag(&self, flag: &str) -> bool;
    async fn request_accounts(&self) -> Result<Vec<String>, PortError>;
    async fn accounts(&self) -> Result<Vec<String>, PortError>;
    async fn chain_id(&self) -> Result<String, PortError>;
    async fn get_balance(&self, address: &str) -> Result<String, PortError>;
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<EvmProviderEvent>, PortError>;
}

/// CIP-30 initial object as injected under one key of the cardano
/// namespace.
#[async_trait]
pub trait CardanoProviderPort: Send + Sync {
    /// Value of the injected object's `name` field, when present.
    fn display_name(&self) -> Option<String>;
    async fn is_enabled(&self) -> Result<bool, PortError>;
    async fn enable(&self) -> Result<Arc<dyn CardanoApiPort>, PortError>;
}

/// Capability object returned by a successful `enable()`. Addresses are
/// returned as whatever encoding the vendor chose; balances as CBOR hex.
#[async_trait]
pub trait CardanoApiPort: Send + Sync {
    async fn network_id(&self) -> Result<u8, PortError>;
    async fn balance(&self) -> Result<String, PortError>;
    async fn change_address(&self) -> Result<Option<String>, PortError>;
    async fn used_addresses(&self) -> Result<Vec<String>, PortError>;
    async fn unused_addresses(&self) -> Result<Vec<String>, PortError>;
    async fn reward_addresses(&self) -> Result<Vec<String>, PortError>;
}

/// The environment's injected globals as an explicit dependency, so the
/// implicit `window.ethereum` / `window.cardano` reads can be substituted
/// in tests.
pub trait InjectedEnvironment: Send + Sync {
    fn evm_provider(&self) -> Option<Arc<dyn EvmProviderPort>>;
    fn cardano_keys(&self) -> Vec<String>;
    fn cardano_provider(&self, key: &str) -> Option<Arc<dyn CardanoProviderPort>>;
}

/// Durable key-value storage (localStorage in the browser).
pub trait StoragePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PortError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PortError>;
    fn remove(&self, key: &str) -> Result<(), PortError>;
}
