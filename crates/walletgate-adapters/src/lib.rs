pub mod cip30;
pub mod config;
pub mod eip1193;
pub mod environment;
pub mod storage;

pub use cip30::{Cip30Adapter, Cip30ApiAdapter};
pub use config::WalletGateConfig;
pub use eip1193::Eip1193Adapter;
pub use environment::ScriptedEnvironment;
pub use storage::MemoryStorageAdapter;

#[cfg(target_arch = "wasm32")]
pub use environment::BrowserEnvironment;
#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorageAdapter;
