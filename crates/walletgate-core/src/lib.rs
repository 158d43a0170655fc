pub mod address;
pub mod codec;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod events;
pub mod identity;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod store;

pub use config::SessionConfig;
pub use connection::{ConnectPhase, ConnectionManager};
pub use domain::{
    AddressCandidate, AddressEncoding, CandidateSource, ChainFamily, ConnectedSession,
    ProviderHandle, SessionSnapshot, WalletDescriptor,
};
pub use error::WalletError;
pub use events::{EventSynchronizer, SyncCallbacks, SyncHandle};
pub use identity::{InjectedEntry, WalletIdentity, WALLETS};
pub use ports::{
    CardanoApiPort, CardanoProviderPort, EvmProviderEvent, EvmProviderPort, InjectedEnvironment,
    PortError, StoragePort,
};
pub use registry::{order_descriptors, ProviderRegistry};
pub use store::{SessionStore, LAST_WALLET_KEY};
