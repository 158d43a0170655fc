use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ports::{CardanoApiPort, EvmProviderPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Cardano,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFamily::Evm => write!(f, "evm"),
            ChainFamily::Cardano => write!(f, "cardano"),
        }
    }
}

/// Result of a registry scan. Re-created on every scan; providers may
/// inject after initial script evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDescriptor {
    pub id: String,
    pub display_name: String,
    pub chain_family: ChainFamily,
    pub installed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressEncoding {
    Canonical,
    HexBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    ChangeAddress,
    UsedAddresses,
    UnusedAddresses,
    RewardAddresses,
    AccountList,
}

/// Intermediate resolution value. `raw` is the string as returned by the
/// provider; `canonical` is the validated textual form promoted into the
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCandidate {
    pub raw: String,
    pub canonical: String,
    pub source: CandidateSource,
    pub encoding: AddressEncoding,
}

/// Non-ownership reference back into the injected environment. Held only
/// for the session's lifetime, never persisted.
#[derive(Clone)]
pub enum ProviderHandle {
    Evm(Arc<dyn EvmProviderPort>),
    Cardano(Arc<dyn CardanoApiPort>),
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderHandle::Evm(_) => write!(f, "ProviderHandle::Evm(..)"),
            ProviderHandle::Cardano(_) => write!(f, "ProviderHandle::Cardano(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectedSession {
    pub wallet_id: String,
    pub chain_family: ChainFamily,
    pub address: String,
    pub balance: String,
    pub network_label: String,
    pub chain_id: Option<u64>,
    pub handle: ProviderHandle,
}

impl ConnectedSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            wallet_id: self.wallet_id.clone(),
            address: self.address.clone(),
            balance: self.balance.clone(),
            network_label: self.network_label.clone(),
            chain_id: self.chain_id,
        }
    }
}

/// Serializable change-event payload consumed by the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub wallet_id: String,
    pub address: String,
    pub balance: String,
    pub network_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}
