use std::sync::Arc;

use tracing::debug;

use crate::domain::{ChainFamily, WalletDescriptor};
use crate::identity::{self, InjectedEntry};
use crate::ports::InjectedEnvironment;

/// Detects which wallet providers are present in the execution
/// environment. Descriptors are re-created on every scan; providers may
/// appear well after initial page evaluation.
pub struct ProviderRegistry {
    env: Arc<dyn InjectedEnvironment>,
}

impl ProviderRegistry {
    pub fn new(env: Arc<dyn InjectedEnvironment>) -> Self {
        Self { env }
    }

    pub fn scan(&self, family: ChainFamily) -> Vec<WalletDescriptor> {
        let descriptors = match family {
            ChainFamily::Evm => self.scan_evm(),
            ChainFamily::Cardano => self.scan_cardano(),
        };
        debug!(
            %family,
            installed = descriptors.iter().filter(|d| d.installed).count(),
            total = descriptors.len(),
            "provider scan"
        );
        descriptors
    }

    /// Re-scans on a fixed schedule until something is installed or the
    /// attempt budget is exhausted. Always returns the last scan, never
    /// an error.
    pub async fn scan_until_installed(&self, family: ChainFamily) -> Vec<WalletDescriptor> {
        self.scan_with_schedule(
            family,
            crate::config::SessionConfig::default().scan_attempts,
            crate::config::SessionConfig::default().scan_backoff(),
        )
        .await
    }

    pub async fn scan_with_schedule(
        &self,
        family: ChainFamily,
        attempts: u32,
        backoff: std::time::Duration,
    ) -> Vec<WalletDescriptor> {
        let mut last = self.scan(family);
        for _ in 1..attempts.max(1) {
            if last.iter().any(|d| d.installed) {
                break;
            }
            tokio::time::sleep(backoff).await;
            last = self.scan(family);
        }
        last
    }

    fn scan_evm(&self) -> Vec<WalletDescriptor> {
        let provider = self.env.evm_provider();
        identity::family_wallets(ChainFamily::Evm)
            .map(|w| WalletDescriptor {
                id: w.id.to_owned(),
                display_name: w.display_name.to_owned(),
                chain_family: ChainFamily::Evm,
                installed: match (&provider, w.evm_flag) {
                    (Some(p), Some(flag)) => p.has_flag(flag),
                    (Some(_), None) => true,
                    (None, _) => false,
                },
            })
            .collect()
    }

    fn scan_cardano(&self) -> Vec<WalletDescriptor> {
        let entries = cardano_entries(self.env.as_ref());
        identity::family_wallets(ChainFamily::Cardano)
            .map(|w| WalletDescriptor {
                id: w.id.to_owned(),
                display_name: w.display_name.to_owned(),
                chain_family: ChainFamily::Cardano,
                installed: identity::match_cardano_key(w, &entries).is_some(),
            })
            .collect()
    }
}

/// Present cardano namespace keys paired with each injected object's
/// `name` field.
pub fn cardano_entries(env: &dyn InjectedEnvironment) -> Vec<InjectedEntry> {
    env.cardano_keys()
        .into_iter()
        .map(|key| {
            let name = env.cardano_provider(&key).and_then(|p| p.display_name());
            InjectedEntry { key, name }
        })
        .collect()
}

/// Pure ordering over a scan result: installed wallets first, the
/// preferred wallet first among installed, table order otherwise.
pub fn order_descriptors(
    mut descriptors: Vec<WalletDescriptor>,
    preferred: Option<&str>,
) -> Vec<WalletDescriptor> {
    descriptors.sort_by_key(|d| {
        let preferred_rank = if d.installed && preferred == Some(d.id.as_str()) {
            0u8
        } else {
            1
        };
        (!d.installed, preferred_rank)
    });
    descriptors
}
