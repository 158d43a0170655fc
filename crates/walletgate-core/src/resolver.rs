//! Ordered-fallback address resolution.
//!
//! Vendor CIP-30 implementations disagree on which query returns a
//! spendable, displayable address. Resolution walks a fixed priority
//! chain and short-circuits on the first validated candidate; the chain
//! order is what makes the result deterministic for a given sequence of
//! provider responses.

use tracing::{debug, warn};

use crate::address;
use crate::domain::{AddressCandidate, AddressEncoding, CandidateSource};
use crate::error::WalletError;
use crate::ports::CardanoApiPort;

/// Resolution order: change address, used, unused, and reward addresses
/// as a last resort (some vendors misplace the payment address there).
pub async fn resolve_cardano(api: &dyn CardanoApiPort) -> Result<AddressCandidate, WalletError> {
    let mut saw_candidate = false;

    match api.change_address().await {
        Ok(Some(raw)) if !raw.is_empty() => {
            saw_candidate = true;
            if let Some(candidate) = single_candidate(&raw, CandidateSource::ChangeAddress) {
                return Ok(candidate);
            }
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "getChangeAddress failed, falling back"),
    }

    for (source, method) in [
        (CandidateSource::UsedAddresses, "getUsedAddresses"),
        (CandidateSource::UnusedAddresses, "getUnusedAddresses"),
        (CandidateSource::RewardAddresses, "getRewardAddresses"),
    ] {
        let entries = match fetch_list(api, source).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(method, error = %err, "address list query failed, falling back");
                continue;
            }
        };
        if entries.iter().any(|e| !e.is_empty()) {
            saw_candidate = true;
        }
        if let Some(candidate) = scan_list(&entries, source) {
            debug!(method, address = %candidate.canonical, "resolved address");
            return Ok(candidate);
        }
    }

    if saw_candidate {
        Err(WalletError::UnsupportedAddressEncoding)
    } else {
        Err(WalletError::NoAddressAvailable)
    }
}

/// EVM resolution: first account-list entry in canonical form.
pub fn resolve_evm(accounts: &[String]) -> Result<AddressCandidate, WalletError> {
    if accounts.iter().all(|a| a.is_empty()) {
        return Err(WalletError::NoAddressAvailable);
    }
    for raw in accounts {
        if address::is_canonical_evm(raw) {
            return Ok(AddressCandidate {
                raw: raw.clone(),
                canonical: raw.clone(),
                source: CandidateSource::AccountList,
                encoding: AddressEncoding::Canonical,
            });
        }
    }
    Err(WalletError::UnsupportedAddressEncoding)
}

async fn fetch_list(
    api: &dyn CardanoApiPort,
    source: CandidateSource,
) -> Result<Vec<String>, crate::ports::PortError> {
    match source {
        CandidateSource::UsedAddresses => api.used_addresses().await,
        CandidateSource::UnusedAddresses => api.unused_addresses().await,
        CandidateSource::RewardAddresses => api.reward_addresses().await,
        _ => Ok(Vec::new()),
    }
}

fn single_candidate(raw: &str, source: CandidateSource) -> Option<AddressCandidate> {
    if address::is_canonical_cardano(raw) {
        return Some(AddressCandidate {
            raw: raw.to_owned(),
            canonical: raw.to_owned(),
            source,
            encoding: AddressEncoding::Canonical,
        });
    }
    if address::looks_like_hex(raw) {
        if let Some(converted) = address::convert_candidate(raw) {
            return Some(AddressCandidate {
                raw: raw.to_owned(),
                canonical: converted,
                source,
                encoding: AddressEncoding::HexBinary,
            });
        }
    }
    None
}

/// Canonical entries win in list order; only when none validate are
/// hex-looking entries converted, again in list order.
fn scan_list(entries: &[String], source: CandidateSource) -> Option<AddressCandidate> {
    for raw in entries {
        if address::is_canonical_cardano(raw) {
            return Some(AddressCandidate {
                raw: raw.clone(),
                canonical: raw.clone(),
                source,
                encoding: AddressEncoding::Canonical,
            });
        }
    }
    for raw in entries {
        if address::looks_like_hex(raw) {
            if let Some(converted) = address::convert_candidate(raw) {
                return Some(AddressCandidate {
                    raw: raw.clone(),
                    canonical: converted,
                    source,
                    encoding: AddressEncoding::HexBinary,
                });
            }
        }
    }
    None
}
