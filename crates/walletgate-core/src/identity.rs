use crate::domain::ChainFamily;

/// One wallet identity with its versioned injection-key alias table.
/// Vendors rename their injection key across versions; the alias list is
/// tried in order and must be enumerated fully before a wallet is
/// declared not installed.
#[derive(Debug, Clone, Copy)]
pub struct WalletIdentity {
    pub id: &'static str,
    pub display_name: &'static str,
    pub chain_family: ChainFamily,
    /// Injection keys under the cardano namespace, primary key first.
    pub aliases: &'static [&'static str],
    /// Lowercase fragment matched against the `name` field of every
    /// present key. Empty disables fragment matching.
    pub name_fragment: &'static str,
    /// Identification flag on the EVM global (`isMetaMask`, ...).
    pub evm_flag: Option<&'static str>,
}

pub const WALLETS: &[WalletIdentity] = &[
    WalletIdentity {
        id: "eternl",
        display_name: "Eternl",
        chain_family: ChainFamily::Cardano,
        aliases: &["eternl", "ccvault"],
        name_fragment: "eternl",
        evm_flag: None,
    },
    WalletIdentity {
        id: "nami",
        display_name: "Nami",
        chain_family: ChainFamily::Cardano,
        aliases: &["nami"],
        name_fragment: "nami",
        evm_flag: None,
    },
    WalletIdentity {
        id: "lace",
        display_name: "Lace",
        chain_family: ChainFamily::Cardano,
        aliases: &["lace"],
        name_fragment: "lace",
        evm_flag: None,
    },
    WalletIdentity {
        id: "flint",
        display_name: "Flint",
        chain_family: ChainFamily::Cardano,
        aliases: &["flint"],
        name_fragment: "flint",
        evm_flag: None,
    },
    WalletIdentity {
        id: "yoroi",
        display_name: "Yoroi",
        chain_family: ChainFamily::Cardano,
        aliases: &["yoroi"],
        name_fragment: "yoroi",
        evm_flag: None,
    },
    WalletIdentity {
        id: "gero",
        display_name: "GeroWallet",
        chain_family: ChainFamily::Cardano,
        aliases: &["gerowallet", "gero"],
        name_fragment: "gero",
        evm_flag: None,
    },
    WalletIdentity {
        id: "typhon",
        display_name: "Typhon",
        chain_family: ChainFamily::Cardano,
        aliases: &["typhoncip30", "typhon"],
        name_fragment: "typhon",
        evm_flag: None,
    },
    WalletIdentity {
        id: "nufi",
        display_name: "NuFi",
        chain_family: ChainFamily::Cardano,
        aliases: &["nufi"],
        name_fragment: "nufi",
        evm_flag: None,
    },
    WalletIdentity {
        id: "metamask",
        display_name: "MetaMask",
        chain_family: ChainFamily::Evm,
        aliases: &[],
        name_fragment: "",
        evm_flag: Some("isMetaMask"),
    },
    WalletIdentity {
        id: "coinbase",
        display_name: "Coinbase Wallet",
        chain_family: ChainFamily::Evm,
        aliases: &[],
        name_fragment: "",
        evm_flag: Some("isCoinbaseWallet"),
    },
    WalletIdentity {
        id: "trust",
        display_name: "Trust Wallet",
        chain_family: ChainFamily::Evm,
        aliases: &[],
        name_fragment: "",
        evm_flag: Some("isTrust"),
    },
    // Catch-all for an injected EVM provider that sets no known flag.
    WalletIdentity {
        id: "injected",
        display_name: "Browser Wallet",
        chain_family: ChainFamily::Evm,
        aliases: &[],
        name_fragment: "",
        evm_flag: None,
    },
];

/// One key present under the cardano namespace, with the `name` field of
/// the object injected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedEntry {
    pub key: String,
    pub name: Option<String>,
}

pub fn find(id: &str) -> Option<&'static WalletIdentity> {
    WALLETS.iter().find(|w| w.id == id)
}

pub fn family_wallets(family: ChainFamily) -> impl Iterator<Item = &'static WalletIdentity> {
    WALLETS.iter().filter(move |w| w.chain_family == family)
}

/// Total alias search: every listed alias is checked against the present
/// keys before falling back to the name-fragment match.
pub fn match_cardano_key<'a>(
    identity: &WalletIdentity,
    entries: &'a [InjectedEntry],
) -> Option<&'a str> {
    for alias in identity.aliases {
        if let Some(entry) = entries.iter().find(|e| e.key == *alias) {
            return Some(entry.key.as_str());
        }
    }
    if identity.name_fragment.is_empty() {
        return None;
    }
    entries
        .iter()
        .find(|e| {
            e.name
                .as_deref()
                .map(|n| n.to_lowercase().contains(identity.name_fragment))
                .unwrap_or(false)
        })
        .map(|e| e.key.as_str())
}
