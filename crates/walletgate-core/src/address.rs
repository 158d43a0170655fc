//! Address format validation and binary-to-canonical conversion.
//!
//! Some Cardano providers return hex-encoded binary addresses instead of
//! bech32 text. Conversion decodes the hex, reads the header byte for the
//! address class and network nibble, and re-encodes with the matching
//! human-readable prefix. A converted result outside the payment prefix
//! set is a conversion failure, not a success.

use bech32::{FromBase32, ToBase32, Variant};

use crate::domain::ChainFamily;

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

// Header nibbles per the Shelley address binary layout.
const PAYMENT_TYPE_MAX: u8 = 7;
const REWARD_TYPES: [u8; 2] = [14, 15];

pub fn is_canonical(family: ChainFamily, raw: &str) -> bool {
    match family {
        ChainFamily::Evm => is_canonical_evm(raw),
        ChainFamily::Cardano => is_canonical_cardano(raw),
    }
}

pub fn is_canonical_evm(raw: &str) -> bool {
    raw.len() == 42
        && raw.starts_with("0x")
        && raw[2..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_canonical_cardano(raw: &str) -> bool {
    let data = match raw
        .strip_prefix("addr1")
        .or_else(|| raw.strip_prefix("addr_test1"))
    {
        Some(data) => data,
        None => return false,
    };
    // 6 characters is the bech32 checksum alone; anything shorter cannot
    // carry an address payload.
    data.len() > 6 && data.chars().all(|c| BECH32_CHARSET.contains(c))
}

pub fn looks_like_hex(raw: &str) -> bool {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    digits.len() >= 2
        && digits.len() % 2 == 0
        && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Hex-encoded binary address -> bech32 text, prefix chosen from the
/// header byte. Returns reward addresses under their own `stake` prefix
/// so the caller's prefix check can reject them.
pub fn cardano_from_hex(raw: &str) -> Option<String> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = alloy::hex::decode(digits).ok()?;
    // Enterprise addresses are 29 bytes, base addresses 57.
    if bytes.len() < 29 || bytes.len() > 128 {
        return None;
    }
    let header = *bytes.first()?;
    let address_type = header >> 4;
    let network = header & 0x0f;
    let hrp = match network {
        1 if address_type <= PAYMENT_TYPE_MAX => "addr",
        0 if address_type <= PAYMENT_TYPE_MAX => "addr_test",
        1 if REWARD_TYPES.contains(&address_type) => "stake",
        0 if REWARD_TYPES.contains(&address_type) => "stake_test",
        _ => return None,
    };
    bech32::encode(hrp, bytes.to_base32(), Variant::Bech32).ok()
}

/// Conversion accepted only when the result lands in the payment prefix
/// set.
pub fn convert_candidate(raw: &str) -> Option<String> {
    let converted = cardano_from_hex(raw)?;
    is_canonical_cardano(&converted).then_some(converted)
}

/// Decodes a bech32 Cardano address back to its binary form. Test
/// support for the round-trip property; not part of resolution.
pub fn cardano_to_bytes(address: &str) -> Option<Vec<u8>> {
    let (_, data, variant) = bech32::decode(address).ok()?;
    if variant != Variant::Bech32 {
        return None;
    }
    Vec::<u8>::from_base32(&data).ok()
}
