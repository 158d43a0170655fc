//! Chain-specific balance decoding.
//!
//! EVM balances arrive as hex-encoded wei; Cardano balances as the CBOR
//! value returned by CIP-30 `getBalance`. Balance is informational, not
//! safety-critical: anything unparseable decodes to zero instead of
//! failing the connection.

use alloy::primitives::U256;

const LOVELACE_PER_ADA: u64 = 1_000_000;

pub fn wei_from_hex(raw: &str) -> Option<U256> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).ok()
}

/// wei -> ETH display string, 4 decimal places, truncating.
pub fn format_wei(wei: U256) -> String {
    let scale = U256::from(10u64).pow(U256::from(18u64));
    let whole = wei / scale;
    let frac = (wei % scale) / U256::from(10u64).pow(U256::from(14u64));
    format!("{}.{:04}", whole, frac.saturating_to::<u64>())
}

/// lovelace -> ADA display string, 2 decimal places, truncating.
pub fn format_lovelace(lovelace: u64) -> String {
    let whole = lovelace / LOVELACE_PER_ADA;
    let frac = (lovelace % LOVELACE_PER_ADA) / 10_000;
    format!("{whole}.{frac:02}")
}

/// Decodes the hex-encoded CBOR value from `getBalance` down to the
/// lovelace component. Handles the plain unsigned-integer shape and the
/// structured `[coin, assets]` shape; everything else is zero.
pub fn lovelace_from_cbor_hex(raw: &str) -> u64 {
    decode_lovelace(raw).unwrap_or(0)
}

fn decode_lovelace(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = alloy::hex::decode(digits).ok()?;
    let mut reader = CborReader::new(&bytes);
    let (major, value) = reader.head()?;
    match major {
        // Plain unsigned integer: lovelace only.
        0 => Some(value),
        // Definite-length array [coin, multiasset]: the leading element
        // is the lovelace amount.
        4 if value >= 1 => {
            let (coin_major, coin) = reader.head()?;
            (coin_major == 0).then_some(coin)
        }
        _ => None,
    }
}

struct CborReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> CborReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    /// Reads one CBOR head: major type plus the argument in any of the
    /// definite length forms (embedded, 1/2/4/8-byte follow-on).
    fn head(&mut self) -> Option<(u8, u64)> {
        let initial = *self.take(1)?.first()?;
        let major = initial >> 5;
        let info = initial & 0x1f;
        let value = match info {
            0..=23 => u64::from(info),
            24 => u64::from(*self.take(1)?.first()?),
            25 => {
                let b = self.take(2)?;
                u64::from(u16::from_be_bytes([b[0], b[1]]))
            }
            26 => {
                let b = self.take(4)?;
                u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            27 => {
                let b = self.take(8)?;
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            // Indefinite lengths and reserved forms are out of scope.
            _ => return None,
        };
        Some((major, value))
    }
}

pub fn chain_id_from_hex(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Some(digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(digits, 16).ok()
    } else {
        trimmed.parse().ok()
    }
}
