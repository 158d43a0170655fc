use walletgate_core::SessionConfig;

/// Deployment-facing knobs for the adapter layer. Everything maps onto
/// [`SessionConfig`]; the defaults match it field for field.
#[derive(Debug, Clone)]
pub struct WalletGateConfig {
    pub authorize_timeout_ms: u64,
    pub scan_attempts: u32,
    pub scan_backoff_ms: u64,
    pub probe_interval_ms: u64,
    pub promotion_attempts: u32,
    pub preferred_wallet: Option<String>,
}

impl Default for WalletGateConfig {
    fn default() -> Self {
        let base = SessionConfig::default();
        Self {
            authorize_timeout_ms: base.authorize_timeout_ms,
            scan_attempts: base.scan_attempts,
            scan_backoff_ms: base.scan_backoff_ms,
            probe_interval_ms: base.probe_interval_ms,
            promotion_attempts: base.promotion_attempts,
            preferred_wallet: base.preferred_wallet,
        }
    }
}

impl WalletGateConfig {
    /// Reads overrides from `WALLETGATE_*` environment variables.
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            authorize_timeout_ms: env_u64(
                "WALLETGATE_AUTHORIZE_TIMEOUT_MS",
                defaults.authorize_timeout_ms,
            ),
            scan_attempts: env_u32("WALLETGATE_SCAN_ATTEMPTS", defaults.scan_attempts),
            scan_backoff_ms: env_u64("WALLETGATE_SCAN_BACKOFF_MS", defaults.scan_backoff_ms),
            probe_interval_ms: env_u64(
                "WALLETGATE_PROBE_INTERVAL_MS",
                defaults.probe_interval_ms,
            ),
            promotion_attempts: env_u32(
                "WALLETGATE_PROMOTION_ATTEMPTS",
                defaults.promotion_attempts,
            ),
            preferred_wallet: std::env::var("WALLETGATE_PREFERRED_WALLET")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            authorize_timeout_ms: self.authorize_timeout_ms,
            scan_attempts: self.scan_attempts,
            scan_backoff_ms: self.scan_backoff_ms,
            probe_interval_ms: self.probe_interval_ms,
            promotion_attempts: self.promotion_attempts,
            preferred_wallet: self.preferred_wallet.clone(),
        }
    }
}

fn env_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_u32(key: &str, fallback: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
