/// Tunables for the connection and synchronization flows. Millisecond
/// fields so adapters can populate them from flat configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock budget for the user-facing authorization call.
    pub authorize_timeout_ms: u64,
    /// Registry re-scan schedule for late-injecting providers.
    pub scan_attempts: u32,
    pub scan_backoff_ms: u64,
    /// Idle probe interval while no session is active.
    pub probe_interval_ms: u64,
    /// Cap on the pending-authorization promotion poll.
    pub promotion_attempts: u32,
    /// Wallet sorted first among installed wallets when present.
    pub preferred_wallet: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            authorize_timeout_ms: 30_000,
            scan_attempts: 10,
            scan_backoff_ms: 400,
            probe_interval_ms: 2_000,
            promotion_attempts: 30,
            preferred_wallet: None,
        }
    }
}

impl SessionConfig {
    pub fn authorize_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.authorize_timeout_ms)
    }

    pub fn scan_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scan_backoff_ms)
    }

    pub fn probe_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.probe_interval_ms)
    }
}
