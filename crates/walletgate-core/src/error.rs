use thiserror::Error;

use crate::domain::ChainFamily;
use crate::ports::PortError;

/// Caller-visible failure taxonomy. Every provider failure is classified
/// into one of these before it leaves the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("no injected provider detected for chain family {0}")]
    NoProviderDetected(ChainFamily),
    #[error("wallet not installed: {0}")]
    WalletNotFound(String),
    #[error("authorization rejected by user")]
    UserRejected,
    #[error("an authorization request is already pending in the wallet")]
    AuthorizationPending,
    #[error("provider did not respond within {0} ms")]
    Timeout(u64),
    #[error("wallet appears locked or has no address history")]
    NoAddressAvailable,
    #[error("wallet returned an unsupported address encoding")]
    UnsupportedAddressEncoding,
    #[error("session address no longer passes format validation")]
    InvalidAddressFormat,
    #[error("provider failure: {0}")]
    Provider(String),
}

// EIP-1193: 4001 user rejected, -32002 request already pending.
// CIP-30 APIError: -3 refused.
const EVM_USER_REJECTED: i64 = 4001;
const EVM_REQUEST_PENDING: i64 = -32002;
const CIP30_REFUSED: i64 = -3;

impl WalletError {
    pub fn classify(err: PortError) -> Self {
        match err {
            PortError::Rpc { code: EVM_USER_REJECTED, .. }
            | PortError::Rpc { code: CIP30_REFUSED, .. } => WalletError::UserRejected,
            PortError::Rpc { code: EVM_REQUEST_PENDING, .. } => WalletError::AuthorizationPending,
            PortError::Rpc { code, message } => {
                WalletError::Provider(format!("rpc {code}: {message}"))
            }
            other => WalletError::Provider(other.to_string()),
        }
    }

    /// Recoverable by retry or by the bounded promotion poll.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WalletError::AuthorizationPending | WalletError::Timeout(_)
        )
    }
}
