// ── Core error types ──
//
// User-facing errors from the engine. Adapter errors are carried whole so
// callers can still match on the transport-level cause.

use camlink_api::Vendor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Orchestration ────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("No compatible protocol found for {host}")]
    NoCompatibleProtocol { host: String },

    #[error("Vendor is unknown; run a compatibility check first")]
    VendorUnknown,

    #[error("No adapter registered for {0}")]
    AdapterNotRegistered(Vendor),

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ── Adapter ──────────────────────────────────────────────────────
    #[error(transparent)]
    Adapter(#[from] camlink_api::Error),
}

impl CoreError {
    /// Whether the failure came from the device rejecting credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Adapter(e) if e.is_auth_failure())
    }

    /// Whether the device could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Adapter(e) if e.is_network())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Adapter(camlink_api::Error::Timeout)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Adapter(camlink_api::Error::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_errors_keep_their_classification() {
        let err = CoreError::from(camlink_api::Error::Authentication {
            message: "bad password".into(),
        });
        assert!(err.is_auth_failure());
        assert!(!err.is_network());
        assert!(CoreError::from(camlink_api::Error::Timeout).is_timeout());
        assert!(CoreError::Cancelled.is_cancelled());
    }
}
