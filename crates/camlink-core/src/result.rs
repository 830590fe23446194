// ── Caller-facing result envelopes ──
//
// `CompatibilityResult` is the verdict of one probe scan; `OperationResult`
// wraps apply operations so callers get data or a message, never both.

use std::fmt::Display;

use serde::Serialize;

use camlink_api::Vendor;

// ── CompatibilityResult ────────────────────────────────────────────

/// Outcome of probing one endpoint (for one vendor, or a whole scan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityResult {
    /// The check ran to a verdict (even a negative one).
    pub success: bool,
    pub is_compatible: bool,
    pub detected_vendor: Option<Vendor>,
    pub requires_auth: bool,
    pub is_authenticated: bool,
    pub message: String,
    pub auth_message: Option<String>,
}

impl CompatibilityResult {
    /// Vendor confirmed and reachable with the given (or no) credentials.
    pub fn compatible(vendor: Vendor, requires_auth: bool, auth_message: Option<String>) -> Self {
        Self {
            success: true,
            is_compatible: true,
            detected_vendor: Some(vendor),
            requires_auth,
            is_authenticated: true,
            message: format!("{} device detected", vendor.display_name()),
            auth_message,
        }
    }

    /// Vendor confirmed, but the credentials were refused.
    pub fn auth_failed(vendor: Vendor, auth_message: impl Into<String>) -> Self {
        Self {
            success: true,
            is_compatible: true,
            detected_vendor: Some(vendor),
            requires_auth: true,
            is_authenticated: false,
            message: format!("{} device detected", vendor.display_name()),
            auth_message: Some(auth_message.into()),
        }
    }

    /// The endpoint is not this vendor, or could not be reached.
    pub fn incompatible(message: impl Into<String>) -> Self {
        Self {
            success: false,
            is_compatible: false,
            detected_vendor: None,
            requires_auth: false,
            is_authenticated: false,
            message: message.into(),
            auth_message: None,
        }
    }

    /// Every registered vendor was tried without a match.
    pub fn no_compatible_protocol() -> Self {
        Self::incompatible("No compatible protocol found")
    }

    /// Usable for reads and writes.
    pub fn is_ready(&self) -> bool {
        self.is_compatible && self.is_authenticated
    }
}

// ── OperationResult ────────────────────────────────────────────────

/// Data on success, a non-empty message on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult<T> {
    success: bool,
    data: Option<T>,
    error_message: Option<String>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
        }
    }

    /// A blank message is replaced so failures always explain themselves.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Operation failed".to_owned()
        } else {
            message
        };
        Self {
            success: false,
            data: None,
            error_message: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error_message) {
            (Some(data), _) => Ok(data),
            (None, message) => Err(message.unwrap_or_else(|| "Operation failed".to_owned())),
        }
    }
}

impl<T, E: Display> From<Result<T, E>> for OperationResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_results_always_carry_a_message() {
        let result: OperationResult<()> = OperationResult::failed("  ");
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("Operation failed"));
        assert!(result.data().is_none());
    }

    #[test]
    fn from_result_maps_both_arms() {
        let ok: OperationResult<u8> = Ok::<u8, String>(3).into();
        assert!(ok.is_success());
        assert_eq!(ok.data(), Some(&3));

        let err: OperationResult<u8> = Err::<u8, _>("API error: nope").into();
        assert_eq!(err.error_message(), Some("API error: nope"));
        assert_eq!(err.into_result(), Err("API error: nope".to_owned()));
    }

    #[test]
    fn compatible_result_names_vendor() {
        let result = CompatibilityResult::compatible(Vendor::Onvif, true, None);
        assert!(result.is_ready());
        assert_eq!(result.message, "ONVIF device detected");
        assert!(!CompatibilityResult::auth_failed(Vendor::Axis, "bad").is_ready());
    }
}
