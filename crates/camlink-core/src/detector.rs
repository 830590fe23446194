//! Per-vendor compatibility detection.
//!
//! One [`CompatibilityDetector`] runs against one adapter:
//!
//! ```text
//! Unprobed -> Probing -> VendorConfirmedNoAuth
//!                     -> VendorConfirmedAuthRequired -> Authenticating -> Authenticated
//!                     -> NotThisVendor                                 -> AuthFailed
//!                     -> NetworkError                                  -> AuthError
//! ```
//!
//! `NotThisVendor` and `NetworkError` are verdicts about this vendor only;
//! the manager moves on to the next one.

use tracing::trace;

use camlink_api::{CameraAdapter, Error, ProbeResponse, Vendor};
use camlink_api::adapter::matches_signature;

use crate::result::CompatibilityResult;

/// Where a detector is in its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorState {
    Unprobed,
    Probing,
    VendorConfirmedNoAuth,
    VendorConfirmedAuthRequired,
    NotThisVendor(String),
    NetworkError(String),
    Authenticating,
    Authenticated,
    AuthFailed(String),
    AuthError(String),
}

impl DetectorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotThisVendor(_)
                | Self::NetworkError(_)
                | Self::Authenticated
                | Self::AuthFailed(_)
                | Self::AuthError(_)
        )
    }
}

/// Classify an unauthenticated probe reply.
pub fn classify_probe(
    probe: &ProbeResponse,
    vendor: Vendor,
    signatures: &[&str],
    is_auth_challenge: bool,
) -> DetectorState {
    match probe.status {
        401 | 403 => DetectorState::VendorConfirmedAuthRequired,
        200..=299 if matches_signature(&probe.body, signatures) => {
            DetectorState::VendorConfirmedNoAuth
        }
        200..=299 => DetectorState::NotThisVendor(format!(
            "Device responds but is not a {} device",
            vendor.display_name()
        )),
        404 => DetectorState::NotThisVendor(format!(
            "{} endpoint not found",
            vendor.display_name()
        )),
        _ if is_auth_challenge => DetectorState::VendorConfirmedAuthRequired,
        status => DetectorState::NetworkError(format!(
            "Network error: unexpected HTTP status {status}"
        )),
    }
}

/// Detection state machine for a single adapter.
pub struct CompatibilityDetector<'a> {
    adapter: &'a dyn CameraAdapter,
    state: DetectorState,
}

impl<'a> CompatibilityDetector<'a> {
    pub fn new(adapter: &'a dyn CameraAdapter) -> Self {
        Self {
            adapter,
            state: DetectorState::Unprobed,
        }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    fn transition(&mut self, next: DetectorState) {
        trace!(
            vendor = %self.adapter.vendor(),
            from = ?self.state,
            to = ?next,
            "detector transition"
        );
        self.state = next;
    }

    /// Probe, then authenticate when the vendor asks for it (or when a
    /// password was supplied for an open endpoint).
    pub async fn run(&mut self, has_password: bool) -> CompatibilityResult {
        let vendor = self.adapter.vendor();

        self.transition(DetectorState::Probing);
        let next = match self.adapter.probe().await {
            Ok(probe) => classify_probe(
                &probe,
                vendor,
                self.adapter.signatures(),
                self.adapter.is_auth_challenge(&probe.body),
            ),
            Err(e) => DetectorState::NetworkError(e.to_string()),
        };
        self.transition(next);

        match self.state.clone() {
            DetectorState::VendorConfirmedAuthRequired => self.authenticate(vendor, true).await,
            DetectorState::VendorConfirmedNoAuth if has_password => {
                self.authenticate(vendor, false).await
            }
            DetectorState::VendorConfirmedNoAuth => {
                CompatibilityResult::compatible(vendor, false, None)
            }
            DetectorState::NotThisVendor(message) | DetectorState::NetworkError(message) => {
                CompatibilityResult::incompatible(message)
            }
            other => CompatibilityResult::incompatible(format!(
                "Detector stopped in unexpected state {other:?}"
            )),
        }
    }

    async fn authenticate(&mut self, vendor: Vendor, requires_auth: bool) -> CompatibilityResult {
        self.transition(DetectorState::Authenticating);
        match self.adapter.authenticate().await {
            Ok(auth) if auth.authenticated => {
                self.transition(DetectorState::Authenticated);
                CompatibilityResult::compatible(vendor, requires_auth, Some(auth.message))
            }
            Ok(auth) => {
                self.transition(DetectorState::AuthFailed(auth.message.clone()));
                CompatibilityResult::auth_failed(vendor, auth.message)
            }
            // The authenticated body was not this vendor's after all.
            Err(Error::ProtocolMismatch { message }) => {
                self.transition(DetectorState::NotThisVendor(message.clone()));
                CompatibilityResult::incompatible(message)
            }
            Err(e) => {
                let message = format!("Authentication error: {e}");
                self.transition(DetectorState::AuthError(message.clone()));
                CompatibilityResult::auth_failed(vendor, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGS: &[&str] = &["www.hikvision.com"];

    fn probe(status: u16, body: &str) -> ProbeResponse {
        ProbeResponse {
            status,
            body: body.into(),
        }
    }

    #[test]
    fn auth_statuses_confirm_vendor() {
        for status in [401, 403] {
            assert_eq!(
                classify_probe(&probe(status, ""), Vendor::Hikvision, SIGS, false),
                DetectorState::VendorConfirmedAuthRequired
            );
        }
    }

    #[test]
    fn ok_without_signature_is_another_device() {
        let state = classify_probe(&probe(200, "<html/>"), Vendor::Hikvision, SIGS, false);
        assert_eq!(
            state,
            DetectorState::NotThisVendor("Device responds but is not a Hikvision device".into())
        );
        let state = classify_probe(
            &probe(200, r#"<DeviceInfo xmlns="http://www.hikvision.com/ver20/XMLSchema">"#),
            Vendor::Hikvision,
            SIGS,
            false,
        );
        assert_eq!(state, DetectorState::VendorConfirmedNoAuth);
    }

    #[test]
    fn not_found_and_server_errors() {
        assert_eq!(
            classify_probe(&probe(404, ""), Vendor::Dahua, SIGS, false),
            DetectorState::NotThisVendor("Dahua endpoint not found".into())
        );
        assert!(matches!(
            classify_probe(&probe(500, ""), Vendor::Dahua, SIGS, false),
            DetectorState::NetworkError(_)
        ));
    }

    #[test]
    fn fault_body_can_be_an_auth_challenge() {
        assert_eq!(
            classify_probe(&probe(400, "NotAuthorized"), Vendor::Onvif, SIGS, true),
            DetectorState::VendorConfirmedAuthRequired
        );
    }

    #[test]
    fn terminal_states() {
        assert!(DetectorState::Authenticated.is_terminal());
        assert!(!DetectorState::VendorConfirmedAuthRequired.is_terminal());
    }
}
