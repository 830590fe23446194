// ── Adapter capability traits ──
//
// A vendor adapter implements three capability sets: connection (probe
// and authenticate), configuration (read sections, apply settings), and
// operation (stream URLs, reboot). `CameraAdapter` is the union the
// engine holds behind a `Box<dyn CameraAdapter>`.

use async_trait::async_trait;

use crate::error::Error;
use crate::fields::FieldBag;
use crate::types::{ApplyOutcome, AuthResult, NetworkConfig, NtpConfig, ProbeResponse};
use crate::vendor::Vendor;

#[async_trait]
pub trait Connection: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Case-insensitive substrings that identify this vendor's responses.
    /// A leading `^` anchors the signature to a `key=value` line.
    fn signatures(&self) -> &'static [&'static str];

    /// Whether a non-401 probe body is really an auth challenge (e.g. an
    /// ONVIF `NotAuthorized` fault on HTTP 400).
    fn is_auth_challenge(&self, _body: &str) -> bool {
        false
    }

    /// Unauthenticated request to the vendor's identity endpoint.
    async fn probe(&self) -> Result<ProbeResponse, Error>;

    /// Authenticated request to the same endpoint. A positive status alone
    /// is not enough: the body must match [`Connection::signatures`], or
    /// `Error::ProtocolMismatch` is returned.
    async fn authenticate(&self) -> Result<AuthResult, Error>;
}

#[async_trait]
pub trait Configuration: Send + Sync {
    async fn device_info(&self) -> Result<FieldBag, Error>;
    async fn network_info(&self) -> Result<FieldBag, Error>;
    async fn video_info(&self) -> Result<FieldBag, Error>;
    async fn ntp_info(&self) -> Result<FieldBag, Error>;

    /// Read current settings, write only what differs, then run any
    /// follow-up the device needs.
    async fn set_network_configuration(&self, desired: &NetworkConfig)
    -> Result<ApplyOutcome, Error>;
    async fn set_ntp_configuration(&self, desired: &NtpConfig) -> Result<ApplyOutcome, Error>;
}

#[async_trait]
pub trait Operation: Send + Sync {
    fn main_stream_url(&self, channel: u32) -> String;
    fn sub_stream_url(&self, channel: u32) -> String;
    async fn reboot(&self) -> Result<(), Error>;
}

/// Everything the engine needs from one vendor.
pub trait CameraAdapter: Connection + Configuration + Operation {}

impl<T: Connection + Configuration + Operation> CameraAdapter for T {}

/// Case-insensitive signature match. `^sig` must open a plain `key=value`
/// line (no markup or quotes); any other signature may appear anywhere.
pub fn matches_signature(body: &str, signatures: &[&str]) -> bool {
    let body = body.to_ascii_lowercase();
    signatures.iter().any(|sig| {
        let sig = sig.to_ascii_lowercase();
        match sig.strip_prefix('^') {
            Some(prefix) => body.lines().map(str::trim).any(|line| {
                line.starts_with(prefix) && !line.contains(['<', '>', '"'])
            }),
            None => body.contains(&sig),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_match_ignores_case() {
        assert!(matches_signature(
            r#"<DeviceInfo xmlns="http://www.HIKVISION.com/ver20/XMLSchema">"#,
            &["www.hikvision.com"]
        ));
        assert!(!matches_signature("<html>router</html>", &["www.hikvision.com"]));
    }

    #[test]
    fn anchored_signature_needs_line_start() {
        let sigs = &["^deviceType=", "^type=", "^table."];
        assert!(matches_signature("deviceType=DH-IPC-HFW4431R-Z\r\n", sigs));
        assert!(matches_signature("type=IPC-HFW2431S\r\n", sigs));
        assert!(matches_signature("table.Network.eth0.IPAddress=10.0.0.8\n", sigs));
        assert!(!matches_signature(
            "<html>\n  <form><input type=\"text\" name=\"devicetype=\"></form>\n</html>",
            sigs
        ));
        assert!(!matches_signature("<p>see the table.</p>", sigs));
        assert!(!matches_signature("<input\n    type=\"password\"\n/>", sigs));
    }
}
