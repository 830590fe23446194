// ── Engine configuration ──
//
// Timeouts and probe order for the protocol manager. Built by the CLI
// (or any other caller) from its own config layer; core never reads files.

use std::time::Duration;

use camlink_api::{TransportConfig, Vendor};

/// Tuning for [`ProtocolManager`](crate::ProtocolManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound for probe + authenticate against one vendor.
    pub probe_timeout: Duration,
    /// Upper bound for a device-info load or a configuration apply.
    pub operation_timeout: Duration,
    /// Vendors tried when no preference is given, in order.
    pub vendor_order: Vec<Vendor>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
    /// Channel used for derived RTSP URLs.
    pub stream_channel: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(15),
            operation_timeout: Duration::from_secs(30),
            vendor_order: Vendor::DEFAULT_ORDER.to_vec(),
            request_timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
            stream_channel: 1,
        }
    }
}

impl EngineConfig {
    /// HTTP settings handed to every adapter the manager creates.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.request_timeout,
            accept_invalid_certs: self.accept_invalid_certs,
            ..TransportConfig::default()
        }
    }
}
