// ── Canonical device record ──
//
// Vendor-neutral view of one camera. Filled section by section by the
// normalizer; any section may be missing, so every field is optional.

use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};

use camlink_api::Vendor;

/// Identity of the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub serial: Option<String>,
    pub mac: Option<String>,
}

/// Current IPv4 settings, plus the address the caller intends to assign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkState {
    pub current_ip: Option<String>,
    pub target_ip: Option<String>,
    pub subnet_mask: Option<String>,
    pub prefix_length: Option<u8>,
    pub gateway: Option<String>,
    pub dns1: Option<String>,
    pub dns2: Option<String>,
    pub dhcp: Option<bool>,
}

/// Main-stream encoder settings and RTSP endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoState {
    pub codec: Option<String>,
    pub resolution: Option<String>,
    pub frame_rate: Option<String>,
    pub bit_rate: Option<String>,
    pub quality_control: Option<String>,
    pub main_stream_url: Option<String>,
    pub sub_stream_url: Option<String>,
}

/// Everything the engine knows about one camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalDevice {
    pub vendor: Vendor,
    pub identity: Identity,
    pub network: NetworkState,
    pub video: VideoState,
}

impl CanonicalDevice {
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            identity: Identity::default(),
            network: NetworkState::default(),
            video: VideoState::default(),
        }
    }

    /// Record the address the next network apply should assign.
    pub fn set_target_ip(&mut self, ip: impl Into<String>) {
        self.network.target_ip = Some(ip.into());
    }
}

/// The three concurrently loaded sections of a device-info load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Section {
    Device,
    Network,
    Video,
}

/// A section that failed to load, with the adapter's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionError {
    pub section: Section,
    pub message: String,
}

/// Result of [`ProtocolManager::load_device_info`](crate::ProtocolManager::load_device_info).
///
/// A load succeeds when at least one section did; the record then holds
/// whatever was gathered, and `section_errors` says what was not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfoReport {
    pub success: bool,
    pub device: CanonicalDevice,
    pub sections_loaded: usize,
    pub section_errors: Vec<SectionError>,
}

impl DeviceInfoReport {
    /// Whether some, but not all, sections loaded.
    pub fn is_partial(&self) -> bool {
        self.success && !self.section_errors.is_empty()
    }
}
