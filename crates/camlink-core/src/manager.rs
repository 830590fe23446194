// ── Protocol manager ──
//
// Entry point for callers. Scans vendors in order until one claims the
// device, loads the three info sections concurrently into a canonical
// record, and runs configuration applies under a deadline and the
// caller's cancellation token.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use camlink_api::{
    ApplyOutcome, CameraAdapter, ConnectionDescriptor, FieldBag, NetworkConfig, NtpConfig, Vendor,
};

use crate::bounded::{Interrupted, run_bounded};
use crate::config::EngineConfig;
use crate::detector::CompatibilityDetector;
use crate::error::CoreError;
use crate::model::{CanonicalDevice, DeviceInfoReport, Section, SectionError};
use crate::normalize;
use crate::registry::AdapterRegistry;
use crate::result::{CompatibilityResult, OperationResult};

/// RTSP endpoints derived from the host and vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamUrls {
    pub vendor: Vendor,
    pub channel: u32,
    pub main: String,
    pub sub: String,
}

/// Orchestrates adapters for one caller. Holds no per-device state, so a
/// single manager can serve any number of concurrent checks.
#[derive(Debug, Clone)]
pub struct ProtocolManager {
    registry: Arc<AdapterRegistry>,
    config: EngineConfig,
}

impl Default for ProtocolManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ProtocolManager {
    /// Manager over the built-in vendor registry.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, AdapterRegistry::shared())
    }

    pub fn with_registry(config: EngineConfig, registry: Arc<AdapterRegistry>) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Vendors in the order a scan tries them: `preferred` first, then the
    /// configured order, then anything else registered.
    pub fn probe_order(&self, preferred: Option<Vendor>) -> Vec<Vendor> {
        let mut order: Vec<Vendor> = Vec::new();
        let candidates = preferred
            .into_iter()
            .chain(self.config.vendor_order.iter().copied())
            .chain(self.registry.vendors());
        for vendor in candidates {
            if self.registry.contains(vendor) && !order.contains(&vendor) {
                order.push(vendor);
            }
        }
        order
    }

    fn adapter(
        &self,
        vendor: Vendor,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn CameraAdapter>, CoreError> {
        self.registry
            .create(vendor, descriptor, &self.config.transport())
            .ok_or(CoreError::AdapterNotRegistered(vendor))?
            .map_err(CoreError::from)
    }

    fn tagged_adapter(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn CameraAdapter>, CoreError> {
        let vendor = descriptor.vendor().ok_or(CoreError::VendorUnknown)?;
        self.adapter(vendor, descriptor)
    }

    // ── Detection ────────────────────────────────────────────────────

    /// Try each vendor in [`probe_order`](Self::probe_order) and stop at
    /// the first that recognises the device.
    ///
    /// Unreachable or foreign endpoints only rule out the vendor at hand;
    /// only cancellation aborts the scan. When nothing matches, the result
    /// is `Ok` with `is_compatible == false`.
    pub async fn check_compatibility(
        &self,
        descriptor: &ConnectionDescriptor,
        preferred: Option<Vendor>,
        cancel: &CancellationToken,
    ) -> Result<CompatibilityResult, CoreError> {
        let has_password = descriptor.has_password();

        for vendor in self.probe_order(preferred) {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let adapter = match self.adapter(vendor, descriptor) {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!(%vendor, error = %e, "could not create adapter, skipping");
                    continue;
                }
            };

            debug!(%vendor, host = descriptor.host(), "probing");
            let detect = async {
                let mut detector = CompatibilityDetector::new(adapter.as_ref());
                detector.run(has_password).await
            };
            match run_bounded(cancel, self.config.probe_timeout, detect).await {
                Err(Interrupted::Cancelled) => return Err(CoreError::Cancelled),
                Err(Interrupted::TimedOut) => {
                    debug!(%vendor, "probe timed out");
                }
                Ok(result) if result.is_compatible => {
                    info!(
                        %vendor,
                        authenticated = result.is_authenticated,
                        "compatible protocol found"
                    );
                    return Ok(result);
                }
                Ok(result) => {
                    debug!(%vendor, message = %result.message, "not this vendor");
                }
            }
        }

        info!(host = descriptor.host(), "no compatible protocol found");
        Ok(CompatibilityResult::no_compatible_protocol())
    }

    // ── Device info ──────────────────────────────────────────────────

    /// Load identity, network and video sections for a vendor-tagged
    /// descriptor.
    ///
    /// Stream URLs are derived before any request. The three reads run
    /// concurrently, each under its own deadline; a failed or timed-out
    /// section is logged and recorded, and the load succeeds when at least
    /// one section arrived.
    pub async fn load_device_info(
        &self,
        descriptor: &ConnectionDescriptor,
        cancel: &CancellationToken,
    ) -> Result<DeviceInfoReport, CoreError> {
        let adapter = self.tagged_adapter(descriptor)?;
        let vendor = adapter.vendor();
        let channel = self.config.stream_channel;

        let mut device = CanonicalDevice::new(vendor);
        device.video.main_stream_url = Some(adapter.main_stream_url(channel));
        device.video.sub_stream_url = Some(adapter.sub_stream_url(channel));

        let limit = self.config.operation_timeout;
        let (device_res, network_res, video_res) = tokio::join!(
            read_section(cancel, limit, adapter.device_info()),
            read_section(cancel, limit, adapter.network_info()),
            read_section(cancel, limit, adapter.video_info()),
        );
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let mut sections_loaded = 0;
        let mut section_errors = Vec::new();
        for (section, result) in [
            (Section::Device, device_res),
            (Section::Network, network_res),
            (Section::Video, video_res),
        ] {
            match result {
                Ok(bag) => {
                    match section {
                        Section::Device => normalize::apply_device_info(&mut device, &bag),
                        Section::Network => normalize::apply_network_info(&mut device, &bag),
                        Section::Video => normalize::apply_video_info(&mut device, &bag),
                    }
                    sections_loaded += 1;
                }
                Err(e) => {
                    warn!(%vendor, %section, error = %e, "section load failed");
                    section_errors.push(SectionError {
                        section,
                        message: e.to_string(),
                    });
                }
            }
        }

        debug!(%vendor, sections_loaded, "device info loaded");
        Ok(DeviceInfoReport {
            success: sections_loaded > 0,
            device,
            sections_loaded,
            section_errors,
        })
    }

    /// Detect the vendor, then load device info with it.
    ///
    /// Fails with [`CoreError::NoCompatibleProtocol`] when no vendor claims
    /// the device and with an authentication error when the credentials
    /// were refused.
    pub async fn check_and_load(
        &self,
        descriptor: &ConnectionDescriptor,
        preferred: Option<Vendor>,
        cancel: &CancellationToken,
    ) -> Result<(CompatibilityResult, DeviceInfoReport), CoreError> {
        let compatibility = self
            .check_compatibility(descriptor, preferred, cancel)
            .await?;
        let Some(vendor) = compatibility.detected_vendor.filter(|_| compatibility.is_compatible)
        else {
            return Err(CoreError::NoCompatibleProtocol {
                host: descriptor.host().to_owned(),
            });
        };
        if !compatibility.is_authenticated {
            return Err(CoreError::Adapter(camlink_api::Error::Authentication {
                message: compatibility
                    .auth_message
                    .clone()
                    .unwrap_or_else(|| "credentials rejected".into()),
            }));
        }

        let tagged = descriptor.clone().with_vendor(Some(vendor));
        let report = self.load_device_info(&tagged, cancel).await?;
        Ok((compatibility, report))
    }

    /// RTSP URLs for a vendor-tagged descriptor. No request is made.
    pub fn stream_urls(
        &self,
        descriptor: &ConnectionDescriptor,
        channel: Option<u32>,
    ) -> Result<StreamUrls, CoreError> {
        let adapter = self.tagged_adapter(descriptor)?;
        let channel = channel.unwrap_or(self.config.stream_channel);
        Ok(StreamUrls {
            vendor: adapter.vendor(),
            channel,
            main: adapter.main_stream_url(channel),
            sub: adapter.sub_stream_url(channel),
        })
    }

    // ── Configuration apply ──────────────────────────────────────────

    /// Apply static IPv4 settings. Only fields that differ are written.
    pub async fn apply_network_config(
        &self,
        descriptor: &ConnectionDescriptor,
        desired: &NetworkConfig,
        cancel: &CancellationToken,
    ) -> OperationResult<ApplyOutcome> {
        if let Err(message) = desired.validate() {
            return OperationResult::failed(
                CoreError::InvalidConfig { message }.to_string(),
            );
        }
        let adapter = match self.tagged_adapter(descriptor) {
            Ok(adapter) => adapter,
            Err(e) => return OperationResult::failed(e.to_string()),
        };
        info!(
            vendor = %adapter.vendor(),
            ip = %desired.ip_address,
            "applying network configuration"
        );
        let apply = adapter.set_network_configuration(desired);
        self.finish_apply(cancel, apply).await
    }

    /// Apply NTP server, enable flag and timezone.
    pub async fn apply_ntp_config(
        &self,
        descriptor: &ConnectionDescriptor,
        desired: &NtpConfig,
        cancel: &CancellationToken,
    ) -> OperationResult<ApplyOutcome> {
        if !desired.is_valid() {
            return OperationResult::failed(
                CoreError::InvalidConfig {
                    message: "NTP server is required".into(),
                }
                .to_string(),
            );
        }
        let adapter = match self.tagged_adapter(descriptor) {
            Ok(adapter) => adapter,
            Err(e) => return OperationResult::failed(e.to_string()),
        };
        info!(
            vendor = %adapter.vendor(),
            server = %desired.server,
            "applying NTP configuration"
        );
        let apply = adapter.set_ntp_configuration(desired);
        self.finish_apply(cancel, apply).await
    }

    async fn finish_apply<F>(&self, cancel: &CancellationToken, apply: F) -> OperationResult<ApplyOutcome>
    where
        F: Future<Output = Result<ApplyOutcome, camlink_api::Error>>,
    {
        let result = match bounded(cancel, self.config.operation_timeout, apply).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(e) => Err(e),
        };
        match &result {
            Ok(outcome) => info!(changed = outcome.changed, "{}", outcome.message),
            Err(e) => warn!(error = %e, "configuration apply failed"),
        }
        result.into()
    }
}

/// One info read under its own deadline. A timeout fails only this section.
async fn read_section<F>(
    cancel: &CancellationToken,
    limit: Duration,
    read: F,
) -> Result<FieldBag, CoreError>
where
    F: Future<Output = Result<FieldBag, camlink_api::Error>>,
{
    bounded(cancel, limit, read).await?.map_err(CoreError::from)
}

/// [`run_bounded`] with interruptions mapped to `CoreError`.
async fn bounded<F: Future>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<F::Output, CoreError> {
    run_bounded(cancel, limit, fut).await.map_err(|i| match i {
        Interrupted::Cancelled => CoreError::Cancelled,
        Interrupted::TimedOut => CoreError::Timeout {
            timeout_secs: limit.as_secs(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(vendors: &[Vendor]) -> Arc<AdapterRegistry> {
        let builtin = AdapterRegistry::builtin();
        let mut builder = AdapterRegistry::builder();
        for &vendor in vendors {
            let source = builtin.clone();
            builder = builder.register(vendor, move |d, c| {
                source
                    .create(vendor, d, c)
                    .unwrap_or(Err(camlink_api::Error::InvalidConfiguration(String::new())))
            });
        }
        Arc::new(builder.build())
    }

    #[test]
    fn default_probe_order() {
        let manager = ProtocolManager::default();
        assert_eq!(
            manager.probe_order(None),
            vec![Vendor::Axis, Vendor::Hikvision, Vendor::Dahua, Vendor::Onvif]
        );
    }

    #[test]
    fn preferred_vendor_goes_first() {
        let manager = ProtocolManager::default();
        assert_eq!(
            manager.probe_order(Some(Vendor::Dahua)),
            vec![Vendor::Dahua, Vendor::Axis, Vendor::Hikvision, Vendor::Onvif]
        );
    }

    #[test]
    fn unregistered_vendors_are_skipped() {
        let manager = ProtocolManager::with_registry(
            EngineConfig::default(),
            registry_with(&[Vendor::Onvif, Vendor::Hikvision]),
        );
        assert_eq!(
            manager.probe_order(Some(Vendor::Axis)),
            vec![Vendor::Hikvision, Vendor::Onvif]
        );
    }

    #[test]
    fn stream_urls_need_a_vendor_tag() {
        let manager = ProtocolManager::default();
        let untagged = ConnectionDescriptor::new("10.0.0.8", 80);
        assert!(matches!(
            manager.stream_urls(&untagged, None),
            Err(CoreError::VendorUnknown)
        ));

        let tagged = untagged.with_vendor(Some(Vendor::Hikvision));
        let urls = manager.stream_urls(&tagged, Some(2)).ok();
        assert_eq!(
            urls.map(|u| u.main),
            Some("rtsp://10.0.0.8:554/Streaming/Channels/201".to_owned())
        );
    }
}
