//! Detection and orchestration engine between `camlink-api` and its
//! consumers (the CLI, or any embedding application).
//!
//! - **[`ProtocolManager`]**: the entry point.
//!   [`check_compatibility()`](ProtocolManager::check_compatibility) scans
//!   vendors in order until one claims the device,
//!   [`load_device_info()`](ProtocolManager::load_device_info) reads the
//!   identity, network and video sections concurrently, and
//!   [`apply_network_config()`](ProtocolManager::apply_network_config) /
//!   [`apply_ntp_config()`](ProtocolManager::apply_ntp_config) run
//!   idempotent read-diff-write applies. Every call takes a
//!   `CancellationToken`.
//!
//! - **[`AdapterRegistry`]**: immutable `Vendor` to adapter-constructor map,
//!   built once and shared. The only place vendors are wired in.
//!
//! - **[`CompatibilityDetector`]**: per-adapter probe/authenticate state
//!   machine producing a [`CompatibilityResult`].
//!
//! - **Canonical model** ([`model`]): [`CanonicalDevice`] filled section by
//!   section from vendor field bags by [`normalize`].

mod bounded;
pub mod config;
pub mod detector;
pub mod error;
pub mod manager;
pub mod model;
pub mod normalize;
pub mod registry;
pub mod result;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use detector::{CompatibilityDetector, DetectorState};
pub use error::CoreError;
pub use manager::{ProtocolManager, StreamUrls};
pub use model::{
    CanonicalDevice, DeviceInfoReport, Identity, NetworkState, Section, SectionError, VideoState,
};
pub use registry::{AdapterFactory, AdapterRegistry, AdapterRegistryBuilder};
pub use result::{CompatibilityResult, OperationResult};

// Re-export the api types callers need to build requests.
pub use camlink_api::{
    ApplyOutcome, AuthMode, ConnectionDescriptor, FieldChange, NetworkConfig, NtpConfig,
    SecondaryStep, Vendor,
};
