// ── Adapter registry ──
//
// Maps each `Vendor` to a constructor for its adapter. The built-in map is
// created once and shared read-only; tests and embedders build their own
// through `AdapterRegistry::builder()`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use camlink_api::{
    AxisAdapter, CameraAdapter, ConnectionDescriptor, DahuaAdapter, HikvisionAdapter,
    OnvifAdapter, TransportConfig, Vendor,
};

/// Builds a fresh adapter (with its own transport) for one descriptor.
pub type AdapterFactory = Arc<
    dyn Fn(&ConnectionDescriptor, &TransportConfig) -> Result<Box<dyn CameraAdapter>, camlink_api::Error>
        + Send
        + Sync,
>;

static BUILTIN: LazyLock<Arc<AdapterRegistry>> =
    LazyLock::new(|| Arc::new(AdapterRegistry::builtin()));

/// Immutable vendor-to-constructor map.
#[derive(Clone)]
pub struct AdapterRegistry {
    factories: BTreeMap<Vendor, AdapterFactory>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("vendors", &self.vendors())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// Registry with the four protocol families this crate ships.
    pub fn builtin() -> Self {
        Self::builder()
            .register(Vendor::Axis, |d, c| {
                Ok(Box::new(AxisAdapter::new(d, c)?) as Box<dyn CameraAdapter>)
            })
            .register(Vendor::Hikvision, |d, c| {
                Ok(Box::new(HikvisionAdapter::new(d, c)?) as Box<dyn CameraAdapter>)
            })
            .register(Vendor::Dahua, |d, c| {
                Ok(Box::new(DahuaAdapter::new(d, c)?) as Box<dyn CameraAdapter>)
            })
            .register(Vendor::Onvif, |d, c| {
                Ok(Box::new(OnvifAdapter::new(d, c)?) as Box<dyn CameraAdapter>)
            })
            .build()
    }

    /// Process-wide shared instance of [`AdapterRegistry::builtin`].
    pub fn shared() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Construct an adapter, or `None` when the vendor is not registered.
    pub fn create(
        &self,
        vendor: Vendor,
        descriptor: &ConnectionDescriptor,
        config: &TransportConfig,
    ) -> Option<Result<Box<dyn CameraAdapter>, camlink_api::Error>> {
        self.factories
            .get(&vendor)
            .map(|factory| factory(descriptor, config))
    }

    pub fn contains(&self, vendor: Vendor) -> bool {
        self.factories.contains_key(&vendor)
    }

    /// Registered vendors, in `Vendor` order.
    pub fn vendors(&self) -> Vec<Vendor> {
        self.factories.keys().copied().collect()
    }
}

#[derive(Default)]
pub struct AdapterRegistryBuilder {
    factories: BTreeMap<Vendor, AdapterFactory>,
}

impl AdapterRegistryBuilder {
    /// Register (or replace) the constructor for `vendor`.
    pub fn register<F>(mut self, vendor: Vendor, factory: F) -> Self
    where
        F: Fn(&ConnectionDescriptor, &TransportConfig) -> Result<Box<dyn CameraAdapter>, camlink_api::Error>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(vendor, Arc::new(factory));
        self
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            factories: self.factories,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use camlink_api::Connection;

    use super::*;

    #[test]
    fn builtin_registers_every_vendor() {
        let registry = AdapterRegistry::shared();
        assert_eq!(registry.vendors(), Vendor::DEFAULT_ORDER.to_vec());

        let descriptor = ConnectionDescriptor::new("192.0.2.10", 80);
        let adapter = registry
            .create(Vendor::Dahua, &descriptor, &TransportConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(adapter.vendor(), Vendor::Dahua);
    }

    #[test]
    fn custom_registry_only_knows_its_vendors() {
        let registry = AdapterRegistry::builder()
            .register(Vendor::Onvif, |d, c| {
                Ok(Box::new(OnvifAdapter::new(d, c)?) as Box<dyn CameraAdapter>)
            })
            .build();
        assert!(registry.contains(Vendor::Onvif));
        assert!(!registry.contains(Vendor::Axis));
        assert!(
            registry
                .create(
                    Vendor::Axis,
                    &ConnectionDescriptor::new("192.0.2.10", 80),
                    &TransportConfig::default()
                )
                .is_none()
        );
    }
}
