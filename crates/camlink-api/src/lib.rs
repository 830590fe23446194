// camlink-api: async adapters for IP camera control protocols
// (Axis VAPIX, Hikvision ISAPI, Dahua CGI, ONVIF SOAP).

pub mod adapter;
pub mod apply;
pub mod auth;
pub mod error;
pub mod fields;
pub mod transport;
pub mod types;
pub mod units;
pub mod vendor;
pub mod vendors;
pub mod wire;

pub use adapter::{CameraAdapter, Configuration, Connection, Operation};
pub use auth::{AuthMode, ConnectionDescriptor};
pub use error::Error;
pub use fields::{FieldBag, FieldChange, FieldValue};
pub use transport::TransportConfig;
pub use types::{
    ApplyOutcome, AuthResult, NetworkConfig, NtpConfig, ProbeResponse, SecondaryStep,
};
pub use vendor::Vendor;
pub use vendors::{AxisAdapter, DahuaAdapter, HikvisionAdapter, OnvifAdapter};
