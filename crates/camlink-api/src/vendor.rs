// ── Vendor identity ──
//
// The closed set of camera dialects this crate speaks. The enum is the
// registry key in `camlink-core` and the tag a descriptor carries once
// detection has confirmed the device.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Vendor {
    /// VAPIX JSON-RPC over `/axis-cgi`.
    Axis,
    /// ISAPI XML over `/ISAPI`.
    Hikvision,
    /// CGI key/value over `/cgi-bin`.
    Dahua,
    /// ONVIF SOAP 1.2 over `/onvif`.
    Onvif,
}

impl Vendor {
    /// Probe order used when the caller has no preference.
    pub const DEFAULT_ORDER: [Vendor; 4] = [
        Vendor::Axis,
        Vendor::Hikvision,
        Vendor::Dahua,
        Vendor::Onvif,
    ];

    /// Human-facing brand name, also the manufacturer fallback.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Axis => "Axis",
            Self::Hikvision => "Hikvision",
            Self::Dahua => "Dahua",
            Self::Onvif => "ONVIF",
        }
    }
}
