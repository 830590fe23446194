// ── Field-bag to canonical record ──
//
// Each vendor flattens its responses differently; this module owns the
// candidate-key tables that pull canonical fields out of those bags. A
// section only overwrites fields it actually found, so the three sections
// can be applied in any order and a missing one leaves its fields unset.

use camlink_api::fields::{self, FieldBag};
use camlink_api::units;
use camlink_api::vendors::{axis, dahua, onvif};
use camlink_api::Vendor;

use crate::model::CanonicalDevice;

/// Placeholder replaced by the device's default interface name.
const IFACE: &str = "{iface}";

/// Mask spellings shared by every vocabulary, most specific first.
const MASK_FALLBACK: &[&str] = &["mask", "subnetMask", "netmask"];

// ── Vocabularies ───────────────────────────────────────────────────

/// Candidate keys for every canonical field, in resolution order.
struct Vocabulary {
    manufacturer: &'static [&'static str],
    model: &'static [&'static str],
    firmware: &'static [&'static str],
    serial: &'static [&'static str],
    mac: &'static [&'static str],

    ip: &'static [&'static str],
    mask: &'static [&'static str],
    prefix: &'static [&'static str],
    gateway: &'static [&'static str],
    dns1: &'static [&'static str],
    dns2: &'static [&'static str],
    dhcp: &'static [&'static str],

    codec: &'static [&'static str],
    width: &'static [&'static str],
    height: &'static [&'static str],
    resolution: &'static [&'static str],
    frame_rate: &'static [&'static str],
    /// Rate in kbit/s.
    bit_rate: &'static [&'static str],
    /// VBR ceiling in kbit/s, preferred over `bit_rate` in VBR mode.
    vbr_cap: &'static [&'static str],
    quality: &'static [&'static str],
    stream_uri: &'static [&'static str],
}

const AXIS: Vocabulary = Vocabulary {
    manufacturer: &["data.propertyList.Brand"],
    model: &["data.propertyList.ProdNbr", "data.propertyList.ProdFullName"],
    firmware: &["data.propertyList.Version"],
    serial: &["data.propertyList.SerialNumber"],
    mac: &["data.propertyList.SerialNumber"],

    ip: axis::keys::IP,
    mask: &[],
    prefix: axis::keys::PREFIX,
    gateway: axis::keys::GATEWAY,
    dns1: axis::keys::DNS1,
    dns2: axis::keys::DNS2,
    dhcp: axis::keys::MODE,

    codec: &["Image.I0.Stream.Codec", "Image.I0.Appearance.VideoCodec"],
    width: &[],
    height: &[],
    resolution: &["Image.I0.Appearance.Resolution"],
    frame_rate: &["Image.I0.Stream.FPS"],
    bit_rate: &[
        "Image.I0.RateControl.TargetBitrate",
        "Image.I0.RateControl.MaxBitrate",
    ],
    vbr_cap: &["Image.I0.RateControl.MaxBitrate"],
    quality: &["Image.I0.RateControl.Mode"],
    stream_uri: &[],
};

const HIKVISION: Vocabulary = Vocabulary {
    manufacturer: &["manufacturer"],
    model: &["model", "deviceModel"],
    firmware: &["firmwareVersion"],
    serial: &["serialNumber"],
    mac: &["macAddress", "MACAddress"],

    ip: &["ipAddress"],
    mask: &["subnetMask"],
    prefix: &[],
    gateway: &["DefaultGateway.ipAddress"],
    dns1: &["PrimaryDNS.ipAddress"],
    dns2: &["SecondaryDNS.ipAddress"],
    dhcp: &["addressingType"],

    codec: &["Video.videoCodecType"],
    width: &["Video.videoResolutionWidth"],
    height: &["Video.videoResolutionHeight"],
    resolution: &[],
    frame_rate: &["Video.maxFrameRate"],
    bit_rate: &["Video.constantBitRate", "Video.vbrUpperCap"],
    vbr_cap: &["Video.vbrUpperCap"],
    quality: &["Video.videoQualityControlType"],
    stream_uri: &[],
};

const DAHUA: Vocabulary = Vocabulary {
    manufacturer: &["vendor"],
    model: &["deviceType", "type", "updateSerial"],
    firmware: &["version"],
    serial: &["serialNumber", "sn"],
    mac: &["Network.{iface}.PhysicalAddress"],

    ip: &["Network.{iface}.IPAddress"],
    mask: &["Network.{iface}.SubnetMask"],
    prefix: &[],
    gateway: &["Network.{iface}.DefaultGateway"],
    dns1: &["Network.{iface}.DnsServers[0]"],
    dns2: &["Network.{iface}.DnsServers[1]"],
    dhcp: &["Network.{iface}.DhcpEnable"],

    codec: &["Encode[0].MainFormat[0].Video.Compression"],
    width: &["Encode[0].MainFormat[0].Video.Width"],
    height: &["Encode[0].MainFormat[0].Video.Height"],
    resolution: &["Encode[0].MainFormat[0].Video.resolution"],
    frame_rate: &["Encode[0].MainFormat[0].Video.FPS"],
    bit_rate: &["Encode[0].MainFormat[0].Video.BitRate"],
    vbr_cap: &[],
    quality: &["Encode[0].MainFormat[0].Video.BitRateControl"],
    stream_uri: &[],
};

const ONVIF: Vocabulary = Vocabulary {
    manufacturer: &["Manufacturer"],
    model: &["Model"],
    firmware: &["FirmwareVersion"],
    serial: &["SerialNumber"],
    mac: &["NetworkInterfaces.Info.HwAddress"],

    ip: &[onvif::keys::IP, "NetworkInterfaces.IPv4.Config.FromDHCP.Address"],
    mask: &[],
    prefix: &[
        onvif::keys::PREFIX,
        "NetworkInterfaces.IPv4.Config.FromDHCP.PrefixLength",
    ],
    gateway: &[onvif::keys::GATEWAY],
    dns1: &[onvif::keys::DNS1, "DNSInformation.DNSFromDHCP.IPv4Address"],
    dns2: &[onvif::keys::DNS2],
    dhcp: &[onvif::keys::DHCP],

    codec: &["Profiles.VideoEncoderConfiguration.Encoding"],
    width: &["Profiles.VideoEncoderConfiguration.Resolution.Width"],
    height: &["Profiles.VideoEncoderConfiguration.Resolution.Height"],
    resolution: &[],
    frame_rate: &["Profiles.VideoEncoderConfiguration.RateControl.FrameRateLimit"],
    bit_rate: &["Profiles.VideoEncoderConfiguration.RateControl.BitrateLimit"],
    vbr_cap: &[],
    quality: &[],
    stream_uri: &[onvif::keys::STREAM_URI],
};

fn vocabulary(vendor: Vendor) -> &'static Vocabulary {
    match vendor {
        Vendor::Axis => &AXIS,
        Vendor::Hikvision => &HIKVISION,
        Vendor::Dahua => &DAHUA,
        Vendor::Onvif => &ONVIF,
    }
}

// ── Lookup helpers ─────────────────────────────────────────────────

/// Candidate keys with the interface placeholder filled in.
fn expand(candidates: &[&str], bag: &FieldBag) -> Vec<String> {
    if !candidates.iter().any(|c| c.contains(IFACE)) {
        return candidates.iter().map(|c| (*c).to_owned()).collect();
    }
    let iface = dahua::keys::interface(bag);
    candidates.iter().map(|c| c.replace(IFACE, &iface)).collect()
}

fn text(bag: &FieldBag, candidates: &[&str]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let keys = expand(candidates, bag);
    let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    fields::lookup_text(bag, &refs).map(|v| v.trim().to_owned())
}

fn number(bag: &FieldBag, candidates: &[&str]) -> Option<u64> {
    if candidates.is_empty() {
        return None;
    }
    let keys = expand(candidates, bag);
    let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    fields::lookup_u64(bag, &refs)
}

/// Overwrite `slot` only when a value was found.
fn set(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Addressing mode as a DHCP flag. Accepts booleans and mode names.
fn dhcp_flag(raw: &str) -> Option<bool> {
    fields::parse_flag(raw).or_else(|| match raw.trim().to_ascii_lowercase().as_str() {
        "dhcp" | "auto" => Some(true),
        "static" | "manual" | "none" => Some(false),
        _ => None,
    })
}

// ── Sections ───────────────────────────────────────────────────────

/// Apply a device-info bag. The manufacturer falls back to the vendor's
/// display name, since several vendors do not report it.
pub fn apply_device_info(device: &mut CanonicalDevice, bag: &FieldBag) {
    let vocab = vocabulary(device.vendor);
    let identity = &mut device.identity;

    let manufacturer = text(bag, vocab.manufacturer)
        .or_else(|| Some(device.vendor.display_name().to_owned()));
    set(&mut identity.manufacturer, manufacturer);
    set(&mut identity.model, text(bag, vocab.model));
    set(&mut identity.firmware, text(bag, vocab.firmware));
    set(&mut identity.serial, text(bag, vocab.serial));
    if identity.mac.is_none() {
        identity.mac = text(bag, vocab.mac);
    }
}

/// Apply a network-info bag.
///
/// A prefix length is derived from the mask and vice versa, whichever the
/// vendor reports. The MAC address is picked up here too when the device
/// section did not carry one.
pub fn apply_network_info(device: &mut CanonicalDevice, bag: &FieldBag) {
    let vocab = vocabulary(device.vendor);
    let net = &mut device.network;

    set(&mut net.current_ip, text(bag, vocab.ip));
    set(&mut net.gateway, text(bag, vocab.gateway));
    set(&mut net.dns1, text(bag, vocab.dns1));
    set(&mut net.dns2, text(bag, vocab.dns2));
    if let Some(dhcp) = text(bag, vocab.dhcp).as_deref().and_then(dhcp_flag) {
        net.dhcp = Some(dhcp);
    }

    let prefix = number(bag, vocab.prefix).and_then(|p| u8::try_from(p).ok());
    let mask = text(bag, vocab.mask).or_else(|| text(bag, MASK_FALLBACK));
    match (prefix, mask) {
        (Some(prefix), _) => {
            let prefix = prefix.min(32);
            net.prefix_length = Some(prefix);
            net.subnet_mask = Some(units::prefix_length_to_mask(prefix));
        }
        (None, Some(mask)) => {
            net.prefix_length = Some(units::mask_to_prefix_length(&mask));
            net.subnet_mask = Some(mask);
        }
        (None, None) => {}
    }

    if net.target_ip.is_none() {
        net.target_ip.clone_from(&net.current_ip);
    }

    if device.identity.mac.is_none() {
        device.identity.mac = text(bag, vocab.mac);
    }
}

/// Apply a video-info bag. Bit rates arrive in kbit/s from every vendor.
pub fn apply_video_info(device: &mut CanonicalDevice, bag: &FieldBag) {
    let vocab = vocabulary(device.vendor);
    let video = &mut device.video;

    set(&mut video.codec, text(bag, vocab.codec));

    let resolution = match (number(bag, vocab.width), number(bag, vocab.height)) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{w}x{h}")),
        _ => text(bag, vocab.resolution),
    };
    set(&mut video.resolution, resolution);

    set(
        &mut video.frame_rate,
        text(bag, vocab.frame_rate).map(|raw| units::format_frame_rate(&raw)),
    );

    let quality = text(bag, vocab.quality).map(|q| q.to_ascii_uppercase());
    let is_vbr = quality.as_deref() == Some("VBR");
    let kbps = if is_vbr {
        number(bag, vocab.vbr_cap).or_else(|| number(bag, vocab.bit_rate))
    } else {
        number(bag, vocab.bit_rate)
    };
    set(
        &mut video.bit_rate,
        kbps.map(|k| units::format_bit_rate(k.saturating_mul(1000), quality.as_deref())),
    );
    set(&mut video.quality_control, quality);

    // A URI reported by the device beats the one derived from the host.
    set(&mut video.main_stream_url, text(bag, vocab.stream_uri));
}
