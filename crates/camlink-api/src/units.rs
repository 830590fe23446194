// ── Unit conversions ──
//
// Subnet mask / prefix length, frame rate, and bit rate formatting shared
// by every vendor. Inputs come straight off the wire, so every function
// tolerates junk and falls back rather than failing.

use std::net::Ipv4Addr;

/// Prefix assumed when a mask cannot be interpreted.
pub const DEFAULT_PREFIX_LENGTH: u8 = 24;

/// Convert a dotted mask (or a bare prefix `0..=32`) to a prefix length.
///
/// Non-contiguous or unparseable masks yield `/24`.
pub fn mask_to_prefix_length(mask: &str) -> u8 {
    let mask = mask.trim().trim_start_matches('/');
    if let Ok(prefix) = mask.parse::<u8>() {
        if prefix <= 32 {
            return prefix;
        }
        return DEFAULT_PREFIX_LENGTH;
    }

    let Ok(addr) = mask.parse::<Ipv4Addr>() else {
        return DEFAULT_PREFIX_LENGTH;
    };
    let bits = u32::from(addr);
    let ones = bits.leading_ones();
    // Every set bit must sit to the left of every clear bit.
    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return DEFAULT_PREFIX_LENGTH;
    }
    u8::try_from(ones).unwrap_or(DEFAULT_PREFIX_LENGTH)
}

/// Convert a prefix length to a dotted mask. Values above 32 clamp to 32.
pub fn prefix_length_to_mask(prefix: u8) -> String {
    let prefix = u32::from(prefix.min(32));
    let bits = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    Ipv4Addr::from(bits).to_string()
}

/// Normalize a frame rate to `"<n> fps"`.
///
/// Integers above 100 are hundredths of a frame per second (`2500` is
/// 25 fps). Values that already carry a unit are returned as-is.
pub fn format_frame_rate(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_alphabetic) {
        return trimmed.to_owned();
    }
    if let Ok(value) = trimmed.parse::<u64>() {
        if value > 100 {
            return format!("{} fps", trim_float(hundredths(value)));
        }
        return format!("{value} fps");
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => format!("{} fps", trim_float(value)),
        _ => trimmed.to_owned(),
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn hundredths(value: u64) -> f64 {
    value as f64 / 100.0
}

/// Format bits per second for display, suffixed with the rate control
/// mode when known (`"4.1 Mbps (VBR)"`).
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn format_bit_rate(bits_per_second: u64, quality_control: Option<&str>) -> String {
    let base = if bits_per_second >= 1_000_000 {
        format!("{:.1} Mbps", bits_per_second as f64 / 1_000_000.0)
    } else if bits_per_second >= 1_000 {
        format!("{:.0} kbps", bits_per_second as f64 / 1_000.0)
    } else {
        format!("{bits_per_second} bps")
    };
    match quality_control.map(str::trim).filter(|q| !q.is_empty()) {
        Some(mode) => format!("{base} ({})", mode.to_ascii_uppercase()),
        None => base,
    }
}

/// `25.00` -> `25`, `29.970` -> `29.97`.
fn trim_float(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_round_trips_for_every_length() {
        for prefix in 0..=32u8 {
            let mask = prefix_length_to_mask(prefix);
            assert_eq!(mask_to_prefix_length(&mask), prefix, "mask {mask}");
        }
    }

    #[test]
    fn common_masks() {
        assert_eq!(mask_to_prefix_length("255.255.255.0"), 24);
        assert_eq!(mask_to_prefix_length("255.255.0.0"), 16);
        assert_eq!(mask_to_prefix_length("255.255.255.252"), 30);
        assert_eq!(prefix_length_to_mask(20), "255.255.240.0");
    }

    #[test]
    fn bad_masks_fall_back_to_24() {
        assert_eq!(mask_to_prefix_length(""), 24);
        assert_eq!(mask_to_prefix_length("not-a-mask"), 24);
        assert_eq!(mask_to_prefix_length("255.0.255.0"), 24);
        assert_eq!(mask_to_prefix_length("64"), 24);
    }

    #[test]
    fn bare_prefix_is_accepted() {
        assert_eq!(mask_to_prefix_length("16"), 16);
        assert_eq!(mask_to_prefix_length("/28"), 28);
    }

    #[test]
    fn frame_rate_conversions() {
        assert_eq!(format_frame_rate("2500"), "25 fps");
        assert_eq!(format_frame_rate("25"), "25 fps");
        assert_eq!(format_frame_rate("100"), "100 fps");
        assert_eq!(format_frame_rate("2997"), "29.97 fps");
        assert_eq!(format_frame_rate("12.5"), "12.5 fps");
        assert_eq!(format_frame_rate("30 fps"), "30 fps");
        assert_eq!(format_frame_rate(" 15fps "), "15fps");
    }

    #[test]
    fn bit_rate_scales() {
        assert_eq!(format_bit_rate(4_096_000, None), "4.1 Mbps");
        assert_eq!(format_bit_rate(512_000, Some("vbr")), "512 kbps (VBR)");
        assert_eq!(format_bit_rate(800, Some("")), "800 bps");
    }
}
