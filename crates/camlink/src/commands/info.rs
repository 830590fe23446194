//! Device info handler: identity, network and video in one sheet.

use std::fmt::Write as _;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use camlink_core::{CanonicalDevice, ConnectionDescriptor, DeviceInfoReport, ProtocolManager};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn sheet(device: &CanonicalDevice, color: bool) -> String {
    let id = &device.identity;
    let net = &device.network;
    let video = &device.video;
    let dhcp = net.dhcp.map(|on| if on { "on" } else { "off" }.to_owned());
    let prefix = net.prefix_length.map(|p| format!("/{p}"));
    output::render_sheet(
        &[
            ("Protocol", Some(device.vendor.display_name().to_owned())),
            ("Manufacturer", id.manufacturer.clone()),
            ("Model", id.model.clone()),
            ("Firmware", id.firmware.clone()),
            ("Serial", id.serial.clone()),
            ("MAC", id.mac.clone()),
            ("IP address", net.current_ip.clone()),
            ("Subnet mask", net.subnet_mask.clone()),
            ("Prefix", prefix),
            ("Gateway", net.gateway.clone()),
            ("DNS 1", net.dns1.clone()),
            ("DNS 2", net.dns2.clone()),
            ("DHCP", dhcp),
            ("Codec", video.codec.clone()),
            ("Resolution", video.resolution.clone()),
            ("Frame rate", video.frame_rate.clone()),
            ("Bit rate", video.bit_rate.clone()),
            ("Quality", video.quality_control.clone()),
            ("Main stream", video.main_stream_url.clone()),
            ("Sub stream", video.sub_stream_url.clone()),
        ],
        color,
    )
}

/// `key=value` lines for scripts; absent fields are skipped.
fn plain(device: &CanonicalDevice) -> String {
    let id = &device.identity;
    let net = &device.network;
    let video = &device.video;
    let mut out = format!("vendor={}", device.vendor);
    for (key, value) in [
        ("manufacturer", &id.manufacturer),
        ("model", &id.model),
        ("firmware", &id.firmware),
        ("serial", &id.serial),
        ("mac", &id.mac),
        ("ip", &net.current_ip),
        ("mask", &net.subnet_mask),
        ("gateway", &net.gateway),
        ("dns1", &net.dns1),
        ("dns2", &net.dns2),
        ("codec", &video.codec),
        ("resolution", &video.resolution),
        ("main_stream", &video.main_stream_url),
        ("sub_stream", &video.sub_stream_url),
    ] {
        if let Some(value) = value {
            let _ = write!(out, "\n{key}={value}");
        }
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

/// Load the device record. A known vendor skips detection.
pub async fn handle(
    manager: &ProtocolManager,
    descriptor: &ConnectionDescriptor,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let report: DeviceInfoReport = if descriptor.vendor().is_some() {
        manager.load_device_info(descriptor, cancel).await?
    } else {
        let (compatibility, report) = manager.check_and_load(descriptor, None, cancel).await?;
        debug!(message = %compatibility.message, "detection finished");
        report
    };

    let color = output::should_color(&global.color);
    for failed in &report.section_errors {
        eprintln!(
            "{}",
            output::status(
                false,
                &format!("warning: {} section unavailable: {}", failed.section, failed.message),
                color,
            )
        );
    }
    if !report.success {
        return Err(CliError::OperationFailed {
            message: "No device information could be read".into(),
        });
    }

    let out = output::render_single(
        &global.output,
        &report,
        |r| sheet(&r.device, color),
        |r| plain(&r.device),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
