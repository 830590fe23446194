//! Compatibility check handler.

use tokio_util::sync::CancellationToken;

use camlink_core::{CompatibilityResult, ConnectionDescriptor, ProtocolManager};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn yes_no(value: bool) -> String {
    let word = if value { "yes" } else { "no" };
    word.to_owned()
}

fn detail(result: &CompatibilityResult, host: &str, color: bool) -> String {
    let protocol = result
        .detected_vendor
        .map(|v| v.display_name().to_owned());
    let authenticated = result.is_compatible.then(|| {
        let word = yes_no(result.is_authenticated);
        output::status(result.is_authenticated, &word, color)
    });
    output::render_sheet(
        &[
            ("Host", Some(host.to_owned())),
            (
                "Compatible",
                Some(output::status(
                    result.is_compatible,
                    &yes_no(result.is_compatible),
                    color,
                )),
            ),
            ("Protocol", protocol),
            ("Auth required", result.is_compatible.then(|| yes_no(result.requires_auth))),
            ("Authenticated", authenticated),
            ("Message", Some(result.message.clone())),
            ("Auth", result.auth_message.clone()),
        ],
        color,
    )
}

// ── Handler ─────────────────────────────────────────────────────────

/// Scan vendors, print the verdict, and exit non-zero unless the camera
/// is usable with the given credentials.
pub async fn handle(
    manager: &ProtocolManager,
    descriptor: &ConnectionDescriptor,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let result = manager
        .check_compatibility(descriptor, descriptor.vendor(), cancel)
        .await?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| detail(r, descriptor.host(), color),
        |r| r.detected_vendor.map_or_else(|| "none".into(), |v| v.to_string()),
    )?;
    output::print_output(&out, global.quiet);

    if !result.is_compatible {
        return Err(CliError::NoCompatibleProtocol {
            host: descriptor.host().to_owned(),
        });
    }
    if !result.is_authenticated {
        return Err(CliError::AuthFailed {
            message: result
                .auth_message
                .unwrap_or_else(|| "Credentials rejected".into()),
        });
    }
    Ok(())
}
