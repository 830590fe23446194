//! Shared helpers for command handlers.

use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tracing::info;

use camlink_core::{
    ApplyOutcome, ConnectionDescriptor, FieldChange, OperationResult, ProtocolManager,
    SecondaryStep,
};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to ask on, refuses instead of hanging.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Return `descriptor` tagged with its vendor, detecting it first when the
/// caller did not name one. Refused credentials stop here.
pub async fn tagged_descriptor(
    manager: &ProtocolManager,
    descriptor: &ConnectionDescriptor,
    cancel: &CancellationToken,
) -> Result<ConnectionDescriptor, CliError> {
    if descriptor.vendor().is_some() {
        return Ok(descriptor.clone());
    }
    let result = manager.check_compatibility(descriptor, None, cancel).await?;
    let Some(vendor) = result.detected_vendor.filter(|_| result.is_compatible) else {
        return Err(CliError::NoCompatibleProtocol {
            host: descriptor.host().to_owned(),
        });
    };
    if !result.is_authenticated {
        return Err(CliError::AuthFailed {
            message: result.auth_message.unwrap_or(result.message),
        });
    }
    info!(%vendor, host = descriptor.host(), "vendor detected");
    Ok(descriptor.clone().with_vendor(Some(vendor)))
}

// ── Apply outcomes ──────────────────────────────────────────────────

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "New")]
    desired: String,
}

impl From<&FieldChange> for ChangeRow {
    fn from(c: &FieldChange) -> Self {
        Self {
            field: c.field.clone(),
            current: c.current.clone().unwrap_or_else(|| "-".into()),
            desired: c.desired.clone(),
        }
    }
}

/// Print an apply result and turn a failed one into an error.
///
/// A write that succeeded but whose restart did not is reported, not
/// failed: the settings are stored and take effect on the next reboot.
pub fn finish_apply(
    result: OperationResult<ApplyOutcome>,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }
    let outcome = result
        .into_result()
        .map_err(|message| CliError::OperationFailed { message })?;

    let color = output::should_color(&global.color);
    let out = match global.output {
        OutputFormat::Table => {
            let mut text = output::status(true, &outcome.message, color);
            if !outcome.changes.is_empty() {
                text.push('\n');
                text.push_str(&output::render_list(
                    &OutputFormat::Table,
                    &outcome.changes,
                    |c| ChangeRow::from(c),
                    |c| c.field.clone(),
                )?);
            }
            text
        }
        OutputFormat::Plain => outcome
            .changes
            .iter()
            .map(|c| c.field.clone())
            .collect::<Vec<_>>()
            .join("\n"),
        ref format => output::render_single(format, &outcome, |_| String::new(), |_| String::new())?,
    };
    output::print_output(&out, global.quiet);

    if let SecondaryStep::Failed(reason) = &outcome.restart {
        if !global.quiet {
            eprintln!(
                "{}",
                output::status(false, &format!("Restart failed: {reason}"), color)
            );
        }
    }
    Ok(())
}
