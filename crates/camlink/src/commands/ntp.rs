//! NTP configuration handler.

use tokio_util::sync::CancellationToken;

use camlink_core::{ConnectionDescriptor, NtpConfig, ProtocolManager};

use crate::cli::{GlobalOpts, NtpArgs, NtpCommand};
use crate::error::CliError;

use super::util;

pub async fn handle(
    manager: &ProtocolManager,
    descriptor: &ConnectionDescriptor,
    args: NtpArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    match args.command {
        NtpCommand::Set(set) => {
            let config = NtpConfig {
                server: set.server,
                enabled: !set.disable,
                timezone: set.timezone,
            };
            if !config.is_valid() {
                return Err(CliError::Validation {
                    field: "server".into(),
                    reason: "NTP server is required".into(),
                });
            }

            let tagged = util::tagged_descriptor(manager, descriptor, cancel).await?;
            let prompt = format!("Set NTP server of {} to {}?", tagged.host(), config.server);
            if !util::confirm(&prompt, "ntp set", global.yes)? {
                return Ok(());
            }

            let result = manager.apply_ntp_config(&tagged, &config, cancel).await;
            util::finish_apply(result, global, cancel)
        }
    }
}
