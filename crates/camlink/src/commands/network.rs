//! Network configuration handler.

use tokio_util::sync::CancellationToken;

use camlink_core::{ConnectionDescriptor, NetworkConfig, ProtocolManager};

use crate::cli::{GlobalOpts, NetworkArgs, NetworkCommand, NetworkSetArgs};
use crate::error::CliError;

use super::util;

fn desired(args: NetworkSetArgs) -> NetworkConfig {
    NetworkConfig {
        ip_address: args.ip,
        subnet_mask: args.mask,
        gateway: args.gateway,
        dns1: args.dns1,
        dns2: args.dns2,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    manager: &ProtocolManager,
    descriptor: &ConnectionDescriptor,
    args: NetworkArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    match args.command {
        NetworkCommand::Set(set) => {
            let config = desired(set);
            // Reject bad input before touching the network.
            config.validate().map_err(|reason| CliError::Validation {
                field: "network".into(),
                reason,
            })?;

            let tagged = util::tagged_descriptor(manager, descriptor, cancel).await?;
            let prompt = format!(
                "Change {} to {}/{}? The camera may become unreachable at its current address.",
                tagged.host(),
                config.ip_address,
                config.subnet_mask,
            );
            if !util::confirm(&prompt, "network set", global.yes)? {
                return Ok(());
            }

            let result = manager
                .apply_network_config(&tagged, &config, cancel)
                .await;
            util::finish_apply(result, global, cancel)
        }
    }
}
