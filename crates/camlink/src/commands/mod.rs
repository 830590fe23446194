//! Command dispatch: bridges CLI args -> protocol manager -> output formatting.

pub mod check;
pub mod config_cmd;
pub mod info;
pub mod network;
pub mod ntp;
pub mod streams;
pub mod util;

use tokio_util::sync::CancellationToken;

use camlink_core::ProtocolManager;

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    target: Target,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let manager = ProtocolManager::new(target.engine);
    let descriptor = &target.descriptor;
    match cmd {
        Command::Check => check::handle(&manager, descriptor, global, cancel).await,
        Command::Info => info::handle(&manager, descriptor, global, cancel).await,
        Command::Network(args) => network::handle(&manager, descriptor, args, global, cancel).await,
        Command::Ntp(args) => ntp::handle(&manager, descriptor, args, global, cancel).await,
        Command::Streams(args) => streams::handle(&manager, descriptor, &args, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
