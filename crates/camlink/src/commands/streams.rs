//! RTSP stream URL handler. Purely local: no request reaches the camera.

use tabled::Tabled;

use camlink_core::{ConnectionDescriptor, ProtocolManager, StreamUrls};

use crate::cli::{GlobalOpts, StreamsArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct StreamRow {
    #[tabled(rename = "Stream")]
    kind: &'static str,
    #[tabled(rename = "Channel")]
    channel: u32,
    #[tabled(rename = "URL")]
    url: String,
}

fn rows(urls: &StreamUrls) -> [StreamRow; 2] {
    [
        StreamRow {
            kind: "main",
            channel: urls.channel,
            url: urls.main.clone(),
        },
        StreamRow {
            kind: "sub",
            channel: urls.channel,
            url: urls.sub.clone(),
        },
    ]
}

pub fn handle(
    manager: &ProtocolManager,
    descriptor: &ConnectionDescriptor,
    args: &StreamsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let urls = manager.stream_urls(descriptor, args.channel)?;
    let out = output::render_single(
        &global.output,
        &urls,
        |u| tabled::Table::new(rows(u)).with(tabled::settings::Style::rounded()).to_string(),
        |u| format!("{}\n{}", u.main, u.sub),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
