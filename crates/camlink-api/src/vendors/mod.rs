// Vendor adapters. Each one owns its transport and knows its own
// endpoints, wire format, and write semantics.

pub mod axis;
pub mod dahua;
pub mod hikvision;
pub mod onvif;

pub use axis::AxisAdapter;
pub use dahua::DahuaAdapter;
pub use hikvision::HikvisionAdapter;
pub use onvif::OnvifAdapter;

use crate::adapter::matches_signature;
use crate::auth::url_host;
use crate::error::Error;
use crate::transport::{HttpReply, preview};
use crate::types::AuthResult;
use crate::vendor::Vendor;

const RTSP_PORT: u16 = 554;

fn rtsp_base(host: &str) -> String {
    format!("rtsp://{}:{RTSP_PORT}", url_host(host))
}

/// Judge an authenticated identity request: rejected credentials, a
/// genuine vendor response, or something else answering on the port.
fn auth_from_reply(
    reply: &HttpReply,
    vendor: Vendor,
    signatures: &[&str],
) -> Result<AuthResult, Error> {
    if reply.is_unauthorized() {
        return Ok(AuthResult::rejected(format!(
            "Invalid credentials (HTTP {})",
            reply.status
        )));
    }
    if !reply.is_success() {
        return Err(Error::Http {
            status: reply.status,
            body: preview(&reply.body),
        });
    }
    if !matches_signature(&reply.body, signatures) {
        return Err(Error::ProtocolMismatch {
            message: format!(
                "authenticated response is not a {} response",
                vendor.display_name()
            ),
        });
    }
    Ok(AuthResult::accepted())
}
