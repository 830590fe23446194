// ── SOAP 1.2 envelopes for ONVIF ──
//
// Envelope construction, the WS-Security UsernameToken digest header,
// and fault extraction. Responses are flattened with
// `xml::flatten_soap_body` once they are known not to be faults.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::escape::escape;
use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::fields::{self, FieldBag};
use crate::transport::{HttpReply, preview};
use crate::wire::xml;

pub const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const DEVICE_NS: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Wrap a body payload in a SOAP 1.2 envelope.
pub fn envelope(body: &str, security: Option<&str>) -> String {
    let header = security
        .map(|s| format!("<s:Header>{s}</s:Header>"))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="{SOAP_ENV_NS}">{header}<s:Body>{body}</s:Body></s:Envelope>"#
    )
}

/// WS-Security UsernameToken with a fresh nonce and the current time.
pub fn security_header(username: &str, password: &str) -> String {
    let nonce: [u8; 16] = rand::random();
    let created = chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
    security_header_at(username, password, &nonce, &created)
}

/// UsernameToken digest: `Base64(SHA1(nonce + created + password))`.
pub fn security_header_at(username: &str, password: &str, nonce: &[u8], created: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    let digest = BASE64.encode(hasher.finalize());
    let nonce = BASE64.encode(nonce);
    let username = escape(username);

    format!(
        r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="{WSSE_NS}" xmlns:wsu="{WSU_NS}"><wsse:UsernameToken><wsse:Username>{username}</wsse:Username><wsse:Password Type="{PASSWORD_DIGEST}">{digest}</wsse:Password><wsse:Nonce EncodingType="{NONCE_ENCODING}">{nonce}</wsse:Nonce><wsu:Created>{created}</wsu:Created></wsse:UsernameToken></wsse:Security>"#
    )
}

/// A decoded SOAP fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub subcode: Option<String>,
    pub reason: String,
}

impl Fault {
    /// ONVIF signals bad or missing credentials with `ter:NotAuthorized`.
    pub fn is_not_authorized(&self) -> bool {
        let sub = self.subcode.as_deref().unwrap_or_default();
        sub.contains("NotAuthorized")
            || self.code.contains("NotAuthorized")
            || self.reason.to_ascii_lowercase().contains("not authorized")
    }

    pub fn into_error(self) -> Error {
        let code = match self.subcode {
            Some(sub) => format!("{}/{sub}", self.code),
            None => self.code,
        };
        Error::SoapFault {
            code,
            reason: self.reason,
        }
    }
}

/// Extract a fault from a body, if it is one. Non-XML bodies are not faults.
pub fn parse_fault(body: &str) -> Option<Fault> {
    let bag = xml::flatten(body).ok()?;
    let has_fault = bag.iter().any(|(k, _)| k.starts_with("Body.Fault"));
    if !has_fault {
        return None;
    }

    let code = fields::lookup_text(&bag, &["Body.Fault.Code.Value", "Body.Fault.faultcode"])
        .unwrap_or_else(|| "Unknown".to_owned());
    let subcode = fields::lookup_text(
        &bag,
        &[
            "Body.Fault.Code.Subcode.Subcode.Value",
            "Body.Fault.Code.Subcode.Value",
        ],
    );
    let reason = fields::lookup_text(&bag, &["Body.Fault.Reason.Text", "Body.Fault.faultstring"])
        .unwrap_or_else(|| "SOAP fault".to_owned());

    Some(Fault {
        code,
        subcode,
        reason,
    })
}

/// Turn a SOAP reply into the flattened response body, or the error it
/// carries.
pub fn check_response(reply: HttpReply) -> Result<FieldBag, Error> {
    if let Some(fault) = parse_fault(&reply.body) {
        if fault.is_not_authorized() {
            return Err(Error::Authentication {
                message: fault.reason,
            });
        }
        return Err(fault.into_error());
    }
    if reply.is_unauthorized() {
        return Err(Error::Authentication {
            message: format!("credentials rejected (HTTP {})", reply.status),
        });
    }
    if !reply.is_success() {
        return Err(Error::Http {
            status: reply.status,
            body: preview(&reply.body),
        });
    }
    xml::flatten_soap_body(&reply.body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const AUTH_FAULT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope" xmlns:ter="http://www.onvif.org/ver10/error">
  <SOAP-ENV:Body>
    <SOAP-ENV:Fault>
      <SOAP-ENV:Code>
        <SOAP-ENV:Value>SOAP-ENV:Sender</SOAP-ENV:Value>
        <SOAP-ENV:Subcode><SOAP-ENV:Value>ter:NotAuthorized</SOAP-ENV:Value></SOAP-ENV:Subcode>
      </SOAP-ENV:Code>
      <SOAP-ENV:Reason><SOAP-ENV:Text xml:lang="en">Sender not Authorized</SOAP-ENV:Text></SOAP-ENV:Reason>
    </SOAP-ENV:Fault>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn detects_not_authorized_fault() {
        let fault = parse_fault(AUTH_FAULT).unwrap();
        assert_eq!(fault.code, "SOAP-ENV:Sender");
        assert_eq!(fault.subcode.as_deref(), Some("ter:NotAuthorized"));
        assert!(fault.is_not_authorized());
        assert!(matches!(
            check_response(HttpReply::new(400, AUTH_FAULT)),
            Err(Error::Authentication { .. })
        ));
    }

    #[test]
    fn non_fault_bodies_are_not_faults() {
        assert!(parse_fault("not xml at all").is_none());
        assert!(parse_fault(&envelope("<Ok/>", None)).is_none());
    }

    #[test]
    fn password_digest_is_deterministic() {
        let a = security_header_at("admin", "secret", b"0123456789abcdef", "2024-01-01T00:00:00Z");
        let b = security_header_at("admin", "secret", b"0123456789abcdef", "2024-01-01T00:00:00Z");
        let c = security_header_at("admin", "other", b"0123456789abcdef", "2024-01-01T00:00:00Z");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.contains("<wsse:Username>admin</wsse:Username>"));
        assert!(a.contains("<wsu:Created>2024-01-01T00:00:00Z</wsu:Created>"));
    }

    #[test]
    fn envelope_includes_header_only_when_given() {
        let plain = envelope("<x/>", None);
        assert!(!plain.contains("s:Header"));
        let secured = envelope("<x/>", Some("<sec/>"));
        assert!(secured.contains("<s:Header><sec/></s:Header>"));
        xml::validate_well_formed(&secured).unwrap();
    }
}
