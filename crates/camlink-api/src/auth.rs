// ── Connection descriptor and HTTP auth schemes ──
//
// A `ConnectionDescriptor` is everything needed to reach one camera.
// Digest challenge parsing and response computation (RFC 7616, MD5) live
// here so the transport only has to decide when to use them.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use crate::error::Error;
use crate::vendor::Vendor;

/// HTTP authentication scheme requested for a connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AuthMode {
    Basic,
    #[default]
    Digest,
    /// Accepted in configuration, rejected by the transport.
    Ntlm,
}

/// Connection parameters for a single device.
///
/// Immutable once built; the vendor tag is attached through
/// [`ConnectionDescriptor::with_vendor`] after detection confirms it.
#[derive(Clone)]
pub struct ConnectionDescriptor {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    auth_mode: AuthMode,
    vendor: Option<Vendor>,
}

impl ConnectionDescriptor {
    pub const DEFAULT_USERNAME: &'static str = "admin";
    pub const DEFAULT_PORT: u16 = 80;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into().trim().to_owned(),
            port,
            username: Self::DEFAULT_USERNAME.to_owned(),
            password: SecretString::from(String::new()),
            auth_mode: AuthMode::default(),
            vendor: None,
        }
    }

    /// Attach credentials. A blank username falls back to `admin`.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        let username = username.into();
        self.username = if username.trim().is_empty() {
            Self::DEFAULT_USERNAME.to_owned()
        } else {
            username
        };
        self.password = password;
        self
    }

    #[must_use]
    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    #[must_use]
    pub fn with_vendor(mut self, vendor: Option<Vendor>) -> Self {
        self.vendor = vendor;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn has_password(&self) -> bool {
        !self.password.expose_secret().is_empty()
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn vendor(&self) -> Option<Vendor> {
        self.vendor
    }

    /// `https` on port 443, `http` everywhere else.
    pub fn scheme(&self) -> &'static str {
        if self.port == 443 { "https" } else { "http" }
    }

    /// Host formatted for use inside a URL authority (IPv6 bracketed).
    pub fn url_host(&self) -> String {
        url_host(&self.host)
    }

    pub fn base_url(&self) -> Result<Url, Error> {
        if self.host.is_empty() {
            return Err(Error::InvalidConfiguration("host is empty".into()));
        }
        let raw = format!("{}://{}:{}/", self.scheme(), self.url_host(), self.port);
        Ok(Url::parse(&raw)?)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("auth_mode", &self.auth_mode)
            .field("vendor", &self.vendor)
            .finish()
    }
}

pub(crate) fn url_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    }
}

// ── Digest ──────────────────────────────────────────────────────────

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value. Returns `None` for
    /// non-Digest schemes or when realm/nonce are missing.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let mut realm = None;
        let mut nonce = None;
        let mut qop = None;
        let mut opaque = None;
        let mut algorithm = None;
        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "qop" => qop = Some(value),
                "opaque" => opaque = Some(value),
                "algorithm" => algorithm = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            nonce: nonce?,
            qop,
            opaque,
            algorithm,
        })
    }

    /// Whether the server offers `qop=auth` (possibly among others).
    fn offers_auth_qop(&self) -> bool {
        self.qop
            .as_deref()
            .is_some_and(|q| q.split(',').any(|v| v.trim().eq_ignore_ascii_case("auth")))
    }

    /// Build the `Authorization` header value for one request.
    pub fn authorization(
        &self,
        method: &str,
        uri: &str,
        username: &str,
        password: &str,
        nonce_count: u32,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!("{username}:{}:{password}", self.realm));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let nc = format!("{nonce_count:08x}");

        let mut header = format!(
            r#"Digest username="{username}", realm="{}", nonce="{}", uri="{uri}""#,
            self.realm, self.nonce
        );
        if self.offers_auth_qop() {
            let response = md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce));
            header.push_str(&format!(
                r#", qop=auth, nc={nc}, cnonce="{cnonce}", response="{response}""#
            ));
        } else {
            let response = md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce));
            header.push_str(&format!(r#", response="{response}""#));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(r#", opaque="{opaque}""#));
        }
        if let Some(algorithm) = &self.algorithm {
            header.push_str(&format!(", algorithm={algorithm}"));
        }
        header
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Split `a="x, y", b=z` into key/value pairs, honouring quotes.
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = params.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_owned();
        rest = rest[eq + 1..].trim_start();

        let value;
        if let Some(stripped) = rest.strip_prefix('"') {
            let end = stripped.find('"').unwrap_or(stripped.len());
            value = stripped[..end].to_owned();
            rest = stripped.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_owned();
            rest = &rest[end..];
        }
        rest = rest.trim_start().trim_start_matches(',').trim_start();
        out.push((key, value));
    }
    out
}

/// Fresh client nonce for a digest exchange.
pub(crate) fn new_cnonce() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Password text for building auth headers.
pub(crate) fn expose(password: &SecretString) -> &str {
    password.expose_secret()
}
