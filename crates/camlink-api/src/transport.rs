// Per-adapter HTTP transport.
//
// Each adapter owns one `HttpTransport` bound to a single device. The
// transport speaks Basic and Digest; a Digest challenge is answered once
// per request and the last challenge is cached so later requests can
// authenticate on the first round-trip.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use secrecy::SecretString;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{self, AuthMode, ConnectionDescriptor, DigestChallenge};
use crate::error::Error;

pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_XML: &str = "application/xml; charset=utf-8";
pub const CONTENT_SOAP: &str = "application/soap+xml; charset=utf-8";

/// Shared transport settings for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Cameras ship self-signed certificates; accept them unless told not to.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
            user_agent: concat!("camlink/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Network {
                message: format!("failed to build HTTP client: {e}"),
            })
    }
}

/// Whether a request carries the descriptor's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAuth {
    Anonymous,
    Attached,
}

/// Status and decoded body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    challenge: Option<String>,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            challenge: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// Map the reply to its body, or to the error its status implies.
    pub fn into_body(self) -> Result<String, Error> {
        if self.is_success() {
            return Ok(self.body);
        }
        if self.is_unauthorized() {
            return Err(Error::Authentication {
                message: format!("credentials rejected (HTTP {})", self.status),
            });
        }
        Err(Error::Http {
            status: self.status,
            body: preview(&self.body),
        })
    }
}

/// First 200 characters of a body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_owned(),
    }
}

struct Outgoing<'a> {
    method: Method,
    url: Url,
    body: Option<(&'static str, &'a str)>,
}

#[derive(Debug)]
struct DigestState {
    challenge: DigestChallenge,
    nonce_count: u32,
}

/// HTTP transport bound to one device.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    auth_mode: AuthMode,
    digest: Mutex<Option<DigestState>>,
}

impl HttpTransport {
    pub fn new(descriptor: &ConnectionDescriptor, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
            base_url: descriptor.base_url()?,
            username: descriptor.username().to_owned(),
            password: descriptor.password().clone(),
            auth_mode: descriptor.auth_mode(),
            digest: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path (which may carry a query string) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn get(&self, path: &str, auth: RequestAuth) -> Result<HttpReply, Error> {
        self.send(
            Outgoing {
                method: Method::GET,
                url: self.url(path)?,
                body: None,
            },
            auth,
        )
        .await
    }

    /// GET with query pairs appended to `path`.
    pub async fn get_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
        auth: RequestAuth,
    ) -> Result<HttpReply, Error> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().extend_pairs(query);
        self.send(
            Outgoing {
                method: Method::GET,
                url,
                body: None,
            },
            auth,
        )
        .await
    }

    pub async fn post(
        &self,
        path: &str,
        content_type: &'static str,
        body: &str,
        auth: RequestAuth,
    ) -> Result<HttpReply, Error> {
        self.send(
            Outgoing {
                method: Method::POST,
                url: self.url(path)?,
                body: Some((content_type, body)),
            },
            auth,
        )
        .await
    }

    pub async fn put(
        &self,
        path: &str,
        content_type: &'static str,
        body: &str,
        auth: RequestAuth,
    ) -> Result<HttpReply, Error> {
        self.send(
            Outgoing {
                method: Method::PUT,
                url: self.url(path)?,
                body: Some((content_type, body)),
            },
            auth,
        )
        .await
    }

    async fn send(&self, req: Outgoing<'_>, auth: RequestAuth) -> Result<HttpReply, Error> {
        if auth == RequestAuth::Anonymous {
            return self.dispatch(&req, None).await;
        }

        match self.auth_mode {
            AuthMode::Basic => {
                let header = self.basic_header();
                self.dispatch(&req, Some(header)).await
            }
            AuthMode::Ntlm => Err(Error::UnsupportedAuth(AuthMode::Ntlm)),
            AuthMode::Digest => self.send_digest(&req).await,
        }
    }

    async fn send_digest(&self, req: &Outgoing<'_>) -> Result<HttpReply, Error> {
        let uri = request_uri(&req.url);

        let reply = match self.digest_header(req.method.as_str(), &uri) {
            Some(header) => self.dispatch(req, Some(header)).await?,
            None => self.dispatch(req, None).await?,
        };
        if reply.status != 401 {
            return Ok(reply);
        }

        // Answer the challenge exactly once.
        let Some(raw) = reply.challenge.as_deref() else {
            return Ok(reply);
        };
        if raw.trim_start().to_ascii_lowercase().starts_with("basic") {
            trace!("device asked for Basic auth, answering with Basic");
            let header = self.basic_header();
            return self.dispatch(req, Some(header)).await;
        }
        let Some(challenge) = DigestChallenge::parse(raw) else {
            debug!(challenge = raw, "unparseable WWW-Authenticate header");
            return Ok(reply);
        };

        *self.digest.lock().unwrap_or_else(PoisonError::into_inner) = Some(DigestState {
            challenge,
            nonce_count: 0,
        });
        match self.digest_header(req.method.as_str(), &uri) {
            Some(header) => self.dispatch(req, Some(header)).await,
            None => Ok(reply),
        }
    }

    fn digest_header(&self, method: &str, uri: &str) -> Option<String> {
        let mut guard = self.digest.lock().unwrap_or_else(PoisonError::into_inner);
        let state = guard.as_mut()?;
        state.nonce_count += 1;
        Some(state.challenge.authorization(
            method,
            uri,
            &self.username,
            auth::expose(&self.password),
            state.nonce_count,
            &auth::new_cnonce(),
        ))
    }

    fn basic_header(&self) -> String {
        use base64::Engine as _;
        let token = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.username,
            auth::expose(&self.password)
        ));
        format!("Basic {token}")
    }

    async fn dispatch(
        &self,
        req: &Outgoing<'_>,
        authorization: Option<String>,
    ) -> Result<HttpReply, Error> {
        debug!(method = %req.method, url = %req.url, "camera request");

        let mut builder = self.http.request(req.method.clone(), req.url.clone());
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some((content_type, body)) = req.body {
            builder = builder
                .header(CONTENT_TYPE, content_type)
                .body(body.to_owned());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let challenge = resp
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.text().await?;
        trace!(status, bytes = body.len(), "camera response");

        Ok(HttpReply {
            status,
            body,
            challenge,
        })
    }
}

/// Path plus query, as it appears in the digest `uri` parameter.
fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{q}", url.path()),
        None => url.path().to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn into_body_maps_statuses() {
        assert_eq!(HttpReply::new(200, "ok").into_body().unwrap(), "ok");
        assert!(matches!(
            HttpReply::new(401, "").into_body(),
            Err(Error::Authentication { .. })
        ));
        assert!(matches!(
            HttpReply::new(500, "boom").into_body(),
            Err(Error::Http { status: 500, .. })
        ));
    }

    #[test]
    fn request_uri_keeps_query() {
        let url = Url::parse("http://cam/cgi-bin/magicBox.cgi?action=getDeviceType").unwrap();
        assert_eq!(request_uri(&url), "/cgi-bin/magicBox.cgi?action=getDeviceType");
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), 203);
        assert_eq!(preview("  short \n"), "short");
    }
}
