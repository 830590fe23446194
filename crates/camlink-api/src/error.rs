use thiserror::Error;

use crate::auth::AuthMode;

/// Top-level error type for the `camlink-api` crate.
///
/// Covers every failure mode an adapter can hit while talking to a camera:
/// transport, authentication, wire decoding, and vendor-reported errors.
/// `camlink-core` folds these into compatibility results and operation
/// envelopes; the CLI maps them to exit codes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, DNS failure, reset, TLS handshake, etc.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The request did not complete within the configured timeout.
    #[error("Connection timeout")]
    Timeout,

    /// The caller cancelled the operation.
    #[error("Request cancelled")]
    Cancelled,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success HTTP status that carries no vendor error envelope.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── Authentication ──────────────────────────────────────────────
    /// The device rejected the supplied credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The connection asked for an auth scheme the transport cannot speak.
    #[error("Unsupported authentication mode: {0}")]
    UnsupportedAuth(AuthMode),

    // ── Protocol ────────────────────────────────────────────────────
    /// The device answered, but not in this vendor's dialect.
    #[error("Protocol mismatch: {message}")]
    ProtocolMismatch { message: String },

    /// The body could not be decoded in the expected wire format.
    #[error("Malformed {format} response: {detail}")]
    MalformedResponse { format: &'static str, detail: String },

    /// ONVIF SOAP fault.
    #[error("SOAP fault {code}: {reason}")]
    SoapFault { code: String, reason: String },

    /// Vendor-reported error (JSON-RPC error object, ISAPI ResponseStatus,
    /// CGI error line).
    #[error("API error{}: {message}", api_code_suffix(.code.as_deref()))]
    Api { code: Option<String>, message: String },

    // ── Input ───────────────────────────────────────────────────────
    /// Desired configuration rejected before any request was sent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn api_code_suffix(code: Option<&str>) -> String {
    code.map(|c| format!(" {c}")).unwrap_or_default()
}

impl Error {
    pub(crate) fn malformed(format: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            format,
            detail: detail.into(),
        }
    }

    /// Returns `true` for transport-level failures (connection or timeout).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout)
    }

    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Adapters never retry on their own; callers decide.
    pub fn is_retryable(&self) -> bool {
        self.is_network()
    }

    /// Returns `true` if the device rejected the credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Extract the vendor error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::SoapFault { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Self::Network { message }
    }
}
