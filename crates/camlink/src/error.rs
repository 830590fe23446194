//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use camlink_config::ConfigError;
use camlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Target ───────────────────────────────────────────────────────
    #[error("No camera specified")]
    #[diagnostic(
        code(camlink::no_target),
        help(
            "Pass --host, or create a profile with: camlink config init\n\
             and select it with --profile or `camlink config use <name>`."
        )
    )]
    NoTarget,

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(camlink::profile_not_found),
        help("List profiles with: camlink config profiles")
    )]
    ProfileNotFound { name: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach camera: {message}")]
    #[diagnostic(
        code(camlink::connection_failed),
        help("Check the address and port, and that the camera is powered and on this network.")
    )]
    ConnectionFailed { message: String },

    #[error("No supported protocol answered at {host}")]
    #[diagnostic(
        code(camlink::no_compatible_protocol),
        help(
            "The camera may use a protocol camlink does not speak, or its web API is disabled.\n\
             Try a specific vendor with --vendor, or a different --port."
        )
    )]
    NoCompatibleProtocol { host: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(camlink::auth_failed),
        help(
            "Verify the username and password.\n\
             Store a password with: camlink config set-password --profile <name>\n\
             Some cameras only accept --auth basic or --auth digest."
        )
    )]
    AuthFailed { message: String },

    // ── Vendor ───────────────────────────────────────────────────────
    #[error("Camera vendor is not known")]
    #[diagnostic(
        code(camlink::vendor_required),
        help("Pass --vendor, set `vendor` in the profile, or run: camlink check")
    )]
    VendorRequired,

    #[error("{message}")]
    #[diagnostic(code(camlink::device_error))]
    Device { message: String },

    #[error("{message}")]
    #[diagnostic(code(camlink::operation_failed))]
    OperationFailed { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(camlink::config),
        help("Inspect the configuration with: camlink config show")
    )]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(camlink::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout / cancellation ───────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(camlink::timeout),
        help("Increase the timeout with --timeout or check the camera's responsiveness.")
    )]
    Timeout { message: String },

    #[error("Operation cancelled")]
    #[diagnostic(code(camlink::cancelled))]
    Cancelled,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(camlink::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(camlink::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NoCompatibleProtocol { .. } | Self::ProfileNotFound { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Cancelled => exit_code::CANCELLED,
            Self::NoTarget
            | Self::VendorRequired
            | Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_cancelled() {
            return CliError::Cancelled;
        }
        if err.is_timeout() {
            return CliError::Timeout {
                message: err.to_string(),
            };
        }
        match err {
            CoreError::NoCompatibleProtocol { host } => CliError::NoCompatibleProtocol { host },

            CoreError::VendorUnknown => CliError::VendorRequired,

            CoreError::InvalidConfig { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Adapter(source) => {
                let message = source.to_string();
                if source.is_auth_failure() {
                    CliError::AuthFailed { message }
                } else if source.is_network() {
                    CliError::ConnectionFailed { message }
                } else {
                    CliError::Device { message }
                }
            }

            other => CliError::OperationFailed {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound { name },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (CoreError::Cancelled, exit_code::CANCELLED),
            (CoreError::Timeout { timeout_secs: 30 }, exit_code::TIMEOUT),
            (
                CoreError::NoCompatibleProtocol {
                    host: "10.0.0.8".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (CoreError::VendorUnknown, exit_code::USAGE),
            (
                CoreError::Adapter(camlink_api::Error::Authentication {
                    message: "bad password".into(),
                }),
                exit_code::AUTH,
            ),
            (
                CoreError::Adapter(camlink_api::Error::Network {
                    message: "connection refused".into(),
                }),
                exit_code::CONNECTION,
            ),
            (
                CoreError::Adapter(camlink_api::Error::Timeout),
                exit_code::TIMEOUT,
            ),
        ];
        for (core, code) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), code, "{label}");
        }
    }

    #[test]
    fn invalid_config_becomes_usage_error() {
        let err = CliError::from(CoreError::InvalidConfig {
            message: "IP address is required".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert_eq!(
            err.to_string(),
            "Invalid value for configuration: IP address is required"
        );
    }

    #[test]
    fn unknown_profile_keeps_name() {
        let err = CliError::from(ConfigError::UnknownProfile {
            name: "lobby".into(),
        });
        assert!(matches!(err, CliError::ProfileNotFound { ref name } if name == "lobby"));
    }
}
