// ── Adapter inputs and outputs ──
//
// Plain data exchanged between adapters and the engine: probe and auth
// results, desired configurations, and the outcome of a write.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::fields::FieldChange;

/// Raw result of an unauthenticated probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// Result of an authenticated request against the vendor's info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResult {
    pub authenticated: bool,
    pub message: String,
}

impl AuthResult {
    pub fn accepted() -> Self {
        Self {
            authenticated: true,
            message: "Authentication successful".into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            message: message.into(),
        }
    }
}

/// Desired static IPv4 settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub ip_address: String,
    pub subnet_mask: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dns1: Option<String>,
    #[serde(default)]
    pub dns2: Option<String>,
}

impl NetworkConfig {
    /// Valid when an IP address is present. Other fields are checked by
    /// [`NetworkConfig::validate`].
    pub fn is_valid(&self) -> bool {
        !self.ip_address.trim().is_empty()
    }

    /// Reject values no device would accept, naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if !self.is_valid() {
            return Err("IP address is required".into());
        }
        check_ipv4("IP address", &self.ip_address)?;
        if !self.subnet_mask.trim().is_empty() {
            let mask = self.subnet_mask.trim().trim_start_matches('/');
            let bare_prefix = mask.parse::<u8>().is_ok_and(|p| p <= 32);
            if !bare_prefix {
                check_ipv4("subnet mask", mask)?;
            }
        }
        if !self.gateway.trim().is_empty() {
            check_ipv4("gateway", &self.gateway)?;
        }
        for (label, dns) in [("DNS 1", &self.dns1), ("DNS 2", &self.dns2)] {
            if let Some(dns) = dns.as_deref().filter(|d| !d.trim().is_empty()) {
                check_ipv4(label, dns)?;
            }
        }
        Ok(())
    }

    pub fn dns1(&self) -> Option<&str> {
        non_blank(self.dns1.as_deref())
    }

    pub fn dns2(&self) -> Option<&str> {
        non_blank(self.dns2.as_deref())
    }

    pub fn gateway(&self) -> Option<&str> {
        non_blank(Some(&self.gateway))
    }
}

/// Desired time synchronisation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtpConfig {
    pub server: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub timezone: Option<String>,
}

fn default_true() -> bool {
    true
}

impl NtpConfig {
    pub fn is_valid(&self) -> bool {
        !self.server.trim().is_empty()
    }

    /// Whether the server is given as an IPv4 literal rather than a name.
    pub fn server_is_address(&self) -> bool {
        self.server.trim().parse::<Ipv4Addr>().is_ok()
    }

    pub fn timezone(&self) -> Option<&str> {
        non_blank(self.timezone.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_ipv4(label: &str, value: &str) -> Result<(), String> {
    value
        .trim()
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| format!("{label} '{}' is not a valid IPv4 address", value.trim()))
}

/// What happened to a follow-up step (usually a restart) after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SecondaryStep {
    NotNeeded,
    Completed,
    /// The write succeeded but the follow-up did not.
    Failed(String),
}

/// Outcome of a read-diff-write operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub changed: bool,
    pub message: String,
    pub changes: Vec<FieldChange>,
    pub restart: SecondaryStep,
}

impl ApplyOutcome {
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            message: "No changes needed".into(),
            changes: Vec::new(),
            restart: SecondaryStep::NotNeeded,
        }
    }

    pub fn applied(changes: Vec<FieldChange>, restart: SecondaryStep) -> Self {
        let mut message = format!("Configuration applied ({} field(s) changed)", changes.len());
        match &restart {
            SecondaryStep::NotNeeded => {}
            SecondaryStep::Completed => message.push_str("; device restarting"),
            SecondaryStep::Failed(reason) => {
                message.push_str("; restart failed, a manual restart may be required: ");
                message.push_str(reason);
            }
        }
        Self {
            changed: true,
            message,
            changes,
            restart,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(ip: &str, mask: &str, gw: &str) -> NetworkConfig {
        NetworkConfig {
            ip_address: ip.into(),
            subnet_mask: mask.into(),
            gateway: gw.into(),
            dns1: None,
            dns2: None,
        }
    }

    #[test]
    fn network_config_requires_ip() {
        assert!(!net("", "255.255.255.0", "").is_valid());
        assert!(net("10.0.0.2", "", "").is_valid());
    }

    #[test]
    fn validate_names_bad_field() {
        assert_eq!(
            net("10.0.0.2", "255.255.255.0", "10.0.0.300").validate(),
            Err("gateway '10.0.0.300' is not a valid IPv4 address".into())
        );
        assert!(net("10.0.0.2", "24", "").validate().is_ok());
    }

    #[test]
    fn applied_outcome_reports_restart_failure() {
        let outcome = ApplyOutcome::applied(Vec::new(), SecondaryStep::Failed("timeout".into()));
        assert!(outcome.changed);
        assert!(outcome.message.contains("manual restart"));
        assert!(!ApplyOutcome::unchanged().changed);
    }
}
