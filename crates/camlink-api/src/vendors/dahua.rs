// ── Dahua (CGI) adapter ──
//
// `magicBox.cgi` for identity and maintenance, `configManager.cgi` for
// settings. Responses are `key=value` lines with a `table.` prefix;
// writes pass every changed key as a query parameter and answer `OK`.

use async_trait::async_trait;

use crate::adapter::{Configuration, Connection, Operation};
use crate::apply::{self, ConfigPlan, WriteReceipt};
use crate::auth::ConnectionDescriptor;
use crate::error::Error;
use crate::fields::{Comparison, DesiredField, FieldBag, FieldChange};
use crate::transport::{HttpTransport, RequestAuth, TransportConfig, preview};
use crate::types::{ApplyOutcome, AuthResult, NetworkConfig, NtpConfig, ProbeResponse};
use crate::units;
use crate::vendor::Vendor;
use crate::wire::kv;

const MAGIC_BOX: &str = "/cgi-bin/magicBox.cgi";
const CONFIG_MANAGER: &str = "/cgi-bin/configManager.cgi";

const TABLE_PREFIX: &str = "table.";
const SIGNATURES: &[&str] = &["^deviceType=", "^type=", "^table."];

/// Field keys in `configManager.cgi` listings, after the `table.` prefix
/// is stripped.
pub mod keys {
    use crate::fields::{self, FieldBag};

    pub const DEFAULT_INTERFACE: &str = "Network.DefaultInterface";
    pub const NTP_SERVER: &str = "NTP.Address";
    pub const NTP_ENABLED: &str = "NTP.Enable";
    pub const TIMEZONE: &str = "NTP.TimeZone";

    /// Name of the interface the device routes through (`eth0` when unset).
    pub fn interface(current: &FieldBag) -> String {
        fields::resolve(current, &[DEFAULT_INTERFACE], "eth0")
    }

    /// `Network.<iface>.<leaf>` for the default interface.
    pub fn interface_key(current: &FieldBag, leaf: &str) -> String {
        format!("Network.{}.{leaf}", interface(current))
    }
}

pub struct DahuaAdapter {
    transport: HttpTransport,
    host: String,
}

impl DahuaAdapter {
    pub fn new(descriptor: &ConnectionDescriptor, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            transport: HttpTransport::new(descriptor, config)?,
            host: descriptor.host().to_owned(),
        })
    }

    async fn query(&self, path: &str, query: &[(&str, &str)]) -> Result<FieldBag, Error> {
        let body = self
            .transport
            .get_query(path, query, RequestAuth::Attached)
            .await?
            .into_body()?;
        if let Some(message) = kv::error_message(&body) {
            return Err(Error::Api {
                code: None,
                message,
            });
        }
        Ok(kv::parse(&body, Some(TABLE_PREFIX)))
    }

    async fn magic_box(&self, action: &str) -> Result<FieldBag, Error> {
        self.query(MAGIC_BOX, &[("action", action)]).await
    }

    async fn config(&self, name: &str) -> Result<FieldBag, Error> {
        self.query(CONFIG_MANAGER, &[("action", "getConfig"), ("name", name)])
            .await
    }

    /// `configManager.cgi?action=setConfig&k1=v1&k2=v2`.
    async fn set_config(&self, changes: &[FieldChange]) -> Result<(), Error> {
        let mut query: Vec<(&str, &str)> = vec![("action", "setConfig")];
        query.extend(changes.iter().map(|c| (c.key.as_str(), c.desired.as_str())));
        let body = self
            .transport
            .get_query(CONFIG_MANAGER, &query, RequestAuth::Attached)
            .await?
            .into_body()?;
        if kv::is_ok(&body) {
            return Ok(());
        }
        Err(Error::Api {
            code: None,
            message: kv::error_message(&body).unwrap_or_else(|| preview(&body)),
        })
    }
}

#[async_trait]
impl Connection for DahuaAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Dahua
    }

    fn signatures(&self) -> &'static [&'static str] {
        SIGNATURES
    }

    async fn probe(&self) -> Result<ProbeResponse, Error> {
        let reply = self
            .transport
            .get_query(
                MAGIC_BOX,
                &[("action", "getDeviceType")],
                RequestAuth::Anonymous,
            )
            .await?;
        Ok(ProbeResponse {
            status: reply.status,
            body: reply.body,
        })
    }

    async fn authenticate(&self) -> Result<AuthResult, Error> {
        let reply = self
            .transport
            .get_query(
                MAGIC_BOX,
                &[("action", "getDeviceType")],
                RequestAuth::Attached,
            )
            .await?;
        super::auth_from_reply(&reply, Vendor::Dahua, SIGNATURES)
    }
}

#[async_trait]
impl Configuration for DahuaAdapter {
    async fn device_info(&self) -> Result<FieldBag, Error> {
        let mut bag = self.magic_box("getSystemInfo").await?;
        bag.merge(self.magic_box("getSoftwareVersion").await?);
        // Older firmware lacks getVendor; the section is still usable.
        if let Ok(vendor) = self.magic_box("getVendor").await {
            bag.merge(vendor);
        }
        Ok(bag)
    }

    async fn network_info(&self) -> Result<FieldBag, Error> {
        self.config("Network").await
    }

    async fn video_info(&self) -> Result<FieldBag, Error> {
        self.config("Encode").await
    }

    async fn ntp_info(&self) -> Result<FieldBag, Error> {
        self.config("NTP").await
    }

    async fn set_network_configuration(
        &self,
        desired: &NetworkConfig,
    ) -> Result<ApplyOutcome, Error> {
        desired.validate().map_err(Error::InvalidConfiguration)?;
        apply::read_diff_write(&NetworkPlan {
            adapter: self,
            desired,
        })
        .await
    }

    async fn set_ntp_configuration(&self, desired: &NtpConfig) -> Result<ApplyOutcome, Error> {
        if !desired.is_valid() {
            return Err(Error::InvalidConfiguration("NTP server is required".into()));
        }
        apply::read_diff_write(&NtpPlan {
            adapter: self,
            desired,
        })
        .await
    }
}

#[async_trait]
impl Operation for DahuaAdapter {
    fn main_stream_url(&self, channel: u32) -> String {
        format!(
            "{}/cam/realmonitor?channel={channel}&subtype=0",
            super::rtsp_base(&self.host)
        )
    }

    fn sub_stream_url(&self, channel: u32) -> String {
        format!(
            "{}/cam/realmonitor?channel={channel}&subtype=1",
            super::rtsp_base(&self.host)
        )
    }

    async fn reboot(&self) -> Result<(), Error> {
        let body = self
            .transport
            .get_query(MAGIC_BOX, &[("action", "reboot")], RequestAuth::Attached)
            .await?
            .into_body()?;
        if kv::is_ok(&body) {
            Ok(())
        } else {
            Err(Error::Api {
                code: None,
                message: preview(&body),
            })
        }
    }
}

// ── Plans ───────────────────────────────────────────────────────────

/// Configuration keys for the interface the device routes through.
fn interface_keys(current: &FieldBag) -> [String; 6] {
    [
        "IPAddress",
        "SubnetMask",
        "DefaultGateway",
        "DnsServers[0]",
        "DnsServers[1]",
        "DhcpEnable",
    ]
    .map(|leaf| keys::interface_key(current, leaf))
}

struct NetworkPlan<'a> {
    adapter: &'a DahuaAdapter,
    desired: &'a NetworkConfig,
}

#[async_trait]
impl ConfigPlan for NetworkPlan<'_> {
    type Snapshot = FieldBag;

    async fn read(&self) -> Result<FieldBag, Error> {
        self.adapter.network_info().await
    }

    fn desired_fields(&self, current: &FieldBag) -> Vec<DesiredField> {
        let d = self.desired;
        let [ip, mask, gateway, dns1, dns2, dhcp] = interface_keys(current);
        let mut out = vec![
            DesiredField::new("dhcp", &[dhcp.as_str()], "false", Comparison::Flag),
            DesiredField::new("ip_address", &[ip.as_str()], d.ip_address.trim(), Comparison::Address),
        ];
        if !d.subnet_mask.trim().is_empty() {
            let dotted = units::prefix_length_to_mask(units::mask_to_prefix_length(&d.subnet_mask));
            out.push(DesiredField::new("subnet_mask", &[mask.as_str()], dotted, Comparison::Mask));
        }
        if let Some(gw) = d.gateway() {
            out.push(DesiredField::new("gateway", &[gateway.as_str()], gw, Comparison::Address));
        }
        if let Some(dns) = d.dns1() {
            out.push(DesiredField::new("dns1", &[dns1.as_str()], dns, Comparison::Address));
        }
        if let Some(dns) = d.dns2() {
            out.push(DesiredField::new("dns2", &[dns2.as_str()], dns, Comparison::Address));
        }
        out
    }

    async fn write(
        &self,
        _current: &FieldBag,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        self.adapter.set_config(changes).await?;
        Ok(WriteReceipt::default())
    }
}

struct NtpPlan<'a> {
    adapter: &'a DahuaAdapter,
    desired: &'a NtpConfig,
}

#[async_trait]
impl ConfigPlan for NtpPlan<'_> {
    type Snapshot = FieldBag;

    async fn read(&self) -> Result<FieldBag, Error> {
        self.adapter.ntp_info().await
    }

    fn desired_fields(&self, _current: &FieldBag) -> Vec<DesiredField> {
        let d = self.desired;
        let mut out = vec![
            DesiredField::new("server", &[keys::NTP_SERVER], d.server.trim(), Comparison::Text),
            DesiredField::new(
                "enabled",
                &[keys::NTP_ENABLED],
                d.enabled.to_string(),
                Comparison::Flag,
            ),
        ];
        if let Some(tz) = d.timezone() {
            out.push(DesiredField::new("timezone", &[keys::TIMEZONE], tz, Comparison::Text));
        }
        out
    }

    async fn write(
        &self,
        _current: &FieldBag,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        self.adapter.set_config(changes).await?;
        Ok(WriteReceipt::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_keys_follow_default_interface() {
        let current: FieldBag = [("Network.DefaultInterface", "eth2")].into_iter().collect();
        let keys = interface_keys(&current);
        assert_eq!(keys[0], "Network.eth2.IPAddress");
        assert_eq!(keys[3], "Network.eth2.DnsServers[0]");

        let keys = interface_keys(&FieldBag::new());
        assert_eq!(keys[0], "Network.eth0.IPAddress");
    }
}
