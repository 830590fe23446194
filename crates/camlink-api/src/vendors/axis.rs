// ── Axis (VAPIX) adapter ──
//
// JSON-RPC style requests (`apiVersion`/`context`/`method`/`params`)
// POSTed to `/axis-cgi/*.cgi`, plus the legacy `param.cgi` key/value
// listing for image settings. Errors arrive as an `error` object on an
// HTTP 200.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::adapter::{Configuration, Connection, Operation};
use crate::apply::{self, ConfigPlan, WriteReceipt};
use crate::auth::ConnectionDescriptor;
use crate::error::Error;
use crate::fields::{self, Comparison, DesiredField, FieldBag, FieldChange};
use crate::transport::{CONTENT_JSON, HttpTransport, RequestAuth, TransportConfig};
use crate::types::{ApplyOutcome, AuthResult, NetworkConfig, NtpConfig, ProbeResponse};
use crate::units;
use crate::vendor::Vendor;
use crate::wire::{json, kv};

const BASIC_DEVICE_INFO: &str = "/axis-cgi/basicdeviceinfo.cgi";
const NETWORK_SETTINGS: &str = "/axis-cgi/network_settings.cgi";
const NTP: &str = "/axis-cgi/ntp.cgi";
const TIME: &str = "/axis-cgi/time.cgi";
const PARAM: &str = "/axis-cgi/param.cgi";
const RESTART: &str = "/axis-cgi/restart.cgi";

const API_VERSION: &str = "1.0";
const CONTEXT: &str = "camlink";
const DEVICE_NAME: &str = "eth0";

const SIGNATURES: &[&str] = &["\"apiVersion\"", "propertyList", "ProdNbr", "AXIS"];

/// Current-value keys in the flattened network and NTP reads. Resolver
/// fields sit under `resolver.`.
pub mod keys {
    pub const IP: &[&str] = &[
        "data.staticAddressConfigurations[0].address",
        "data.addressConfigurations[0].address",
    ];
    pub const PREFIX: &[&str] = &[
        "data.staticAddressConfigurations[0].prefixLength",
        "data.addressConfigurations[0].prefixLength",
    ];
    pub const GATEWAY: &[&str] = &["data.staticDefaultRouter", "data.defaultRouter"];
    pub const MODE: &[&str] = &["data.configurationMode"];
    pub const DNS1: &[&str] = &[
        "resolver.data.staticNameServers[0]",
        "resolver.data.nameServers[0]",
    ];
    pub const DNS2: &[&str] = &[
        "resolver.data.staticNameServers[1]",
        "resolver.data.nameServers[1]",
    ];
    pub const NTP_SERVER: &[&str] = &["data.staticServers[0]", "data.servers[0]"];
    pub const NTP_ENABLED: &[&str] = &["data.enabled"];
    pub const TIMEZONE: &[&str] = &["data.timeZone"];
}

pub struct AxisAdapter {
    transport: HttpTransport,
    host: String,
}

impl AxisAdapter {
    pub fn new(descriptor: &ConnectionDescriptor, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            transport: HttpTransport::new(descriptor, config)?,
            host: descriptor.host().to_owned(),
        })
    }

    fn request_body(method: &str, params: Option<Value>) -> String {
        let mut body = json!({
            "apiVersion": API_VERSION,
            "context": CONTEXT,
            "method": method,
        });
        if let Some(params) = params {
            body["params"] = params;
        }
        body.to_string()
    }

    async fn call(&self, path: &str, method: &str, params: Option<Value>) -> Result<Value, Error> {
        debug!(method, "vapix call");
        let body = Self::request_body(method, params);
        let text = self
            .transport
            .post(path, CONTENT_JSON, &body, RequestAuth::Attached)
            .await?
            .into_body()?;
        let value = json::parse(&text)?;
        check_rpc_error(&value)?;
        Ok(value)
    }

    async fn call_flat(
        &self,
        path: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<FieldBag, Error> {
        Ok(json::flatten(&self.call(path, method, params).await?))
    }

    async fn params(&self, group: &str) -> Result<FieldBag, Error> {
        let body = self
            .transport
            .get_query(
                PARAM,
                &[("action", "list"), ("group", group)],
                RequestAuth::Attached,
            )
            .await?
            .into_body()?;
        if let Some(message) = kv::error_message(&body) {
            return Err(Error::Api {
                code: None,
                message,
            });
        }
        Ok(kv::parse(&body, Some("root.")))
    }
}

/// VAPIX reports failures as `{"error": {"code": ..., "message": ...}}`.
fn check_rpc_error(value: &Value) -> Result<(), Error> {
    let Some(err) = value.get("error") else {
        return Ok(());
    };
    let code = err.get("code").map(|c| match c {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_owned();
    Err(Error::Api { code, message })
}

#[async_trait]
impl Connection for AxisAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Axis
    }

    fn signatures(&self) -> &'static [&'static str] {
        SIGNATURES
    }

    async fn probe(&self) -> Result<ProbeResponse, Error> {
        let body = Self::request_body("getAllUnrestrictedProperties", None);
        let reply = self
            .transport
            .post(BASIC_DEVICE_INFO, CONTENT_JSON, &body, RequestAuth::Anonymous)
            .await?;
        Ok(ProbeResponse {
            status: reply.status,
            body: reply.body,
        })
    }

    async fn authenticate(&self) -> Result<AuthResult, Error> {
        let body = Self::request_body("getAllProperties", None);
        let reply = self
            .transport
            .post(BASIC_DEVICE_INFO, CONTENT_JSON, &body, RequestAuth::Attached)
            .await?;
        super::auth_from_reply(&reply, Vendor::Axis, SIGNATURES)
    }
}

#[async_trait]
impl Configuration for AxisAdapter {
    async fn device_info(&self) -> Result<FieldBag, Error> {
        self.call_flat(BASIC_DEVICE_INFO, "getAllProperties", None)
            .await
    }

    async fn network_info(&self) -> Result<FieldBag, Error> {
        let mut bag = self
            .call_flat(
                NETWORK_SETTINGS,
                "getIPv4AddressConfiguration",
                Some(json!({ "deviceName": DEVICE_NAME })),
            )
            .await?;
        let resolver = self
            .call_flat(NETWORK_SETTINGS, "getResolverConfiguration", None)
            .await?;
        bag.merge_prefixed("resolver", resolver);
        Ok(bag)
    }

    async fn video_info(&self) -> Result<FieldBag, Error> {
        self.params("Image.I0").await
    }

    async fn ntp_info(&self) -> Result<FieldBag, Error> {
        let mut bag = self.call_flat(NTP, "getNTPInfo", None).await?;
        bag.merge(self.call_flat(TIME, "getDateTimeInfo", None).await?);
        Ok(bag)
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
impl Operation for AxisAdapter {
    fn main_stream_url(&self, channel: u32) -> String {
        format!(
            "{}/axis-media/media.amp?camera={channel}",
            super::rtsp_base(&self.host)
        )
    }

    fn sub_stream_url(&self, channel: u32) -> String {
        format!(
            "{}/axis-media/media.amp?camera={channel}&resolution=640x360",
            super::rtsp_base(&self.host)
        )
    }

    async fn reboot(&self) -> Result<(), Error> {
        self.transport
            .get(RESTART, RequestAuth::Attached)
            .await?
            .into_body()?;
        Ok(())
    }
}

// ── Network plan ────────────────────────────────────────────────────

struct NetworkPlan<'a> {
    adapter: &'a AxisAdapter,
    desired: &'a NetworkConfig,
}

#[async_trait]
impl ConfigPlan for NetworkPlan<'_> {
    type Snapshot = FieldBag;

    async fn read(&self) -> Result<FieldBag, Error> {
        self.adapter.network_info().await
    }

    fn desired_fields(&self, _snapshot: &FieldBag) -> Vec<DesiredField> {
        let d = self.desired;
        let mut out = vec![
            DesiredField::new("ip_address", keys::IP, d.ip_address.trim(), Comparison::Address),
            DesiredField::new("mode", keys::MODE, "static", Comparison::Text),
        ];
        if !d.subnet_mask.trim().is_empty() {
            out.push(DesiredField::new(
                "subnet_mask",
                keys::PREFIX,
                d.subnet_mask.trim(),
                Comparison::Mask,
            ));
        }
        if let Some(gw) = d.gateway() {
            out.push(DesiredField::new("gateway", keys::GATEWAY, gw, Comparison::Address));
        }
        if let Some(dns) = d.dns1() {
            out.push(DesiredField::new("dns1", keys::DNS1, dns, Comparison::Address));
        }
        if let Some(dns) = d.dns2() {
            out.push(DesiredField::new("dns2", keys::DNS2, dns, Comparison::Address));
        }
        out
    }

    async fn write(
        &self,
        current: &FieldBag,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        let d = self.desired;

        // Resolver first: once the address moves, the old one stops answering.
        if apply::touches(changes, &["dns1", "dns2"]) {
            let servers: Vec<String> = [
                d.dns1()
                    .map(str::to_owned)
                    .or_else(|| fields::lookup_text(current, keys::DNS1)),
                d.dns2()
                    .map(str::to_owned)
                    .or_else(|| fields::lookup_text(current, keys::DNS2)),
            ]
            .into_iter()
            .flatten()
            .collect();
            self.adapter
                .call(
                    NETWORK_SETTINGS,
                    "setResolverConfiguration",
                    Some(json!({
                        "useDhcpResolverInfo": false,
                        "staticNameServers": servers,
                    })),
                )
                .await?;
        }

        if apply::touches(changes, &["ip_address", "subnet_mask", "gateway", "mode"]) {
            let prefix = if d.subnet_mask.trim().is_empty() {
                fields::lookup_text(current, keys::PREFIX)
                    .map_or(units::DEFAULT_PREFIX_LENGTH, |p| {
                        units::mask_to_prefix_length(&p)
                    })
            } else {
                units::mask_to_prefix_length(&d.subnet_mask)
            };
            let router = d
                .gateway()
                .map(str::to_owned)
                .or_else(|| fields::lookup_text(current, keys::GATEWAY))
                .unwrap_or_default();
            self.adapter
                .call(
                    NETWORK_SETTINGS,
                    "setIPv4AddressConfiguration",
                    Some(json!({
                        "deviceName": DEVICE_NAME,
                        "configurationMode": "static",
                        "staticDefaultRouter": router,
                        "staticAddressConfigurations": [{
                            "address": d.ip_address.trim(),
                            "prefixLength": prefix,
                        }],
                    })),
                )
                .await?;
        }

        Ok(WriteReceipt::default())
    }
}

// ── NTP plan ────────────────────────────────────────────────────────

struct NtpPlan<'a> {
    adapter: &'a AxisAdapter,
    desired: &'a NtpConfig,
}

#[async_trait]
impl ConfigPlan for NtpPlan<'_> {
    type Snapshot = FieldBag;

    async fn read(&self) -> Result<FieldBag, Error> {
        self.adapter.ntp_info().await
    }

    fn desired_fields(&self, _snapshot: &FieldBag) -> Vec<DesiredField> {
        let d = self.desired;
        let mut out = vec![
            DesiredField::new("server", keys::NTP_SERVER, d.server.trim(), Comparison::Text),
            DesiredField::new(
                "enabled",
                keys::NTP_ENABLED,
                d.enabled.to_string(),
                Comparison::Flag,
            ),
        ];
        if let Some(tz) = d.timezone() {
            out.push(DesiredField::new("timezone", keys::TIMEZONE, tz, Comparison::Text));
        }
        out
    }

    async fn write(
        &self,
        _current: &FieldBag,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        let d = self.desired;
        if apply::touches(changes, &["server", "enabled"]) {
            self.adapter
                .call(
                    NTP,
                    "setNTPClientConfiguration",
                    Some(json!({
                        "enabled": d.enabled,
                        "serversSource": "static",
                        "staticServers": [d.server.trim()],
                    })),
                )
                .await?;
        }
        if let Some(tz) = d.timezone().filter(|_| apply::touches(changes, &["timezone"])) {
            self.adapter
                .call(TIME, "setTimeZone", Some(json!({ "timeZone": tz })))
                .await?;
        }
        Ok(WriteReceipt::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_object_becomes_api_error() {
        let value = json!({"apiVersion": "1.0", "error": {"code": 2101, "message": "Invalid parameter"}});
        match check_rpc_error(&value) {
            Err(Error::Api { code, message }) => {
                assert_eq!(code.as_deref(), Some("2101"));
                assert_eq!(message, "Invalid parameter");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(check_rpc_error(&json!({"data": {}})).is_ok());
    }

    #[test]
    fn request_body_omits_params_when_absent() {
        let body: Value =
            serde_json::from_str(&AxisAdapter::request_body("getAllProperties", None)).unwrap();
        assert_eq!(body["method"], "getAllProperties");
        assert_eq!(body["apiVersion"], API_VERSION);
        assert!(body.get("params").is_none());
    }

    #[test]
    fn stream_urls_use_rtsp_port() {
        let d = ConnectionDescriptor::new("10.0.0.8", 80);
        let a = AxisAdapter::new(&d, &TransportConfig::default()).unwrap();
        assert_eq!(
            a.main_stream_url(1),
            "rtsp://10.0.0.8:554/axis-media/media.amp?camera=1"
        );
        assert!(a.sub_stream_url(2).contains("camera=2&resolution="));
    }
}
