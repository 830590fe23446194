// ── ONVIF adapter ──
//
// SOAP 1.2 over HTTP POST to the device and media services. Credentials
// travel in a WS-Security UsernameToken header (on top of HTTP auth when
// the device also challenges at the transport level). A `NotAuthorized`
// fault is the SOAP way of saying 401.

use async_trait::async_trait;
use quick_xml::escape::escape;
use secrecy::SecretString;
use tracing::debug;

use crate::adapter::{Configuration, Connection, Operation};
use crate::apply::{self, ConfigPlan, WriteReceipt};
use crate::auth::{self, ConnectionDescriptor};
use crate::error::Error;
use crate::fields::{self, Comparison, DesiredField, FieldBag, FieldChange};
use crate::transport::{CONTENT_SOAP, HttpReply, HttpTransport, RequestAuth, TransportConfig};
use crate::types::{ApplyOutcome, AuthResult, NetworkConfig, NtpConfig, ProbeResponse};
use crate::units;
use crate::vendor::Vendor;
use crate::wire::soap::{self, DEVICE_NS, MEDIA_NS, SCHEMA_NS};

const DEVICE_SERVICE: &str = "/onvif/device_service";
const MEDIA_SERVICE: &str = "/onvif/media_service";

const SIGNATURES: &[&str] = &[
    "www.onvif.org/ver10/device/wsdl",
    "www.onvif.org/ver10/schema",
    "www.onvif.org/ver10/media/wsdl",
];

/// Keys in the flattened SOAP response bodies.
pub mod keys {
    pub const INTERFACE_TOKEN: &str = "NetworkInterfaces@token";
    pub const IP: &str = "NetworkInterfaces.IPv4.Config.Manual.Address";
    pub const PREFIX: &str = "NetworkInterfaces.IPv4.Config.Manual.PrefixLength";
    pub const DHCP: &str = "NetworkInterfaces.IPv4.Config.DHCP";
    pub const GATEWAY: &str = "NetworkGateway.IPv4Address";
    pub const DNS1: &str = "DNSInformation.DNSManual.IPv4Address";
    pub const DNS2: &str = "DNSInformation.DNSManual[1].IPv4Address";
    pub const DNS_FROM_DHCP: &str = "DNSInformation.FromDHCP";

    pub const NTP_ADDRESS: &str = "NTPInformation.NTPManual.IPv4Address";
    pub const NTP_NAME: &str = "NTPInformation.NTPManual.DNSname";
    pub const NTP_FROM_DHCP: &str = "NTPInformation.FromDHCP";
    pub const DATE_TIME_TYPE: &str = "SystemDateAndTime.DateTimeType";
    pub const DAYLIGHT_SAVINGS: &str = "SystemDateAndTime.DaylightSavings";
    pub const TIMEZONE: &str = "SystemDateAndTime.TimeZone.TZ";

    pub const PROFILE_TOKEN: &str = "Profiles@token";
    pub const STREAM_URI: &str = "MediaUri.Uri";
}

const DEFAULT_INTERFACE_TOKEN: &str = "eth0";

pub struct OnvifAdapter {
    transport: HttpTransport,
    host: String,
    username: String,
    password: SecretString,
}

impl OnvifAdapter {
    pub fn new(descriptor: &ConnectionDescriptor, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            transport: HttpTransport::new(descriptor, config)?,
            host: descriptor.host().to_owned(),
            username: descriptor.username().to_owned(),
            password: descriptor.password().clone(),
        })
    }

    fn secured_envelope(&self, body: &str) -> String {
        let password = auth::expose(&self.password);
        if password.is_empty() {
            return soap::envelope(body, None);
        }
        let security = soap::security_header(&self.username, password);
        soap::envelope(body, Some(&security))
    }

    async fn post(&self, service: &str, body: &str, auth: RequestAuth) -> Result<HttpReply, Error> {
        let envelope = match auth {
            RequestAuth::Anonymous => soap::envelope(body, None),
            RequestAuth::Attached => self.secured_envelope(body),
        };
        self.transport.post(service, CONTENT_SOAP, &envelope, auth).await
    }

    /// Authenticated call; returns the flattened response body.
    async fn call(&self, service: &str, body: &str) -> Result<FieldBag, Error> {
        let reply = self.post(service, body, RequestAuth::Attached).await?;
        soap::check_response(reply)
    }

    async fn device(&self, operation: &str) -> Result<FieldBag, Error> {
        debug!(operation, "onvif device call");
        self.call(DEVICE_SERVICE, &format!(r#"<{operation} xmlns="{DEVICE_NS}"/>"#))
            .await
    }
}

#[async_trait]
impl Connection for OnvifAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Onvif
    }

    fn signatures(&self) -> &'static [&'static str] {
        SIGNATURES
    }

    fn is_auth_challenge(&self, body: &str) -> bool {
        soap::parse_fault(body).is_some_and(|f| f.is_not_authorized())
    }

    async fn probe(&self) -> Result<ProbeResponse, Error> {
        let body = format!(r#"<GetDeviceInformation xmlns="{DEVICE_NS}"/>"#);
        let reply = self
            .post(DEVICE_SERVICE, &body, RequestAuth::Anonymous)
            .await?;
        Ok(ProbeResponse {
            status: reply.status,
            body: reply.body,
        })
    }

    async fn authenticate(&self) -> Result<AuthResult, Error> {
        let body = format!(r#"<GetDeviceInformation xmlns="{DEVICE_NS}"/>"#);
        let reply = self
            .post(DEVICE_SERVICE, &body, RequestAuth::Attached)
            .await?;
        if let Some(fault) = soap::parse_fault(&reply.body) {
            if fault.is_not_authorized() {
                return Ok(AuthResult::rejected(format!(
                    "Invalid credentials: {}",
                    fault.reason
                )));
            }
            return Err(fault.into_error());
        }
        super::auth_from_reply(&reply, Vendor::Onvif, SIGNATURES)
    }
}

#[async_trait]
impl Configuration for OnvifAdapter {
    async fn device_info(&self) -> Result<FieldBag, Error> {
        self.device("GetDeviceInformation").await
    }

    async fn network_info(&self) -> Result<FieldBag, Error> {
        let mut bag = self.device("GetNetworkInterfaces").await?;
        bag.merge(self.device("GetDNS").await?);
        bag.merge(self.device("GetNetworkDefaultGateway").await?);
        Ok(bag)
    }

    async fn video_info(&self) -> Result<FieldBag, Error> {
        let mut bag = self
            .call(MEDIA_SERVICE, &format!(r#"<GetProfiles xmlns="{MEDIA_NS}"/>"#))
            .await?;
        if let Some(token) = fields::lookup_text(&bag, &[keys::PROFILE_TOKEN]) {
            let body = format!(
                r#"<GetStreamUri xmlns="{MEDIA_NS}"><StreamSetup><Stream xmlns="{SCHEMA_NS}">RTP-Unicast</Stream><Transport xmlns="{SCHEMA_NS}"><Protocol>RTSP</Protocol></Transport></StreamSetup><ProfileToken>{}</ProfileToken></GetStreamUri>"#,
                escape(&token)
            );
            match self.call(MEDIA_SERVICE, &body).await {
                Ok(uri) => bag.merge(uri),
                Err(e) => debug!(error = %e, "GetStreamUri failed, keeping derived stream URL"),
            }
        }
        Ok(bag)
    }

    async fn ntp_info(&self) -> Result<FieldBag, Error> {
        let mut bag = self.device("GetNTP").await?;
        bag.merge(self.device("GetSystemDateAndTime").await?);
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
impl Operation for OnvifAdapter {
    fn main_stream_url(&self, channel: u32) -> String {
        let profile = channel.saturating_mul(2).saturating_sub(1);
        format!("{}/onvif/profile{profile}/media.smp", super::rtsp_base(&self.host))
    }

    fn sub_stream_url(&self, channel: u32) -> String {
        // Profiles come in main/sub pairs: channel N is profile 2N-1 and 2N.
        let profile = channel.saturating_mul(2);
        format!("{}/onvif/profile{profile}/media.smp", super::rtsp_base(&self.host))
    }

    async fn reboot(&self) -> Result<(), Error> {
        self.device("SystemReboot").await.map(|_| ())
    }
}

// ── Request bodies ──────────────────────────────────────────────────

fn set_network_interfaces(token: &str, address: &str, prefix: u8) -> String {
    format!(
        r#"<SetNetworkInterfaces xmlns="{DEVICE_NS}"><InterfaceToken>{}</InterfaceToken><NetworkInterface><Enabled xmlns="{SCHEMA_NS}">true</Enabled><IPv4 xmlns="{SCHEMA_NS}"><Enabled>true</Enabled><Manual><Address>{}</Address><PrefixLength>{prefix}</PrefixLength></Manual><DHCP>false</DHCP></IPv4></NetworkInterface></SetNetworkInterfaces>"#,
        escape(token),
        escape(address)
    )
}

fn set_default_gateway(gateway: &str) -> String {
    format!(
        r#"<SetNetworkDefaultGateway xmlns="{DEVICE_NS}"><IPv4Address>{}</IPv4Address></SetNetworkDefaultGateway>"#,
        escape(gateway)
    )
}

fn set_dns(servers: &[String]) -> String {
    let manual: String = servers
        .iter()
        .map(|s| {
            format!(
                r#"<DNSManual><Type xmlns="{SCHEMA_NS}">IPv4</Type><IPv4Address xmlns="{SCHEMA_NS}">{}</IPv4Address></DNSManual>"#,
                escape(s)
            )
        })
        .collect();
    format!(r#"<SetDNS xmlns="{DEVICE_NS}"><FromDHCP>false</FromDHCP>{manual}</SetDNS>"#)
}

fn set_ntp(server: &str, is_address: bool) -> String {
    let (kind, element) = if is_address {
        ("IPv4", "IPv4Address")
    } else {
        ("DNS", "DNSname")
    };
    format!(
        r#"<SetNTP xmlns="{DEVICE_NS}"><FromDHCP>false</FromDHCP><NTPManual><Type xmlns="{SCHEMA_NS}">{kind}</Type><{element} xmlns="{SCHEMA_NS}">{}</{element}></NTPManual></SetNTP>"#,
        escape(server)
    )
}

fn set_system_date_and_time(ntp: bool, daylight_savings: bool, timezone: Option<&str>) -> String {
    let tz = timezone
        .map(|tz| format!(r#"<TimeZone><TZ xmlns="{SCHEMA_NS}">{}</TZ></TimeZone>"#, escape(tz)))
        .unwrap_or_default();
    let utc = if ntp {
        String::new()
    } else {
        use chrono::{Datelike, Timelike};
        let now = chrono::Utc::now();
        format!(
            r#"<UTCDateTime><Date xmlns="{SCHEMA_NS}"><Year>{}</Year><Month>{}</Month><Day>{}</Day></Date><Time xmlns="{SCHEMA_NS}"><Hour>{}</Hour><Minute>{}</Minute><Second>{}</Second></Time></UTCDateTime>"#,
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second()
        )
    };
    let kind = if ntp { "NTP" } else { "Manual" };
    format!(
        r#"<SetSystemDateAndTime xmlns="{DEVICE_NS}"><DateTimeType>{kind}</DateTimeType><DaylightSavings>{daylight_savings}</DaylightSavings>{tz}{utc}</SetSystemDateAndTime>"#
    )
}

// ── Plans ───────────────────────────────────────────────────────────

struct NetworkPlan<'a> {
    adapter: &'a OnvifAdapter,
    desired: &'a NetworkConfig,
}

#[async_trait]
impl ConfigPlan for NetworkPlan<'_> {
    type Snapshot = FieldBag;

    async fn read(&self) -> Result<FieldBag, Error> {
        self.adapter.network_info().await
    }

    fn desired_fields(&self, _current: &FieldBag) -> Vec<DesiredField> {
        let d = self.desired;
        let mut out = vec![
            DesiredField::new("dhcp", &[keys::DHCP], "false", Comparison::Flag),
            DesiredField::new("ip_address", &[keys::IP], d.ip_address.trim(), Comparison::Address),
        ];
        if !d.subnet_mask.trim().is_empty() {
            out.push(DesiredField::new(
                "subnet_mask",
                &[keys::PREFIX],
                d.subnet_mask.trim(),
                Comparison::Mask,
            ));
        }
        if let Some(gw) = d.gateway() {
            out.push(DesiredField::new("gateway", &[keys::GATEWAY], gw, Comparison::Address));
        }
        if d.dns1().is_some() || d.dns2().is_some() {
            out.push(DesiredField::new(
                "dns_manual",
                &[keys::DNS_FROM_DHCP],
                "false",
                Comparison::Flag,
            ));
        }
        if let Some(dns) = d.dns1() {
            out.push(DesiredField::new("dns1", &[keys::DNS1], dns, Comparison::Address));
        }
        if let Some(dns) = d.dns2() {
            out.push(DesiredField::new("dns2", &[keys::DNS2], dns, Comparison::Address));
        }
        out
    }

    async fn write(
        &self,
        current: &FieldBag,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        let d = self.desired;
        let a = self.adapter;

        if apply::touches(changes, &["dns_manual", "dns1", "dns2"]) {
            let servers: Vec<String> = [
                d.dns1()
                    .map(str::to_owned)
                    .or_else(|| fields::lookup_text(current, &[keys::DNS1])),
                d.dns2()
                    .map(str::to_owned)
                    .or_else(|| fields::lookup_text(current, &[keys::DNS2])),
            ]
            .into_iter()
            .flatten()
            .collect();
            a.call(DEVICE_SERVICE, &set_dns(&servers)).await?;
        }

        if let Some(gw) = d.gateway().filter(|_| apply::touches(changes, &["gateway"])) {
            a.call(DEVICE_SERVICE, &set_default_gateway(gw)).await?;
        }

        let mut receipt = WriteReceipt::default();
        if apply::touches(changes, &["dhcp", "ip_address", "subnet_mask"]) {
            let token = fields::resolve(current, &[keys::INTERFACE_TOKEN], DEFAULT_INTERFACE_TOKEN);
            let prefix = if d.subnet_mask.trim().is_empty() {
                fields::lookup_text(current, &[keys::PREFIX])
                    .map_or(units::DEFAULT_PREFIX_LENGTH, |p| {
                        units::mask_to_prefix_length(&p)
                    })
            } else {
                units::mask_to_prefix_length(&d.subnet_mask)
            };
            let reply = a
                .call(
                    DEVICE_SERVICE,
                    &set_network_interfaces(&token, d.ip_address.trim(), prefix),
                )
                .await?;
            receipt.restart_required =
                fields::lookup_bool(&reply, &["RebootNeeded"]).unwrap_or(false);
        }
        Ok(receipt)
    }

    async fn follow_up(&self) -> Result<(), Error> {
        self.adapter.reboot().await
    }
}

struct NtpPlan<'a> {
    adapter: &'a OnvifAdapter,
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
        let server_key = if d.server_is_address() {
            keys::NTP_ADDRESS
        } else {
            keys::NTP_NAME
        };
        let kind = if d.enabled { "NTP" } else { "Manual" };
        let mut out = vec![
            DesiredField::new("ntp_manual", &[keys::NTP_FROM_DHCP], "false", Comparison::Flag),
            DesiredField::new("server", &[server_key], d.server.trim(), Comparison::Text),
            DesiredField::new("time_mode", &[keys::DATE_TIME_TYPE], kind, Comparison::Text),
        ];
        if let Some(tz) = d.timezone() {
            out.push(DesiredField::new("timezone", &[keys::TIMEZONE], tz, Comparison::Text));
        }
        out
    }

    async fn write(
        &self,
        current: &FieldBag,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        let d = self.desired;
        if apply::touches(changes, &["ntp_manual", "server"]) {
            self.adapter
                .call(
                    DEVICE_SERVICE,
                    &set_ntp(d.server.trim(), d.server_is_address()),
                )
                .await?;
        }
        if apply::touches(changes, &["time_mode", "timezone"]) {
            let dst = fields::lookup_bool(current, &[keys::DAYLIGHT_SAVINGS]).unwrap_or(false);
            let tz = d
                .timezone()
                .map(str::to_owned)
                .or_else(|| fields::lookup_text(current, &[keys::TIMEZONE]));
            self.adapter
                .call(
                    DEVICE_SERVICE,
                    &set_system_date_and_time(d.enabled, dst, tz.as_deref()),
                )
                .await?;
        }
        Ok(WriteReceipt::default())
    }
}
