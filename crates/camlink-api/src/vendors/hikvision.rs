// ── Hikvision (ISAPI) adapter ──
//
// XML resources under `/ISAPI`. Writes are read-modify-write on the whole
// resource document: the current XML is fetched, only the changed leaves
// are rewritten, and the document is PUT back. Write results come back as
// a `ResponseStatus` document whose status code 7 means "reboot required".

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::adapter::{Configuration, Connection, Operation};
use crate::apply::{self, ConfigPlan, WriteReceipt};
use crate::auth::ConnectionDescriptor;
use crate::error::Error;
use crate::fields::{self, Comparison, DesiredField, FieldBag, FieldChange};
use crate::transport::{CONTENT_XML, HttpReply, HttpTransport, RequestAuth, TransportConfig};
use crate::types::{ApplyOutcome, AuthResult, NetworkConfig, NtpConfig, ProbeResponse};
use crate::vendor::Vendor;
use crate::wire::xml;

const DEVICE_INFO: &str = "/ISAPI/System/deviceInfo";
const IP_ADDRESS: &str = "/ISAPI/System/Network/interfaces/1/ipAddress";
const STREAM_CHANNEL: &str = "/ISAPI/Streaming/channels/101";
const TIME: &str = "/ISAPI/System/time";
const NTP_SERVER: &str = "/ISAPI/System/time/ntpServers/1";
const REBOOT: &str = "/ISAPI/System/reboot";

const SIGNATURES: &[&str] = &[
    "www.hikvision.com/ver10/XMLSchema",
    "www.hikvision.com/ver20/XMLSchema",
    "www.isapi.org/ver20/XMLSchema",
];

const STATUS_OK: u64 = 1;
const STATUS_REBOOT_REQUIRED: u64 = 7;

/// Leaf paths in the flattened ISAPI documents.
pub mod keys {
    pub const ADDRESSING: &str = "addressingType";
    pub const IP: &str = "ipAddress";
    pub const MASK: &str = "subnetMask";
    pub const GATEWAY: &str = "DefaultGateway.ipAddress";
    pub const DNS1: &str = "PrimaryDNS.ipAddress";
    pub const DNS2: &str = "SecondaryDNS.ipAddress";

    pub const TIME_MODE: &str = "timeMode";
    pub const TIMEZONE: &str = "timeZone";
    pub const NTP_FORMAT: &str = "addressingFormatType";
    pub const NTP_HOST: &str = "hostName";
    pub const NTP_IP: &str = "ipAddress";
}

pub struct HikvisionAdapter {
    transport: HttpTransport,
    host: String,
}

impl HikvisionAdapter {
    pub fn new(descriptor: &ConnectionDescriptor, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            transport: HttpTransport::new(descriptor, config)?,
            host: descriptor.host().to_owned(),
        })
    }

    async fn fetch(&self, path: &str) -> Result<String, Error> {
        self.transport
            .get(path, RequestAuth::Attached)
            .await?
            .into_body()
    }

    async fn fetch_flat(&self, path: &str) -> Result<FieldBag, Error> {
        xml::flatten(&self.fetch(path).await?)
    }

    /// Rewrite `edits` into `document` and PUT it back to `path`. Nothing
    /// is sent when the document lacks any of the target leaves.
    async fn put_document(
        &self,
        path: &str,
        document: &str,
        edits: &[(&str, &str)],
    ) -> Result<WriteReceipt, Error> {
        let rewrite = xml::rewrite_leaves(document, edits)?;
        if !rewrite.missing.is_empty() {
            warn!(path, missing = ?rewrite.missing, "device document lacks fields to update");
            return Err(Error::malformed(
                "XML",
                format!("{path} has no element for {}", rewrite.missing.join(", ")),
            ));
        }
        let reply = self
            .transport
            .put(path, CONTENT_XML, &rewrite.document, RequestAuth::Attached)
            .await?;
        parse_response_status(reply)
    }
}

/// Interpret an ISAPI write reply.
fn parse_response_status(reply: HttpReply) -> Result<WriteReceipt, Error> {
    if reply.is_unauthorized() {
        return reply.into_body().map(|_| WriteReceipt::default());
    }
    let status = xml::flatten(&reply.body).ok().and_then(|bag| {
        let code = fields::lookup_u64(&bag, &["statusCode"])?;
        Some((code, bag))
    });

    match status {
        Some((STATUS_OK, _)) => Ok(WriteReceipt::default()),
        Some((STATUS_REBOOT_REQUIRED, _)) => Ok(WriteReceipt {
            restart_required: true,
        }),
        Some((code, bag)) => Err(Error::Api {
            code: Some(fields::resolve(&bag, &["subStatusCode"], &code.to_string())),
            message: fields::resolve(&bag, &["statusString"], "Unknown error"),
        }),
        None if reply.is_success() => Ok(WriteReceipt::default()),
        None => reply.into_body().map(|_| WriteReceipt::default()),
    }
}

#[async_trait]
impl Connection for HikvisionAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Hikvision
    }

    fn signatures(&self) -> &'static [&'static str] {
        SIGNATURES
    }

    async fn probe(&self) -> Result<ProbeResponse, Error> {
        let reply = self.transport.get(DEVICE_INFO, RequestAuth::Anonymous).await?;
        Ok(ProbeResponse {
            status: reply.status,
            body: reply.body,
        })
    }

    async fn authenticate(&self) -> Result<AuthResult, Error> {
        let reply = self.transport.get(DEVICE_INFO, RequestAuth::Attached).await?;
        super::auth_from_reply(&reply, Vendor::Hikvision, SIGNATURES)
    }
}

#[async_trait]
impl Configuration for HikvisionAdapter {
    async fn device_info(&self) -> Result<FieldBag, Error> {
        self.fetch_flat(DEVICE_INFO).await
    }

    async fn network_info(&self) -> Result<FieldBag, Error> {
        self.fetch_flat(IP_ADDRESS).await
    }

    async fn video_info(&self) -> Result<FieldBag, Error> {
        self.fetch_flat(STREAM_CHANNEL).await
    }

    async fn ntp_info(&self) -> Result<FieldBag, Error> {
        let mut bag = self.fetch_flat(TIME).await?;
        bag.merge(self.fetch_flat(NTP_SERVER).await?);
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
impl Operation for HikvisionAdapter {
    fn main_stream_url(&self, channel: u32) -> String {
        format!(
            "{}/Streaming/Channels/{channel}01",
            super::rtsp_base(&self.host)
        )
    }

    fn sub_stream_url(&self, channel: u32) -> String {
        format!(
            "{}/Streaming/Channels/{channel}02",
            super::rtsp_base(&self.host)
        )
    }

    async fn reboot(&self) -> Result<(), Error> {
        let reply = self
            .transport
            .put(REBOOT, CONTENT_XML, "", RequestAuth::Attached)
            .await?;
        parse_response_status(reply).map(|_| ())
    }
}

// ── Network plan ────────────────────────────────────────────────────

/// Flattened fields plus the raw document they came from.
struct Snapshot {
    bag: FieldBag,
    document: String,
}

impl AsRef<FieldBag> for Snapshot {
    fn as_ref(&self) -> &FieldBag {
        &self.bag
    }
}

struct NetworkPlan<'a> {
    adapter: &'a HikvisionAdapter,
    desired: &'a NetworkConfig,
}

#[async_trait]
impl ConfigPlan for NetworkPlan<'_> {
    type Snapshot = Snapshot;

    async fn read(&self) -> Result<Snapshot, Error> {
        let document = self.adapter.fetch(IP_ADDRESS).await?;
        Ok(Snapshot {
            bag: xml::flatten(&document)?,
            document,
        })
    }

    fn desired_fields(&self, _snapshot: &Snapshot) -> Vec<DesiredField> {
        let d = self.desired;
        let mut out = vec![
            DesiredField::new("addressing", &[keys::ADDRESSING], "static", Comparison::Text),
            DesiredField::new("ip_address", &[keys::IP], d.ip_address.trim(), Comparison::Address),
        ];
        if !d.subnet_mask.trim().is_empty() {
            let mask = crate::units::prefix_length_to_mask(crate::units::mask_to_prefix_length(
                &d.subnet_mask,
            ));
            out.push(DesiredField::new("subnet_mask", &[keys::MASK], mask, Comparison::Mask));
        }
        if let Some(gw) = d.gateway() {
            out.push(DesiredField::new("gateway", &[keys::GATEWAY], gw, Comparison::Address));
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
        snapshot: &Snapshot,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        let edits: Vec<(&str, &str)> = changes
            .iter()
            .map(|c| (c.key.as_str(), c.desired.as_str()))
            .collect();
        debug!(edits = edits.len(), "updating ISAPI ipAddress document");
        self.adapter
            .put_document(IP_ADDRESS, &snapshot.document, &edits)
            .await
    }

    async fn follow_up(&self) -> Result<(), Error> {
        self.adapter.reboot().await
    }
}

// ── NTP plan ────────────────────────────────────────────────────────

struct NtpSnapshot {
    bag: FieldBag,
    time_document: String,
    server_document: String,
}

impl AsRef<FieldBag> for NtpSnapshot {
    fn as_ref(&self) -> &FieldBag {
        &self.bag
    }
}

struct NtpPlan<'a> {
    adapter: &'a HikvisionAdapter,
    desired: &'a NtpConfig,
}

const SERVER_FIELDS: &[&str] = &["server_format", "server"];
const TIME_FIELDS: &[&str] = &["time_mode", "timezone"];

#[async_trait]
impl ConfigPlan for NtpPlan<'_> {
    type Snapshot = NtpSnapshot;

    async fn read(&self) -> Result<NtpSnapshot, Error> {
        let time_document = self.adapter.fetch(TIME).await?;
        let server_document = self.adapter.fetch(NTP_SERVER).await?;
        let mut bag = xml::flatten(&time_document)?;
        bag.merge(xml::flatten(&server_document)?);
        Ok(NtpSnapshot {
            bag,
            time_document,
            server_document,
        })
    }

    fn desired_fields(&self, _snapshot: &NtpSnapshot) -> Vec<DesiredField> {
        let d = self.desired;
        let (format, server_key) = if d.server_is_address() {
            ("ipaddress", keys::NTP_IP)
        } else {
            ("hostname", keys::NTP_HOST)
        };
        let mode = if d.enabled { "NTP" } else { "manual" };
        let mut out = vec![
            DesiredField::new("server_format", &[keys::NTP_FORMAT], format, Comparison::Text),
            DesiredField::new("server", &[server_key], d.server.trim(), Comparison::Text),
            DesiredField::new("time_mode", &[keys::TIME_MODE], mode, Comparison::Text),
        ];
        if let Some(tz) = d.timezone() {
            out.push(DesiredField::new("timezone", &[keys::TIMEZONE], tz, Comparison::Text));
        }
        out
    }

    async fn write(
        &self,
        snapshot: &NtpSnapshot,
        changes: &[FieldChange],
    ) -> Result<WriteReceipt, Error> {
        let mut receipt = WriteReceipt::default();
        let server_edits = edits_for(changes, SERVER_FIELDS);
        if !server_edits.is_empty() {
            receipt = receipt.merge(
                self.adapter
                    .put_document(NTP_SERVER, &snapshot.server_document, &server_edits)
                    .await?,
            );
        }
        let time_edits = edits_for(changes, TIME_FIELDS);
        if !time_edits.is_empty() {
            receipt = receipt.merge(
                self.adapter
                    .put_document(TIME, &snapshot.time_document, &time_edits)
                    .await?,
            );
        }
        Ok(receipt)
    }

    async fn follow_up(&self) -> Result<(), Error> {
        self.adapter.reboot().await
    }
}

fn edits_for<'c>(changes: &'c [FieldChange], names: &[&str]) -> Vec<(&'c str, &'c str)> {
    changes
        .iter()
        .filter(|c| names.contains(&c.field.as_str()))
        .map(|c| (c.key.as_str(), c.desired.as_str()))
        .collect()
}
