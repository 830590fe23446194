#![allow(clippy::unwrap_used)]
// Integration tests for `OnvifAdapter` using wiremock.

use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use camlink_api::fields::resolve;
use camlink_api::{
    Configuration, Connection, ConnectionDescriptor, Error, NetworkConfig, OnvifAdapter,
    SecondaryStep, TransportConfig,
};

async fn setup(password: &str) -> (MockServer, OnvifAdapter) {
    let server = MockServer::start().await;
    let addr = server.address();
    let descriptor = ConnectionDescriptor::new(addr.ip().to_string(), addr.port())
        .with_credentials("admin", SecretString::from(password.to_owned()));
    let adapter = OnvifAdapter::new(&descriptor, &TransportConfig::default()).unwrap();
    (server, adapter)
}

fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope" xmlns:tds="http://www.onvif.org/ver10/device/wsdl" xmlns:tt="http://www.onvif.org/ver10/schema" xmlns:ter="http://www.onvif.org/ver10/error">
<SOAP-ENV:Body>{body}</SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#
    )
}

fn not_authorized() -> String {
    envelope(
        "<SOAP-ENV:Fault><SOAP-ENV:Code><SOAP-ENV:Value>SOAP-ENV:Sender</SOAP-ENV:Value>\
         <SOAP-ENV:Subcode><SOAP-ENV:Value>ter:NotAuthorized</SOAP-ENV:Value></SOAP-ENV:Subcode>\
         </SOAP-ENV:Code><SOAP-ENV:Reason><SOAP-ENV:Text>Sender not Authorized</SOAP-ENV:Text>\
         </SOAP-ENV:Reason></SOAP-ENV:Fault>",
    )
}

fn device_information() -> String {
    envelope(
        "<tds:GetDeviceInformationResponse>\
         <tds:Manufacturer>Uniview</tds:Manufacturer><tds:Model>IPC2124LB</tds:Model>\
         <tds:FirmwareVersion>GIPC-B6202.4.1</tds:FirmwareVersion>\
         <tds:SerialNumber>210235C3EN3201000123</tds:SerialNumber>\
         <tds:HardwareId>1.0</tds:HardwareId></tds:GetDeviceInformationResponse>",
    )
}

fn mount_action(action: &'static str, status: u16, body: String) -> Mock {
    Mock::given(method("POST"))
        .and(path("/onvif/device_service"))
        .and(body_string_contains(action))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
}

#[tokio::test]
async fn probe_fault_counts_as_auth_challenge() {
    let (server, adapter) = setup("").await;

    mount_action("GetDeviceInformation", 400, not_authorized())
        .mount(&server)
        .await;

    let probe = adapter.probe().await.unwrap();
    assert_eq!(probe.status, 400);
    assert!(adapter.is_auth_challenge(&probe.body));
    assert!(!adapter.is_auth_challenge(&device_information()));
}

#[tokio::test]
async fn requests_use_soap12_content_type_and_ws_security() {
    let (server, adapter) = setup("secret").await;

    Mock::given(method("POST"))
        .and(path("/onvif/device_service"))
        .and(header("content-type", "application/soap+xml; charset=utf-8"))
        .and(body_string_contains("wsse:UsernameToken"))
        .and(body_string_contains("GetDeviceInformation"))
        .respond_with(ResponseTemplate::new(200).set_body_string(device_information()))
        .mount(&server)
        .await;

    let auth = adapter.authenticate().await.unwrap();
    assert!(auth.authenticated);

    let bag = adapter.device_info().await.unwrap();
    assert_eq!(resolve(&bag, &["Manufacturer"], ""), "Uniview");
    assert_eq!(resolve(&bag, &["FirmwareVersion"], ""), "GIPC-B6202.4.1");
}

#[tokio::test]
async fn wrong_password_is_reported_not_raised() {
    let (server, adapter) = setup("wrong").await;

    mount_action("GetDeviceInformation", 400, not_authorized())
        .mount(&server)
        .await;

    let auth = adapter.authenticate().await.unwrap();
    assert!(!auth.authenticated);

    let read = adapter.device_info().await;
    assert!(matches!(read, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn set_network_writes_interface_and_honours_reboot_needed() {
    let (server, adapter) = setup("secret").await;

    mount_action(
        "GetNetworkInterfaces",
        200,
        envelope(
            r#"<tds:GetNetworkInterfacesResponse><tds:NetworkInterfaces token="eth1">
<tt:Enabled>true</tt:Enabled>
<tt:Info><tt:Name>eth1</tt:Name><tt:HwAddress>24:28:fd:01:02:03</tt:HwAddress></tt:Info>
<tt:IPv4><tt:Enabled>true</tt:Enabled><tt:Config>
<tt:Manual><tt:Address>192.168.0.13</tt:Address><tt:PrefixLength>24</tt:PrefixLength></tt:Manual>
<tt:DHCP>false</tt:DHCP></tt:Config></tt:IPv4>
</tds:NetworkInterfaces></tds:GetNetworkInterfacesResponse>"#,
        ),
    )
    .mount(&server)
    .await;
    mount_action(
        "GetDNS",
        200,
        envelope(
            "<tds:GetDNSResponse><tds:DNSInformation><tt:FromDHCP>false</tt:FromDHCP>\
             <tt:DNSManual><tt:Type>IPv4</tt:Type><tt:IPv4Address>8.8.8.8</tt:IPv4Address></tt:DNSManual>\
             </tds:DNSInformation></tds:GetDNSResponse>",
        ),
    )
    .mount(&server)
    .await;
    mount_action(
        "GetNetworkDefaultGateway",
        200,
        envelope(
            "<tds:GetNetworkDefaultGatewayResponse><tds:NetworkGateway>\
             <tt:IPv4Address>192.168.0.1</tt:IPv4Address></tds:NetworkGateway>\
             </tds:GetNetworkDefaultGatewayResponse>",
        ),
    )
    .mount(&server)
    .await;
    Mock::given(method("POST"))
        .and(path("/onvif/device_service"))
        .and(body_string_contains("SetNetworkInterfaces"))
        .and(body_string_contains("<InterfaceToken>eth1</InterfaceToken>"))
        .and(body_string_contains("<Address>192.168.0.50</Address>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<tds:SetNetworkInterfacesResponse><tds:RebootNeeded>true</tds:RebootNeeded>\
             </tds:SetNetworkInterfacesResponse>",
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_action(
        "SystemReboot",
        200,
        envelope(
            "<tds:SystemRebootResponse><tds:Message>Rebooting in 30 seconds</tds:Message>\
             </tds:SystemRebootResponse>",
        ),
    )
    .expect(1)
    .mount(&server)
    .await;

    let outcome = adapter
        .set_network_configuration(&NetworkConfig {
            ip_address: "192.168.0.50".into(),
            subnet_mask: "255.255.255.0".into(),
            gateway: "192.168.0.1".into(),
            dns1: Some("8.8.8.8".into()),
            dns2: None,
        })
        .await
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.restart, SecondaryStep::Completed);
}
