#![allow(clippy::unwrap_used)]
// Integration tests for `HikvisionAdapter` using wiremock.

use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use camlink_api::fields::resolve;
use camlink_api::{
    AuthMode, Configuration, Connection, ConnectionDescriptor, Error, HikvisionAdapter,
    NetworkConfig, SecondaryStep, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup_with(mode: AuthMode) -> (MockServer, HikvisionAdapter) {
    let server = MockServer::start().await;
    let addr = server.address();
    let descriptor = ConnectionDescriptor::new(addr.ip().to_string(), addr.port())
        .with_credentials("admin", SecretString::from("pass".to_owned()))
        .with_auth_mode(mode);
    let adapter = HikvisionAdapter::new(&descriptor, &TransportConfig::default()).unwrap();
    (server, adapter)
}

async fn setup() -> (MockServer, HikvisionAdapter) {
    setup_with(AuthMode::Basic).await
}

const DEVICE_INFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DeviceInfo version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<deviceName>Lobby</deviceName>
<model>DS-2CD2143G2-I</model>
<serialNumber>DS-2CD2143G2-I20210101AAWRF12345678</serialNumber>
<macAddress>44:19:b6:01:02:03</macAddress>
<firmwareVersion>V5.7.3</firmwareVersion>
</DeviceInfo>"#;

const IP_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<IPAddress version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<ipVersion>dual</ipVersion>
<addressingType>static</addressingType>
<ipAddress>192.168.1.64</ipAddress>
<subnetMask>255.255.255.0</subnetMask>
<ipv6Address>::</ipv6Address>
<DefaultGateway><ipAddress>192.168.1.1</ipAddress></DefaultGateway>
<PrimaryDNS><ipAddress>8.8.8.8</ipAddress></PrimaryDNS>
<SecondaryDNS><ipAddress>8.8.4.4</ipAddress></SecondaryDNS>
</IPAddress>"#;

fn response_status(code: u32, text: &str, sub: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ResponseStatus version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<requestURL>/ISAPI/System/Network/interfaces/1/ipAddress</requestURL>
<statusCode>{code}</statusCode>
<statusString>{text}</statusString>
<subStatusCode>{sub}</subStatusCode>
</ResponseStatus>"#
    )
}

fn net(ip: &str, gateway: &str) -> NetworkConfig {
    NetworkConfig {
        ip_address: ip.into(),
        subnet_mask: "255.255.255.0".into(),
        gateway: gateway.into(),
        dns1: None,
        dns2: None,
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn basic_auth_header_is_sent() {
    let (server, adapter) = setup().await;

    // admin:pass
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .and(header("authorization", "Basic YWRtaW46cGFzcw=="))
        .respond_with(ResponseTemplate::new(200).set_body_string(DEVICE_INFO))
        .mount(&server)
        .await;

    let auth = adapter.authenticate().await.unwrap();
    assert!(auth.authenticated);

    let bag = adapter.device_info().await.unwrap();
    assert_eq!(resolve(&bag, &["model"], ""), "DS-2CD2143G2-I");
    assert_eq!(resolve(&bag, &["firmwareVersion"], ""), "V5.7.3");
}

#[tokio::test]
async fn digest_challenge_is_answered_once() {
    let (server, adapter) = setup_with(AuthMode::Digest).await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .and(|req: &Request| {
            req.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| {
                    v.starts_with("Digest ")
                        && v.contains(r#"username="admin""#)
                        && v.contains(r#"realm="IP Camera""#)
                        && v.contains(r#"uri="/ISAPI/System/deviceInfo""#)
                        && v.contains("qop=auth")
                })
        })
        .respond_with(ResponseTemplate::new(200).set_body_string(DEVICE_INFO))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ISAPI/System/deviceInfo"))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "WWW-Authenticate",
            r#"Digest qop="auth", realm="IP Camera", nonce="4e6a4d304e6a", stale="FALSE""#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let auth = adapter.authenticate().await.unwrap();
    assert!(auth.authenticated);

    // Cached challenge: the second request authenticates on the first try.
    adapter.device_info().await.unwrap();
}

#[tokio::test]
async fn set_network_rewrites_document_and_reboots() {
    let (server, adapter) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .respond_with(ResponseTemplate::new(200).set_body_string(IP_DOC))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .and(body_string_contains("<ipAddress>10.0.0.20</ipAddress>"))
        .and(body_string_contains(
            "<DefaultGateway><ipAddress>10.0.0.1</ipAddress></DefaultGateway>",
        ))
        .and(body_string_contains("<ipv6Address>::</ipv6Address>"))
        .and(body_string_contains(
            r#"xmlns="http://www.hikvision.com/ver20/XMLSchema""#,
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(response_status(7, "Reboot Required", "rebootRequired")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/System/reboot"))
        .respond_with(ResponseTemplate::new(200).set_body_string(response_status(1, "OK", "ok")))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = adapter
        .set_network_configuration(&net("10.0.0.20", "10.0.0.1"))
        .await
        .unwrap();
    assert!(outcome.changed);
    let fields: Vec<&str> = outcome.changes.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(fields, vec!["ip_address", "gateway"]);
    assert_eq!(outcome.restart, SecondaryStep::Completed);
}

#[tokio::test]
async fn unchanged_gateway_is_not_rewritten() {
    let (server, adapter) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .respond_with(ResponseTemplate::new(200).set_body_string(IP_DOC))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .respond_with(ResponseTemplate::new(200).set_body_string(response_status(1, "OK", "ok")))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = adapter
        .set_network_configuration(&net("192.168.1.64", "192.168.1.1"))
        .await
        .unwrap();
    assert!(!outcome.changed);
}

#[tokio::test]
async fn rejected_write_surfaces_status_string() {
    let (server, adapter) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .respond_with(ResponseTemplate::new(200).set_body_string(IP_DOC))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(response_status(6, "Invalid Content", "badIPv4Address")),
        )
        .mount(&server)
        .await;

    match adapter
        .set_network_configuration(&net("10.0.0.20", "192.168.1.1"))
        .await
    {
        Err(Error::Api { code, message }) => {
            assert_eq!(code.as_deref(), Some("badIPv4Address"));
            assert_eq!(message, "Invalid Content");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn missing_leaf_fails_without_writing() {
    let (server, adapter) = setup().await;
    let without_secondary = IP_DOC.replace(
        "<SecondaryDNS><ipAddress>8.8.4.4</ipAddress></SecondaryDNS>\n",
        "",
    );

    Mock::given(method("GET"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .respond_with(ResponseTemplate::new(200).set_body_string(without_secondary))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ISAPI/System/Network/interfaces/1/ipAddress"))
        .respond_with(ResponseTemplate::new(200).set_body_string(response_status(1, "OK", "ok")))
        .expect(0)
        .mount(&server)
        .await;

    let result = adapter
        .set_network_configuration(&NetworkConfig {
            dns2: Some("1.1.1.1".into()),
            ..net("192.168.1.64", "192.168.1.1")
        })
        .await;
    match result {
        Err(Error::MalformedResponse { detail, .. }) => {
            assert!(detail.contains("SecondaryDNS.ipAddress"), "{detail}");
        }
        other => panic!("expected MalformedResponse, got: {other:?}"),
    }
}

#[tokio::test]
async fn ntlm_is_rejected_before_sending() {
    let (server, adapter) = setup_with(AuthMode::Ntlm).await;

    let result = adapter.device_info().await;
    assert!(matches!(result, Err(Error::UnsupportedAuth(AuthMode::Ntlm))));
    assert!(server.received_requests().await.unwrap().is_empty());
}
