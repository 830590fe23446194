#![allow(clippy::unwrap_used)]
// End-to-end tests: the built-in registry against wiremock devices.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use camlink_core::{ConnectionDescriptor, EngineConfig, ProtocolManager, Section, Vendor};

fn manager() -> ProtocolManager {
    ProtocolManager::new(EngineConfig {
        probe_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(2),
        ..EngineConfig::default()
    })
}

fn descriptor(server: &MockServer) -> ConnectionDescriptor {
    let addr = server.address();
    ConnectionDescriptor::new(addr.ip().to_string(), addr.port())
}

async fn mount_magic_box(server: &MockServer, action: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/magicBox.cgi"))
        .and(query_param("action", action))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn dahua_device_is_found_after_axis_and_hikvision_miss() {
    let server = MockServer::start().await;
    mount_magic_box(&server, "getDeviceType", "type=IPC-HFW2431S-S-S2\r\n").await;

    let result = manager()
        .check_compatibility(&descriptor(&server), None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_compatible);
    assert_eq!(result.detected_vendor, Some(Vendor::Dahua));
    assert!(!result.requires_auth);

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(
        paths,
        vec![
            "/axis-cgi/basicdeviceinfo.cgi",
            "/ISAPI/System/deviceInfo",
            "/cgi-bin/magicBox.cgi",
        ]
    );
}

#[tokio::test]
async fn dahua_load_survives_failed_encode_section() {
    let server = MockServer::start().await;
    mount_magic_box(
        &server,
        "getSystemInfo",
        "deviceType=IPC-HFW2431S-S-S2\r\nserialNumber=5J0A8F2PAZ12345\r\n",
    )
    .await;
    mount_magic_box(
        &server,
        "getSoftwareVersion",
        "version=2.800.0000000.25.R,build:2021-07-15\r\n",
    )
    .await;
    mount_magic_box(&server, "getVendor", "vendor=Dahua\r\n").await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/configManager.cgi"))
        .and(query_param("name", "Network"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "table.Network.DefaultInterface=eth0\r\n\
             table.Network.eth0.IPAddress=192.168.1.108\r\n\
             table.Network.eth0.SubnetMask=255.255.255.0\r\n\
             table.Network.eth0.DefaultGateway=192.168.1.1\r\n\
             table.Network.eth0.DhcpEnable=false\r\n\
             table.Network.eth0.PhysicalAddress=3c:ef:8c:01:02:03\r\n",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/configManager.cgi"))
        .and(query_param("name", "Encode"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tagged = descriptor(&server).with_vendor(Some(Vendor::Dahua));
    let report = manager()
        .load_device_info(&tagged, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.sections_loaded, 2);
    assert_eq!(report.section_errors[0].section, Section::Video);

    let device = &report.device;
    assert_eq!(device.identity.manufacturer.as_deref(), Some("Dahua"));
    assert_eq!(device.identity.model.as_deref(), Some("IPC-HFW2431S-S-S2"));
    assert_eq!(device.identity.serial.as_deref(), Some("5J0A8F2PAZ12345"));
    assert_eq!(device.identity.mac.as_deref(), Some("3c:ef:8c:01:02:03"));
    assert_eq!(device.network.current_ip.as_deref(), Some("192.168.1.108"));
    assert_eq!(device.network.prefix_length, Some(24));
    assert_eq!(device.network.dhcp, Some(false));
    assert!(
        device
            .video
            .main_stream_url
            .as_deref()
            .unwrap()
            .ends_with("/cam/realmonitor?channel=1&subtype=0")
    );
}

#[tokio::test]
async fn nothing_answering_is_not_compatible() {
    let server = MockServer::start().await;

    let result = manager()
        .check_compatibility(&descriptor(&server), None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_compatible);
    assert_eq!(result.message, "No compatible protocol found");
}

#[tokio::test]
async fn generic_web_page_is_no_vendor() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html>\n<body>\n<form>\n<input type=\"text\" name=\"user\">\n\
             <table class=\"login\"></table>\n</form>\n</body>\n</html>\n",
        ))
        .mount(&server)
        .await;

    let result = manager()
        .check_compatibility(&descriptor(&server), None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_compatible);
    assert_eq!(result.detected_vendor, None);

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(
        paths,
        vec![
            "/axis-cgi/basicdeviceinfo.cgi",
            "/ISAPI/System/deviceInfo",
            "/cgi-bin/magicBox.cgi",
            "/onvif/device_service",
        ]
    );
}
