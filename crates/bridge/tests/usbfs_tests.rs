//! Integration tests for the usbfs backend
//!
//! Drives the negotiator through the real permission thread and opener,
//! using temporary files as device nodes.

#![cfg(target_os = "linux")]

use common::test_utils::{DEFAULT_TEST_TIMEOUT, MockEnumerator, with_timeout};
use common::{CameraEvent, DeviceIdentity, DeviceRecord, HANDLE_SENTINEL};
use std::sync::Arc;
use tempfile::NamedTempFile;
use usbcam_bridge::usb::{UsbfsOpener, UsbfsPermissionService};
use usbcam_bridge::{BridgeConfig, CameraPlugin, NegotiationPhase, UsbServices};

const CAMERA: DeviceIdentity = DeviceIdentity::new(0x32e4, 0x9750);

fn plugin_over(node: &str) -> (CameraPlugin, Arc<UsbfsPermissionService>) {
    let enumerator = Arc::new(MockEnumerator::with_devices(vec![DeviceRecord::new(
        node, CAMERA,
    )]));
    let permissions = Arc::new(UsbfsPermissionService::new());
    let services = UsbServices {
        enumerator,
        permissions: permissions.clone(),
        opener: Arc::new(UsbfsOpener),
        companion: None,
    };

    (
        CameraPlugin::new(services, &BridgeConfig::default()),
        permissions,
    )
}

#[tokio::test]
async fn test_accessible_node_is_granted_and_opened() {
    let node = NamedTempFile::new().unwrap();
    let path = node.path().to_string_lossy().to_string();
    let (plugin, permissions) = plugin_over(&path);

    assert!(plugin.connect_camera(0x32e4, 0x9750));

    let event = with_timeout(DEFAULT_TEST_TIMEOUT, plugin.events().recv())
        .await
        .expect("no decision from the permission thread")
        .unwrap();

    let CameraEvent::PermissionReceived { handle } = event else {
        panic!("expected permission_received, got {:?}", event);
    };
    assert!(handle >= 0);
    assert_eq!(plugin.is_camera_connected(), handle);
    assert_eq!(plugin.phase(), NegotiationPhase::Granted);
    assert_eq!(permissions.registered(), 0);
}

#[tokio::test]
async fn test_missing_node_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("001").to_string_lossy().to_string();
    let (plugin, permissions) = plugin_over(&path);

    assert!(plugin.connect_camera(0x32e4, 0x9750));

    let event = with_timeout(DEFAULT_TEST_TIMEOUT, plugin.events().recv())
        .await
        .expect("no decision from the permission thread")
        .unwrap();

    assert!(matches!(event, CameraEvent::PermissionDenied { .. }));
    assert_eq!(plugin.is_camera_connected(), HANDLE_SENTINEL);
    assert_eq!(plugin.phase(), NegotiationPhase::Denied);
    assert_eq!(permissions.registered(), 0);
}
