//! Common utilities for usbcam-bridge
//!
//! This crate provides the pieces shared between the bridge and its
//! collaborators: USB identity types, the external service traits the bridge
//! is driven by, the event channel handed to the host, error handling and
//! logging setup.

pub mod channel;
pub mod error;
pub mod logging;
pub mod services;
pub mod test_utils;
pub mod usb_types;

pub use channel::{CameraEvent, CameraStatus, EventReceiver, EventSender, create_event_channel};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use services::{
    CompanionPermission, DecisionSink, DeviceConnection, DeviceEnumerator, DeviceOpener,
    ListenerId, PermissionCallback, PermissionService,
};
pub use usb_types::{DeviceIdentity, DeviceRecord, DeviceRef, Epoch, HANDLE_SENTINEL};
