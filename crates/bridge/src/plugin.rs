//! Host-facing plugin surface
//!
//! The method and signal names are the ones the host engine binds to. Host
//! integers are 64-bit; vendor/product values outside the u16 range never
//! match a device.

use crate::config::BridgeConfig;
use crate::usb::{DeviceMatcher, NegotiationPhase, PermissionNegotiator, UsbServices};
use common::{
    DeviceIdentity, EventReceiver, EventSender, HANDLE_SENTINEL, create_event_channel,
    setup_logging,
};
use tracing::{debug, info};

/// Name the host registers the plugin under
pub const PLUGIN_NAME: &str = "EiffelCamera";

/// Methods exposed to the host
pub const PLUGIN_METHODS: [&str; 3] = ["isCameraConnected", "connectCamera", "isCameraAttached"];

/// Signals the host can connect to
pub const PLUGIN_SIGNALS: [&str; 4] = [
    "permission_received",
    "permission_denied",
    "open_failed",
    "camera_status_changed",
];

/// Install the tracing subscriber at the `[logging]` level
///
/// Returns false when the host already installed one; the host's subscriber
/// is kept.
pub fn init_logging(config: &BridgeConfig) -> bool {
    match setup_logging(&config.logging.log_level) {
        Ok(()) => {
            info!("Log level: {}", config.logging.log_level);
            true
        }
        Err(e) => {
            debug!("Keeping existing subscriber: {}", e);
            false
        }
    }
}

pub struct CameraPlugin {
    negotiator: PermissionNegotiator,
    event_tx: EventSender,
    event_rx: EventReceiver,
}

impl CameraPlugin {
    /// Create a plugin over the given services
    pub fn new(services: UsbServices, config: &BridgeConfig) -> Self {
        let (event_tx, event_rx) = create_event_channel(config.events.capacity);
        let capability = config.permission.capability().map(str::to_string);
        let negotiator = PermissionNegotiator::new(services, capability, event_tx.clone());

        info!("{} plugin ready", PLUGIN_NAME);
        Self {
            negotiator,
            event_tx,
            event_rx,
        }
    }

    /// Create a plugin over libusb enumeration and usbfs access checks
    ///
    /// Also installs logging from `config` unless the host already has.
    #[cfg(target_os = "linux")]
    pub fn with_system_backend(config: &BridgeConfig) -> common::Result<Self> {
        use crate::usb::{LoggingCompanion, RusbEnumerator, UsbfsOpener, UsbfsPermissionService};
        use std::sync::Arc;

        init_logging(config);

        let enumerator = RusbEnumerator::new()
            .map_err(|e| common::Error::Usb(format!("Failed to create USB context: {}", e)))?;

        let services = UsbServices {
            enumerator: Arc::new(enumerator),
            permissions: Arc::new(UsbfsPermissionService::new()),
            opener: Arc::new(UsbfsOpener),
            companion: Some(Arc::new(LoggingCompanion)),
        };

        Ok(Self::new(services, config))
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn methods(&self) -> &'static [&'static str] {
        &PLUGIN_METHODS
    }

    pub fn signals(&self) -> &'static [&'static str] {
        &PLUGIN_SIGNALS
    }

    /// `isCameraAttached(vid, pid)`
    pub fn is_camera_attached(&self, vid: i64, pid: i64) -> bool {
        match DeviceIdentity::from_host(vid, pid) {
            Some(identity) => self.matcher().is_attached(identity),
            None => {
                debug!("Identity {:#x}:{:#x} is out of range", vid, pid);
                false
            }
        }
    }

    /// `connectCamera(vid, pid)`
    ///
    /// True means the permission request was issued, not that it was granted.
    pub fn connect_camera(&self, vid: i64, pid: i64) -> bool {
        match DeviceIdentity::from_host(vid, pid) {
            Some(identity) => self.negotiator.request_connection(identity),
            None => {
                debug!("Identity {:#x}:{:#x} is out of range", vid, pid);
                false
            }
        }
    }

    /// `isCameraConnected()`: current handle, or -1
    pub fn is_camera_connected(&self) -> i32 {
        self.negotiator.query_handle()
    }

    /// Whether a handle is currently published
    pub fn is_connected(&self) -> bool {
        self.is_camera_connected() != HANDLE_SENTINEL
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.negotiator.phase()
    }

    pub fn matcher(&self) -> &DeviceMatcher {
        self.negotiator.matcher()
    }

    pub fn negotiator(&self) -> &PermissionNegotiator {
        &self.negotiator
    }

    /// Receiver for the plugin's signals
    pub fn events(&self) -> EventReceiver {
        self.event_rx.clone()
    }

    pub(crate) fn event_sender(&self) -> EventSender {
        self.event_tx.clone()
    }
}
