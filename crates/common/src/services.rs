//! External collaborators of the bridge
//!
//! The bridge never talks to the OS directly. Device enumeration, the
//! permission dialog, opening a device and companion capability requests are
//! all reached through the traits below, so a host (Android plugin shim,
//! desktop backend, tests) can plug in its own implementation.

use crate::usb_types::{DeviceRecord, DeviceRef, Epoch};
use std::fmt;
use std::sync::Weak;
use tracing::debug;

/// Source of the OS's current USB device list
pub trait DeviceEnumerator: Send + Sync {
    /// Snapshot of attached devices, in OS-defined order
    fn device_list(&self) -> crate::Result<Vec<DeviceRecord>>;
}

/// Identifier of a listener registered with a [`PermissionService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Receiver of permission decisions, implemented by the negotiator
pub trait DecisionSink: Send + Sync {
    fn on_permission_decision(&self, epoch: Epoch, device: &DeviceRef, granted: bool);
}

/// One-shot continuation handed to the permission service
///
/// Carries the epoch of the request it was created for and a weak link to
/// the negotiator, so a decision that outlives the negotiator is dropped.
#[derive(Clone)]
pub struct PermissionCallback {
    epoch: Epoch,
    sink: Weak<dyn DecisionSink>,
}

impl PermissionCallback {
    pub fn new(epoch: Epoch, sink: Weak<dyn DecisionSink>) -> Self {
        Self { epoch, sink }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Deliver the OS decision for `device`
    pub fn deliver(&self, device: &DeviceRef, granted: bool) {
        match self.sink.upgrade() {
            Some(sink) => sink.on_permission_decision(self.epoch, device, granted),
            None => debug!(
                "Dropping decision for {} (epoch {}): negotiator is gone",
                device, self.epoch
            ),
        }
    }
}

impl fmt::Debug for PermissionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionCallback")
            .field("epoch", &self.epoch)
            .field("alive", &(self.sink.strong_count() > 0))
            .finish()
    }
}

/// OS permission service
///
/// Implementations must not invoke callbacks from inside
/// `register_listener` or `unregister_listener`. Delivering from inside
/// `request_permission` is allowed.
pub trait PermissionService: Send + Sync {
    /// Register a listener that will receive the decision for a later request
    fn register_listener(&self, callback: PermissionCallback) -> crate::Result<ListenerId>;

    /// Remove a listener; unknown ids are ignored
    fn unregister_listener(&self, id: ListenerId);

    /// Ask the OS for permission on `device`, answering through `listener`
    ///
    /// The answer may arrive at any later time, or never.
    fn request_permission(&self, device: &DeviceRef, listener: ListenerId) -> crate::Result<()>;
}

/// An opened device; closing happens on drop
pub trait DeviceConnection: Send {
    /// Low-level file descriptor of the connection
    fn file_descriptor(&self) -> i32;
}

/// Opens a device the process holds permission for
pub trait DeviceOpener: Send + Sync {
    fn open(&self, device: &DeviceRef) -> crate::Result<Box<dyn DeviceConnection>>;
}

/// Companion OS capability request (e.g. "CAMERA"), fired alongside the USB
/// permission request. The outcome is never observed.
pub trait CompanionPermission: Send + Sync {
    fn request(&self, capability: &str);
}
