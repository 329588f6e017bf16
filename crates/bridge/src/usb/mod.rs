//! USB subsystem
//!
//! Matching attached devices and negotiating permission to open them.
//!
//! - `matcher`: vendor/product lookup over the OS device list
//! - `negotiator`: the asynchronous permission request/decision cycle
//! - `state`: the single negotiation slot
//! - `enumerator`, `usbfs`: libusb/usbfs services for desktop Linux hosts

pub mod enumerator;
pub mod matcher;
pub mod negotiator;
pub mod state;
#[cfg(target_os = "linux")]
pub mod usbfs;

// Re-export public types
pub use enumerator::RusbEnumerator;
pub use matcher::DeviceMatcher;
pub use negotiator::{PermissionNegotiator, UsbServices};
pub use state::{NegotiationPhase, NegotiationState};
#[cfg(target_os = "linux")]
pub use usbfs::{LoggingCompanion, UsbfsOpener, UsbfsPermissionService};
