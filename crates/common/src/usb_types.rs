//! USB type abstractions shared by the bridge and its backends

use std::fmt;

/// Handle value meaning "no connection established"
pub const HANDLE_SENTINEL: i32 = -1;

/// Vendor/product pair identifying a class of USB device
///
/// This is not unique per physical unit: several attached devices may share
/// the same pair. Matching takes the first device in enumeration order, and
/// that order is defined by the OS, not by us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Build an identity from host-supplied integers
    ///
    /// Values outside the u16 range cannot name a USB device and yield `None`.
    pub fn from_host(vendor_id: i64, product_id: i64) -> Option<Self> {
        let vendor_id = u16::try_from(vendor_id).ok()?;
        let product_id = u16::try_from(product_id).ok()?;
        Some(Self::new(vendor_id, product_id))
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Opaque reference to one attached device, as handed out by the enumerator
///
/// Only the enumerator and opener interpret `name`; the bridge compares refs
/// for equality when correlating permission decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceRef {
    name: String,
    identity: DeviceIdentity,
}

impl DeviceRef {
    pub fn new(name: impl Into<String>, identity: DeviceIdentity) -> Self {
        Self {
            name: name.into(),
            identity,
        }
    }

    /// OS-level device name (e.g. a usbfs node path)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.identity)
    }
}

/// One entry of the OS device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub name: String,
    pub identity: DeviceIdentity,
    pub device: DeviceRef,
}

impl DeviceRecord {
    pub fn new(name: impl Into<String>, identity: DeviceIdentity) -> Self {
        let name = name.into();
        Self {
            device: DeviceRef::new(name.clone(), identity),
            name,
            identity,
        }
    }

    pub fn matches(&self, identity: DeviceIdentity) -> bool {
        self.identity == identity
    }
}

/// Negotiation epoch
///
/// Monotonically increasing counter that tells successive permission
/// requests apart, so a late decision for a superseded request can be
/// recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_host_range() {
        assert_eq!(
            DeviceIdentity::from_host(0x32e4, 0x9750),
            Some(DeviceIdentity::new(0x32e4, 0x9750))
        );
        assert_eq!(DeviceIdentity::from_host(-1, 0x9750), None);
        assert_eq!(DeviceIdentity::from_host(0x1234, 0x1_0000), None);
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(DeviceIdentity::new(0x1234, 0xab).to_string(), "1234:00ab");
    }

    #[test]
    fn test_record_matches() {
        let record = DeviceRecord::new("/dev/bus/usb/001/004", DeviceIdentity::new(1, 2));
        assert!(record.matches(DeviceIdentity::new(1, 2)));
        assert!(!record.matches(DeviceIdentity::new(2, 1)));
        assert_eq!(record.device.name(), "/dev/bus/usb/001/004");
    }

    #[test]
    fn test_epoch_is_monotonic() {
        let first = Epoch(0);
        assert!(first.next() > first);
        assert_eq!(first.next().next(), Epoch(2));
    }
}
