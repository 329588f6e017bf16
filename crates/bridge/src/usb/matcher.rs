//! Device matcher
//!
//! Looks up attached devices by vendor/product pair. Queries only; nothing
//! here opens a device or asks for permission.

use common::{DeviceEnumerator, DeviceIdentity, DeviceRef};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DeviceMatcher {
    enumerator: Arc<dyn DeviceEnumerator>,
}

impl DeviceMatcher {
    pub fn new(enumerator: Arc<dyn DeviceEnumerator>) -> Self {
        Self { enumerator }
    }

    /// Whether any attached device has this identity
    ///
    /// An unavailable device list counts as "not attached".
    pub fn is_attached(&self, identity: DeviceIdentity) -> bool {
        self.find_match(identity).is_some()
    }

    /// First attached device with this identity
    ///
    /// When several devices share the identity, the winner depends on the
    /// OS's enumeration order, which is not stable and not ours to choose.
    pub fn find_match(&self, identity: DeviceIdentity) -> Option<DeviceRef> {
        let devices = match self.enumerator.device_list() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device list unavailable, treating {} as absent: {}", identity, e);
                return None;
            }
        };

        let found = devices
            .into_iter()
            .find(|record| record.matches(identity))
            .map(|record| record.device);

        match &found {
            Some(device) => debug!("Matched {} to {}", identity, device.name()),
            None => debug!("No attached device matches {}", identity),
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{MockEnumerator, create_mock_device_list, create_mock_record};

    #[test]
    fn test_first_match_wins() {
        let enumerator = Arc::new(MockEnumerator::with_devices(vec![
            create_mock_record(1, 0xaaaa, 0x0001),
            create_mock_record(2, 0x1234, 0x5678),
            create_mock_record(3, 0x1234, 0x5678),
        ]));
        let matcher = DeviceMatcher::new(enumerator);

        let found = matcher
            .find_match(DeviceIdentity::new(0x1234, 0x5678))
            .unwrap();
        assert_eq!(found.name(), "/dev/bus/usb/001/002");
    }

    #[test]
    fn test_absent_identity() {
        let matcher = DeviceMatcher::new(Arc::new(MockEnumerator::with_devices(
            create_mock_device_list(4),
        )));

        assert!(!matcher.is_attached(DeviceIdentity::new(0x1234, 0x5678)));
        assert!(matcher.is_attached(DeviceIdentity::new(0x1002, 0x2002)));
    }

    #[test]
    fn test_vendor_alone_does_not_match() {
        let matcher = DeviceMatcher::new(Arc::new(MockEnumerator::with_devices(vec![
            create_mock_record(1, 0x1234, 0x0000),
        ])));

        assert!(!matcher.is_attached(DeviceIdentity::new(0x1234, 0x5678)));
    }

    #[test]
    fn test_enumeration_failure_fails_closed() {
        let enumerator = Arc::new(MockEnumerator::with_devices(vec![create_mock_record(
            1, 0x1234, 0x5678,
        )]));
        enumerator.set_failing(true);
        let matcher = DeviceMatcher::new(enumerator);

        assert!(!matcher.is_attached(DeviceIdentity::new(0x1234, 0x5678)));
        assert!(matcher.find_match(DeviceIdentity::new(0x1234, 0x5678)).is_none());
    }
}
