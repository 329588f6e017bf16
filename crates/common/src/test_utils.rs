//! Test utilities for usbcam-bridge
//!
//! Provides mock implementations of the external services and helper
//! functions for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{create_mock_record, MockEnumerator};
//! use common::DeviceEnumerator;
//!
//! # fn main() {
//! let enumerator = MockEnumerator::with_devices(vec![create_mock_record(1, 0x1234, 0x5678)]);
//! assert_eq!(enumerator.device_list().unwrap().len(), 1);
//! # }
//! ```

use crate::services::{
    CompanionPermission, DeviceConnection, DeviceEnumerator, DeviceOpener, ListenerId,
    PermissionCallback, PermissionService,
};
use crate::usb_types::{DeviceIdentity, DeviceRecord, DeviceRef};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a mock device record named like a usbfs node on bus 1
///
/// # Example
/// ```
/// use common::test_utils::create_mock_record;
///
/// let record = create_mock_record(4, 0x1234, 0x5678);
/// assert_eq!(record.name, "/dev/bus/usb/001/004");
/// assert_eq!(record.identity.vendor_id, 0x1234);
/// ```
pub fn create_mock_record(address: u8, vendor_id: u16, product_id: u16) -> DeviceRecord {
    DeviceRecord::new(
        format!("/dev/bus/usb/001/{:03}", address),
        DeviceIdentity::new(vendor_id, product_id),
    )
}

/// Create a list of mock devices with distinct identities
pub fn create_mock_device_list(count: u8) -> Vec<DeviceRecord> {
    (1..=count)
        .map(|i| create_mock_record(i, 0x1000 + u16::from(i), 0x2000 + u16::from(i)))
        .collect()
}

/// Enumerator backed by an in-memory device list
#[derive(Default)]
pub struct MockEnumerator {
    devices: Mutex<Vec<DeviceRecord>>,
    failing: AtomicBool,
}

impl MockEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<DeviceRecord>) -> Self {
        Self {
            devices: Mutex::new(devices),
            failing: AtomicBool::new(false),
        }
    }

    /// Plug a device in
    pub fn attach(&self, record: DeviceRecord) {
        self.devices.lock().unwrap().push(record);
    }

    /// Unplug every device with the given name
    pub fn detach(&self, name: &str) {
        self.devices.lock().unwrap().retain(|r| r.name != name);
    }

    /// Make `device_list` fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl DeviceEnumerator for MockEnumerator {
    fn device_list(&self) -> crate::Result<Vec<DeviceRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(crate::Error::Usb("device list unavailable".to_string()));
        }
        Ok(self.devices.lock().unwrap().clone())
    }
}

/// Permission service that records requests and lets tests play the OS
///
/// Every callback ever registered is kept, so a test can deliver a decision
/// to a listener the bridge has already unregistered (a late broadcast).
#[derive(Default)]
pub struct MockPermissionService {
    next_id: AtomicU64,
    active: Mutex<HashMap<ListenerId, PermissionCallback>>,
    history: Mutex<HashMap<ListenerId, PermissionCallback>>,
    requests: Mutex<Vec<(DeviceRef, ListenerId)>>,
    failing: AtomicBool,
}

impl MockPermissionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `request_permission` fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of listeners currently registered
    pub fn active_listeners(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Number of listeners registered over the service's lifetime
    pub fn registered_total(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    /// Every permission request issued so far, oldest first
    pub fn requests(&self) -> Vec<(DeviceRef, ListenerId)> {
        self.requests.lock().unwrap().clone()
    }

    /// Deliver a decision to a listener, registered or not
    ///
    /// Returns false if the id was never registered.
    pub fn deliver(&self, id: ListenerId, device: &DeviceRef, granted: bool) -> bool {
        // Clone out so the callback can unregister without deadlocking
        let callback = self.history.lock().unwrap().get(&id).cloned();
        match callback {
            Some(callback) => {
                callback.deliver(device, granted);
                true
            }
            None => false,
        }
    }

    /// Answer the most recent permission request
    pub fn deliver_latest(&self, granted: bool) -> bool {
        let latest = self.requests.lock().unwrap().last().cloned();
        match latest {
            Some((device, id)) => self.deliver(id, &device, granted),
            None => false,
        }
    }

    /// Answer the n-th permission request (0-based)
    pub fn deliver_nth(&self, n: usize, granted: bool) -> bool {
        let request = self.requests.lock().unwrap().get(n).cloned();
        match request {
            Some((device, id)) => self.deliver(id, &device, granted),
            None => false,
        }
    }
}

impl PermissionService for MockPermissionService {
    fn register_listener(&self, callback: PermissionCallback) -> crate::Result<ListenerId> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.active.lock().unwrap().insert(id, callback.clone());
        self.history.lock().unwrap().insert(id, callback);
        Ok(id)
    }

    fn unregister_listener(&self, id: ListenerId) {
        self.active.lock().unwrap().remove(&id);
    }

    fn request_permission(&self, device: &DeviceRef, listener: ListenerId) -> crate::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(crate::Error::Permission("service unavailable".to_string()));
        }
        self.requests
            .lock()
            .unwrap()
            .push((device.clone(), listener));
        Ok(())
    }
}

/// Connection handed out by [`MockOpener`]; tracks how many are alive
pub struct MockConnection {
    fd: i32,
    live: Arc<AtomicUsize>,
}

impl DeviceConnection for MockConnection {
    fn file_descriptor(&self) -> i32 {
        self.fd
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Opener returning increasing fake descriptors
pub struct MockOpener {
    next_fd: AtomicI32,
    failing: AtomicBool,
    opened: Mutex<Vec<DeviceRef>>,
    live: Arc<AtomicUsize>,
}

impl Default for MockOpener {
    fn default() -> Self {
        Self::starting_at(10)
    }
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// First descriptor handed out will be `fd`
    pub fn starting_at(fd: i32) -> Self {
        Self {
            next_fd: AtomicI32::new(fd),
            failing: AtomicBool::new(false),
            opened: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate the device vanishing between grant and open
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Devices successfully opened so far
    pub fn opened(&self) -> Vec<DeviceRef> {
        self.opened.lock().unwrap().clone()
    }

    /// Connections not yet dropped
    pub fn live_connections(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl DeviceOpener for MockOpener {
    fn open(&self, device: &DeviceRef) -> crate::Result<Box<dyn DeviceConnection>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(crate::Error::Usb(format!("{} is gone", device.name())));
        }
        let fd = self.next_fd.fetch_add(1, Ordering::SeqCst);
        self.opened.lock().unwrap().push(device.clone());
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            fd,
            live: Arc::clone(&self.live),
        }))
    }
}

/// Companion that records requested capabilities
#[derive(Default)]
pub struct MockCompanion {
    requested: Mutex<Vec<String>>,
}

impl MockCompanion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl CompanionPermission for MockCompanion {
    fn request(&self, capability: &str) {
        self.requested.lock().unwrap().push(capability.to_string());
    }
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let event = with_timeout(DEFAULT_TEST_TIMEOUT, receiver.recv()).await.unwrap();
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
