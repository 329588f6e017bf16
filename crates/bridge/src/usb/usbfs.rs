//! usbfs backend for desktop Linux hosts
//!
//! There is no permission dialog on a desktop: the process may use a device
//! iff it can read and write its usbfs node (udev rules decide). The
//! permission service answers from a dedicated thread so decisions still
//! arrive out of band, the way a mobile OS delivers its broadcast.

use common::{
    CompanionPermission, DeviceConnection, DeviceOpener, DeviceRef, ListenerId,
    PermissionCallback, PermissionService,
};
use nix::unistd::{AccessFlags, access};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

type ListenerMap = Arc<Mutex<HashMap<ListenerId, PermissionCallback>>>;

/// Grants permission when the usbfs node is readable and writable
#[derive(Default)]
pub struct UsbfsPermissionService {
    next_id: AtomicU64,
    listeners: ListenerMap,
}

impl UsbfsPermissionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listeners not yet unregistered
    pub fn registered(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn has_access(node: &str) -> bool {
        match access(node, AccessFlags::R_OK | AccessFlags::W_OK) {
            Ok(()) => true,
            Err(e) => {
                debug!("No read/write access to {}: {}", node, e);
                false
            }
        }
    }
}

impl PermissionService for UsbfsPermissionService {
    fn register_listener(&self, callback: PermissionCallback) -> common::Result<ListenerId> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);
        Ok(id)
    }

    fn unregister_listener(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn request_permission(&self, device: &DeviceRef, listener: ListenerId) -> common::Result<()> {
        let registered = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&listener);
        if !registered {
            return Err(common::Error::Permission(format!(
                "listener {:?} is not registered",
                listener
            )));
        }

        let listeners = Arc::clone(&self.listeners);
        let device = device.clone();

        std::thread::Builder::new()
            .name("usb-permission".to_string())
            .spawn(move || {
                let granted = Self::has_access(device.name());

                // Deliver only if nobody unregistered the listener meanwhile
                let callback = listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&listener)
                    .cloned();

                match callback {
                    Some(callback) => callback.deliver(&device, granted),
                    None => debug!("Listener {:?} gone, dropping decision", listener),
                }
            })?;

        Ok(())
    }
}

/// Connection over an open usbfs node; closed on drop
pub struct UsbfsConnection {
    file: File,
}

impl DeviceConnection for UsbfsConnection {
    fn file_descriptor(&self) -> i32 {
        self.file.as_raw_fd()
    }
}

/// Opens usbfs nodes read/write
#[derive(Debug, Default, Clone, Copy)]
pub struct UsbfsOpener;

impl DeviceOpener for UsbfsOpener {
    fn open(&self, device: &DeviceRef) -> common::Result<Box<dyn DeviceConnection>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device.name())
            .map_err(|e| common::Error::Usb(format!("Failed to open {}: {}", device.name(), e)))?;

        info!("Opened {} as fd {}", device.name(), file.as_raw_fd());
        Ok(Box::new(UsbfsConnection { file }))
    }
}

/// Desktop hosts have no companion capability dialog; requests are logged
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCompanion;

impl CompanionPermission for LoggingCompanion {
    fn request(&self, capability: &str) {
        warn!(
            "Companion capability {} not supported on this host, ignoring",
            capability
        );
    }
}
