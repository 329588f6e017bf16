//! Async event channel between the bridge and its host
//!
//! Permission decisions arrive on an OS callback thread, while the host
//! consumes events from its own loop (blocking, polling or async). The
//! channel decouples the two: the sending side never blocks.
//!
//! Negotiation outcomes are never dropped; there is at most one per request.
//! Only `camera_status_changed` updates are shed once `capacity` events are
//! waiting.

use crate::usb_types::DeviceRef;
use async_channel::{Receiver, Sender, TryRecvError, TrySendError, unbounded};

/// Connection status of the supervised camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraStatus {
    /// Camera is not attached, or was lost
    NotConnected,
    /// Camera is attached and a connection has been requested
    Attached,
    /// Permission was granted and a handle is available
    Connected,
}

impl CameraStatus {
    /// Numeric code handed to hosts that only understand integers
    pub fn code(self) -> i32 {
        match self {
            CameraStatus::NotConnected => 0,
            CameraStatus::Attached => 1,
            CameraStatus::Connected => 2,
        }
    }
}

/// Events emitted to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    /// Permission was granted and the device opened
    PermissionReceived {
        /// Low-level descriptor of the opened device (never negative)
        handle: i32,
    },

    /// The OS refused permission for the device
    PermissionDenied {
        /// Device the request was issued for
        device: DeviceRef,
    },

    /// Permission was granted but the device could not be opened
    OpenFailed {
        /// Device the request was issued for
        device: DeviceRef,
        /// Why the open failed
        reason: String,
    },

    /// Supervised connection status changed
    StatusChanged {
        /// New status
        status: CameraStatus,
    },
}

impl CameraEvent {
    /// Whether the event reports the outcome of a permission request
    pub fn is_outcome(&self) -> bool {
        !matches!(self, CameraEvent::StatusChanged { .. })
    }

    /// Signal name under which the host sees this event
    pub fn signal_name(&self) -> &'static str {
        match self {
            CameraEvent::PermissionReceived { .. } => "permission_received",
            CameraEvent::PermissionDenied { .. } => "permission_denied",
            CameraEvent::OpenFailed { .. } => "open_failed",
            CameraEvent::StatusChanged { .. } => "camera_status_changed",
        }
    }
}

/// Sending half, held by the negotiator and supervisor
#[derive(Debug, Clone)]
pub struct EventSender {
    event_tx: Sender<CameraEvent>,
    status_capacity: usize,
}

impl EventSender {
    /// Queue an event without blocking
    ///
    /// Called from OS callback threads, so a full or closed channel is
    /// reported instead of waited on. Outcomes are always queued while the
    /// receiver is alive.
    pub fn emit(&self, event: CameraEvent) -> crate::Result<()> {
        if !event.is_outcome() && self.event_tx.len() >= self.status_capacity {
            return Err(crate::Error::Channel(format!(
                "event queue full, dropped {}",
                event.signal_name()
            )));
        }

        self.event_tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(ev) => {
                crate::Error::Channel(format!("event queue full, dropped {}", ev.signal_name()))
            }
            TrySendError::Closed(ev) => {
                crate::Error::Channel(format!("event queue closed, dropped {}", ev.signal_name()))
            }
        })
    }
}

/// Receiving half, handed to the host
#[derive(Debug, Clone)]
pub struct EventReceiver {
    event_rx: Receiver<CameraEvent>,
}

impl EventReceiver {
    /// Wait for the next event
    pub async fn recv(&self) -> crate::Result<CameraEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Wait for the next event from a non-async host thread
    pub fn recv_blocking(&self) -> crate::Result<CameraEvent> {
        self.event_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Take the next event if one is queued
    pub fn try_recv(&self) -> Option<CameraEvent> {
        match self.event_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Drain every queued event
    pub fn drain(&self) -> Vec<CameraEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Create the event channel
///
/// `capacity` bounds how many events may be waiting before status updates
/// are dropped.
///
/// Returns (EventSender for the bridge, EventReceiver for the host)
pub fn create_event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (event_tx, event_rx) = unbounded();

    (
        EventSender {
            event_tx,
            status_capacity: capacity.max(1),
        },
        EventReceiver { event_rx },
    )
}
