//! Permission negotiator
//!
//! Drives one request/decision cycle at a time:
//!
//! 1. `request_connection` discards the previous session, matches the
//!    device, registers an epoch-tagged listener and asks the OS for
//!    permission. It returns as soon as the request is issued.
//! 2. The OS answers later, on its own thread, through the listener. The
//!    answer is applied only if its epoch and device still match the slot.
//! 3. On grant the device is opened, the connection stored and a single
//!    `permission_received` event emitted.
//!
//! The OS may never answer (a dismissed dialog has no terminal event). The
//! slot then stays `AwaitingPermission` until the next request; there is no
//! timeout here.

use crate::usb::matcher::DeviceMatcher;
use crate::usb::state::{NegotiationPhase, NegotiationState};
use common::{
    CameraEvent, CompanionPermission, DecisionSink, DeviceEnumerator, DeviceIdentity,
    DeviceOpener, DeviceRef, Epoch, EventSender, ListenerId, PermissionCallback,
    PermissionService,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, warn};

/// External services the negotiator is driven by
#[derive(Clone)]
pub struct UsbServices {
    pub enumerator: Arc<dyn DeviceEnumerator>,
    pub permissions: Arc<dyn PermissionService>,
    pub opener: Arc<dyn DeviceOpener>,
    pub companion: Option<Arc<dyn CompanionPermission>>,
}

/// Negotiation slot guarded by the negotiator's mutex
struct Session {
    /// Epoch of the most recent request
    epoch: Epoch,
    state: NegotiationState,
}

struct NegotiatorInner {
    matcher: DeviceMatcher,
    permissions: Arc<dyn PermissionService>,
    opener: Arc<dyn DeviceOpener>,
    companion: Option<Arc<dyn CompanionPermission>>,
    companion_capability: Option<String>,
    events: EventSender,
    session: Mutex<Session>,
}

pub struct PermissionNegotiator {
    inner: Arc<NegotiatorInner>,
}

impl PermissionNegotiator {
    pub fn new(
        services: UsbServices,
        companion_capability: Option<String>,
        events: EventSender,
    ) -> Self {
        let inner = NegotiatorInner {
            matcher: DeviceMatcher::new(services.enumerator),
            permissions: services.permissions,
            opener: services.opener,
            companion: services.companion,
            companion_capability,
            events,
            session: Mutex::new(Session {
                epoch: Epoch(0),
                state: NegotiationState::Idle,
            }),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn matcher(&self) -> &DeviceMatcher {
        &self.inner.matcher
    }

    /// Start a new negotiation for `identity`
    ///
    /// Returns true once the permission request has been issued; the grant
    /// itself is reported later through events. Returns false when no
    /// attached device matches or the permission service refuses the
    /// request. Any earlier negotiation is discarded either way.
    pub fn request_connection(&self, identity: DeviceIdentity) -> bool {
        self.inner.reset();

        let Some(device) = self.inner.matcher.find_match(identity) else {
            info!("Cannot request connection: {} is not attached", identity);
            return false;
        };

        let Some((epoch, listener)) = self.inner.arm(&device) else {
            return false;
        };

        if let (Some(companion), Some(capability)) =
            (&self.inner.companion, self.inner.companion_capability.as_deref())
        {
            debug!("Requesting companion capability {}", capability);
            companion.request(capability);
        }

        // Issued without the lock held: the service may answer synchronously
        if let Err(e) = self.inner.permissions.request_permission(&device, listener) {
            warn!("Permission request for {} failed: {}", device, e);
            self.inner.abandon(epoch);
            return false;
        }

        info!("Requested permission for {} (epoch {})", device, epoch);
        true
    }

    /// Apply an OS decision directly
    ///
    /// Normally reached through the registered listener; exposed for hosts
    /// that receive the broadcast themselves.
    pub fn on_permission_decision(&self, epoch: Epoch, device: &DeviceRef, granted: bool) {
        self.inner.on_permission_decision(epoch, device, granted);
    }

    /// Current handle, or the sentinel when no connection is established
    pub fn query_handle(&self) -> i32 {
        self.inner.lock_session().state.handle()
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.inner.lock_session().state.phase()
    }

    /// Epoch of the most recent request
    pub fn current_epoch(&self) -> Epoch {
        self.inner.current_epoch()
    }
}

impl Drop for PermissionNegotiator {
    fn drop(&mut self) {
        self.inner.reset();
    }
}

impl NegotiatorInner {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_epoch(&self) -> Epoch {
        self.lock_session().epoch
    }

    /// Drop the current session: unregister its listener, close its
    /// connection, return to `Idle`
    fn reset(&self) {
        let previous = {
            let mut session = self.lock_session();
            std::mem::replace(&mut session.state, NegotiationState::Idle)
        };

        if let Some(listener) = previous.listener() {
            debug!("Superseding pending negotiation, unregistering {:?}", listener);
            self.permissions.unregister_listener(listener);
        }

        if previous.phase() == NegotiationPhase::Granted {
            info!("Closing previous connection (handle {})", previous.handle());
        }
        // The previous connection, if any, closes here
    }

    /// Advance the epoch and register the listener for `device`
    fn arm(self: &Arc<Self>, device: &DeviceRef) -> Option<(Epoch, ListenerId)> {
        let mut session = self.lock_session();

        // Another request may have raced in between reset and now
        if let Some(listener) = session.state.listener() {
            self.permissions.unregister_listener(listener);
        }

        let epoch = session.epoch.next();
        session.epoch = epoch;

        let sink: Weak<dyn DecisionSink> = Arc::downgrade(self) as Weak<dyn DecisionSink>;
        let listener = match self
            .permissions
            .register_listener(PermissionCallback::new(epoch, sink))
        {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Could not register permission listener for {}: {}", device, e);
                session.state = NegotiationState::Idle;
                return None;
            }
        };

        debug!(
            "Registered listener {:?} for {} (epoch {})",
            listener, device, epoch
        );
        session.state = NegotiationState::AwaitingPermission {
            epoch,
            target: device.clone(),
            listener,
        };
        Some((epoch, listener))
    }

    /// Give up on `epoch` if it is still pending
    fn abandon(&self, epoch: Epoch) {
        let mut session = self.lock_session();
        let pending = matches!(
            session.state,
            NegotiationState::AwaitingPermission { epoch: current, .. } if current == epoch
        );
        if !pending {
            return;
        }

        if let Some(listener) = session.state.listener() {
            self.permissions.unregister_listener(listener);
        }
        session.state = NegotiationState::Idle;
    }

    fn emit(&self, event: CameraEvent) {
        let name = event.signal_name();
        if let Err(e) = self.events.emit(event) {
            error!("Failed to emit {}: {}", name, e);
        }
    }
}

impl DecisionSink for NegotiatorInner {
    fn on_permission_decision(&self, epoch: Epoch, device: &DeviceRef, granted: bool) {
        let mut session = self.lock_session();

        if !session.state.awaits(epoch, device) {
            debug!(
                "Ignoring stale decision for {} (epoch {}, current {}, {:?})",
                device,
                epoch,
                session.epoch,
                session.state.phase()
            );
            return;
        }

        if let Some(listener) = session.state.listener() {
            self.permissions.unregister_listener(listener);
        }

        if !granted {
            warn!("Permission denied for {}", device);
            session.state = NegotiationState::Denied {
                epoch,
                device: device.clone(),
            };
            self.emit(CameraEvent::PermissionDenied {
                device: device.clone(),
            });
            return;
        }

        let opened = self.opener.open(device).and_then(|connection| {
            let handle = connection.file_descriptor();
            if handle < 0 {
                Err(common::Error::Usb(format!(
                    "opener returned invalid descriptor {}",
                    handle
                )))
            } else {
                Ok(connection)
            }
        });

        match opened {
            Ok(connection) => {
                let handle = connection.file_descriptor();
                info!("Got permission for {}, handle {}", device, handle);
                session.state = NegotiationState::Granted {
                    epoch,
                    device: device.clone(),
                    connection,
                };
                self.emit(CameraEvent::PermissionReceived { handle });
            }
            Err(e) => {
                error!("Permission granted but opening {} failed: {}", device, e);
                session.state = NegotiationState::Denied {
                    epoch,
                    device: device.clone(),
                };
                self.emit(CameraEvent::OpenFailed {
                    device: device.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}
