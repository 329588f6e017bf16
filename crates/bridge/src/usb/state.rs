//! Negotiation state machine
//!
//! A single slot shared by the caller thread and the OS callback thread. It
//! is only ever touched under the negotiator's mutex.

use common::{DeviceConnection, DeviceRef, Epoch, HANDLE_SENTINEL, ListenerId};
use std::fmt;

/// Payload-free view of [`NegotiationState`], for callers and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationPhase {
    Idle,
    AwaitingPermission,
    Granted,
    Denied,
}

/// Where the current negotiation stands
pub enum NegotiationState {
    /// No device targeted
    Idle,

    /// Permission requested, listener registered
    AwaitingPermission {
        epoch: Epoch,
        target: DeviceRef,
        listener: ListenerId,
    },

    /// Device opened; the connection stays open while this state holds it
    Granted {
        epoch: Epoch,
        device: DeviceRef,
        connection: Box<dyn DeviceConnection>,
    },

    /// Permission refused, or the device could not be opened after a grant.
    /// Behaves like `Idle` for every operation.
    Denied { epoch: Epoch, device: DeviceRef },
}

impl NegotiationState {
    pub fn phase(&self) -> NegotiationPhase {
        match self {
            NegotiationState::Idle => NegotiationPhase::Idle,
            NegotiationState::AwaitingPermission { .. } => NegotiationPhase::AwaitingPermission,
            NegotiationState::Granted { .. } => NegotiationPhase::Granted,
            NegotiationState::Denied { .. } => NegotiationPhase::Denied,
        }
    }

    /// Published handle; the sentinel unless granted
    pub fn handle(&self) -> i32 {
        match self {
            NegotiationState::Granted { connection, .. } => connection.file_descriptor(),
            _ => HANDLE_SENTINEL,
        }
    }

    /// Listener still registered for this state, if any
    pub fn listener(&self) -> Option<ListenerId> {
        match self {
            NegotiationState::AwaitingPermission { listener, .. } => Some(*listener),
            _ => None,
        }
    }

    /// Whether a decision tagged `epoch` for `device` answers this state
    pub fn awaits(&self, epoch: Epoch, device: &DeviceRef) -> bool {
        matches!(
            self,
            NegotiationState::AwaitingPermission { epoch: current, target, .. }
                if *current == epoch && target == device
        )
    }
}

impl fmt::Debug for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationState::Idle => f.write_str("Idle"),
            NegotiationState::AwaitingPermission {
                epoch,
                target,
                listener,
            } => f
                .debug_struct("AwaitingPermission")
                .field("epoch", epoch)
                .field("target", target)
                .field("listener", listener)
                .finish(),
            NegotiationState::Granted {
                epoch,
                device,
                connection,
            } => f
                .debug_struct("Granted")
                .field("epoch", epoch)
                .field("device", device)
                .field("handle", &connection.file_descriptor())
                .finish(),
            NegotiationState::Denied { epoch, device } => f
                .debug_struct("Denied")
                .field("epoch", epoch)
                .field("device", device)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::DeviceIdentity;

    struct FakeConnection(i32);

    impl DeviceConnection for FakeConnection {
        fn file_descriptor(&self) -> i32 {
            self.0
        }
    }

    fn device(name: &str) -> DeviceRef {
        DeviceRef::new(name, DeviceIdentity::new(0x1234, 0x5678))
    }

    #[test]
    fn test_handle_only_when_granted() {
        assert_eq!(NegotiationState::Idle.handle(), HANDLE_SENTINEL);

        let awaiting = NegotiationState::AwaitingPermission {
            epoch: Epoch(1),
            target: device("a"),
            listener: ListenerId(0),
        };
        assert_eq!(awaiting.handle(), HANDLE_SENTINEL);
        assert_eq!(awaiting.listener(), Some(ListenerId(0)));

        let granted = NegotiationState::Granted {
            epoch: Epoch(1),
            device: device("a"),
            connection: Box::new(FakeConnection(12)),
        };
        assert_eq!(granted.handle(), 12);
        assert_eq!(granted.phase(), NegotiationPhase::Granted);
        assert_eq!(granted.listener(), None);
        assert!(format!("{:?}", granted).contains("handle: 12"));

        let denied = NegotiationState::Denied {
            epoch: Epoch(1),
            device: device("a"),
        };
        assert_eq!(denied.handle(), HANDLE_SENTINEL);
    }

    #[test]
    fn test_awaits_matches_epoch_and_device() {
        let state = NegotiationState::AwaitingPermission {
            epoch: Epoch(2),
            target: device("a"),
            listener: ListenerId(5),
        };

        assert!(state.awaits(Epoch(2), &device("a")));
        assert!(!state.awaits(Epoch(1), &device("a")));
        assert!(!state.awaits(Epoch(2), &device("b")));
        assert!(!NegotiationState::Idle.awaits(Epoch(2), &device("a")));
    }
}
