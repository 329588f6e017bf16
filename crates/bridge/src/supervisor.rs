//! Camera connection supervisor
//!
//! Polls for the configured camera, starts a negotiation when it shows up
//! and reports `camera_status_changed` as the connection moves between
//! not-connected, attached and connected.

use crate::config::BridgeConfig;
use crate::plugin::CameraPlugin;
use common::{CameraEvent, CameraStatus, DeviceIdentity, EventSender, HANDLE_SENTINEL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub struct CameraSupervisor {
    plugin: Arc<CameraPlugin>,
    identity: DeviceIdentity,
    period: Duration,
    events: EventSender,
    status: Option<CameraStatus>,
    attached: bool,
}

impl CameraSupervisor {
    pub fn new(plugin: Arc<CameraPlugin>, identity: DeviceIdentity, period: Duration) -> Self {
        let events = plugin.event_sender();
        Self {
            plugin,
            identity,
            period,
            events,
            status: None,
            attached: false,
        }
    }

    /// Supervise the `[camera]` device at the `[supervisor]` poll interval
    pub fn from_config(plugin: Arc<CameraPlugin>, config: &BridgeConfig) -> anyhow::Result<Self> {
        let identity = config.identity()?;
        Ok(Self::new(plugin, identity, config.supervisor.poll_interval()))
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn poll_interval(&self) -> Duration {
        self.period
    }

    /// Last reported status; `NotConnected` before the first tick
    pub fn status(&self) -> CameraStatus {
        self.status.unwrap_or(CameraStatus::NotConnected)
    }

    /// Advance the supervisor by one poll
    pub fn tick(&mut self) -> CameraStatus {
        if self.status.is_none() {
            self.set_status(CameraStatus::NotConnected);
        }

        let attached = self.plugin.matcher().is_attached(self.identity);

        if !self.attached {
            if attached {
                info!("Camera {} attached", self.identity);
                self.attached = true;
                self.set_status(CameraStatus::Attached);
                self.connect();
            }
            return self.status();
        }

        if !attached {
            warn!("Camera {} no longer attached", self.identity);
            self.attached = false;
            self.set_status(CameraStatus::NotConnected);
            return self.status();
        }

        let handle = self.plugin.is_camera_connected();
        if self.status() != CameraStatus::Connected && handle != HANDLE_SENTINEL {
            info!("Camera {} connected (handle {})", self.identity, handle);
            self.set_status(CameraStatus::Connected);
        }

        self.status()
    }

    /// Poll until `shutdown` turns true or its sender drops
    ///
    /// Enumeration and the permission request block on the OS, so each
    /// poll runs on the blocking pool.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Camera supervisor started for {} ({:?} poll)",
            self.identity, self.period
        );

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut supervisor = self;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let polled = tokio::task::spawn_blocking(move || {
                supervisor.tick();
                supervisor
            })
            .await;

            supervisor = match polled {
                Ok(supervisor) => supervisor,
                Err(e) => {
                    error!("Camera poll task failed: {}", e);
                    return;
                }
            };
        }

        info!("Camera supervisor stopped");
    }

    fn connect(&self) {
        let issued = self
            .plugin
            .negotiator()
            .request_connection(self.identity);
        if issued {
            debug!("Permission requested for {}", self.identity);
        } else {
            warn!("Could not request permission for {}", self.identity);
        }
    }

    fn set_status(&mut self, status: CameraStatus) {
        if self.status == Some(status) {
            return;
        }
        self.status = Some(status);
        if let Err(e) = self.events.emit(CameraEvent::StatusChanged { status }) {
            error!("Failed to emit camera_status_changed: {}", e);
        }
    }
}
