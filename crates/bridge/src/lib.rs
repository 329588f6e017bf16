//! usbcam-bridge
//!
//! Lets a host application ask for exclusive access to a USB camera. The
//! bridge finds the device by vendor/product ID, requests OS permission,
//! waits for the decision to come back out of band, opens the device and
//! hands the host a file descriptor through a `permission_received` event.
//!
//! ```no_run
//! use std::sync::Arc;
//! use usbcam_bridge::{BridgeConfig, CameraPlugin, CameraSupervisor};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = BridgeConfig::load_or_default();
//! let plugin = Arc::new(CameraPlugin::with_system_backend(&config)?);
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let supervisor = CameraSupervisor::from_config(plugin.clone(), &config)?;
//! tokio::spawn(supervisor.run(shutdown_rx));
//!
//! let event = plugin.events().recv().await?;
//! println!("{:?}", event);
//! shutdown_tx.send(true)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod plugin;
pub mod supervisor;
pub mod usb;

pub use config::BridgeConfig;
pub use plugin::{CameraPlugin, PLUGIN_METHODS, PLUGIN_NAME, PLUGIN_SIGNALS, init_logging};
pub use supervisor::CameraSupervisor;
pub use usb::{DeviceMatcher, NegotiationPhase, PermissionNegotiator, UsbServices};
