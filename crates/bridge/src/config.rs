//! Bridge configuration management

use anyhow::{Context, Result, anyhow};
use common::DeviceIdentity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub camera: CameraSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub permission: PermissionSettings,
    #[serde(default)]
    pub events: EventSettings,
    #[serde(default)]
    pub supervisor: SupervisorSettings,
}

/// Camera the supervisor looks for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// USB vendor ID, hex string (e.g. "0x32e4")
    pub vendor_id: String,
    /// USB product ID, hex string (e.g. "0x9750")
    pub product_id: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        // Eiffel stereo camera
        Self {
            vendor_id: "0x32e4".to_string(),
            product_id: "0x9750".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSettings {
    /// OS capability requested alongside USB permission (empty = none)
    #[serde(default = "PermissionSettings::default_capability")]
    pub companion_capability: Option<String>,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            companion_capability: Self::default_capability(),
        }
    }
}

impl PermissionSettings {
    fn default_capability() -> Option<String> {
        Some("CAMERA".to_string())
    }

    /// Capability to request, if any
    pub fn capability(&self) -> Option<&str> {
        self.companion_capability
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Waiting events before status updates are dropped
    #[serde(default = "EventSettings::default_capacity")]
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

impl EventSettings {
    fn default_capacity() -> usize {
        64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// Attachment polling interval
    #[serde(default = "SupervisorSettings::default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval(),
        }
    }
}

impl SupervisorSettings {
    fn default_poll_interval() -> u64 {
        500
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            logging: LoggingSettings::default(),
            permission: PermissionSettings::default(),
            events: EventSettings::default(),
            supervisor: SupervisorSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref())
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usbcam-bridge/bridge.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: BridgeConfig =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbcam-bridge").join("bridge.toml")
        } else {
            PathBuf::from(".config/usbcam-bridge/bridge.toml")
        }
    }

    /// Camera identity from the configured hex IDs
    pub fn identity(&self) -> Result<DeviceIdentity> {
        let vendor_id = Self::parse_hex_id(&self.camera.vendor_id, "vendor_id")?;
        let product_id = Self::parse_hex_id(&self.camera.product_id, "product_id")?;
        Ok(DeviceIdentity::new(vendor_id, product_id))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.log_level,
                valid_levels.join(", ")
            ));
        }

        self.identity()?;

        if self.events.capacity == 0 {
            return Err(anyhow!("Event capacity must be at least 1"));
        }

        if self.supervisor.poll_interval_ms == 0 {
            return Err(anyhow!("Supervisor poll interval must be at least 1 ms"));
        }

        Ok(())
    }

    /// Parse a hex ID (VID or PID)
    fn parse_hex_id(id: &str, name: &str) -> Result<u16> {
        let hex_part = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .ok_or_else(|| {
                anyhow!(
                    "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                    name,
                    id
                )
            })?;

        if hex_part.is_empty() || hex_part.len() > 4 {
            return Err(anyhow!(
                "Invalid {} '{}', hex part must be 1-4 digits",
                name,
                id
            ));
        }

        u16::from_str_radix(hex_part, 16)
            .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.permission.capability(), Some("CAMERA"));
        assert_eq!(
            config.identity().unwrap(),
            DeviceIdentity::new(0x32e4, 0x9750)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(BridgeConfig::parse_hex_id("0x1234", "VID").unwrap(), 0x1234);
        assert_eq!(BridgeConfig::parse_hex_id("0XABCD", "VID").unwrap(), 0xabcd);
        assert_eq!(BridgeConfig::parse_hex_id("0x1", "VID").unwrap(), 1);
        assert!(BridgeConfig::parse_hex_id("1234", "VID").is_err());
        assert!(BridgeConfig::parse_hex_id("0x", "VID").is_err());
        assert!(BridgeConfig::parse_hex_id("0x12345", "VID").is_err());
        assert!(BridgeConfig::parse_hex_id("0xGHIJ", "VID").is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = BridgeConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.camera.vendor_id, parsed.camera.vendor_id);
        assert_eq!(config.events.capacity, parsed.events.capacity);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = BridgeConfig::default();
        config.logging.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_capability_disables_companion() {
        let mut config = BridgeConfig::default();
        config.permission.companion_capability = Some("  ".to_string());
        assert_eq!(config.permission.capability(), None);

        config.permission.companion_capability = None;
        assert_eq!(config.permission.capability(), None);
    }
}
