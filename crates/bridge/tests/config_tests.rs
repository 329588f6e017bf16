//! Integration tests for configuration parsing
//!
//! Tests bridge configuration parsing, including:
//! - Minimal and full configuration files
//! - Defaults for omitted sections
//! - Invalid configuration handling
//! - Save/load through the filesystem

use common::DeviceIdentity;
use std::time::Duration;
use tempfile::tempdir;
use usbcam_bridge::BridgeConfig;

const MINIMAL_CONFIG: &str = r#"
[camera]
vendor_id = "0x1234"
product_id = "0x5678"
"#;

const FULL_CONFIG: &str = r#"
[camera]
vendor_id = "0x32E4"
product_id = "0x9750"

[logging]
log_level = "debug"

[permission]
companion_capability = "CAMERA"

[events]
capacity = 8

[supervisor]
poll_interval_ms = 250
"#;

mod parsing {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = BridgeConfig::from_toml(MINIMAL_CONFIG).unwrap();

        assert_eq!(
            config.identity().unwrap(),
            DeviceIdentity::new(0x1234, 0x5678)
        );
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.permission.capability(), Some("CAMERA"));
        assert_eq!(config.events.capacity, 64);
        assert_eq!(config.supervisor.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_full_config() {
        let config = BridgeConfig::from_toml(FULL_CONFIG).unwrap();

        assert_eq!(
            config.identity().unwrap(),
            DeviceIdentity::new(0x32e4, 0x9750)
        );
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.events.capacity, 8);
        assert_eq!(config.supervisor.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_empty_capability_disables_companion() {
        let text = format!("{}\n[permission]\ncompanion_capability = \"\"\n", MINIMAL_CONFIG);
        let config = BridgeConfig::from_toml(&text).unwrap();
        assert_eq!(config.permission.capability(), None);
    }
}

mod validation {
    use super::*;

    #[test]
    fn test_missing_camera_section() {
        assert!(BridgeConfig::from_toml("[logging]\nlog_level = \"info\"\n").is_err());
    }

    #[test]
    fn test_invalid_vendor_id() {
        let text = MINIMAL_CONFIG.replace("0x1234", "1234");
        assert!(BridgeConfig::from_toml(&text).is_err());

        let text = MINIMAL_CONFIG.replace("0x1234", "0x12345");
        assert!(BridgeConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let text = format!("{}\n[logging]\nlog_level = \"loud\"\n", MINIMAL_CONFIG);
        assert!(BridgeConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let text = format!("{}\n[events]\ncapacity = 0\n", MINIMAL_CONFIG);
        assert!(BridgeConfig::from_toml(&text).is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let text = format!("{}\n[supervisor]\npoll_interval_ms = 0\n", MINIMAL_CONFIG);
        assert!(BridgeConfig::from_toml(&text).is_err());
    }
}

mod filesystem {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("bridge.toml");

        let mut config = BridgeConfig::default();
        config.camera.vendor_id = "0xabcd".to_string();
        config.events.capacity = 3;
        config.save(&path).unwrap();

        let loaded = BridgeConfig::load(Some(path)).unwrap();
        assert_eq!(
            loaded.identity().unwrap(),
            DeviceIdentity::new(0xabcd, 0x9750)
        );
        assert_eq!(loaded.events.capacity, 3);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(BridgeConfig::load(Some(dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "[camera]\nvendor_id = 12\n").unwrap();

        assert!(BridgeConfig::load(Some(path)).is_err());
    }
}
