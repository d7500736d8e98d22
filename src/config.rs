//! Configuration using Figment
//!
//! Loaded from (later sources win):
//! 1. built-in defaults
//! 2. a TOML file
//! 3. environment variables prefixed with `DAQ_CAPS_`, nested keys separated
//!    by `__` (e.g. `DAQ_CAPS_LOGGING__LEVEL=debug`)
//!
//! # Example
//! ```no_run
//! use daq_caps::config::CapsConfig;
//!
//! let config = CapsConfig::load_from("daq-caps.toml")?;
//! config.validate()?;
//! let registry = config.registry();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashSet;
use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::classify::{ClassifierConfig, ErrorClassifier};
use crate::device::DeviceRegistry;
use crate::error::{CapsError, Result};
use crate::logging::OutputFormat;
use crate::quirks::{QuirkOverride, QuirkTable};
use crate::sim::BoardProfile;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DAQ_CAPS_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Extra vendor codes for the error classifier
    pub classifier: ClassifierConfig,
    /// Per-model quirk overrides
    pub quirks: Vec<QuirkOverride>,
    /// Simulated boards to probe
    pub boards: Vec<BoardProfile>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: OutputFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Compact,
        }
    }
}

impl CapsConfig {
    /// Defaults overridden by environment variables only.
    pub fn load() -> std::result::Result<Self, figment::Error> {
        Self::base().merge(Env::prefixed(ENV_PREFIX).split("__")).extract()
    }

    /// Load from a TOML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> std::result::Result<Self, figment::Error> {
        Self::base()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<()> {
        if !VALID_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(CapsError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }

        let mut models = HashSet::new();
        for entry in &self.quirks {
            if !models.insert(entry.model) {
                return Err(CapsError::Config(format!(
                    "Duplicate quirk override for model 0x{:X}",
                    entry.model
                )));
            }
            if entry.packet_size == Some(0) {
                return Err(CapsError::Config(format!(
                    "Packet size for model 0x{:X} must be at least 1",
                    entry.model
                )));
            }
        }

        let mut names = HashSet::new();
        for board in &self.boards {
            if board.name.trim().is_empty() {
                return Err(CapsError::Config("Board name cannot be empty".to_string()));
            }
            if !names.insert(board.name.as_str()) {
                return Err(CapsError::Config(format!(
                    "Duplicate board name: {}",
                    board.name
                )));
            }
            if board.analog_input.channels > 0 && board.analog_input.resolution == 0 {
                return Err(CapsError::Config(format!(
                    "Board '{}' has analog inputs but zero resolution",
                    board.name
                )));
            }
            if board.analog_output.channels > 0 && board.analog_output.resolution == 0 {
                return Err(CapsError::Config(format!(
                    "Board '{}' has analog outputs but zero resolution",
                    board.name
                )));
            }
            for port in &board.ports {
                if port.num_bits == 0 || port.num_bits > 32 {
                    return Err(CapsError::Config(format!(
                        "Board '{}' port {} has invalid width {}",
                        board.name, port.tag, port.num_bits
                    )));
                }
            }
        }

        Ok(())
    }

    /// Classifier with the configured extra codes.
    pub fn error_classifier(&self) -> ErrorClassifier {
        ErrorClassifier::from_config(&self.classifier)
    }

    /// Built-in quirk table with the configured overrides.
    pub fn quirk_table(&self) -> QuirkTable {
        QuirkTable::with_overrides(&self.quirks)
    }

    /// Registry using the configured classifier and quirks. Not yet initialized.
    pub fn registry(&self) -> DeviceRegistry {
        DeviceRegistry::new(self.error_classifier(), self.quirk_table())
    }

    /// Configured boards, or the demo boards when none are configured.
    pub fn boards_or_demo(&self) -> Vec<BoardProfile> {
        if self.boards.is_empty() {
            BoardProfile::demo_boards()
        } else {
            self.boards.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::OutcomeClass;
    use crate::quirks::ModelId;
    use crate::transport::VendorCode;
    use serial_test::serial;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_defaults_when_file_missing() {
        let config = CapsConfig::load_from("/nonexistent/daq-caps.toml").unwrap();
        assert_eq!(config, CapsConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let file = write_config(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [classifier]
            unsupported = [9001]

            [[quirks]]
            model = 0x7A
            packet_size = 32

            [[boards]]
            name = "bench"
            model = 0x7A
            "#,
        );

        let config = CapsConfig::load_from(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, OutputFormat::Json);
        assert_eq!(config.boards.len(), 1);
        assert!(config.validate().is_ok());

        assert_eq!(config.quirk_table().packet_size(ModelId(0x7A)), 32);
        assert_eq!(
            config.error_classifier().class_of(VendorCode(9001)),
            OutcomeClass::Unsupported
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_config("[logging]\nlevel = \"warn\"\n");

        std::env::set_var("DAQ_CAPS_LOGGING__LEVEL", "trace");
        let config = CapsConfig::load_from(file.path());
        std::env::remove_var("DAQ_CAPS_LOGGING__LEVEL");

        assert_eq!(config.unwrap().logging.level, "trace");
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = CapsConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_duplicate_board_names() {
        let config = CapsConfig {
            boards: vec![BoardProfile::default(), BoardProfile::default()],
            ..CapsConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("Duplicate board"));
    }

    #[test]
    fn test_zero_packet_size_rejected() {
        let config = CapsConfig {
            quirks: vec![QuirkOverride {
                model: 0x7A,
                name: None,
                packet_size: Some(0),
                trigger_resolution: None,
            }],
            ..CapsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_demo_boards_fill_empty_config() {
        let config = CapsConfig::default();
        assert!(!config.boards_or_demo().is_empty());
    }
}
