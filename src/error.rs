//! Error types for capability discovery.
//!
//! Only two classes of driver failure ever surface from a capability query:
//! the board being busy and a real fault. "Unsupported" is a capability signal
//! and is turned into `false` or absence by the engines, never into an error.

use thiserror::Error;

use crate::transport::{BoardHandle, ConfigKey, VendorCode};

/// Result type alias for capability operations.
pub type Result<T> = std::result::Result<T, CapsError>;

/// Errors that can occur while discovering capabilities.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapsError {
    /// Network device is held by another session or process.
    ///
    /// Says nothing about the feature being probed. Never cached.
    #[error("Device {handle} is busy ({code}); capability not determined")]
    DeviceBusy {
        /// Board that was busy
        handle: BoardHandle,
        /// Busy code returned by the driver
        code: VendorCode,
    },

    /// Any other driver failure: bad arguments, disconnected hardware, driver fault.
    #[error("Hardware failure on {handle} during {operation}: {code}")]
    HardFailure {
        /// Board the call was issued to
        handle: BoardHandle,
        /// Read, write or trial that failed
        operation: String,
        /// Driver error code
        code: VendorCode,
    },

    /// A required configuration value is not reported by this board.
    #[error("Configuration item {key} not available on {handle} ({code})")]
    ConfigUnavailable {
        /// Board that was queried
        handle: BoardHandle,
        /// Item that was read or written
        key: ConfigKey,
        /// Driver error code
        code: VendorCode,
    },

    /// Device registry used before `init()` or after `teardown()`.
    #[error("Device registry is not initialized")]
    NotInitialized,

    /// Handle is not open in this registry.
    #[error("Unknown device handle {0}")]
    UnknownHandle(BoardHandle),

    /// Invalid configuration or parameter.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CapsError {
    /// Check if the device is busy. Retrying later may succeed.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::DeviceBusy { .. })
    }

    /// Vendor code behind a driver-originated error.
    pub fn vendor_code(&self) -> Option<VendorCode> {
        match self {
            Self::DeviceBusy { code, .. }
            | Self::HardFailure { code, .. }
            | Self::ConfigUnavailable { code, .. } => Some(*code),
            _ => None,
        }
    }
}
