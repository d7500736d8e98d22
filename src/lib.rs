//! # DAQ Capability Discovery
//!
//! Discovers what a data acquisition board can do (which digital ports change
//! direction, which analog ranges a channel accepts, whether triggers, gain
//! queues and background scans exist) by issuing real driver operations and
//! classifying the vendor error codes that come back.
//!
//! Results are cached per port/channel for the lifetime of the device
//! session. A board held by another process is reported as busy and never
//! cached as "unsupported".
//!
//! ## Crate Structure
//!
//! - **`transport`**: The driver boundary (`DaqTransport`), configuration keys and trial
//!   operations.
//! - **`classify`**: Maps vendor codes onto Success / Unsupported / DeviceBusy / HardFailure.
//! - **`fact`**: Write-once memoized capability values.
//! - **`device`**: Open boards (`DaqDevice`) and the `DeviceRegistry` that hands out handles.
//! - **`subsystem`**: Capability engines for digital ports, analog inputs and analog outputs.
//! - **`range`**: Range/gain codes and the canonical probing order.
//! - **`quirks`**: Per-model packet size and trigger resolution.
//! - **`descriptor`** / **`report`**: Static capability tables and the per-device report.
//! - **`sim`**: Profile-driven simulated board for tests and hardware-free runs.
//! - **`config`** / **`logging`**: Figment configuration and tracing setup.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use daq_caps::device::DeviceRegistry;
//! use daq_caps::sim::{BoardProfile, SimulatedBoard};
//!
//! let registry = DeviceRegistry::default();
//! registry.init();
//!
//! let profile = BoardProfile::demo_boards().remove(0);
//! let descriptor = profile.descriptor();
//! let device = registry.open(descriptor, Arc::new(SimulatedBoard::new(profile)))?;
//!
//! let input = device.analog_input()?;
//! println!("{} ranges", input.supported_ranges()?.len());
//! # Ok::<(), daq_caps::error::CapsError>(())
//! ```

pub mod classify;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod fact;
pub mod logging;
pub mod quirks;
pub mod range;
pub mod report;
pub mod sim;
pub mod subsystem;
pub mod transport;

pub use classify::{ErrorClassifier, Outcome, OutcomeClass};
pub use device::{DaqDevice, DeviceDescriptor, DeviceRegistry};
pub use error::{CapsError, Result};
pub use fact::{CapabilityFact, FactState};
pub use range::{RangeCatalog, RangeCode};
pub use report::CapabilityReport;
pub use subsystem::analog_input::AnalogInput;
pub use subsystem::analog_output::AnalogOutput;
pub use subsystem::digital_io::{DigitalPort, PortTag};
pub use transport::{BoardHandle, ConfigItem, ConfigKey, DaqTransport, TrialOperation, VendorCode};
