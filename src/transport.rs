//! Native driver boundary.
//!
//! Everything the capability engines know about a board arrives through the
//! [`DaqTransport`] trait: integer configuration reads/writes addressed by a
//! [`ConfigKey`], and trial invocations of real hardware operations
//! ([`TrialOperation`]). A concrete driver binding implements this trait; the
//! crate ships [`crate::sim::SimulatedBoard`] for tests and hardware-free runs.
//!
//! Failures are reported as raw [`VendorCode`]s. Interpreting them is the job
//! of [`crate::classify::ErrorClassifier`], never of the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::range::RangeCode;
use crate::subsystem::digital_io::PortTag;

/// Numeric handle assigned to an open board by the device registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoardHandle(pub u32);

impl fmt::Display for BoardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "board{}", self.0)
    }
}

/// Raw error code returned by the vendor driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorCode(pub i32);

impl VendorCode {
    /// Not an error. A transport must never return this as a failure.
    pub const NO_ERRORS: Self = Self(0);
    /// Board number is not valid or not installed.
    pub const BAD_BOARD: Self = Self(1);
    /// Digital port number is not valid for this board.
    pub const BAD_PORT_NUM: Self = Self(11);
    /// Analog channel number is not valid.
    pub const BAD_AD_CHAN: Self = Self(16);
    /// Digital port cannot be configured.
    pub const NOT_DIGITAL_CONF: Self = Self(6);
    /// Range code is not supported by the board.
    pub const BAD_RANGE: Self = Self(30);
    /// Function is not supported by this board type.
    pub const BAD_BOARD_TYPE: Self = Self(39);
    /// Bit number is not valid for the port.
    pub const BAD_BIT_NUMBER: Self = Self(41);
    /// Trigger type is not supported.
    pub const BAD_TRIG_TYPE: Self = Self(45);
    /// Board has no analog trigger hardware.
    pub const NO_AD_TRIGGER: Self = Self(56);
    /// Channel/gain queue size is not supported.
    pub const BAD_QUEUE_SIZE: Self = Self(67);
    /// Configuration item does not apply to this board.
    pub const CFG_NOT_SUPPORTED: Self = Self(75);
    /// Generic "function not supported" response.
    pub const FUNCTION_NOT_SUPPORTED: Self = Self(84);
    /// Device driver fault.
    pub const DRIVER_FAULT: Self = Self(91);
    /// USB or network link dropped.
    pub const DEVICE_DISCONNECTED: Self = Self(158);
    /// Network device is held by another session in this process.
    pub const NET_DEV_IN_USE: Self = Self(1043);
    /// Network device is held by another process.
    pub const NET_DEV_IN_USE_BY_ANOTHER_PROC: Self = Self(1044);

    /// Raw integer value.
    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for VendorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vendor error {}", self.0)
    }
}

/// Information category of a configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfoType {
    /// Board-wide items, addressed by sub-index 0 in practice.
    Board,
    /// Per digital port items, sub-index is the port index.
    Digital,
}

/// Configuration items the capability engines read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigItem {
    /// Hardware model identifier.
    BoardType,
    /// Number of analog input channels.
    NumAdChans,
    /// Analog input resolution in bits.
    AdResolution,
    /// Switch/jumper fixed input range, negative when software selectable.
    HardRange,
    /// Channel used as the analog trigger source, ≤ 0 for the default input.
    AdTriggerSource,
    /// Number of analog output channels.
    NumDaChans,
    /// Analog output resolution in bits.
    DacResolution,
    /// Output range configured outside software (used when range codes are ignored).
    DacRange,
    /// Number of digital ports.
    NumDigitalDevs,
    /// Port tag of a digital port.
    DigitalDevType,
    /// Number of bits in a digital port.
    DigitalNumBits,
    /// Bits that can be read.
    DigitalInMask,
    /// Bits that can be written.
    DigitalOutMask,
}

/// Address of one configuration value: (category, sub-index, item).
///
/// The device handle is supplied separately by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    /// Category
    pub info: InfoType,
    /// Sub-index within the category, e.g. port index
    pub dev_num: u32,
    /// Item to read or write
    pub item: ConfigItem,
}

impl ConfigKey {
    /// Board-wide item at sub-index 0.
    pub fn board(item: ConfigItem) -> Self {
        Self {
            info: InfoType::Board,
            dev_num: 0,
            item,
        }
    }

    /// Item of the digital port at `port_index`.
    pub fn digital(port_index: u32, item: ConfigItem) -> Self {
        Self {
            info: InfoType::Digital,
            dev_num: port_index,
            item,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}].{:?}", self.info, self.dev_num, self.item)
    }
}

/// Direction of a digital port or bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Read from the port
    Input,
    /// Drive the port
    Output,
}

/// Function class addressed by a background status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionClass {
    /// Analog input scans
    AnalogIn,
    /// Analog output scans
    AnalogOut,
    /// Digital input scans
    DigitalIn,
    /// Digital output scans
    DigitalOut,
}

/// Sample width used for single-sample analog reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleWidth {
    /// 16-bit read call.
    Standard,
    /// 32-bit read call, required above 16 bits of resolution.
    Wide,
}

impl SampleWidth {
    /// Width needed for a converter of `resolution` bits.
    pub fn for_resolution(resolution: u32) -> Self {
        if resolution > 16 {
            Self::Wide
        } else {
            Self::Standard
        }
    }
}

/// Trigger condition types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    /// Fire when the input rises above the threshold
    TriggerAbove,
    /// Fire when the input falls below the threshold
    TriggerBelow,
}

/// One real hardware operation issued for its success/failure signal.
///
/// Operations with side effects always carry harmless arguments when issued by
/// the capability engines: value 0, zero thresholds, an empty queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialOperation {
    /// Configure every bit of a port.
    ConfigurePort { port: PortTag, direction: Direction },
    /// Configure a single bit, numbered from the port's first addressable bit.
    ConfigureBit {
        port: PortTag,
        bit: u32,
        direction: Direction,
    },
    /// Read one raw sample.
    ReadSample {
        channel: u32,
        range: RangeCode,
        width: SampleWidth,
    },
    /// Read one voltage-scaled sample.
    ReadVoltage { channel: u32, range: RangeCode },
    /// Write one raw sample.
    WriteSample {
        channel: u32,
        range: RangeCode,
        value: u32,
    },
    /// Write one voltage.
    WriteVoltage {
        channel: u32,
        range: RangeCode,
        millivolts: i32,
    },
    /// Arm an analog trigger condition.
    SetTrigger {
        kind: TriggerKind,
        low_threshold: u32,
        high_threshold: u32,
    },
    /// Load a channel/gain queue.
    LoadQueue { entries: Vec<(u32, RangeCode)> },
    /// Query background operation status. Has no effect on the hardware.
    QueryStatus { function: FunctionClass },
}

impl TrialOperation {
    /// Short label used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConfigurePort { .. } => "configure_port",
            Self::ConfigureBit { .. } => "configure_bit",
            Self::ReadSample { .. } => "read_sample",
            Self::ReadVoltage { .. } => "read_voltage",
            Self::WriteSample { .. } => "write_sample",
            Self::WriteVoltage { .. } => "write_voltage",
            Self::SetTrigger { .. } => "set_trigger",
            Self::LoadQueue { .. } => "load_queue",
            Self::QueryStatus { .. } => "query_status",
        }
    }
}

/// Contract of the native driver binding.
///
/// Implementations perform exactly one blocking driver call per method
/// invocation. Callers serialize access per board (see
/// [`crate::device::DaqDevice`]), so implementations need not lock.
pub trait DaqTransport: Send + Sync {
    /// Read one integer configuration value.
    fn config_read(&self, board: BoardHandle, key: ConfigKey) -> Result<i64, VendorCode>;

    /// Write one integer configuration value.
    fn config_write(&self, board: BoardHandle, key: ConfigKey, value: i64)
        -> Result<(), VendorCode>;

    /// Perform one hardware operation.
    fn try_operation(&self, board: BoardHandle, op: &TrialOperation) -> Result<(), VendorCode>;
}
