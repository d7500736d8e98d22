//! Digital port capabilities.
//!
//! Direction support is decided from the port's input/output masks plus trial
//! direction configurations. The masks are read directly and never inferred.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::DaqDevice;
use crate::error::{CapsError, Result};
use crate::fact::CapabilityFact;
use crate::transport::{ConfigItem, ConfigKey, Direction, FunctionClass, TrialOperation};

/// Vendor-assigned digital port identifier.
///
/// Not a bare index: numbering conventions differ across hardware
/// generations, and some boards start at `FirstCL` with no A/B ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum PortTag {
    /// Miscellaneous/auxiliary bits
    Aux,
    Aux1,
    Aux2,
    FirstA,
    FirstB,
    /// Low nibble of port C. Legacy low-byte port on boards that emulate an 8255.
    FirstCL,
    FirstCH,
    SecondA,
    SecondB,
    SecondCL,
    SecondCH,
    ThirdA,
    ThirdB,
    ThirdCL,
    ThirdCH,
    FourthA,
    FourthB,
    FourthCL,
    FourthCH,
    /// Tag this crate has no name for.
    Other(i32),
}

const NAMED_TAGS: &[(PortTag, i32)] = &[
    (PortTag::Aux, 1),
    (PortTag::Aux1, 2),
    (PortTag::Aux2, 3),
    (PortTag::FirstA, 10),
    (PortTag::FirstB, 11),
    (PortTag::FirstCL, 12),
    (PortTag::FirstCH, 13),
    (PortTag::SecondA, 14),
    (PortTag::SecondB, 15),
    (PortTag::SecondCL, 16),
    (PortTag::SecondCH, 17),
    (PortTag::ThirdA, 18),
    (PortTag::ThirdB, 19),
    (PortTag::ThirdCL, 20),
    (PortTag::ThirdCH, 21),
    (PortTag::FourthA, 22),
    (PortTag::FourthB, 23),
    (PortTag::FourthCL, 24),
    (PortTag::FourthCH, 25),
];

impl PortTag {
    /// Convert from the raw value reported by `DigitalDevType`.
    pub fn from_raw(raw: i32) -> Self {
        NAMED_TAGS
            .iter()
            .find(|(_, value)| *value == raw)
            .map_or(Self::Other(raw), |(tag, _)| *tag)
    }

    /// Convert to the raw driver value.
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Other(raw) => raw,
            tag => NAMED_TAGS
                .iter()
                .find(|(named, _)| *named == tag)
                .map_or(0, |(_, value)| *value),
        }
    }

    /// Only the auxiliary port can have individually configurable bits.
    pub fn allows_bit_configuration(self) -> bool {
        self == Self::Aux
    }
}

impl fmt::Display for PortTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "PORT({})", raw),
            tag => write!(f, "{:?}", tag),
        }
    }
}

/// Offset of the first addressable bit of a port.
///
/// Some boards start at `FirstCL` and number its bits as if `FirstA` and
/// `FirstB` existed, for compatibility with older digital peripherals.
pub fn first_bit(port_index: u32, tag: PortTag) -> u32 {
    if port_index == 0 && tag == PortTag::FirstCL {
        16
    } else {
        0
    }
}

/// Capabilities of one digital port.
pub struct DigitalPort<'d> {
    device: &'d DaqDevice,
    index: u32,
    tag: PortTag,
    num_bits: u32,
    in_mask: u32,
    out_mask: u32,
    port_configurable: CapabilityFact<bool>,
    bit_configurable: CapabilityFact<bool>,
    input_scan: CapabilityFact<bool>,
    output_scan: CapabilityFact<bool>,
}

impl<'d> DigitalPort<'d> {
    /// Read the port attributes for `index` from the board.
    pub fn open(device: &'d DaqDevice, index: u32) -> Result<Self> {
        let read = |item| device.config_value(ConfigKey::digital(index, item));
        let tag = PortTag::from_raw(to_i32(device, read(ConfigItem::DigitalDevType)?)?);
        let num_bits = to_u32(device, read(ConfigItem::DigitalNumBits)?)?;
        let in_mask = to_u32(device, read(ConfigItem::DigitalInMask)?)?;
        let out_mask = to_u32(device, read(ConfigItem::DigitalOutMask)?)?;

        debug!(
            handle = %device.handle(),
            index,
            tag = %tag,
            num_bits,
            in_mask = format!("{:#x}", in_mask),
            out_mask = format!("{:#x}", out_mask),
            "Opened digital port"
        );

        Ok(Self::from_parts(device, index, tag, num_bits, in_mask, out_mask))
    }

    /// Build a port from attributes that are already known.
    pub fn from_parts(
        device: &'d DaqDevice,
        index: u32,
        tag: PortTag,
        num_bits: u32,
        in_mask: u32,
        out_mask: u32,
    ) -> Self {
        Self {
            device,
            index,
            tag,
            num_bits,
            in_mask,
            out_mask,
            port_configurable: CapabilityFact::new(),
            bit_configurable: CapabilityFact::new(),
            input_scan: CapabilityFact::new(),
            output_scan: CapabilityFact::new(),
        }
    }

    /// Device the port belongs to.
    pub fn device(&self) -> &'d DaqDevice {
        self.device
    }

    /// Position in the board's port list.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Vendor port identifier.
    pub fn tag(&self) -> PortTag {
        self.tag
    }

    /// Port width in bits.
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Bits hard-wired as inputs.
    pub fn in_mask(&self) -> u32 {
        self.in_mask
    }

    /// Bits hard-wired as outputs.
    pub fn out_mask(&self) -> u32 {
        self.out_mask
    }

    /// Offset of the first bit when bits are addressed board-wide.
    pub fn first_bit(&self) -> u32 {
        first_bit(self.index, self.tag)
    }

    /// Whether the whole port can be switched between input and output.
    pub fn is_port_configurable(&self) -> Result<bool> {
        self.port_configurable
            .get_or_probe(|| {
                self.probe_directions(|direction| TrialOperation::ConfigurePort {
                    port: self.tag,
                    direction,
                })
            })
            .copied()
    }

    /// Whether single bits of the port can be switched individually.
    pub fn is_bit_configurable(&self) -> Result<bool> {
        self.bit_configurable
            .get_or_probe(|| {
                if !self.tag.allows_bit_configuration() {
                    return Ok(false);
                }
                let bit = self.first_bit();
                self.probe_directions(|direction| TrialOperation::ConfigureBit {
                    port: self.tag,
                    bit,
                    direction,
                })
            })
            .copied()
    }

    /// Whether the port can be read.
    pub fn is_input_supported(&self) -> Result<bool> {
        Ok(self.in_mask > 0 || self.is_port_configurable()?)
    }

    /// Whether the port can be written.
    pub fn is_output_supported(&self) -> Result<bool> {
        Ok(self.out_mask > 0 || self.is_port_configurable()?)
    }

    /// Whether background digital input scans are available.
    pub fn is_input_scan_supported(&self) -> Result<bool> {
        self.input_scan
            .get_or_probe(|| self.probe_status(FunctionClass::DigitalIn))
            .copied()
    }

    /// Whether background digital output scans are available.
    pub fn is_output_scan_supported(&self) -> Result<bool> {
        self.output_scan
            .get_or_probe(|| self.probe_status(FunctionClass::DigitalOut))
            .copied()
    }

    /// Output trial then input trial; both must succeed.
    ///
    /// Overlapping masks mean fixed-direction bits, so nothing is attempted.
    fn probe_directions<F>(&self, trial_for: F) -> Result<bool>
    where
        F: Fn(Direction) -> TrialOperation,
    {
        if self.in_mask & self.out_mask != 0 {
            debug!(
                handle = %self.device.handle(),
                port = %self.tag,
                "masks overlap, port is fixed-direction"
            );
            return Ok(false);
        }
        for direction in [Direction::Output, Direction::Input] {
            if !self.device.probe(&trial_for(direction))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn probe_status(&self, function: FunctionClass) -> Result<bool> {
        self.device.probe(&TrialOperation::QueryStatus { function })
    }
}

impl fmt::Debug for DigitalPort<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalPort")
            .field("index", &self.index)
            .field("tag", &self.tag)
            .field("num_bits", &self.num_bits)
            .field("in_mask", &format_args!("{:#x}", self.in_mask))
            .field("out_mask", &format_args!("{:#x}", self.out_mask))
            .finish()
    }
}

fn to_u32(device: &DaqDevice, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| out_of_range(device, value))
}

fn to_i32(device: &DaqDevice, value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| out_of_range(device, value))
}

fn out_of_range(device: &DaqDevice, value: i64) -> CapsError {
    CapsError::Config(format!(
        "digital port value {} out of range on {}",
        value,
        device.handle()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_bit_rule() {
        assert_eq!(first_bit(0, PortTag::FirstCL), 16);
        assert_eq!(first_bit(1, PortTag::FirstCL), 0);
        assert_eq!(first_bit(0, PortTag::FirstA), 0);
        assert_eq!(first_bit(0, PortTag::Aux), 0);
        assert_eq!(first_bit(0, PortTag::SecondCL), 0);
    }

    #[test]
    fn test_port_tag_raw_mapping() {
        assert_eq!(PortTag::from_raw(12), PortTag::FirstCL);
        assert_eq!(PortTag::FirstCL.to_raw(), 12);
        assert_eq!(PortTag::from_raw(1), PortTag::Aux);
        assert_eq!(PortTag::from_raw(99), PortTag::Other(99));
        assert_eq!(PortTag::Other(99).to_raw(), 99);
    }

    #[test]
    fn test_bit_configuration_only_on_aux() {
        assert!(PortTag::Aux.allows_bit_configuration());
        assert!(!PortTag::Aux1.allows_bit_configuration());
        assert!(!PortTag::FirstA.allows_bit_configuration());
    }
}
