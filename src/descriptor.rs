//! Static capability descriptor tables.
//!
//! Each table lists the capabilities of one kind of handle as
//! `(name, description, getter, optional setter, arity)`. Reports and the CLI
//! walk these tables instead of enumerating methods at runtime. Almost every
//! capability is discovered and therefore read-only; the few board values
//! that can be written carry a setter and the number of arguments it takes.

use std::fmt;

use serde::Serialize;

use crate::error::{CapsError, Result};
use crate::range::RangeCode;
use crate::subsystem::analog_input::AnalogInput;
use crate::subsystem::analog_output::AnalogOutput;
use crate::subsystem::digital_io::DigitalPort;

/// Value produced by a capability getter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    /// Yes/no capability
    Bool(bool),
    /// Count, size or offset
    Integer(i64),
    /// `None` when the board does not report the value
    OptionalInteger(Option<i64>),
    /// Range codes in probing order
    Ranges(Vec<RangeCode>),
    /// `None` when the value cannot be determined
    OptionalRange(Option<RangeCode>),
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => write!(f, "yes"),
            Self::Bool(false) => write!(f, "no"),
            Self::Integer(value) | Self::OptionalInteger(Some(value)) => write!(f, "{}", value),
            Self::Ranges(ranges) if ranges.is_empty() => write!(f, "none"),
            Self::Ranges(ranges) => {
                let names: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                write!(f, "{}", names.join(", "))
            }
            Self::OptionalRange(Some(range)) => write!(f, "{}", range),
            Self::OptionalInteger(None) | Self::OptionalRange(None) => write!(f, "unknown"),
        }
    }
}

/// One named capability with its getter and, if writable, its setter.
pub struct Capability<G, S> {
    /// Stable identifier used in reports
    pub name: &'static str,
    /// One-line human description
    pub description: &'static str,
    /// Number of arguments the setter takes; 0 for read-only capabilities
    pub arity: usize,
    /// Reads the capability
    pub get: G,
    /// Writes the underlying board value
    pub set: Option<S>,
}

impl<G, S> Capability<G, S> {
    /// Capability that can only be read.
    pub const fn read_only(name: &'static str, description: &'static str, get: G) -> Self {
        Self {
            name,
            description,
            arity: 0,
            get,
            set: None,
        }
    }

    /// Capability backed by a writable board value.
    pub const fn read_write(
        name: &'static str,
        description: &'static str,
        arity: usize,
        get: G,
        set: S,
    ) -> Self {
        Self {
            name,
            description,
            arity,
            get,
            set: Some(set),
        }
    }

    /// Whether a setter is registered.
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Setter to call with `args`, after checking that it exists and that
    /// `args` matches its arity.
    pub fn setter(&self, args: &[i64]) -> Result<&S> {
        let set = self
            .set
            .as_ref()
            .ok_or_else(|| CapsError::Config(format!("capability {} is read-only", self.name)))?;
        if args.len() != self.arity {
            return Err(CapsError::Config(format!(
                "capability {} takes {} argument(s), got {}",
                self.name,
                self.arity,
                args.len()
            )));
        }
        Ok(set)
    }
}

/// Port capability getter.
pub type PortGetter = for<'a, 'd> fn(&'a DigitalPort<'d>) -> Result<CapabilityValue>;
/// Port capability setter.
pub type PortSetter = for<'a, 'd, 'v> fn(&'a DigitalPort<'d>, &'v [i64]) -> Result<()>;
/// Analog input capability getter.
pub type InputGetter = for<'a, 'd> fn(&'a AnalogInput<'d>) -> Result<CapabilityValue>;
/// Analog input capability setter.
pub type InputSetter = for<'a, 'd, 'v> fn(&'a AnalogInput<'d>, &'v [i64]) -> Result<()>;
/// Analog output capability getter.
pub type OutputGetter = for<'a, 'd> fn(&'a AnalogOutput<'d>) -> Result<CapabilityValue>;
/// Analog output capability setter.
pub type OutputSetter = for<'a, 'd, 'v> fn(&'a AnalogOutput<'d>, &'v [i64]) -> Result<()>;

impl<G, S> fmt::Debug for Capability<G, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("arity", &self.arity)
            .field("writable", &self.is_writable())
            .finish()
    }
}

// =============================================================================
// Digital ports
// =============================================================================

/// Capabilities of one digital port.
pub static PORT_CAPABILITIES: &[Capability<PortGetter, PortSetter>] = &[
    Capability::read_only(
        "first_bit",
        "Offset of the first addressable bit",
        port_first_bit,
    ),
    Capability::read_only(
        "port_configurable",
        "Whole port can switch between input and output",
        port_configurable,
    ),
    Capability::read_only(
        "bit_configurable",
        "Single bits can switch direction",
        port_bit_configurable,
    ),
    Capability::read_only("input", "Port can be read", port_input),
    Capability::read_only("output", "Port can be written", port_output),
    Capability::read_only(
        "input_scan",
        "Background digital input scans",
        port_input_scan,
    ),
    Capability::read_only(
        "output_scan",
        "Background digital output scans",
        port_output_scan,
    ),
];

fn port_first_bit(port: &DigitalPort<'_>) -> Result<CapabilityValue> {
    Ok(CapabilityValue::Integer(i64::from(port.first_bit())))
}

fn port_configurable(port: &DigitalPort<'_>) -> Result<CapabilityValue> {
    port.is_port_configurable().map(CapabilityValue::Bool)
}

fn port_bit_configurable(port: &DigitalPort<'_>) -> Result<CapabilityValue> {
    port.is_bit_configurable().map(CapabilityValue::Bool)
}

fn port_input(port: &DigitalPort<'_>) -> Result<CapabilityValue> {
    port.is_input_supported().map(CapabilityValue::Bool)
}

fn port_output(port: &DigitalPort<'_>) -> Result<CapabilityValue> {
    port.is_output_supported().map(CapabilityValue::Bool)
}

fn port_input_scan(port: &DigitalPort<'_>) -> Result<CapabilityValue> {
    port.is_input_scan_supported().map(CapabilityValue::Bool)
}

fn port_output_scan(port: &DigitalPort<'_>) -> Result<CapabilityValue> {
    port.is_output_scan_supported().map(CapabilityValue::Bool)
}

// =============================================================================
// Analog input
// =============================================================================

/// Capabilities of the analog input subsystem.
pub static ANALOG_INPUT_CAPABILITIES: &[Capability<InputGetter, InputSetter>] = &[
    Capability::read_only(
        "supported_ranges",
        "Range codes accepted by single-sample reads",
        input_ranges,
    ),
    Capability::read_only("voltage", "Voltage-scaled reads", input_voltage),
    Capability::read_only("scan", "Background analog input scans", input_scan),
    Capability::read_only("trigger", "Analog trigger conditions", input_trigger),
    Capability::read_only("gain_queue", "Channel/gain queue", input_gain_queue),
    Capability::read_only(
        "packet_size",
        "Transfer packet size in samples",
        input_packet_size,
    ),
    Capability::read_only(
        "trigger_resolution",
        "Trigger threshold resolution in bits",
        input_trigger_resolution,
    ),
    Capability::read_write(
        "trigger_source",
        "Channel used as analog trigger source",
        1,
        input_trigger_source,
        set_input_trigger_source,
    ),
    Capability::read_only(
        "trigger_range",
        "Span the trigger threshold is expressed in",
        input_trigger_range,
    ),
];

fn input_ranges(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    Ok(CapabilityValue::Ranges(input.supported_ranges()?.to_vec()))
}

fn input_voltage(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    input.is_voltage_supported().map(CapabilityValue::Bool)
}

fn input_scan(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    input.is_scan_supported().map(CapabilityValue::Bool)
}

fn input_trigger(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    input.is_trigger_supported().map(CapabilityValue::Bool)
}

fn input_gain_queue(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    input.is_gain_queue_supported().map(CapabilityValue::Bool)
}

fn input_packet_size(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    Ok(CapabilityValue::Integer(i64::from(input.packet_size())))
}

fn input_trigger_resolution(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    Ok(CapabilityValue::Integer(i64::from(input.trigger_resolution())))
}

fn input_trigger_source(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    let source = input.trigger_source()?;
    Ok(CapabilityValue::OptionalInteger(source.map(i64::from)))
}

fn set_input_trigger_source(input: &AnalogInput<'_>, args: &[i64]) -> Result<()> {
    let &[channel] = args else {
        return Err(CapsError::Config(format!(
            "trigger_source takes one argument, got {}",
            args.len()
        )));
    };
    let channel = i32::try_from(channel)
        .map_err(|_| CapsError::Config(format!("trigger source {} out of range", channel)))?;
    input.set_trigger_source(channel)
}

fn input_trigger_range(input: &AnalogInput<'_>) -> Result<CapabilityValue> {
    input.trigger_range().map(CapabilityValue::OptionalRange)
}

// =============================================================================
// Analog output
// =============================================================================

/// Capabilities of the analog output subsystem.
pub static ANALOG_OUTPUT_CAPABILITIES: &[Capability<OutputGetter, OutputSetter>] = &[
    Capability::read_only(
        "supported_ranges",
        "Range codes accepted by single-sample writes",
        output_ranges,
    ),
    Capability::read_only("voltage", "Voltage-scaled writes", output_voltage),
    Capability::read_only("scan", "Background analog output scans", output_scan),
];

fn output_ranges(output: &AnalogOutput<'_>) -> Result<CapabilityValue> {
    Ok(CapabilityValue::Ranges(output.supported_ranges()?.to_vec()))
}

fn output_voltage(output: &AnalogOutput<'_>) -> Result<CapabilityValue> {
    output.is_voltage_supported().map(CapabilityValue::Bool)
}

fn output_scan(output: &AnalogOutput<'_>) -> Result<CapabilityValue> {
    output.is_scan_supported().map(CapabilityValue::Bool)
}
