//! Capability report for one device.
//!
//! [`CapabilityReport::collect`] opens every subsystem of a device and walks
//! the descriptor tables. A getter that fails is recorded as an error entry
//! with the error text; it is never shown as "unsupported".

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{info, warn};

use crate::descriptor::{
    Capability, CapabilityValue, ANALOG_INPUT_CAPABILITIES, ANALOG_OUTPUT_CAPABILITIES,
    PORT_CAPABILITIES,
};
use crate::device::DaqDevice;
use crate::error::Result;
use crate::subsystem::digital_io::PortTag;
use crate::transport::BoardHandle;

/// Result of evaluating one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryResult {
    /// Capability determined
    Value(CapabilityValue),
    /// Query failed; holds the error text
    Error(String),
}

/// One row of a report section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityEntry {
    /// Descriptor name
    pub name: &'static str,
    /// Descriptor has a setter
    pub writable: bool,
    /// Value or error text
    #[serde(flatten)]
    pub result: EntryResult,
}

impl CapabilityEntry {
    /// Value, if the query succeeded.
    pub fn value(&self) -> Option<&CapabilityValue> {
        match &self.result {
            EntryResult::Value(value) => Some(value),
            EntryResult::Error(_) => None,
        }
    }

    /// Whether the query failed.
    pub fn is_error(&self) -> bool {
        matches!(self.result, EntryResult::Error(_))
    }
}

/// Analog input or output section.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    /// Channel count
    pub channels: u32,
    /// Resolution in bits
    pub resolution: u32,
    /// One entry per descriptor
    pub capabilities: Vec<CapabilityEntry>,
}

/// One digital port section.
#[derive(Debug, Clone, Serialize)]
pub struct PortReport {
    /// Port index on the board
    pub index: u32,
    /// Port identifier
    pub tag: PortTag,
    /// Width in bits
    pub num_bits: u32,
    /// Bits usable as inputs
    pub in_mask: u32,
    /// Bits usable as outputs
    pub out_mask: u32,
    /// One entry per descriptor
    pub capabilities: Vec<CapabilityEntry>,
}

/// Everything discovered about one device.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    /// Handle the device was opened with
    pub handle: BoardHandle,
    /// Hardware model id, hex
    pub model: String,
    /// Model name from the quirk table, if listed
    pub model_name: Option<String>,
    /// Product name from discovery
    pub product_name: String,
    /// Serial number or MAC address
    pub unique_id: String,
    /// Analog input section
    pub analog_input: ChannelReport,
    /// Analog output section
    pub analog_output: ChannelReport,
    /// One section per digital port
    pub ports: Vec<PortReport>,
}

impl CapabilityReport {
    /// Query every capability of `device`.
    ///
    /// Fails only when a subsystem's attributes cannot be read; individual
    /// capability failures become error entries.
    pub fn collect(device: &DaqDevice) -> Result<Self> {
        let input = device.analog_input()?;
        let analog_input = ChannelReport {
            channels: input.n_channels(),
            resolution: input.resolution(),
            capabilities: evaluate(device, ANALOG_INPUT_CAPABILITIES, |c| (c.get)(&input)),
        };

        let output = device.analog_output()?;
        let analog_output = ChannelReport {
            channels: output.n_channels(),
            resolution: output.resolution(),
            capabilities: evaluate(device, ANALOG_OUTPUT_CAPABILITIES, |c| (c.get)(&output)),
        };

        let ports = device
            .digital_ports()?
            .iter()
            .map(|port| PortReport {
                index: port.index(),
                tag: port.tag(),
                num_bits: port.num_bits(),
                in_mask: port.in_mask(),
                out_mask: port.out_mask(),
                capabilities: evaluate(device, PORT_CAPABILITIES, |c| (c.get)(port)),
            })
            .collect();

        let report = Self {
            handle: device.handle(),
            model: device.model().to_string(),
            model_name: device.quirks().get(device.model()).map(|q| q.name.clone()),
            product_name: device.descriptor().product_name.clone(),
            unique_id: device.descriptor().unique_id.clone(),
            analog_input,
            analog_output,
            ports,
        };
        info!(
            handle = %report.handle,
            errors = report.error_count(),
            "Collected capability report"
        );
        Ok(report)
    }

    /// Number of capabilities that could not be determined.
    pub fn error_count(&self) -> usize {
        self.entries().filter(|entry| entry.is_error()).count()
    }

    fn entries(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.analog_input
            .capabilities
            .iter()
            .chain(&self.analog_output.capabilities)
            .chain(self.ports.iter().flat_map(|port| &port.capabilities))
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain text table, one section per subsystem.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let model = match &self.model_name {
            Some(name) => format!("{} ({})", self.model, name),
            None => self.model.clone(),
        };
        let _ = writeln!(
            out,
            "{} {} [{}] model {}",
            self.handle, self.product_name, self.unique_id, model
        );

        let _ = writeln!(
            out,
            "\nAnalog input: {} channels, {}-bit",
            self.analog_input.channels, self.analog_input.resolution
        );
        write_rows(&mut out, &self.analog_input.capabilities);

        let _ = writeln!(
            out,
            "\nAnalog output: {} channels, {}-bit",
            self.analog_output.channels, self.analog_output.resolution
        );
        write_rows(&mut out, &self.analog_output.capabilities);

        for port in &self.ports {
            let _ = writeln!(
                out,
                "\nDigital port {} {}: {} bits, in {:#x}, out {:#x}",
                port.index, port.tag, port.num_bits, port.in_mask, port.out_mask
            );
            write_rows(&mut out, &port.capabilities);
        }
        out
    }
}

fn evaluate<G, S, F>(
    device: &DaqDevice,
    table: &[Capability<G, S>],
    mut get: F,
) -> Vec<CapabilityEntry>
where
    F: FnMut(&Capability<G, S>) -> Result<CapabilityValue>,
{
    table
        .iter()
        .map(|capability| {
            let result = match get(capability) {
                Ok(value) => EntryResult::Value(value),
                Err(err) => {
                    warn!(
                        handle = %device.handle(),
                        capability = capability.name,
                        error = %err,
                        "capability not determined"
                    );
                    EntryResult::Error(err.to_string())
                }
            };
            CapabilityEntry {
                name: capability.name,
                writable: capability.is_writable(),
                result,
            }
        })
        .collect()
}

fn write_rows(out: &mut String, entries: &[CapabilityEntry]) {
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for entry in entries {
        let text = match &entry.result {
            EntryResult::Value(value) => value.to_string(),
            EntryResult::Error(err) => format!("ERROR: {}", err),
        };
        let _ = writeln!(out, "  {:<width$}  {}", entry.name, text, width = width);
    }
}
