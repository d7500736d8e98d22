//! Analog output capabilities.
//!
//! Every trial write outputs value 0 on channel 0.

use tracing::debug;

use crate::device::DaqDevice;
use crate::error::Result;
use crate::fact::CapabilityFact;
use crate::range::{RangeCatalog, RangeCode};
use crate::subsystem::analog_input::checked_u32;
use crate::subsystem::probe_ranges;
use crate::transport::{ConfigItem, ConfigKey, FunctionClass, TrialOperation};

const PROBE_CHANNEL: u32 = 0;

/// Capabilities of a board's analog output subsystem.
pub struct AnalogOutput<'d> {
    device: &'d DaqDevice,
    n_channels: u32,
    resolution: u32,
    catalog: RangeCatalog,
    ranges: CapabilityFact<Vec<RangeCode>>,
    voltage: CapabilityFact<bool>,
    scan: CapabilityFact<bool>,
}

impl<'d> AnalogOutput<'d> {
    /// Read channel count and resolution from the board.
    pub fn open(device: &'d DaqDevice) -> Result<Self> {
        let n_channels = device
            .optional_config(ConfigKey::board(ConfigItem::NumDaChans))?
            .unwrap_or(0);
        let resolution = if n_channels > 0 {
            device.config_value(ConfigKey::board(ConfigItem::DacResolution))?
        } else {
            0
        };

        debug!(
            handle = %device.handle(),
            n_channels,
            resolution,
            "Created analog output accessor"
        );

        Ok(Self::from_parts(
            device,
            checked_u32(device, n_channels)?,
            checked_u32(device, resolution)?,
        ))
    }

    /// Build an accessor from attributes that are already known.
    pub fn from_parts(device: &'d DaqDevice, n_channels: u32, resolution: u32) -> Self {
        Self {
            device,
            n_channels,
            resolution,
            catalog: RangeCatalog::default(),
            ranges: CapabilityFact::new(),
            voltage: CapabilityFact::new(),
            scan: CapabilityFact::new(),
        }
    }

    /// Probe only the codes in `catalog`, in its order.
    pub fn with_catalog(mut self, catalog: RangeCatalog) -> Self {
        self.catalog = catalog;
        self.ranges = CapabilityFact::new();
        self
    }

    /// Number of analog output channels.
    pub fn n_channels(&self) -> u32 {
        self.n_channels
    }

    /// DAC resolution in bits, 0 without outputs.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Ranges the outputs accept.
    ///
    /// Boards that ignore range codes report their externally configured
    /// range instead; that case is detected by writing with an invalid code.
    pub fn supported_ranges(&self) -> Result<&[RangeCode]> {
        self.ranges
            .get_or_probe(|| self.probe_supported_ranges())
            .map(Vec::as_slice)
    }

    /// Whether voltage-scaled writes work on the first supported range.
    pub fn is_voltage_supported(&self) -> Result<bool> {
        self.voltage
            .get_or_probe(|| {
                let Some(&range) = self.supported_ranges()?.first() else {
                    return Ok(false);
                };
                self.device.probe(&TrialOperation::WriteVoltage {
                    channel: PROBE_CHANNEL,
                    range,
                    millivolts: 0,
                })
            })
            .copied()
    }

    /// Whether background output scans are available.
    pub fn is_scan_supported(&self) -> Result<bool> {
        self.scan
            .get_or_probe(|| {
                self.device.probe(&TrialOperation::QueryStatus {
                    function: FunctionClass::AnalogOut,
                })
            })
            .copied()
    }

    fn probe_supported_ranges(&self) -> Result<Vec<RangeCode>> {
        if self.n_channels == 0 {
            return Ok(Vec::new());
        }

        let write_zero = |range| TrialOperation::WriteSample {
            channel: PROBE_CHANNEL,
            range,
            value: 0,
        };

        if self.device.probe(&write_zero(RangeCode::INVALID))? {
            let configured = self
                .device
                .optional_config(ConfigKey::board(ConfigItem::DacRange))?;
            debug!(
                handle = %self.device.handle(),
                configured = ?configured,
                "output ignores range codes"
            );
            return Ok(configured
                .filter(|code| *code >= 0)
                .and_then(|code| i32::try_from(code).ok())
                .map(RangeCode)
                .into_iter()
                .collect());
        }

        probe_ranges(self.device, &self.catalog, write_zero)
    }
}

impl std::fmt::Debug for AnalogOutput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalogOutput")
            .field("handle", &self.device.handle())
            .field("n_channels", &self.n_channels)
            .field("resolution", &format!("{}-bit", self.resolution))
            .finish()
    }
}
