//! Analog input capabilities.
//!
//! Ranges, voltage scaling, triggering, gain queues and background scans are
//! discovered with trial operations on channel 0. Packet size and trigger
//! resolution come from the quirk table because no query answers them.

use tracing::debug;

use crate::device::DaqDevice;
use crate::error::{CapsError, Result};
use crate::fact::CapabilityFact;
use crate::range::{RangeCatalog, RangeCode};
use crate::subsystem::probe_ranges;
use crate::transport::{
    ConfigItem, ConfigKey, FunctionClass, SampleWidth, TriggerKind, TrialOperation,
};

/// Channel used for trial reads.
const PROBE_CHANNEL: u32 = 0;

/// Capabilities of a board's analog input subsystem.
pub struct AnalogInput<'d> {
    device: &'d DaqDevice,
    n_channels: u32,
    resolution: u32,
    catalog: RangeCatalog,
    ranges: CapabilityFact<Vec<RangeCode>>,
    voltage: CapabilityFact<bool>,
    scan: CapabilityFact<bool>,
    trigger: CapabilityFact<bool>,
    gain_queue: CapabilityFact<bool>,
}

impl<'d> AnalogInput<'d> {
    /// Read channel count and resolution from the board.
    ///
    /// Boards without analog inputs report zero channels or do not know the
    /// items; both yield an accessor with zero channels.
    pub fn open(device: &'d DaqDevice) -> Result<Self> {
        let n_channels = device
            .optional_config(ConfigKey::board(ConfigItem::NumAdChans))?
            .unwrap_or(0);
        let resolution = if n_channels > 0 {
            device.config_value(ConfigKey::board(ConfigItem::AdResolution))?
        } else {
            0
        };

        debug!(
            handle = %device.handle(),
            n_channels,
            resolution,
            "Created analog input accessor"
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
            trigger: CapabilityFact::new(),
            gain_queue: CapabilityFact::new(),
        }
    }

    /// Probe only the codes in `catalog`, in its order.
    pub fn with_catalog(mut self, catalog: RangeCatalog) -> Self {
        self.catalog = catalog;
        self.ranges = CapabilityFact::new();
        self
    }

    /// Number of analog input channels.
    pub fn n_channels(&self) -> u32 {
        self.n_channels
    }

    /// Resolution in bits.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Device this accessor belongs to.
    pub fn device(&self) -> &'d DaqDevice {
        self.device
    }

    /// Ranges the inputs accept, in probing order.
    ///
    /// A switch/jumper fixed range is returned alone without probing.
    pub fn supported_ranges(&self) -> Result<&[RangeCode]> {
        self.ranges
            .get_or_probe(|| self.probe_supported_ranges())
            .map(Vec::as_slice)
    }

    /// Whether voltage-scaled reads work, tried on the first supported range.
    pub fn is_voltage_supported(&self) -> Result<bool> {
        self.voltage
            .get_or_probe(|| {
                let Some(&range) = self.supported_ranges()?.first() else {
                    return Ok(false);
                };
                self.device.probe(&TrialOperation::ReadVoltage {
                    channel: PROBE_CHANNEL,
                    range,
                })
            })
            .copied()
    }

    /// Whether background input scans are available.
    pub fn is_scan_supported(&self) -> Result<bool> {
        self.scan
            .get_or_probe(|| {
                self.device.probe(&TrialOperation::QueryStatus {
                    function: FunctionClass::AnalogIn,
                })
            })
            .copied()
    }

    /// Whether an analog trigger condition can be armed.
    pub fn is_trigger_supported(&self) -> Result<bool> {
        self.trigger
            .get_or_probe(|| {
                self.device.probe(&TrialOperation::SetTrigger {
                    kind: TriggerKind::TriggerAbove,
                    low_threshold: 0,
                    high_threshold: 0,
                })
            })
            .copied()
    }

    /// Whether a channel/gain queue can be loaded.
    pub fn is_gain_queue_supported(&self) -> Result<bool> {
        self.gain_queue
            .get_or_probe(|| {
                self.device
                    .probe(&TrialOperation::LoadQueue { entries: Vec::new() })
            })
            .copied()
    }

    /// Transfer packet size in samples.
    pub fn packet_size(&self) -> u32 {
        self.device.quirks().packet_size(self.device.model())
    }

    /// Trigger threshold resolution in bits, 0 without analog trigger hardware.
    pub fn trigger_resolution(&self) -> u32 {
        self.device.quirks().trigger_resolution(self.device.model())
    }

    /// Span the trigger threshold is expressed in, if it can be determined.
    ///
    /// Boards with trigger hardware that trigger from the default input use a
    /// fixed ±10 V span. This rule is reconstructed from vendor documentation
    /// and should be validated per model. Reads the current trigger source on
    /// every call since it is writable.
    pub fn trigger_range(&self) -> Result<Option<RangeCode>> {
        if self.trigger_resolution() == 0 {
            return Ok(None);
        }
        let source = self
            .device
            .optional_config(ConfigKey::board(ConfigItem::AdTriggerSource))?;
        Ok(match source {
            Some(channel) if channel <= 0 => Some(RangeCode::BIP10VOLTS),
            _ => None,
        })
    }

    /// Channel currently used as analog trigger source.
    ///
    /// `None` when the board does not report one. Never cached.
    pub fn trigger_source(&self) -> Result<Option<i32>> {
        self.device
            .optional_config(ConfigKey::board(ConfigItem::AdTriggerSource))?
            .map(|channel| {
                i32::try_from(channel).map_err(|_| {
                    CapsError::Config(format!(
                        "trigger source {} out of range on {}",
                        channel,
                        self.device.handle()
                    ))
                })
            })
            .transpose()
    }

    /// Select the channel used as analog trigger source.
    pub fn set_trigger_source(&self, channel: i32) -> Result<()> {
        self.device.write_config(
            ConfigKey::board(ConfigItem::AdTriggerSource),
            i64::from(channel),
        )
    }

    fn probe_supported_ranges(&self) -> Result<Vec<RangeCode>> {
        let hard_range = self
            .device
            .optional_config(ConfigKey::board(ConfigItem::HardRange))?;
        if let Some(code) = hard_range.filter(|code| *code >= 0) {
            let code = i32::try_from(code).map_err(|_| {
                CapsError::Config(format!(
                    "hard range {} out of range on {}",
                    code,
                    self.device.handle()
                ))
            })?;
            debug!(handle = %self.device.handle(), range = %RangeCode(code), "fixed input range");
            return Ok(vec![RangeCode(code)]);
        }
        if self.n_channels == 0 {
            return Ok(Vec::new());
        }

        let width = SampleWidth::for_resolution(self.resolution);
        probe_ranges(self.device, &self.catalog, |range| TrialOperation::ReadSample {
            channel: PROBE_CHANNEL,
            range,
            width,
        })
    }
}

impl std::fmt::Debug for AnalogInput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalogInput")
            .field("handle", &self.device.handle())
            .field("n_channels", &self.n_channels)
            .field("resolution", &format!("{}-bit", self.resolution))
            .finish()
    }
}

pub(crate) fn checked_u32(device: &DaqDevice, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        CapsError::Config(format!(
            "analog value {} out of range on {}",
            value,
            device.handle()
        ))
    })
}
