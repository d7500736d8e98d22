//! Simulated board (profile-driven `DaqTransport`).
//!
//! A [`BoardProfile`] describes what a board has: analog channels and the
//! range codes they accept, digital ports and their masks, which optional
//! functions exist. [`SimulatedBoard`] answers configuration reads from the
//! profile and accepts or rejects trial operations with the vendor codes a
//! real driver returns for absent features.
//!
//! Tests use the call log to assert how many driver calls a query cost, and
//! fault injection to force busy or hard failures on chosen operations.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::device::DeviceDescriptor;
use crate::range::RangeCode;
use crate::subsystem::digital_io::{first_bit, PortTag};
use crate::transport::{
    BoardHandle, ConfigItem, ConfigKey, DaqTransport, FunctionClass, InfoType, SampleWidth,
    TrialOperation, VendorCode,
};

// =============================================================================
// Profiles
// =============================================================================

/// Analog input section of a board profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalogInputProfile {
    /// Channel count, 0 without analog inputs
    pub channels: u32,
    /// Resolution in bits
    pub resolution: u32,
    /// Range codes a single-sample read accepts
    pub ranges: Vec<i32>,
    /// Voltage reads accepted
    pub voltage: bool,
    /// Background scans accepted
    pub scan: bool,
    /// Analog trigger accepted
    pub trigger: bool,
    /// Channel/gain queue accepted
    pub gain_queue: bool,
    /// Initial value of the trigger source item
    pub trigger_source: i32,
}

impl Default for AnalogInputProfile {
    fn default() -> Self {
        Self {
            channels: 0,
            resolution: 12,
            ranges: Vec::new(),
            voltage: false,
            scan: false,
            trigger: false,
            gain_queue: false,
            trigger_source: 0,
        }
    }
}

/// Analog output section of a board profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalogOutputProfile {
    /// Channel count, 0 without analog outputs
    pub channels: u32,
    /// DAC resolution in bits
    pub resolution: u32,
    /// Range codes a single-sample write accepts
    pub ranges: Vec<i32>,
    /// Board ignores range codes on writes (range set by jumper)
    pub ignores_range: bool,
    /// Value of the DAC range item, negative when not reported
    pub dac_range: i32,
    /// Voltage writes accepted
    pub voltage: bool,
    /// Background scans accepted
    pub scan: bool,
}

impl Default for AnalogOutputProfile {
    fn default() -> Self {
        Self {
            channels: 0,
            resolution: 12,
            ranges: Vec::new(),
            ignores_range: false,
            dac_range: -1,
            voltage: false,
            scan: false,
        }
    }
}

/// One digital port of a board profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortProfile {
    /// Port identifier
    pub tag: PortTag,
    /// Width in bits
    #[serde(default = "default_num_bits")]
    pub num_bits: u32,
    /// Bits hard-wired as inputs
    #[serde(default)]
    pub in_mask: u32,
    /// Bits hard-wired as outputs
    #[serde(default)]
    pub out_mask: u32,
    /// Whole-port direction changes are accepted
    #[serde(default)]
    pub configurable: bool,
    /// Single-bit direction changes are accepted
    #[serde(default)]
    pub bit_configurable: bool,
}

fn default_num_bits() -> u32 {
    8
}

impl PortProfile {
    /// Port that can be switched between input and output as a whole.
    pub fn configurable(tag: PortTag, num_bits: u32) -> Self {
        Self {
            tag,
            num_bits,
            in_mask: 0,
            out_mask: 0,
            configurable: true,
            bit_configurable: false,
        }
    }
}

/// Description of a simulated board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardProfile {
    /// Name used to select the board from the command line
    pub name: String,
    /// Serial number reported in the descriptor
    pub unique_id: String,
    /// Hardware model identifier returned for `BoardType`
    pub model: u32,
    /// Switch/jumper fixed input range, negative when software selectable
    pub hard_range: i32,
    /// Analog input section
    pub analog_input: AnalogInputProfile,
    /// Analog output section
    pub analog_output: AnalogOutputProfile,
    /// Digital ports in board order
    pub ports: Vec<PortProfile>,
    /// Digital input scans accepted
    pub digital_input_scan: bool,
    /// Digital output scans accepted
    pub digital_output_scan: bool,
}

impl Default for BoardProfile {
    fn default() -> Self {
        Self {
            name: "sim".to_string(),
            unique_id: "0".to_string(),
            model: 0,
            hard_range: -1,
            analog_input: AnalogInputProfile::default(),
            analog_output: AnalogOutputProfile::default(),
            ports: Vec::new(),
            digital_input_scan: false,
            digital_output_scan: false,
        }
    }
}

impl BoardProfile {
    /// Discovery descriptor for this board.
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.name.clone(), self.unique_id.clone())
    }

    /// Boards probed when no configuration lists any.
    pub fn demo_boards() -> Vec<Self> {
        vec![
            Self {
                name: "USB-1208FS".to_string(),
                unique_id: "01A2B3C4".to_string(),
                model: 0x82,
                analog_input: AnalogInputProfile {
                    channels: 8,
                    resolution: 12,
                    ranges: vec![1, 0, 15, 3, 2, 4, 5, 6],
                    voltage: true,
                    scan: true,
                    trigger: false,
                    gain_queue: true,
                    trigger_source: 0,
                },
                analog_output: AnalogOutputProfile {
                    channels: 2,
                    resolution: 12,
                    ranges: vec![101],
                    voltage: true,
                    scan: true,
                    ..AnalogOutputProfile::default()
                },
                ports: vec![
                    PortProfile::configurable(PortTag::FirstA, 8),
                    PortProfile::configurable(PortTag::FirstB, 8),
                ],
                digital_input_scan: false,
                digital_output_scan: false,
                ..Self::default()
            },
            Self {
                name: "PCI-DAS6030".to_string(),
                unique_id: "pci-3".to_string(),
                model: 0x5E,
                analog_input: AnalogInputProfile {
                    channels: 16,
                    resolution: 12,
                    ranges: vec![1, 0, 14, 4, 100, 101, 103, 104],
                    voltage: true,
                    scan: true,
                    trigger: true,
                    gain_queue: true,
                    trigger_source: 0,
                },
                analog_output: AnalogOutputProfile {
                    channels: 2,
                    resolution: 12,
                    ranges: vec![1],
                    voltage: true,
                    scan: true,
                    ..AnalogOutputProfile::default()
                },
                ports: vec![
                    PortProfile::configurable(PortTag::FirstA, 8),
                    PortProfile::configurable(PortTag::FirstB, 8),
                    PortProfile::configurable(PortTag::FirstCL, 4),
                    PortProfile::configurable(PortTag::FirstCH, 4),
                    PortProfile {
                        tag: PortTag::Aux,
                        num_bits: 8,
                        in_mask: 0,
                        out_mask: 0,
                        configurable: true,
                        bit_configurable: true,
                    },
                ],
                digital_input_scan: true,
                digital_output_scan: true,
                ..Self::default()
            },
            Self {
                name: "USB-TC".to_string(),
                unique_id: "01C0FFEE".to_string(),
                model: 0x90,
                hard_range: 14,
                analog_input: AnalogInputProfile {
                    channels: 8,
                    resolution: 24,
                    ranges: vec![14],
                    voltage: true,
                    ..AnalogInputProfile::default()
                },
                ports: vec![PortProfile {
                    tag: PortTag::FirstA,
                    num_bits: 8,
                    in_mask: 0x0F,
                    out_mask: 0xFF,
                    configurable: false,
                    bit_configurable: false,
                }],
                ..Self::default()
            },
        ]
    }
}

// =============================================================================
// SimulatedBoard
// =============================================================================

/// One driver call recorded by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCall {
    /// Configuration read
    ConfigRead(ConfigKey),
    /// Configuration write with its value
    ConfigWrite(ConfigKey, i64),
    /// Trial operation
    Trial(TrialOperation),
}

#[derive(Debug, Default)]
struct SimState {
    busy: bool,
    trigger_source: i32,
    trial_faults: HashMap<TrialOperation, VendorCode>,
    config_faults: HashMap<ConfigKey, VendorCode>,
    calls: Vec<SimCall>,
}

/// In-memory board answering from a [`BoardProfile`].
#[derive(Debug)]
pub struct SimulatedBoard {
    profile: BoardProfile,
    state: Mutex<SimState>,
}

impl SimulatedBoard {
    /// Board answering from `profile`.
    pub fn new(profile: BoardProfile) -> Self {
        let state = SimState {
            trigger_source: profile.analog_input.trigger_source,
            ..SimState::default()
        };
        Self {
            profile,
            state: Mutex::new(state),
        }
    }

    /// Profile the board answers from.
    pub fn profile(&self) -> &BoardProfile {
        &self.profile
    }

    /// While busy, every call fails with "in use by another process".
    pub fn set_busy(&self, busy: bool) {
        self.state.lock().busy = busy;
    }

    /// Fail every occurrence of `op` with `code`.
    pub fn fail_on(&self, op: TrialOperation, code: VendorCode) {
        self.state.lock().trial_faults.insert(op, code);
    }

    /// Fail every read of `key` with `code`.
    pub fn fail_config(&self, key: ConfigKey, code: VendorCode) {
        self.state.lock().config_faults.insert(key, code);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.trial_faults.clear();
        state.config_faults.clear();
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().calls.clone()
    }

    /// Trial operations received so far, in order.
    pub fn trials(&self) -> Vec<TrialOperation> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SimCall::Trial(op) => Some(op.clone()),
                _ => None,
            })
            .collect()
    }

    /// Trial operations issued so far.
    pub fn trial_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, SimCall::Trial(_)))
            .count()
    }

    /// Configuration reads issued so far.
    pub fn config_read_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, SimCall::ConfigRead(_)))
            .count()
    }

    /// Total calls of any kind.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Forget recorded calls.
    pub fn clear_log(&self) {
        self.state.lock().calls.clear();
    }

    fn port(&self, index: u32) -> Result<&PortProfile, VendorCode> {
        self.profile
            .ports
            .get(index as usize)
            .ok_or(VendorCode::BAD_PORT_NUM)
    }

    fn port_by_tag(&self, tag: PortTag) -> Result<(u32, &PortProfile), VendorCode> {
        self.profile
            .ports
            .iter()
            .enumerate()
            .find(|(_, port)| port.tag == tag)
            .map(|(index, port)| (index as u32, port))
            .ok_or(VendorCode::BAD_PORT_NUM)
    }

    fn board_item(&self, item: ConfigItem, trigger_source: i32) -> Result<i64, VendorCode> {
        let ai = &self.profile.analog_input;
        let ao = &self.profile.analog_output;
        let value = match item {
            ConfigItem::BoardType => i64::from(self.profile.model),
            ConfigItem::NumAdChans => i64::from(ai.channels),
            ConfigItem::AdResolution => i64::from(ai.resolution),
            ConfigItem::HardRange => i64::from(self.profile.hard_range),
            ConfigItem::AdTriggerSource => i64::from(trigger_source),
            ConfigItem::NumDaChans => i64::from(ao.channels),
            ConfigItem::DacResolution => i64::from(ao.resolution),
            ConfigItem::DacRange => i64::from(ao.dac_range),
            ConfigItem::NumDigitalDevs => self.profile.ports.len() as i64,
            _ => return Err(VendorCode::CFG_NOT_SUPPORTED),
        };
        Ok(value)
    }

    fn digital_item(&self, index: u32, item: ConfigItem) -> Result<i64, VendorCode> {
        let port = self.port(index)?;
        let value = match item {
            ConfigItem::DigitalDevType => i64::from(port.tag.to_raw()),
            ConfigItem::DigitalNumBits => i64::from(port.num_bits),
            ConfigItem::DigitalInMask => i64::from(port.in_mask),
            ConfigItem::DigitalOutMask => i64::from(port.out_mask),
            _ => return Err(VendorCode::CFG_NOT_SUPPORTED),
        };
        Ok(value)
    }

    fn run(&self, op: &TrialOperation) -> Result<(), VendorCode> {
        let ai = &self.profile.analog_input;
        let ao = &self.profile.analog_output;
        match op {
            TrialOperation::ConfigurePort { port, .. } => {
                let (_, port) = self.port_by_tag(*port)?;
                accept(port.configurable, VendorCode::NOT_DIGITAL_CONF)
            }
            TrialOperation::ConfigureBit { port, bit, .. } => {
                let (index, profile) = self.port_by_tag(*port)?;
                let first = first_bit(index, profile.tag);
                if *bit < first || *bit >= first + profile.num_bits {
                    return Err(VendorCode::BAD_BIT_NUMBER);
                }
                accept(profile.bit_configurable, VendorCode::NOT_DIGITAL_CONF)
            }
            TrialOperation::ReadSample {
                channel,
                range,
                width,
            } => {
                check_channel(*channel, ai.channels)?;
                if *width == SampleWidth::Standard && ai.resolution > 16 {
                    return Err(VendorCode::FUNCTION_NOT_SUPPORTED);
                }
                accept_range(&ai.ranges, *range)
            }
            TrialOperation::ReadVoltage { channel, range } => {
                check_channel(*channel, ai.channels)?;
                accept(ai.voltage, VendorCode::BAD_BOARD_TYPE)?;
                accept_range(&ai.ranges, *range)
            }
            TrialOperation::WriteSample { channel, range, .. } => {
                check_channel(*channel, ao.channels)?;
                if ao.ignores_range {
                    return Ok(());
                }
                accept_range(&ao.ranges, *range)
            }
            TrialOperation::WriteVoltage { channel, range, .. } => {
                check_channel(*channel, ao.channels)?;
                accept(ao.voltage, VendorCode::BAD_BOARD_TYPE)?;
                if ao.ignores_range {
                    return Ok(());
                }
                accept_range(&ao.ranges, *range)
            }
            TrialOperation::SetTrigger { .. } => accept(ai.trigger, VendorCode::NO_AD_TRIGGER),
            TrialOperation::LoadQueue { .. } => accept(ai.gain_queue, VendorCode::BAD_QUEUE_SIZE),
            TrialOperation::QueryStatus { function } => {
                let supported = match function {
                    FunctionClass::AnalogIn => ai.scan,
                    FunctionClass::AnalogOut => ao.scan,
                    FunctionClass::DigitalIn => self.profile.digital_input_scan,
                    FunctionClass::DigitalOut => self.profile.digital_output_scan,
                };
                accept(supported, VendorCode::BAD_BOARD_TYPE)
            }
        }
    }
}

impl DaqTransport for SimulatedBoard {
    fn config_read(&self, _board: BoardHandle, key: ConfigKey) -> Result<i64, VendorCode> {
        let mut state = self.state.lock();
        state.calls.push(SimCall::ConfigRead(key));
        if state.busy {
            return Err(VendorCode::NET_DEV_IN_USE_BY_ANOTHER_PROC);
        }
        if let Some(code) = state.config_faults.get(&key) {
            return Err(*code);
        }
        match key.info {
            InfoType::Board => self.board_item(key.item, state.trigger_source),
            InfoType::Digital => self.digital_item(key.dev_num, key.item),
        }
    }

    fn config_write(&self, _board: BoardHandle, key: ConfigKey, value: i64) -> Result<(), VendorCode> {
        let mut state = self.state.lock();
        state.calls.push(SimCall::ConfigWrite(key, value));
        if state.busy {
            return Err(VendorCode::NET_DEV_IN_USE_BY_ANOTHER_PROC);
        }
        match (key.info, key.item) {
            (InfoType::Board, ConfigItem::AdTriggerSource) => {
                state.trigger_source =
                    i32::try_from(value).map_err(|_| VendorCode::BAD_AD_CHAN)?;
                Ok(())
            }
            _ => Err(VendorCode::CFG_NOT_SUPPORTED),
        }
    }

    fn try_operation(&self, _board: BoardHandle, op: &TrialOperation) -> Result<(), VendorCode> {
        let mut state = self.state.lock();
        state.calls.push(SimCall::Trial(op.clone()));
        if state.busy {
            return Err(VendorCode::NET_DEV_IN_USE_BY_ANOTHER_PROC);
        }
        if let Some(code) = state.trial_faults.get(op) {
            return Err(*code);
        }
        drop(state);
        self.run(op)
    }
}

fn accept(supported: bool, otherwise: VendorCode) -> Result<(), VendorCode> {
    if supported {
        Ok(())
    } else {
        Err(otherwise)
    }
}

fn accept_range(ranges: &[i32], range: RangeCode) -> Result<(), VendorCode> {
    accept(ranges.contains(&range.0), VendorCode::BAD_RANGE)
}

fn check_channel(channel: u32, channels: u32) -> Result<(), VendorCode> {
    if channel < channels {
        Ok(())
    } else {
        Err(VendorCode::BAD_AD_CHAN)
    }
}
