//! Analog Channel Capability Test Suite
//!
//! Range probing order and content, fixed ranges, abort on busy, quirk
//! lookups, the trigger range rule and analog output range detection.

mod common;

use common::open_board;
use daq_caps::range::RangeCatalog;
use daq_caps::sim::{AnalogInputProfile, AnalogOutputProfile, BoardProfile};
use daq_caps::transport::{ConfigItem, ConfigKey, FunctionClass, SampleWidth, TriggerKind};
use daq_caps::{CapsError, RangeCode, TrialOperation, VendorCode};

fn input_board(model: u32, ai: AnalogInputProfile) -> BoardProfile {
    BoardProfile {
        model,
        analog_input: ai,
        ..BoardProfile::default()
    }
}

fn read_sample(range: i32) -> TrialOperation {
    TrialOperation::ReadSample {
        channel: 0,
        range: RangeCode(range),
        width: SampleWidth::Standard,
    }
}

fn small_catalog() -> RangeCatalog {
    RangeCatalog::new((0..=5).map(RangeCode))
}

// =============================================================================
// Input Range Probing
// =============================================================================

#[test]
fn test_ranges_keep_catalog_order() {
    let (device, sim) = open_board(input_board(
        0x7A,
        AnalogInputProfile {
            channels: 4,
            ranges: vec![5, 2],
            ..AnalogInputProfile::default()
        },
    ));
    let input = device.analog_input().unwrap().with_catalog(small_catalog());
    sim.clear_log();

    assert_eq!(input.supported_ranges().unwrap(), &[RangeCode(2), RangeCode(5)]);
    assert_eq!(sim.trials(), (0..=5).map(read_sample).collect::<Vec<_>>());

    let calls = sim.call_count();
    assert_eq!(input.supported_ranges().unwrap(), &[RangeCode(2), RangeCode(5)]);
    assert_eq!(sim.call_count(), calls);
}

#[test]
fn test_fixed_hard_range() {
    let (device, sim) = open_board(BoardProfile {
        hard_range: 3,
        ..input_board(
            0x7A,
            AnalogInputProfile {
                channels: 4,
                ranges: vec![0, 1, 2, 3],
                ..AnalogInputProfile::default()
            },
        )
    });
    let input = device.analog_input().unwrap().with_catalog(small_catalog());
    sim.clear_log();

    assert_eq!(input.supported_ranges().unwrap(), &[RangeCode(3)]);
    assert_eq!(sim.trial_count(), 0);
}

#[test]
fn test_busy_aborts_range_walk() {
    let (device, sim) = open_board(input_board(
        0x7A,
        AnalogInputProfile {
            channels: 4,
            ranges: vec![0, 1, 2, 3, 4, 5],
            ..AnalogInputProfile::default()
        },
    ));
    let input = device.analog_input().unwrap().with_catalog(small_catalog());
    sim.fail_on(read_sample(2), VendorCode::NET_DEV_IN_USE);
    sim.clear_log();

    let err = input.supported_ranges().unwrap_err();
    assert!(err.is_busy());
    assert_eq!(sim.trials(), vec![read_sample(0), read_sample(1), read_sample(2)]);

    sim.clear_faults();
    assert_eq!(input.supported_ranges().unwrap().len(), 6);
}

#[test]
fn test_hard_failure_aborts_range_walk() {
    let (device, sim) = open_board(input_board(
        0x7A,
        AnalogInputProfile {
            channels: 1,
            ranges: vec![0, 1],
            ..AnalogInputProfile::default()
        },
    ));
    let input = device.analog_input().unwrap().with_catalog(small_catalog());
    sim.fail_on(read_sample(0), VendorCode::DEVICE_DISCONNECTED);
    sim.clear_log();

    assert!(matches!(
        input.supported_ranges(),
        Err(CapsError::HardFailure { code: VendorCode::DEVICE_DISCONNECTED, .. })
    ));
    assert_eq!(sim.trial_count(), 1);
}

#[test]
fn test_zero_channels() {
    let (device, sim) = open_board(input_board(0x7A, AnalogInputProfile::default()));
    let input = device.analog_input().unwrap();
    sim.clear_log();

    assert_eq!(input.n_channels(), 0);
    assert!(input.supported_ranges().unwrap().is_empty());
    assert!(!input.is_voltage_supported().unwrap());
    assert_eq!(sim.trial_count(), 0);
}

#[test]
fn test_wide_reads_above_16_bits() {
    let (device, sim) = open_board(input_board(
        0x7A,
        AnalogInputProfile {
            channels: 2,
            resolution: 18,
            ranges: vec![1],
            ..AnalogInputProfile::default()
        },
    ));
    let input = device
        .analog_input()
        .unwrap()
        .with_catalog(RangeCatalog::new([RangeCode::BIP10VOLTS]));
    sim.clear_log();

    assert_eq!(input.supported_ranges().unwrap(), &[RangeCode::BIP10VOLTS]);
    assert_eq!(
        sim.trials(),
        vec![TrialOperation::ReadSample {
            channel: 0,
            range: RangeCode::BIP10VOLTS,
            width: SampleWidth::Wide,
        }]
    );
}

#[test]
fn test_canonical_order_by_default() {
    let (device, _sim) = open_board(input_board(
        0x7A,
        AnalogInputProfile {
            channels: 8,
            // Listed out of canonical order on purpose
            ranges: vec![100, 0, 1],
            voltage: true,
            ..AnalogInputProfile::default()
        },
    ));
    let input = device.analog_input().unwrap();

    assert_eq!(
        input.supported_ranges().unwrap(),
        &[RangeCode::BIP10VOLTS, RangeCode::BIP5VOLTS, RangeCode::UNI10VOLTS]
    );
}

// =============================================================================
// Input Features
// =============================================================================

#[test]
fn test_voltage_uses_first_supported_range() {
    let (device, sim) = open_board(input_board(
        0x7A,
        AnalogInputProfile {
            channels: 8,
            ranges: vec![0, 1],
            voltage: true,
            ..AnalogInputProfile::default()
        },
    ));
    let input = device.analog_input().unwrap();

    assert!(input.is_voltage_supported().unwrap());
    assert_eq!(
        sim.trials().last(),
        Some(&TrialOperation::ReadVoltage {
            channel: 0,
            range: RangeCode::BIP10VOLTS,
        })
    );
}

#[test]
fn test_trigger_queue_and_scan() {
    let (device, sim) = open_board(input_board(
        0x5E,
        AnalogInputProfile {
            channels: 16,
            trigger: true,
            gain_queue: false,
            scan: true,
            ..AnalogInputProfile::default()
        },
    ));
    let input = device.analog_input().unwrap();
    sim.clear_log();

    assert!(input.is_trigger_supported().unwrap());
    assert!(!input.is_gain_queue_supported().unwrap());
    assert!(input.is_scan_supported().unwrap());
    assert_eq!(
        sim.trials(),
        vec![
            TrialOperation::SetTrigger {
                kind: TriggerKind::TriggerAbove,
                low_threshold: 0,
                high_threshold: 0,
            },
            TrialOperation::LoadQueue { entries: vec![] },
            TrialOperation::QueryStatus {
                function: FunctionClass::AnalogIn,
            },
        ]
    );
}

fn feature_board() -> BoardProfile {
    input_board(
        0x5E,
        AnalogInputProfile {
            channels: 16,
            ranges: vec![1],
            voltage: true,
            trigger: true,
            gain_queue: true,
            scan: false,
            ..AnalogInputProfile::default()
        },
    )
}

#[test]
fn test_features_resolve_once() {
    let (device, sim) = open_board(feature_board());
    let input = device.analog_input().unwrap();

    assert!(input.is_voltage_supported().unwrap());
    assert!(input.is_trigger_supported().unwrap());
    assert!(input.is_gain_queue_supported().unwrap());
    assert!(!input.is_scan_supported().unwrap());

    let calls = sim.call_count();
    assert!(input.is_voltage_supported().unwrap());
    assert!(input.is_trigger_supported().unwrap());
    assert!(input.is_gain_queue_supported().unwrap());
    assert!(!input.is_scan_supported().unwrap());
    assert_eq!(sim.call_count(), calls, "cached answers issue no driver calls");
}

#[test]
fn test_busy_features_are_not_cached() {
    let (device, sim) = open_board(feature_board());
    let input = device.analog_input().unwrap();
    sim.set_busy(true);

    assert!(input.is_voltage_supported().unwrap_err().is_busy());
    assert!(input.is_trigger_supported().unwrap_err().is_busy());
    assert!(input.is_gain_queue_supported().unwrap_err().is_busy());
    assert!(input.is_scan_supported().unwrap_err().is_busy());

    sim.set_busy(false);
    assert!(input.is_voltage_supported().unwrap());
    assert!(input.is_trigger_supported().unwrap());
    assert!(input.is_gain_queue_supported().unwrap());
    assert!(!input.is_scan_supported().unwrap());
}

// =============================================================================
// Quirks and Trigger Range
// =============================================================================

#[test]
fn test_quirk_lookups() {
    let (listed, sim) = open_board(input_board(0x7A, AnalogInputProfile::default()));
    let input = listed.analog_input().unwrap();
    sim.clear_log();
    assert_eq!(input.packet_size(), 64);
    assert_eq!(input.trigger_resolution(), 0);
    assert_eq!(sim.call_count(), 0);

    let (unlisted, _sim) = open_board(input_board(0x1234, AnalogInputProfile::default()));
    let input = unlisted.analog_input().unwrap();
    assert_eq!(input.packet_size(), 1);
    assert_eq!(input.trigger_resolution(), 0);
}

#[test]
fn test_trigger_range_rule() {
    let (device, sim) = open_board(input_board(
        0x5E,
        AnalogInputProfile {
            channels: 16,
            trigger_source: 0,
            ..AnalogInputProfile::default()
        },
    ));
    let input = device.analog_input().unwrap();
    assert_eq!(input.trigger_resolution(), 12);
    assert_eq!(input.trigger_range().unwrap(), Some(RangeCode::BIP10VOLTS));

    // Not cached: follows the writable trigger source
    input.set_trigger_source(3).unwrap();
    assert_eq!(input.trigger_range().unwrap(), None);

    input.set_trigger_source(0).unwrap();
    sim.fail_config(
        ConfigKey::board(ConfigItem::AdTriggerSource),
        VendorCode::CFG_NOT_SUPPORTED,
    );
    assert_eq!(input.trigger_range().unwrap(), None);
}

#[test]
fn test_trigger_range_without_trigger_hardware() {
    let (device, sim) = open_board(input_board(0x7A, AnalogInputProfile::default()));
    let input = device.analog_input().unwrap();
    sim.clear_log();

    assert_eq!(input.trigger_range().unwrap(), None);
    assert_eq!(sim.call_count(), 0);
}

// =============================================================================
// Analog Output
// =============================================================================

fn output_board(ao: AnalogOutputProfile) -> BoardProfile {
    BoardProfile {
        model: 0x82,
        analog_output: ao,
        ..BoardProfile::default()
    }
}

fn write_zero(range: RangeCode) -> TrialOperation {
    TrialOperation::WriteSample {
        channel: 0,
        range,
        value: 0,
    }
}

#[test]
fn test_output_ignoring_range_codes() {
    let (device, sim) = open_board(output_board(AnalogOutputProfile {
        channels: 2,
        ignores_range: true,
        dac_range: RangeCode::UNI5VOLTS.0,
        ..AnalogOutputProfile::default()
    }));
    let output = device.analog_output().unwrap();
    sim.clear_log();

    assert_eq!(output.supported_ranges().unwrap(), &[RangeCode::UNI5VOLTS]);
    assert_eq!(sim.trials(), vec![write_zero(RangeCode::INVALID)]);
}

#[test]
fn test_output_ignoring_range_without_dac_range() {
    let (device, _sim) = open_board(output_board(AnalogOutputProfile {
        channels: 2,
        ignores_range: true,
        ..AnalogOutputProfile::default()
    }));
    let output = device.analog_output().unwrap();

    assert!(output.supported_ranges().unwrap().is_empty());
    assert!(!output.is_voltage_supported().unwrap());
}

#[test]
fn test_output_range_probing() {
    let (device, sim) = open_board(output_board(AnalogOutputProfile {
        channels: 2,
        ranges: vec![101, 1],
        voltage: true,
        ..AnalogOutputProfile::default()
    }));
    let output = device
        .analog_output()
        .unwrap()
        .with_catalog(RangeCatalog::new([
            RangeCode::BIP10VOLTS,
            RangeCode::BIP5VOLTS,
            RangeCode::UNI5VOLTS,
        ]));
    sim.clear_log();

    assert_eq!(
        output.supported_ranges().unwrap(),
        &[RangeCode::BIP10VOLTS, RangeCode::UNI5VOLTS]
    );
    assert_eq!(
        sim.trials(),
        vec![
            write_zero(RangeCode::INVALID),
            write_zero(RangeCode::BIP10VOLTS),
            write_zero(RangeCode::BIP5VOLTS),
            write_zero(RangeCode::UNI5VOLTS),
        ]
    );

    assert!(output.is_voltage_supported().unwrap());
    assert_eq!(
        sim.trials().last(),
        Some(&TrialOperation::WriteVoltage {
            channel: 0,
            range: RangeCode::BIP10VOLTS,
            millivolts: 0,
        })
    );
}

#[test]
fn test_output_busy_during_range_check() {
    let (device, sim) = open_board(output_board(AnalogOutputProfile {
        channels: 1,
        ranges: vec![1],
        ..AnalogOutputProfile::default()
    }));
    let output = device.analog_output().unwrap();
    sim.set_busy(true);

    assert!(output.supported_ranges().unwrap_err().is_busy());

    sim.set_busy(false);
    assert_eq!(output.supported_ranges().unwrap(), &[RangeCode::BIP10VOLTS]);
}

#[test]
fn test_output_scan() {
    let (device, sim) = open_board(output_board(AnalogOutputProfile {
        channels: 1,
        scan: true,
        ..AnalogOutputProfile::default()
    }));
    let output = device.analog_output().unwrap();
    sim.clear_log();

    assert!(output.is_scan_supported().unwrap());
    assert_eq!(
        sim.trials(),
        vec![TrialOperation::QueryStatus {
            function: FunctionClass::AnalogOut,
        }]
    );
}
