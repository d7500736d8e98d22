//! Concurrent Capability Queries
//!
//! Facts may be queried from several threads. The first resolution of a fact
//! runs exactly once; the others wait and observe its value.

mod common;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::open_board;
use daq_caps::range::RangeCatalog;
use daq_caps::sim::{AnalogInputProfile, BoardProfile, PortProfile, SimulatedBoard};
use daq_caps::{
    BoardHandle, ConfigItem, ConfigKey, DaqTransport, DeviceDescriptor, DeviceRegistry, PortTag,
    RangeCode, TrialOperation, VendorCode,
};
use parking_lot::Mutex;

const THREADS: usize = 8;

#[test]
fn test_range_walk_runs_once_across_threads() {
    let (device, sim) = open_board(BoardProfile {
        model: 0x82,
        analog_input: AnalogInputProfile {
            channels: 8,
            ranges: vec![1, 3],
            ..AnalogInputProfile::default()
        },
        ..BoardProfile::default()
    });
    let input = device
        .analog_input()
        .unwrap()
        .with_catalog(RangeCatalog::new((0..=5).map(RangeCode)));
    sim.clear_log();

    let results: Vec<Vec<RangeCode>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| input.supported_ranges().unwrap().to_vec()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for ranges in &results {
        assert_eq!(ranges, &[RangeCode(1), RangeCode(3)]);
    }
    assert_eq!(sim.trial_count(), 6, "the catalog is walked exactly once");
}

#[test]
fn test_ports_probe_independently() {
    let (device, sim) = open_board(BoardProfile {
        model: 0x5E,
        ports: vec![
            PortProfile::configurable(PortTag::FirstA, 8),
            PortProfile::configurable(PortTag::FirstB, 8),
            PortProfile::configurable(PortTag::FirstCL, 4),
            PortProfile::configurable(PortTag::FirstCH, 4),
        ],
        ..BoardProfile::default()
    });
    let ports = device.digital_ports().unwrap();
    sim.clear_log();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for port in &ports {
                    assert!(port.is_port_configurable().unwrap());
                }
            });
        }
    });

    // Two direction trials per port, regardless of thread count
    assert_eq!(sim.trial_count(), ports.len() * 2);
}

// =============================================================================
// Registry
// =============================================================================

/// Board whose model read blocks until released.
struct SlowBoard {
    inner: SimulatedBoard,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl DaqTransport for SlowBoard {
    fn config_read(&self, board: BoardHandle, key: ConfigKey) -> Result<i64, VendorCode> {
        if key.item == ConfigItem::BoardType {
            let _ = self.entered.lock().send(());
            // Bounded so a regression fails the assertions instead of hanging
            let _ = self.release.lock().recv_timeout(Duration::from_secs(5));
        }
        self.inner.config_read(board, key)
    }

    fn config_write(
        &self,
        board: BoardHandle,
        key: ConfigKey,
        value: i64,
    ) -> Result<(), VendorCode> {
        self.inner.config_write(board, key, value)
    }

    fn try_operation(&self, board: BoardHandle, op: &TrialOperation) -> Result<(), VendorCode> {
        self.inner.try_operation(board, op)
    }
}

#[test]
fn test_slow_open_does_not_block_registry() {
    let registry = DeviceRegistry::default();
    registry.init();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let slow = Arc::new(SlowBoard {
        inner: SimulatedBoard::new(BoardProfile {
            model: 0x82,
            ..BoardProfile::default()
        }),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });

    thread::scope(|s| {
        let opener = s.spawn(|| registry.open(DeviceDescriptor::new("slow", "0"), slow.clone()));
        entered_rx.recv().unwrap();

        // Model read still in flight on the other board
        assert!(registry.is_initialized());
        assert!(registry.open_handles().is_empty());
        let fast = registry
            .open(
                DeviceDescriptor::new("fast", "1"),
                Arc::new(SimulatedBoard::new(BoardProfile::default())),
            )
            .unwrap();
        assert_eq!(fast.handle(), BoardHandle(1));
        assert_eq!(registry.open_handles(), vec![BoardHandle(1)]);

        release_tx.send(()).unwrap();
        let slow_device = opener.join().unwrap().unwrap();
        assert_eq!(slow_device.handle(), BoardHandle(0));
        assert_eq!(registry.open_handles(), vec![BoardHandle(0), BoardHandle(1)]);
    });
}
