//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use daq_caps::classify::{ClassifierConfig, ErrorClassifier};
use daq_caps::quirks::QuirkTable;
use daq_caps::sim::{BoardProfile, SimulatedBoard};
use daq_caps::{DaqDevice, DeviceRegistry};

/// Open a simulated board with the built-in classifier and quirks.
pub fn open_board(profile: BoardProfile) -> (DaqDevice, Arc<SimulatedBoard>) {
    open_with(DeviceRegistry::default(), profile)
}

/// Open a simulated board with extra classifier codes.
pub fn open_board_classified(
    profile: BoardProfile,
    classifier: ClassifierConfig,
) -> (DaqDevice, Arc<SimulatedBoard>) {
    let registry = DeviceRegistry::new(
        ErrorClassifier::from_config(&classifier),
        QuirkTable::builtin(),
    );
    open_with(registry, profile)
}

fn open_with(registry: DeviceRegistry, profile: BoardProfile) -> (DaqDevice, Arc<SimulatedBoard>) {
    registry.init();
    let descriptor = profile.descriptor();
    let sim = Arc::new(SimulatedBoard::new(profile));
    let device = registry.open(descriptor, sim.clone()).unwrap();
    sim.clear_log();
    (device, sim)
}
