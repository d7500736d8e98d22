//! Capability engines per subsystem.
//!
//! - [`digital_io`] - digital port direction, bit and scan capabilities
//! - [`analog_input`] - analog input ranges, voltage, trigger, queue, scan
//! - [`analog_output`] - analog output ranges, voltage, scan

pub mod analog_input;
pub mod analog_output;
pub mod digital_io;

use tracing::debug;

use crate::device::DaqDevice;
use crate::error::Result;
use crate::range::{RangeCatalog, RangeCode};
use crate::transport::TrialOperation;

/// Probe every code of `catalog` in order, keeping the ones that succeed.
///
/// Unsupported codes are skipped. The first busy or hard failure aborts the
/// walk and is returned; later codes are never attempted.
pub(crate) fn probe_ranges<F>(
    device: &DaqDevice,
    catalog: &RangeCatalog,
    mut trial_for: F,
) -> Result<Vec<RangeCode>>
where
    F: FnMut(RangeCode) -> TrialOperation,
{
    let mut supported = Vec::new();
    for &code in catalog.codes() {
        if device.probe(&trial_for(code))? {
            supported.push(code);
        }
    }
    debug!(
        handle = %device.handle(),
        probed = catalog.len(),
        supported = supported.len(),
        "range probe complete"
    );
    Ok(supported)
}
