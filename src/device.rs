//! Board handles and the device registry.
//!
//! [`DaqDevice`] wraps one open board: its handle, hardware model, the
//! transport that reaches it and a command lock. Every single driver call
//! (one configuration read, one trial operation) runs under the lock, so two
//! probes on the same board never interleave at the transaction level. The
//! lock is never held across probes.
//!
//! [`DeviceRegistry`] owns what a driver binding would otherwise keep in
//! process-wide statics: the one-time driver initialization flag and the
//! handle counter.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::{ErrorClassifier, Outcome, OutcomeClass};
use crate::error::{CapsError, Result};
use crate::quirks::{ModelId, QuirkTable};
use crate::subsystem::analog_input::AnalogInput;
use crate::subsystem::analog_output::AnalogOutput;
use crate::subsystem::digital_io::DigitalPort;
use crate::transport::{
    BoardHandle, ConfigItem, ConfigKey, DaqTransport, TrialOperation, VendorCode,
};

/// Identity of a board as found by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Product name, e.g. "USB-1208FS"
    pub product_name: String,
    /// Serial number or MAC address
    pub unique_id: String,
}

impl DeviceDescriptor {
    /// Descriptor from discovery results.
    pub fn new(product_name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            unique_id: unique_id.into(),
        }
    }
}

/// One open board.
///
/// Ports and channels borrow the device and cannot outlive it.
pub struct DaqDevice {
    /// Registry that issued `handle`
    registry: RegistryId,
    handle: BoardHandle,
    model: ModelId,
    descriptor: DeviceDescriptor,
    transport: Arc<dyn DaqTransport>,
    classifier: Arc<ErrorClassifier>,
    quirks: Arc<QuirkTable>,
    /// Serializes driver calls on this board's command channel.
    command_lock: Mutex<()>,
}

impl DaqDevice {
    fn new(
        registry: RegistryId,
        handle: BoardHandle,
        descriptor: DeviceDescriptor,
        transport: Arc<dyn DaqTransport>,
        classifier: Arc<ErrorClassifier>,
        quirks: Arc<QuirkTable>,
    ) -> Result<Self> {
        let mut device = Self {
            registry,
            handle,
            model: ModelId(0),
            descriptor,
            transport,
            classifier,
            quirks,
            command_lock: Mutex::new(()),
        };
        let model = device.config_value(ConfigKey::board(ConfigItem::BoardType))?;
        device.model = ModelId(u32::try_from(model).map_err(|_| {
            CapsError::Config(format!("board type {} out of range on {}", model, handle))
        })?);
        Ok(device)
    }

    /// Handle assigned by the registry.
    pub fn handle(&self) -> BoardHandle {
        self.handle
    }

    /// Hardware model identifier.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Identity from discovery.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Classifier applied to every driver result.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Per-model quirk lookup.
    pub fn quirks(&self) -> &QuirkTable {
        &self.quirks
    }

    /// Read and classify one configuration value.
    pub fn read_config(&self, key: ConfigKey) -> Outcome<i64> {
        let raw = {
            let _guard = self.command_lock.lock();
            self.transport.config_read(self.handle, key)
        };
        let outcome = self.classifier.classify(raw);
        debug!(handle = %self.handle, key = %key, outcome = ?outcome.class(), "config read");
        outcome
    }

    /// Read a configuration value the caller cannot do without.
    ///
    /// Unsupported becomes [`CapsError::ConfigUnavailable`].
    pub fn config_value(&self, key: ConfigKey) -> Result<i64> {
        match self.read_config(key) {
            Outcome::Success(value) => Ok(value),
            Outcome::Unsupported(code) => Err(CapsError::ConfigUnavailable {
                handle: self.handle,
                key,
                code,
            }),
            Outcome::DeviceBusy(code) => Err(self.busy(code)),
            Outcome::HardFailure(code) => Err(CapsError::HardFailure {
                handle: self.handle,
                operation: format!("read {}", key),
                code,
            }),
        }
    }

    /// Read a configuration value that may legitimately be absent.
    pub fn optional_config(&self, key: ConfigKey) -> Result<Option<i64>> {
        match self.read_config(key) {
            Outcome::DeviceBusy(code) => Err(self.busy(code)),
            outcome => outcome.into_signal(self.handle, &format!("read {}", key)),
        }
    }

    /// Write one configuration value.
    pub fn write_config(&self, key: ConfigKey, value: i64) -> Result<()> {
        let raw = {
            let _guard = self.command_lock.lock();
            self.transport.config_write(self.handle, key, value)
        };
        match self.classifier.classify(raw) {
            Outcome::Success(()) => {
                debug!(handle = %self.handle, key = %key, value, "config write");
                Ok(())
            }
            Outcome::Unsupported(code) => Err(CapsError::ConfigUnavailable {
                handle: self.handle,
                key,
                code,
            }),
            Outcome::DeviceBusy(code) => Err(self.busy(code)),
            Outcome::HardFailure(code) => Err(CapsError::HardFailure {
                handle: self.handle,
                operation: format!("write {}", key),
                code,
            }),
        }
    }

    /// Issue one trial operation and classify the result.
    pub fn trial(&self, op: &TrialOperation) -> Outcome<()> {
        let raw = {
            let _guard = self.command_lock.lock();
            self.transport.try_operation(self.handle, op)
        };
        let outcome = self.classifier.classify(raw);
        debug!(
            handle = %self.handle,
            operation = op.label(),
            outcome = ?outcome.class(),
            "trial operation"
        );
        outcome
    }

    /// Issue one trial operation and read it as a capability signal.
    ///
    /// Success is `true`, Unsupported is `false`; busy and hard failures are
    /// returned as errors and must not be read as "unsupported".
    pub fn probe(&self, op: &TrialOperation) -> Result<bool> {
        let outcome = self.trial(op);
        if outcome.class() == OutcomeClass::DeviceBusy {
            warn!(handle = %self.handle, operation = op.label(), "device busy during probe");
        }
        Ok(outcome.into_signal(self.handle, op.label())?.is_some())
    }

    /// Open every digital port the board reports.
    pub fn digital_ports(&self) -> Result<Vec<DigitalPort<'_>>> {
        let count = self
            .optional_config(ConfigKey::board(ConfigItem::NumDigitalDevs))?
            .unwrap_or(0);
        let count = u32::try_from(count).map_err(|_| {
            CapsError::Config(format!(
                "digital port count {} out of range on {}",
                count, self.handle
            ))
        })?;
        (0..count)
            .map(|index| DigitalPort::open(self, index))
            .collect()
    }

    /// Analog input subsystem accessor.
    pub fn analog_input(&self) -> Result<AnalogInput<'_>> {
        AnalogInput::open(self)
    }

    /// Analog output subsystem accessor.
    pub fn analog_output(&self) -> Result<AnalogOutput<'_>> {
        AnalogOutput::open(self)
    }

    fn busy(&self, code: VendorCode) -> CapsError {
        warn!(handle = %self.handle, %code, "device busy");
        CapsError::DeviceBusy {
            handle: self.handle,
            code,
        }
    }
}

impl std::fmt::Debug for DaqDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaqDevice")
            .field("handle", &self.handle)
            .field("model", &self.model)
            .field("product", &self.descriptor.product_name)
            .finish()
    }
}

/// Distinguishes registries so a device can only be closed where it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    initialized: bool,
    next_handle: u32,
    open: BTreeMap<BoardHandle, DeviceDescriptor>,
}

/// Owns driver initialization and handle assignment.
///
/// Lifecycle: [`init`](Self::init), any number of
/// [`open`](Self::open)/[`close`](Self::close), then
/// [`teardown`](Self::teardown).
#[derive(Debug)]
pub struct DeviceRegistry {
    id: RegistryId,
    classifier: Arc<ErrorClassifier>,
    quirks: Arc<QuirkTable>,
    state: Mutex<RegistryState>,
}

impl DeviceRegistry {
    /// Uninitialized registry sharing `classifier` and `quirks` with every
    /// device it opens.
    pub fn new(classifier: ErrorClassifier, quirks: QuirkTable) -> Self {
        Self {
            id: RegistryId::next(),
            classifier: Arc::new(classifier),
            quirks: Arc::new(quirks),
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// One-time driver initialization. Calling it again is a no-op.
    pub fn init(&self) {
        let mut state = self.state.lock();
        if !state.initialized {
            state.initialized = true;
            info!("Device registry initialized");
        }
    }

    /// Whether [`init`](Self::init) ran since the last teardown.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Open a board reached through `transport` and assign it a handle.
    ///
    /// Reads the hardware model without holding the registry lock, so a slow
    /// board does not stall other registry calls. A failed read leaves
    /// nothing registered; its handle is reused unless another open took a
    /// later one in the meantime.
    pub fn open(
        &self,
        descriptor: DeviceDescriptor,
        transport: Arc<dyn DaqTransport>,
    ) -> Result<DaqDevice> {
        let handle = {
            let mut state = self.state.lock();
            if !state.initialized {
                return Err(CapsError::NotInitialized);
            }
            let handle = BoardHandle(state.next_handle);
            state.next_handle += 1;
            handle
        };

        let opened = DaqDevice::new(
            self.id,
            handle,
            descriptor.clone(),
            transport,
            Arc::clone(&self.classifier),
            Arc::clone(&self.quirks),
        );

        let mut state = self.state.lock();
        let device = match opened {
            Ok(device) => device,
            Err(err) => {
                if state.next_handle == handle.0 + 1 {
                    state.next_handle = handle.0;
                }
                return Err(err);
            }
        };
        // Torn down while the model was being read
        if !state.initialized {
            return Err(CapsError::NotInitialized);
        }
        state.open.insert(handle, descriptor);
        drop(state);

        info!(
            handle = %handle,
            model = %device.model,
            product = %device.descriptor.product_name,
            "Opened device"
        );
        Ok(device)
    }

    /// Close a device. Its ports and channels must already be dropped.
    ///
    /// A device opened by another registry is rejected as an unknown handle.
    pub fn close(&self, device: DaqDevice) -> Result<()> {
        if device.registry != self.id {
            return Err(CapsError::UnknownHandle(device.handle));
        }
        let mut state = self.state.lock();
        if state.open.remove(&device.handle).is_none() {
            return Err(CapsError::UnknownHandle(device.handle));
        }
        info!(handle = %device.handle, "Closed device");
        Ok(())
    }

    /// Forget all open handles and clear the initialization flag.
    ///
    /// Returns the handles that were still open.
    pub fn teardown(&self) -> Vec<BoardHandle> {
        let mut state = self.state.lock();
        let handles: Vec<BoardHandle> = state.open.keys().copied().collect();
        if !handles.is_empty() {
            warn!(count = handles.len(), "Tearing down registry with open devices");
        }
        state.open.clear();
        state.initialized = false;
        handles
    }

    /// Handles currently open, ascending.
    pub fn open_handles(&self) -> Vec<BoardHandle> {
        self.state.lock().open.keys().copied().collect()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(ErrorClassifier::new(), QuirkTable::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BoardProfile, SimulatedBoard};
    use crate::transport::FunctionClass;
    use tracing_test::traced_test;

    fn board(model: u32) -> Arc<SimulatedBoard> {
        Arc::new(SimulatedBoard::new(BoardProfile {
            model,
            ..BoardProfile::default()
        }))
    }

    #[test]
    fn test_open_requires_init() {
        let registry = DeviceRegistry::default();
        let err = registry
            .open(DeviceDescriptor::new("sim", "0"), board(0x7A))
            .unwrap_err();
        assert_eq!(err, CapsError::NotInitialized);
    }

    #[test]
    fn test_handles_increase_and_close() {
        let registry = DeviceRegistry::default();
        registry.init();
        registry.init();

        let first = registry
            .open(DeviceDescriptor::new("sim", "a"), board(0x7A))
            .unwrap();
        let second = registry
            .open(DeviceDescriptor::new("sim", "b"), board(0x82))
            .unwrap();
        assert_eq!(first.handle(), BoardHandle(0));
        assert_eq!(second.handle(), BoardHandle(1));
        assert_eq!(second.model(), ModelId(0x82));
        assert_eq!(registry.open_handles(), vec![BoardHandle(0), BoardHandle(1)]);

        registry.close(first).unwrap();
        assert_eq!(registry.open_handles(), vec![BoardHandle(1)]);

        let third = registry
            .open(DeviceDescriptor::new("sim", "c"), board(0x7A))
            .unwrap();
        assert_eq!(third.handle(), BoardHandle(2));
    }

    #[test]
    fn test_teardown_clears_state() {
        let registry = DeviceRegistry::default();
        registry.init();
        let device = registry
            .open(DeviceDescriptor::new("sim", "a"), board(0x7A))
            .unwrap();

        assert_eq!(registry.teardown(), vec![BoardHandle(0)]);
        assert!(!registry.is_initialized());
        assert_eq!(
            registry.close(device).unwrap_err(),
            CapsError::UnknownHandle(BoardHandle(0))
        );
    }

    #[test]
    fn test_busy_board_fails_open() {
        let registry = DeviceRegistry::default();
        registry.init();
        let sim = board(0x7A);
        sim.set_busy(true);

        let err = registry
            .open(DeviceDescriptor::new("sim", "a"), sim)
            .unwrap_err();
        assert_eq!(
            err,
            CapsError::DeviceBusy {
                handle: BoardHandle(0),
                code: VendorCode::NET_DEV_IN_USE_BY_ANOTHER_PROC,
            }
        );
        assert!(registry.open_handles().is_empty());

        // The failed open gives its handle back
        let device = registry
            .open(DeviceDescriptor::new("sim", "b"), board(0x7A))
            .unwrap();
        assert_eq!(device.handle(), BoardHandle(0));
    }

    #[test]
    fn test_close_rejects_foreign_device() {
        let first = DeviceRegistry::default();
        let second = DeviceRegistry::default();
        first.init();
        second.init();

        let ours = first
            .open(DeviceDescriptor::new("sim", "a"), board(0x7A))
            .unwrap();
        let theirs = second
            .open(DeviceDescriptor::new("sim", "b"), board(0x7A))
            .unwrap();
        assert_eq!(ours.handle(), theirs.handle());

        assert_eq!(
            first.close(theirs).unwrap_err(),
            CapsError::UnknownHandle(BoardHandle(0))
        );
        assert_eq!(first.open_handles(), vec![BoardHandle(0)]);
        assert_eq!(second.open_handles(), vec![BoardHandle(0)]);
        first.close(ours).unwrap();
    }

    struct NegativePortCount;

    impl DaqTransport for NegativePortCount {
        fn config_read(
            &self,
            _board: BoardHandle,
            key: ConfigKey,
        ) -> std::result::Result<i64, VendorCode> {
            match key.item {
                ConfigItem::BoardType => Ok(0x7A),
                ConfigItem::NumDigitalDevs => Ok(-1),
                _ => Err(VendorCode::CFG_NOT_SUPPORTED),
            }
        }

        fn config_write(
            &self,
            _board: BoardHandle,
            _key: ConfigKey,
            _value: i64,
        ) -> std::result::Result<(), VendorCode> {
            Err(VendorCode::CFG_NOT_SUPPORTED)
        }

        fn try_operation(
            &self,
            _board: BoardHandle,
            _op: &TrialOperation,
        ) -> std::result::Result<(), VendorCode> {
            Err(VendorCode::FUNCTION_NOT_SUPPORTED)
        }
    }

    #[test]
    fn test_negative_port_count_is_rejected() {
        let registry = DeviceRegistry::default();
        registry.init();
        let device = registry
            .open(DeviceDescriptor::new("sim", "a"), Arc::new(NegativePortCount))
            .unwrap();
        assert!(matches!(device.digital_ports(), Err(CapsError::Config(_))));
    }

    #[test]
    fn test_probe_maps_outcomes() {
        let registry = DeviceRegistry::default();
        registry.init();
        let sim = board(0x7A);
        let device = registry
            .open(DeviceDescriptor::new("sim", "a"), sim.clone())
            .unwrap();
        let op = TrialOperation::QueryStatus {
            function: FunctionClass::AnalogIn,
        };

        // Default profile has no scan support
        assert!(!device.probe(&op).unwrap());

        sim.fail_on(op.clone(), VendorCode::DEVICE_DISCONNECTED);
        let err = device.probe(&op).unwrap_err();
        assert!(!err.is_busy());
        assert_eq!(err.vendor_code(), Some(VendorCode::DEVICE_DISCONNECTED));
    }

    #[test]
    #[traced_test]
    fn test_busy_probe_is_logged() {
        let registry = DeviceRegistry::default();
        registry.init();
        let sim = board(0x7A);
        let device = registry
            .open(DeviceDescriptor::new("sim", "a"), sim.clone())
            .unwrap();
        sim.set_busy(true);

        let op = TrialOperation::QueryStatus {
            function: FunctionClass::AnalogIn,
        };
        assert!(device.probe(&op).unwrap_err().is_busy());
        assert!(logs_contain("device busy during probe"));
    }

    #[test]
    fn test_missing_item_is_config_unavailable() {
        let registry = DeviceRegistry::default();
        registry.init();
        let sim = board(0x7A);
        let device = registry
            .open(DeviceDescriptor::new("sim", "a"), sim.clone())
            .unwrap();
        let key = ConfigKey::board(ConfigItem::HardRange);
        sim.fail_config(key, VendorCode::CFG_NOT_SUPPORTED);

        assert_eq!(device.optional_config(key).unwrap(), None);
        assert!(matches!(
            device.config_value(key),
            Err(CapsError::ConfigUnavailable { .. })
        ));
    }
}
