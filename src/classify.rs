//! Failure taxonomy for raw driver outcomes.
//!
//! Probing deliberately performs operations that fail when a feature is
//! absent. That only works if "failed because absent" can be told apart from
//! "failed because the board is held elsewhere" and "failed because something
//! is broken". Every raw result from the transport passes through
//! [`ErrorClassifier::classify`] before an engine branches on it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CapsError, Result};
use crate::transport::{BoardHandle, VendorCode};

/// Classified outcome of one driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The call worked; holds its result.
    Success(T),
    /// The item or operation does not apply to this board/port/channel.
    Unsupported(VendorCode),
    /// A network device is held by another session or process.
    DeviceBusy(VendorCode),
    /// Anything else.
    HardFailure(VendorCode),
}

/// Label of an [`Outcome`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeClass {
    /// See [`Outcome::Success`]
    Success,
    /// See [`Outcome::Unsupported`]
    Unsupported,
    /// See [`Outcome::DeviceBusy`]
    DeviceBusy,
    /// See [`Outcome::HardFailure`]
    HardFailure,
}

impl<T> Outcome<T> {
    /// Class of this outcome.
    pub fn class(&self) -> OutcomeClass {
        match self {
            Self::Success(_) => OutcomeClass::Success,
            Self::Unsupported(_) => OutcomeClass::Unsupported,
            Self::DeviceBusy(_) => OutcomeClass::DeviceBusy,
            Self::HardFailure(_) => OutcomeClass::HardFailure,
        }
    }

    /// Turn the outcome into a capability signal.
    ///
    /// Success is `Some(value)`, Unsupported is `None`, busy and hard failures
    /// become errors attributed to `operation` on `handle`.
    pub fn into_signal(self, handle: BoardHandle, operation: &str) -> Result<Option<T>> {
        match self {
            Self::Success(value) => Ok(Some(value)),
            Self::Unsupported(_) => Ok(None),
            Self::DeviceBusy(code) => Err(CapsError::DeviceBusy { handle, code }),
            Self::HardFailure(code) => Err(CapsError::HardFailure {
                handle,
                operation: operation.to_string(),
                code,
            }),
        }
    }
}

/// Extra codes layered on top of the built-in classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Additional codes meaning "does not apply".
    #[serde(default)]
    pub unsupported: Vec<i32>,
    /// Additional codes meaning "held by another session".
    #[serde(default)]
    pub busy: Vec<i32>,
}

/// Maps vendor codes to exactly one outcome class.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    unsupported: HashSet<VendorCode>,
    busy: HashSet<VendorCode>,
}

const BUILTIN_UNSUPPORTED: &[VendorCode] = &[
    VendorCode::BAD_BOARD_TYPE,
    VendorCode::BAD_PORT_NUM,
    VendorCode::BAD_BIT_NUMBER,
    VendorCode::NOT_DIGITAL_CONF,
    VendorCode::BAD_RANGE,
    VendorCode::BAD_TRIG_TYPE,
    VendorCode::NO_AD_TRIGGER,
    VendorCode::BAD_QUEUE_SIZE,
    VendorCode::CFG_NOT_SUPPORTED,
    VendorCode::FUNCTION_NOT_SUPPORTED,
];

const BUILTIN_BUSY: &[VendorCode] = &[
    VendorCode::NET_DEV_IN_USE,
    VendorCode::NET_DEV_IN_USE_BY_ANOTHER_PROC,
];

impl ErrorClassifier {
    /// Classifier with the built-in code tables only.
    pub fn new() -> Self {
        Self {
            unsupported: BUILTIN_UNSUPPORTED.iter().copied().collect(),
            busy: BUILTIN_BUSY.iter().copied().collect(),
        }
    }

    /// Built-in tables extended with configured codes.
    ///
    /// Busy takes precedence: a code listed in both sets classifies as busy,
    /// since caching "unsupported" for a busy board would be permanent.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut classifier = Self::new();
        classifier
            .unsupported
            .extend(config.unsupported.iter().copied().map(VendorCode));
        classifier
            .busy
            .extend(config.busy.iter().copied().map(VendorCode));
        classifier
    }

    /// Class of a single failure code.
    pub fn class_of(&self, code: VendorCode) -> OutcomeClass {
        if self.busy.contains(&code) {
            OutcomeClass::DeviceBusy
        } else if self.unsupported.contains(&code) {
            OutcomeClass::Unsupported
        } else {
            // Includes NO_ERRORS reported as a failure: a driver contract violation.
            OutcomeClass::HardFailure
        }
    }

    /// Classify one raw result.
    pub fn classify<T>(&self, raw: std::result::Result<T, VendorCode>) -> Outcome<T> {
        match raw {
            Ok(value) => Outcome::Success(value),
            Err(code) => match self.class_of(code) {
                OutcomeClass::DeviceBusy => Outcome::DeviceBusy(code),
                OutcomeClass::Unsupported => Outcome::Unsupported(code),
                _ => Outcome::HardFailure(code),
            },
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
