//! Range/gain codes.
//!
//! A range code selects the span and amplification an analog channel measures
//! or outputs. Codes are vendor assigned integers; their numeric order says
//! nothing about the span, so probing walks [`canonical_order`] instead.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical unit of a range span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeUnit {
    /// Volts
    Volts,
    /// Current loop, milliamps
    Milliamps,
    /// Ratiometric (volts per volt)
    Ratio,
}

/// Vendor range code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeCode(pub i32);

/// Physical span of a range code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpan {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Unit of both bounds
    pub unit: RangeUnit,
}

impl RangeSpan {
    /// Width of the span (max - min).
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Check if this is a bipolar range (includes negative values).
    pub fn is_bipolar(&self) -> bool {
        self.min < 0.0
    }
}

// Vendor header names; the span of each is in `RANGE_TABLE`.
#[allow(missing_docs)]
impl RangeCode {
    pub const BIP60VOLTS: Self = Self(20);
    pub const BIP30VOLTS: Self = Self(23);
    pub const BIP20VOLTS: Self = Self(15);
    pub const BIP15VOLTS: Self = Self(21);
    pub const BIP10VOLTS: Self = Self(1);
    pub const BIP5VOLTS: Self = Self(0);
    pub const BIP4VOLTS: Self = Self(16);
    pub const BIP2PT5VOLTS: Self = Self(2);
    pub const BIP2VOLTS: Self = Self(14);
    pub const BIP1PT25VOLTS: Self = Self(3);
    pub const BIP1VOLTS: Self = Self(4);
    pub const BIPPT625VOLTS: Self = Self(5);
    pub const BIPPT5VOLTS: Self = Self(6);
    pub const BIPPT25VOLTS: Self = Self(12);
    pub const BIPPT2VOLTS: Self = Self(13);
    pub const BIPPT1VOLTS: Self = Self(7);
    pub const BIPPT05VOLTS: Self = Self(8);
    pub const BIPPT01VOLTS: Self = Self(9);
    pub const BIPPT005VOLTS: Self = Self(10);
    pub const BIP1PT67VOLTS: Self = Self(11);
    pub const BIPPT312VOLTS: Self = Self(17);
    pub const BIPPT156VOLTS: Self = Self(18);
    pub const BIPPT125VOLTS: Self = Self(22);
    pub const BIPPT078VOLTS: Self = Self(19);
    pub const UNI10VOLTS: Self = Self(100);
    pub const UNI5VOLTS: Self = Self(101);
    pub const UNI4VOLTS: Self = Self(114);
    pub const UNI2PT5VOLTS: Self = Self(102);
    pub const UNI2VOLTS: Self = Self(103);
    pub const UNI1PT67VOLTS: Self = Self(109);
    pub const UNI1PT25VOLTS: Self = Self(104);
    pub const UNI1VOLTS: Self = Self(105);
    pub const UNIPT5VOLTS: Self = Self(110);
    pub const UNIPT25VOLTS: Self = Self(111);
    pub const UNIPT2VOLTS: Self = Self(112);
    pub const UNIPT1VOLTS: Self = Self(106);
    pub const UNIPT05VOLTS: Self = Self(113);
    pub const UNIPT02VOLTS: Self = Self(108);
    pub const UNIPT01VOLTS: Self = Self(107);
    pub const MA4TO20: Self = Self(200);
    pub const MA2TO10: Self = Self(201);
    pub const MA1TO5: Self = Self(202);
    pub const MAPT5TO2PT5: Self = Self(203);
    pub const MA0TO20: Self = Self(204);
    pub const BIPPT025VOLTSPERVOLT: Self = Self(400);

    /// Code that no board accepts. Used to detect boards that ignore range codes.
    pub const INVALID: Self = Self(-5);

    /// Raw integer value.
    pub fn value(self) -> i32 {
        self.0
    }

    /// Vendor name of the code, if it is a known code.
    pub fn name(self) -> Option<&'static str> {
        RANGE_TABLE
            .iter()
            .find(|entry| entry.code == self)
            .map(|entry| entry.name)
    }

    /// Physical span of the code, if it is a known code.
    pub fn span(self) -> Option<RangeSpan> {
        RANGE_TABLE
            .iter()
            .find(|entry| entry.code == self)
            .map(|entry| RangeSpan {
                min: entry.min,
                max: entry.max,
                unit: entry.unit,
            })
    }
}

impl fmt::Display for RangeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "RANGE({})", self.0),
        }
    }
}

struct RangeEntry {
    code: RangeCode,
    name: &'static str,
    min: f64,
    max: f64,
    unit: RangeUnit,
}

const fn volts(code: RangeCode, name: &'static str, min: f64, max: f64) -> RangeEntry {
    RangeEntry {
        code,
        name,
        min,
        max,
        unit: RangeUnit::Volts,
    }
}

const fn milliamps(code: RangeCode, name: &'static str, min: f64, max: f64) -> RangeEntry {
    RangeEntry {
        code,
        name,
        min,
        max,
        unit: RangeUnit::Milliamps,
    }
}

// Declaration order is the canonical probing order.
const RANGE_TABLE: &[RangeEntry] = &[
    volts(RangeCode::BIP60VOLTS, "BIP60VOLTS", -60.0, 60.0),
    volts(RangeCode::BIP30VOLTS, "BIP30VOLTS", -30.0, 30.0),
    volts(RangeCode::BIP20VOLTS, "BIP20VOLTS", -20.0, 20.0),
    volts(RangeCode::BIP15VOLTS, "BIP15VOLTS", -15.0, 15.0),
    volts(RangeCode::BIP10VOLTS, "BIP10VOLTS", -10.0, 10.0),
    volts(RangeCode::BIP5VOLTS, "BIP5VOLTS", -5.0, 5.0),
    volts(RangeCode::BIP4VOLTS, "BIP4VOLTS", -4.0, 4.0),
    volts(RangeCode::BIP2PT5VOLTS, "BIP2PT5VOLTS", -2.5, 2.5),
    volts(RangeCode::BIP2VOLTS, "BIP2VOLTS", -2.0, 2.0),
    volts(RangeCode::BIP1PT25VOLTS, "BIP1PT25VOLTS", -1.25, 1.25),
    volts(RangeCode::BIP1VOLTS, "BIP1VOLTS", -1.0, 1.0),
    volts(RangeCode::BIPPT625VOLTS, "BIPPT625VOLTS", -0.625, 0.625),
    volts(RangeCode::BIPPT5VOLTS, "BIPPT5VOLTS", -0.5, 0.5),
    volts(RangeCode::BIPPT25VOLTS, "BIPPT25VOLTS", -0.25, 0.25),
    volts(RangeCode::BIPPT2VOLTS, "BIPPT2VOLTS", -0.2, 0.2),
    volts(RangeCode::BIPPT1VOLTS, "BIPPT1VOLTS", -0.1, 0.1),
    volts(RangeCode::BIPPT05VOLTS, "BIPPT05VOLTS", -0.05, 0.05),
    volts(RangeCode::BIPPT01VOLTS, "BIPPT01VOLTS", -0.01, 0.01),
    volts(RangeCode::BIPPT005VOLTS, "BIPPT005VOLTS", -0.005, 0.005),
    volts(RangeCode::BIP1PT67VOLTS, "BIP1PT67VOLTS", -1.67, 1.67),
    volts(RangeCode::BIPPT312VOLTS, "BIPPT312VOLTS", -0.312, 0.312),
    volts(RangeCode::BIPPT156VOLTS, "BIPPT156VOLTS", -0.156, 0.156),
    volts(RangeCode::BIPPT125VOLTS, "BIPPT125VOLTS", -0.125, 0.125),
    volts(RangeCode::BIPPT078VOLTS, "BIPPT078VOLTS", -0.078, 0.078),
    volts(RangeCode::UNI10VOLTS, "UNI10VOLTS", 0.0, 10.0),
    volts(RangeCode::UNI5VOLTS, "UNI5VOLTS", 0.0, 5.0),
    volts(RangeCode::UNI4VOLTS, "UNI4VOLTS", 0.0, 4.0),
    volts(RangeCode::UNI2PT5VOLTS, "UNI2PT5VOLTS", 0.0, 2.5),
    volts(RangeCode::UNI2VOLTS, "UNI2VOLTS", 0.0, 2.0),
    volts(RangeCode::UNI1PT67VOLTS, "UNI1PT67VOLTS", 0.0, 1.67),
    volts(RangeCode::UNI1PT25VOLTS, "UNI1PT25VOLTS", 0.0, 1.25),
    volts(RangeCode::UNI1VOLTS, "UNI1VOLTS", 0.0, 1.0),
    volts(RangeCode::UNIPT5VOLTS, "UNIPT5VOLTS", 0.0, 0.5),
    volts(RangeCode::UNIPT25VOLTS, "UNIPT25VOLTS", 0.0, 0.25),
    volts(RangeCode::UNIPT2VOLTS, "UNIPT2VOLTS", 0.0, 0.2),
    volts(RangeCode::UNIPT1VOLTS, "UNIPT1VOLTS", 0.0, 0.1),
    volts(RangeCode::UNIPT05VOLTS, "UNIPT05VOLTS", 0.0, 0.05),
    volts(RangeCode::UNIPT02VOLTS, "UNIPT02VOLTS", 0.0, 0.02),
    volts(RangeCode::UNIPT01VOLTS, "UNIPT01VOLTS", 0.0, 0.01),
    milliamps(RangeCode::MA4TO20, "MA4TO20", 4.0, 20.0),
    milliamps(RangeCode::MA2TO10, "MA2TO10", 2.0, 10.0),
    milliamps(RangeCode::MA1TO5, "MA1TO5", 1.0, 5.0),
    milliamps(RangeCode::MAPT5TO2PT5, "MAPT5TO2PT5", 0.5, 2.5),
    milliamps(RangeCode::MA0TO20, "MA0TO20", 0.0, 20.0),
    RangeEntry {
        code: RangeCode::BIPPT025VOLTSPERVOLT,
        name: "BIPPT025VOLTSPERVOLT",
        min: -0.025,
        max: 0.025,
        unit: RangeUnit::Ratio,
    },
];

/// Every defined range code, in the fixed order used for probing.
pub fn canonical_order() -> Vec<RangeCode> {
    RANGE_TABLE.iter().map(|entry| entry.code).collect()
}

/// Ordered set of range codes a channel engine probes.
///
/// Defaults to the canonical order. A narrower catalog restricts probing to
/// codes a caller already knows are plausible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeCatalog {
    codes: Vec<RangeCode>,
}

impl RangeCatalog {
    /// Catalog over an explicit, ordered list of codes.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn new(codes: impl IntoIterator<Item = RangeCode>) -> Self {
        let mut unique: Vec<RangeCode> = Vec::new();
        for code in codes {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        Self { codes: unique }
    }

    /// Codes in probing order.
    pub fn codes(&self) -> &[RangeCode] {
        &self.codes
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether there is nothing to probe.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for RangeCatalog {
    fn default() -> Self {
        Self {
            codes: canonical_order(),
        }
    }
}
