//! Per-model constants that no runtime query can answer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware model identifier reported by `BoardType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub u32);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Packet size used when a model is not listed.
pub const DEFAULT_PACKET_SIZE: u32 = 1;
/// Trigger resolution used when a model is not listed (no analog trigger).
pub const DEFAULT_TRIGGER_RESOLUTION: u32 = 0;

/// Known constants for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelQuirks {
    /// Hardware model id
    pub model: ModelId,
    /// Product family name
    pub name: String,
    /// Transfer packet size in samples
    pub packet_size: u32,
    /// Trigger threshold resolution in bits
    pub trigger_resolution: u32,
}

/// Configured override for one model. Unset fields keep the built-in value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuirkOverride {
    /// Model id the override applies to
    pub model: u32,
    /// Replacement name
    #[serde(default)]
    pub name: Option<String>,
    /// Replacement packet size
    #[serde(default)]
    pub packet_size: Option<u32>,
    /// Replacement trigger resolution
    #[serde(default)]
    pub trigger_resolution: Option<u32>,
}

// (model, name, packet size, trigger resolution in bits)
const BUILTIN: &[(u32, &str, u32, u32)] = &[
    (0x75, "miniLAB 1008", 64, 0),
    (0x76, "PMD-1208LS", 64, 0),
    (0x7A, "USB-1208LS", 64, 0),
    (0x7D, "USB-1608FS", 31, 0),
    (0x82, "USB-1208FS", 31, 0),
    (0xA1, "USB-1408FS", 31, 0),
    (0x5E, "PCI-DAS6030", 1, 12),
    (0x5F, "PCI-DAS6031", 1, 12),
    (0x60, "PCI-DAS6032", 1, 12),
    (0x61, "PCI-DAS6033", 1, 12),
    (0x66, "PCI-DAS6052", 1, 12),
    (0x65, "PCI-DAS6025", 1, 8),
    (0x67, "PCI-DAS6014", 1, 8),
    (0xD0, "USB-1602HS", 1, 12),
    (0xD1, "USB-1604HS", 1, 12),
];

/// Model-keyed lookup of packet size and trigger resolution.
#[derive(Debug, Clone)]
pub struct QuirkTable {
    models: BTreeMap<ModelId, ModelQuirks>,
}

impl QuirkTable {
    /// Table with the built-in entries.
    pub fn builtin() -> Self {
        let models = BUILTIN
            .iter()
            .map(|&(model, name, packet_size, trigger_resolution)| {
                (
                    ModelId(model),
                    ModelQuirks {
                        model: ModelId(model),
                        name: name.to_string(),
                        packet_size,
                        trigger_resolution,
                    },
                )
            })
            .collect();
        Self { models }
    }

    /// Table with no entries; every lookup returns the defaults.
    pub fn empty() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Built-in entries with `overrides` applied on top.
    pub fn with_overrides(overrides: &[QuirkOverride]) -> Self {
        let mut table = Self::builtin();
        for entry in overrides {
            let model = ModelId(entry.model);
            let quirks = table.models.entry(model).or_insert_with(|| ModelQuirks {
                model,
                name: format!("model {}", model),
                packet_size: DEFAULT_PACKET_SIZE,
                trigger_resolution: DEFAULT_TRIGGER_RESOLUTION,
            });
            if let Some(name) = &entry.name {
                quirks.name = name.clone();
            }
            if let Some(packet_size) = entry.packet_size {
                quirks.packet_size = packet_size;
            }
            if let Some(trigger_resolution) = entry.trigger_resolution {
                quirks.trigger_resolution = trigger_resolution;
            }
        }
        table
    }

    /// Packet size for `model`, or the default.
    pub fn packet_size(&self, model: ModelId) -> u32 {
        self.models
            .get(&model)
            .map_or(DEFAULT_PACKET_SIZE, |q| q.packet_size)
    }

    /// Trigger resolution for `model`, or the default.
    pub fn trigger_resolution(&self, model: ModelId) -> u32 {
        self.models
            .get(&model)
            .map_or(DEFAULT_TRIGGER_RESOLUTION, |q| q.trigger_resolution)
    }

    /// Entry for `model`, if listed.
    pub fn get(&self, model: ModelId) -> Option<&ModelQuirks> {
        self.models.get(&model)
    }

    /// All listed models, ordered by id.
    pub fn entries(&self) -> impl Iterator<Item = &ModelQuirks> {
        self.models.values()
    }
}

impl Default for QuirkTable {
    fn default() -> Self {
        Self::builtin()
    }
}
