/*!
# Slot Module

Raw slot records as reported by the pool collector, and the canonical slot
configurations the catalog is built from.

A raw [`SlotRecord`] is a flat attribute map using HTCondor startd names.
Capacities arrive in native units (disk in KiB, memory in MiB) and are
converted to GiB when a record is turned into a [`SlotConfiguration`].
*/

use crate::error::{CrystalBallError, Result};
use crate::units::{kib_to_gib, mib_to_gib};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const ATTR_NODE: &str = "UtsnameNodename";
pub const ATTR_SLOT_TYPE: &str = "SlotType";
pub const ATTR_CPUS: &str = "TotalSlotCpus";
pub const ATTR_GPUS: &str = "TotalSlotGPUs";
pub const ATTR_DISK: &str = "TotalSlotDisk";
pub const ATTR_MEMORY: &str = "TotalSlotMemory";
pub const ATTR_SLOTS: &str = "TotalSlots";

/// Attributes requested from the collector
pub const PROJECTION: [&str; 7] = [
    ATTR_SLOT_TYPE,
    ATTR_NODE,
    ATTR_CPUS,
    ATTR_DISK,
    ATTR_MEMORY,
    ATTR_SLOTS,
    ATTR_GPUS,
];

/// One raw slot advertisement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub attributes: HashMap<String, String>,
}

impl SlotRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, dropping the quoting ClassAd strings carry
    pub fn with(mut self, key: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        let value = value.as_ref().trim().trim_matches('"').to_string();
        self.attributes.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Dynamic slots are ephemeral children of partitionable slots
    pub fn is_dynamic(&self) -> bool {
        self.get(ATTR_SLOT_TYPE) == Some("Dynamic")
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            CrystalBallError::MalformedSlotRecord(format!("missing attribute {}", key))
        })
    }

    fn number(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None | Some("") | Some("undefined") => Ok(None),
            Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
                CrystalBallError::MalformedSlotRecord(format!("{} is not numeric: {}", key, raw))
            }),
        }
    }

    fn required_number(&self, key: &str) -> Result<f64> {
        self.number(key)?.ok_or_else(|| {
            CrystalBallError::MalformedSlotRecord(format!("missing attribute {}", key))
        })
    }
}

/// How a slot hands out its capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotType {
    /// A fixed number of identically-sized whole allocations
    Static,
    /// Capacity divided among differently-sized jobs on demand
    Partitionable,
    /// Any slot advertising GPUs
    #[serde(rename = "GPU")]
    Gpu,
}

impl SlotType {
    /// Map a collector `SlotType` tag, without GPU reclassification
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "Static" => Ok(Self::Static),
            "Partitionable" | "Dynamic" => Ok(Self::Partitionable),
            "GPU" => Ok(Self::Gpu),
            other => Err(CrystalBallError::MalformedSlotRecord(format!(
                "unknown slot type {}",
                other
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Static => "Static",
            Self::Partitionable => "Partitionable",
            Self::Gpu => "GPU",
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fixed tuple two configurations are compared on.
///
/// GiB values are held in hundredths, matching the precision they are
/// rounded to when converted from native units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub slot_type: SlotType,
    pub cores: u32,
    pub memory_centi_gib: u64,
    pub disk_centi_gib: u64,
    pub gpus: u32,
    pub declared_slots: Option<u32>,
}

/// A distinct slot shape on a node, with the number of physical slots sharing it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfiguration {
    pub slot_type: SlotType,
    pub cores: u32,
    pub memory_gib: f64,
    pub disk_gib: f64,
    pub gpus: u32,
    /// Declared slot cardinality, only kept for static slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_slots: Option<u32>,
    pub repetition: u32,
}

impl SlotConfiguration {
    pub fn new(slot_type: SlotType, cores: u32, memory_gib: f64, disk_gib: f64) -> Self {
        Self {
            slot_type,
            cores,
            memory_gib,
            disk_gib,
            gpus: 0,
            declared_slots: None,
            repetition: 1,
        }
    }

    /// Set the GPU count; any GPUs turn the slot into a GPU slot
    pub fn with_gpus(mut self, gpus: u32) -> Self {
        self.gpus = gpus;
        if gpus != 0 {
            self.slot_type = SlotType::Gpu;
        }
        self
    }

    /// Set the declared slot count; ignored for non-static slots
    pub fn with_declared_slots(mut self, slots: u32) -> Self {
        if self.slot_type == SlotType::Static && slots > 0 {
            self.declared_slots = Some(slots);
        }
        self
    }

    pub fn with_repetition(mut self, repetition: u32) -> Self {
        self.repetition = repetition;
        self
    }

    pub fn key(&self) -> SlotKey {
        SlotKey {
            slot_type: self.slot_type,
            cores: self.cores,
            memory_centi_gib: to_centi(self.memory_gib),
            disk_centi_gib: to_centi(self.disk_gib),
            gpus: self.gpus,
            declared_slots: self.declared_slots,
        }
    }

    /// Whether two configurations describe the same physical slot shape
    pub fn same_shape(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl PartialEq for SlotConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.same_shape(other) && self.repetition == other.repetition
    }
}

fn to_centi(gib: f64) -> u64 {
    (gib.max(0.0) * 100.0).round() as u64
}

fn to_count(value: f64) -> u32 {
    value.max(0.0) as u32
}

impl TryFrom<&SlotRecord> for SlotConfiguration {
    type Error = CrystalBallError;

    fn try_from(record: &SlotRecord) -> Result<Self> {
        let slot_type = SlotType::from_tag(record.required(ATTR_SLOT_TYPE)?)?;
        let cores = to_count(record.required_number(ATTR_CPUS)?);
        let disk_gib = kib_to_gib(record.required_number(ATTR_DISK)?);
        let memory_gib = mib_to_gib(record.required_number(ATTR_MEMORY)?);
        let gpus = to_count(record.number(ATTR_GPUS)?.unwrap_or(0.0));

        let mut configuration =
            SlotConfiguration::new(slot_type, cores, memory_gib, disk_gib).with_gpus(gpus);

        if configuration.slot_type == SlotType::Static {
            let slots = record.required_number(ATTR_SLOTS)?;
            configuration = configuration.with_declared_slots(to_count(slots));
        }

        Ok(configuration)
    }
}
