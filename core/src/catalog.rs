/*!
# Catalog Module

The slot catalog: every node of the pool with the distinct slot shapes it
offers, each annotated with how many physical slots share that shape.

The collector reports one record per physical slot. Identical records on a
node are folded into a single [`SlotConfiguration`] whose `repetition`
counts them, so the fit of a shape is evaluated once and then multiplied
out instead of being re-evaluated for every copy.

A catalog can be written to and read back from a JSON snapshot, which
stands in for a live collector query.
*/

use crate::error::{CrystalBallError, Result};
use crate::slot::{SlotConfiguration, SlotRecord, ATTR_NODE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// The distinct slot shapes of one node, in first-seen order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSlots {
    pub node: String,
    pub slots: Vec<SlotConfiguration>,
}

impl NodeSlots {
    fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            slots: Vec::new(),
        }
    }

    /// Fold `repetition` more slots of this shape into the node
    fn absorb(&mut self, configuration: SlotConfiguration) {
        match self
            .slots
            .iter_mut()
            .find(|existing| existing.same_shape(&configuration))
        {
            Some(existing) => existing.repetition += configuration.repetition,
            None => self.slots.push(configuration),
        }
    }

    /// Number of physical slots on this node
    pub fn physical_slots(&self) -> u32 {
        self.slots.iter().map(|slot| slot.repetition).sum()
    }
}

/// Deduplicated, counted slot catalog of a pool.
///
/// Only [`Catalog::from_json`] reads a catalog back, so the node index is
/// always rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub collected_at: DateTime<Utc>,
    pub nodes: Vec<NodeSlots>,

    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// On-disk form of a catalog
#[derive(Deserialize)]
struct Snapshot {
    collected_at: DateTime<Utc>,
    nodes: Vec<NodeSlots>,
}

/// Rebuild a configuration through its builders, so hand-edited entries
/// get the same classification as collected ones
fn normalize(slot: SlotConfiguration) -> SlotConfiguration {
    let mut normalized =
        SlotConfiguration::new(slot.slot_type, slot.cores, slot.memory_gib, slot.disk_gib)
            .with_gpus(slot.gpus);
    if let Some(slots) = slot.declared_slots {
        normalized = normalized.with_declared_slots(slots);
    }
    normalized.with_repetition(slot.repetition)
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog stamped with the current time
    pub fn new() -> Self {
        Self {
            collected_at: Utc::now(),
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a catalog from raw slot records.
    ///
    /// Records that cannot be read are skipped with a warning; dynamic
    /// slots never reach the catalog.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a SlotRecord>) -> Self {
        let mut catalog = Self::new();
        let mut skipped = 0usize;

        for record in records {
            if record.is_dynamic() {
                continue;
            }
            if let Err(e) = catalog.add_record(record) {
                warn!("Skipping slot record: {}", e);
                skipped += 1;
            }
        }

        info!(
            "Built slot catalog: {} nodes, {} distinct configurations, {} physical slots ({} skipped)",
            catalog.nodes.len(),
            catalog.configuration_count(),
            catalog.physical_slots(),
            skipped
        );

        catalog
    }

    /// Add one raw record to the catalog
    pub fn add_record(&mut self, record: &SlotRecord) -> Result<()> {
        let node = record
            .get(ATTR_NODE)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                CrystalBallError::MalformedSlotRecord(format!("missing attribute {}", ATTR_NODE))
            })?
            .to_string();
        let configuration = SlotConfiguration::try_from(record)?;
        self.insert(node, configuration);
        Ok(())
    }

    /// Insert a configuration for a node, merging with an equal shape
    pub fn insert(&mut self, node: impl Into<String>, configuration: SlotConfiguration) {
        let node = node.into();
        let position = match self.index.get(&node) {
            Some(position) => *position,
            None => {
                self.nodes.push(NodeSlots::new(node.clone()));
                let position = self.nodes.len() - 1;
                self.index.insert(node.clone(), position);
                position
            }
        };

        debug!(
            "Adding {} slot ({} cores, {} GiB) x{} on {}",
            configuration.slot_type,
            configuration.cores,
            configuration.memory_gib,
            configuration.repetition,
            node
        );
        self.nodes[position].absorb(configuration);
    }

    /// Slot shapes of a single node
    pub fn node(&self, name: &str) -> Option<&NodeSlots> {
        self.index.get(name).map(|position| &self.nodes[*position])
    }

    /// Iterate every configuration with the node it belongs to
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotConfiguration)> {
        self.nodes.iter().flat_map(|node| {
            node.slots
                .iter()
                .map(move |slot| (node.node.as_str(), slot))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn configuration_count(&self) -> usize {
        self.nodes.iter().map(|node| node.slots.len()).sum()
    }

    pub fn physical_slots(&self) -> u32 {
        self.nodes.iter().map(NodeSlots::physical_slots).sum()
    }

    /// Serialize the catalog to a JSON snapshot
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CrystalBallError::Snapshot(e.to_string()))
    }

    /// Read a catalog back from a JSON snapshot.
    ///
    /// Every configuration goes through the same merge path as raw records,
    /// so duplicated shapes in an edited snapshot fold into one entry.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| CrystalBallError::Snapshot(e.to_string()))?;

        let mut catalog = Catalog {
            collected_at: snapshot.collected_at,
            ..Catalog::new()
        };

        for node in snapshot.nodes {
            for slot in node.slots {
                if slot.repetition == 0 {
                    return Err(CrystalBallError::Snapshot(format!(
                        "slot on {} has a repetition of 0",
                        node.node
                    )));
                }
                catalog.insert(node.node.clone(), normalize(slot));
            }
        }

        Ok(catalog)
    }

    /// Write the snapshot to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!("Wrote slot catalog snapshot to {}", path.display());
        Ok(())
    }

    /// Load a snapshot written by [`Catalog::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        debug!("Loaded slot catalog snapshot from {}", path.display());
        Self::from_json(&json)
    }
}
