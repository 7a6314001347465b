//! Snapshot Types
//!
//! Serialization structs for the persisted relationship ledger.
//!
//! The engine never writes files itself; hosts take a [`LedgerSnapshot`] and
//! store it however they like. Field semantics must survive the round trip
//! exactly, so these structs mirror the ledger's record one-to-one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::EntityId;

/// Persisted relationship record for one entity type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationshipSnapshot {
    /// Affinity points, 0..=100
    pub points: f32,
    #[serde(default)]
    pub betrayal_count: u32,
    #[serde(default)]
    pub successful_bond_count: u32,
    /// Total seconds spent bonded (including lineage credit)
    #[serde(default)]
    pub cumulative_bonded_time: f32,
    /// Sticky once points have reached 100
    #[serde(default)]
    pub ability_unlocked: bool,
}

/// Persisted ledger: entity id → record, in stable key order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerSnapshot {
    pub records: BTreeMap<EntityId, RelationshipSnapshot>,
}

impl LedgerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity_id: EntityId, record: RelationshipSnapshot) {
        self.records.insert(entity_id, record);
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&RelationshipSnapshot> {
        self.records.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
