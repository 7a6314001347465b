//! Shared helpers for the bond engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bond_core::{
    BondEngine, EngineConfig, EntityCatalog, EntityDef, HostileProfile, Position, Vitality,
};
use bond_events::{
    BondEvent, EntityId, HostileVariant, LedgerSnapshot, PlayerId, RelationshipSnapshot, Tier,
};

pub fn player(id: &str) -> PlayerId {
    PlayerId::from(id)
}

pub fn entity(id: &str) -> EntityId {
    EntityId::from(id)
}

/// A primary entity that always counts the player as compliant.
pub fn primary(id: &str, rate: f32, variant: HostileVariant) -> EntityDef {
    EntityDef::new(id, Tier::Primary, rate)
        .with_hostile(HostileProfile::new(variant, 5.0, 1.0, 2.0))
}

pub fn descendant(id: &str, parent: &str, rate: f32) -> EntityDef {
    EntityDef::new(id, Tier::Descendant, rate)
        .with_lineage(parent)
        .with_hostile(HostileProfile::new(HostileVariant::Aggressive, 5.0, 1.0, 2.0))
}

pub fn junior(id: &str, parent: &str, rate: f32) -> EntityDef {
    EntityDef::new(id, Tier::Junior, rate).with_lineage(parent)
}

pub fn engine_with(defs: Vec<EntityDef>, seed: u64) -> BondEngine {
    let config = EngineConfig::default();
    let catalog = EntityCatalog::from_defs(defs, &config.tiers).expect("valid catalog");
    BondEngine::new(config, catalog, seed)
}

/// Adds a player with full vitality at the origin.
pub fn add_player(engine: &mut BondEngine, id: &str, max: f32) -> PlayerId {
    engine
        .spawn_player(id, Vitality::full(max), Position::new(0.0, 0.0))
        .expect("new player");
    player(id)
}

/// Collects every dispatched event.
pub fn record_events(engine: &mut BondEngine) -> Arc<Mutex<Vec<BondEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    engine.subscribe(move |envelope| sink.lock().unwrap().push(envelope.event.clone()));
    events
}

pub fn snapshot_with(entity_id: &str, points: f32, betrayals: u32, unlocked: bool) -> LedgerSnapshot {
    let mut snapshot = LedgerSnapshot::new();
    snapshot.insert(
        entity(entity_id),
        RelationshipSnapshot {
            points,
            betrayal_count: betrayals,
            successful_bond_count: 0,
            cumulative_bonded_time: 0.0,
            ability_unlocked: unlocked,
        },
    );
    snapshot
}

pub fn count(events: &Arc<Mutex<Vec<BondEvent>>>, name: &str) -> usize {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.name() == name)
        .count()
}
