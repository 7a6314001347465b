//! Sample data fixtures for testing.
//!
//! Compiled for this crate's own tests, and for other crates through the
//! `test-fixtures` feature.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // bond-events = { path = "../bond-events", features = ["test-fixtures"] }
//!
//! use bond_events::fixtures;
//!
//! let events = fixtures::sample_events();
//! let ledger = fixtures::sample_ledger();
//! ```

use crate::{EntityId, EventEnvelope, LedgerSnapshot};

/// Returns sample events from the fixtures file.
///
/// One Primary bond that breaks, turns the entity hostile (vengeful), survives
/// a failed rebind and finally expires.
pub fn sample_events() -> Vec<EventEnvelope> {
    let jsonl = include_str!("../tests/fixtures/sample_events.jsonl");
    jsonl
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            EventEnvelope::from_jsonl(l).unwrap_or_else(|e| {
                panic!("Failed to parse event line: {}\nError: {}", l, e)
            })
        })
        .collect()
}

/// Returns a sample persisted ledger.
///
/// Contains:
/// - `ember_wraith`: hostile (3 betrayals, 17.5 points), ability still unlocked
/// - `cinder_child`: bonded at 44 points
/// - `ash_sprite`: ascended
pub fn sample_ledger() -> LedgerSnapshot {
    let json = include_str!("../tests/fixtures/sample_ledger.json");
    LedgerSnapshot::from_json(json).expect("Failed to parse sample_ledger.json")
}

/// Returns all sample events concerning the given entity.
pub fn events_for(entity_id: &str) -> Vec<EventEnvelope> {
    let id = EntityId::from(entity_id);
    sample_events()
        .into_iter()
        .filter(|e| e.involves_entity(&id))
        .collect()
}
