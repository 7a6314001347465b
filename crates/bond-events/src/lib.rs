//! Shared event types and serialization for the bond engine.
//!
//! This crate contains pure data structures with no engine logic.
//! It is a dependency for every other crate in the workspace and for hosts
//! that only consume the engine's events or persisted ledger.

pub mod affinity;
pub mod event;
pub mod ids;
pub mod snapshot;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export identifier types
pub use ids::{EntityId, PlayerId, SessionId};

// Re-export affinity vocabulary
pub use affinity::{AffinityLevel, BondOutcome, HostileVariant, Tier};

// Re-export event types
pub use event::{
    generate_event_id, AttackKind, BondEvent, EngineTimestamp, EventEnvelope, HostileExitReason,
    RebindResult,
};

// Re-export snapshot types
pub use snapshot::{LedgerSnapshot, RelationshipSnapshot};
