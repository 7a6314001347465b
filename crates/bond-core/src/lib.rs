//! Bond Engine
//!
//! Rules engine for temporary bonds between players and sentient entities.
//! A bond drains the player's vitality in exchange for power, the entity
//! judges the player's behavior against its policy, and the long-lived
//! relationship with each entity type shapes future costs. Broken bonds can
//! turn the entity hostile for a while.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod compliance;
pub mod components;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod hostile;
pub mod ledger;
pub mod session;
pub mod systems;

pub use components::*;

pub use compliance::{ComplianceEvaluator, CompliancePolicy, PolicyKind, PolicySpec, Verdict};
pub use config::{EngineConfig, TierProfile, DEFAULT_TUNING_PATH};
pub use context::{BondContext, EngineClock, EnvironmentHook, EnvironmentHooks};
pub use engine::BondEngine;
pub use error::{BondError, BondResult, ConfigError, InvalidOperation};
pub use events::{EventLog, EventObserver, EventQueue, SubscriptionId};
pub use hostile::{HostileArena, HostileInstance, Sighting, Strike};
pub use ledger::{classify_level, RelationshipLedger, RelationshipRecord, MAX_POINTS};
pub use session::{effective_drain_rate, BondSession, BondSessions};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
