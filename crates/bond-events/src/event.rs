//! Event Types
//!
//! Everything the engine announces to its observers. Events are wrapped in an
//! [`EventEnvelope`] carrying a sequential id and the engine time at which the
//! tick that produced them ran.

use serde::{Deserialize, Serialize};

use crate::affinity::{AffinityLevel, BondOutcome, HostileVariant, Tier};
use crate::ids::{EntityId, PlayerId, SessionId};

/// Engine time: the tick counter plus simulated seconds since start.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineTimestamp {
    pub tick: u64,
    pub time: f32,
}

impl EngineTimestamp {
    pub fn new(tick: u64, time: f32) -> Self {
        Self { tick, time }
    }
}

/// How a hostile strike was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Single target within contact range
    Targeted,
    /// Every player inside a radius
    Area,
    /// Backlash from a failed rebind attempt
    RebindBacklash,
}

/// Result of an attempt to rebind a hostile entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebindResult {
    Success,
    Failure,
}

/// Why a hostile instance returned to dormancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostileExitReason {
    /// The behavior duration elapsed
    Expired,
    /// A player successfully rebound the entity
    Rebound,
}

/// An engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BondEvent {
    BondStarted {
        session_id: SessionId,
        player_id: PlayerId,
        entity_id: EntityId,
        tier: Tier,
        drain_rate: f32,
    },
    BondEnded {
        session_id: SessionId,
        player_id: PlayerId,
        entity_id: EntityId,
        outcome: BondOutcome,
        duration: f32,
    },
    LevelChanged {
        entity_id: EntityId,
        previous: AffinityLevel,
        level: AffinityLevel,
    },
    AbilityUnlocked {
        entity_id: EntityId,
    },
    AbilityActivated {
        player_id: PlayerId,
        entity_id: EntityId,
    },
    CompliancePunished {
        player_id: PlayerId,
        entity_id: EntityId,
        damage: f32,
    },
    HostileEntered {
        entity_id: EntityId,
        variant: HostileVariant,
        betrayer: PlayerId,
    },
    HostileAttack {
        entity_id: EntityId,
        player_id: PlayerId,
        attack: AttackKind,
        damage: f32,
    },
    RebindAttempted {
        entity_id: EntityId,
        player_id: PlayerId,
        chance: f32,
        result: RebindResult,
    },
    HostileExited {
        entity_id: EntityId,
        reason: HostileExitReason,
    },
}

impl BondEvent {
    /// Short snake_case name of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            BondEvent::BondStarted { .. } => "bond_started",
            BondEvent::BondEnded { .. } => "bond_ended",
            BondEvent::LevelChanged { .. } => "level_changed",
            BondEvent::AbilityUnlocked { .. } => "ability_unlocked",
            BondEvent::AbilityActivated { .. } => "ability_activated",
            BondEvent::CompliancePunished { .. } => "compliance_punished",
            BondEvent::HostileEntered { .. } => "hostile_entered",
            BondEvent::HostileAttack { .. } => "hostile_attack",
            BondEvent::RebindAttempted { .. } => "rebind_attempted",
            BondEvent::HostileExited { .. } => "hostile_exited",
        }
    }

    /// The entity type this event concerns. Every event names one.
    pub fn entity_id(&self) -> &EntityId {
        match self {
            BondEvent::BondStarted { entity_id, .. }
            | BondEvent::BondEnded { entity_id, .. }
            | BondEvent::LevelChanged { entity_id, .. }
            | BondEvent::AbilityUnlocked { entity_id }
            | BondEvent::AbilityActivated { entity_id, .. }
            | BondEvent::CompliancePunished { entity_id, .. }
            | BondEvent::HostileEntered { entity_id, .. }
            | BondEvent::HostileAttack { entity_id, .. }
            | BondEvent::RebindAttempted { entity_id, .. }
            | BondEvent::HostileExited { entity_id, .. } => entity_id,
        }
    }

    /// The player this event concerns, if any.
    pub fn player_id(&self) -> Option<&PlayerId> {
        match self {
            BondEvent::BondStarted { player_id, .. }
            | BondEvent::BondEnded { player_id, .. }
            | BondEvent::AbilityActivated { player_id, .. }
            | BondEvent::CompliancePunished { player_id, .. }
            | BondEvent::HostileAttack { player_id, .. }
            | BondEvent::RebindAttempted { player_id, .. } => Some(player_id),
            BondEvent::HostileEntered { betrayer, .. } => Some(betrayer),
            BondEvent::LevelChanged { .. }
            | BondEvent::AbilityUnlocked { .. }
            | BondEvent::HostileExited { .. } => None,
        }
    }
}

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}

/// An event together with its id and the time it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub timestamp: EngineTimestamp,
    #[serde(flatten)]
    pub event: BondEvent,
}

impl EventEnvelope {
    pub fn new(sequence: u64, timestamp: EngineTimestamp, event: BondEvent) -> Self {
        Self {
            event_id: generate_event_id(sequence),
            timestamp,
            event,
        }
    }

    pub fn involves_entity(&self, entity_id: &EntityId) -> bool {
        self.event.entity_id() == entity_id
    }

    pub fn involves_player(&self, player_id: &PlayerId) -> bool {
        self.event.player_id() == Some(player_id)
    }

    /// Serializes to a single JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a single JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
