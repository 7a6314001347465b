//! Engine error types.
//!
//! Only programmer errors surface here. Running out of resource mid-bond is a
//! normal transition handled by the session (a forced break), never an error.

use std::path::PathBuf;

use bond_events::{EntityId, PlayerId};
use thiserror::Error;

/// Reasons a command is rejected. A rejected command leaves state unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidOperation {
    #[error("unknown player '{0}'")]
    UnknownPlayer(PlayerId),
    #[error("unknown entity '{0}'")]
    UnknownEntity(EntityId),
    #[error("entity '{0}' is already bonded")]
    EntityAlreadyBonded(EntityId),
    #[error("player '{0}' already has an active bond")]
    PlayerAlreadyBonded(PlayerId),
    #[error("entity '{0}' is hostile and must be rebound first")]
    EntityHostile(EntityId),
    #[error("entity '{0}' is not hostile")]
    EntityNotHostile(EntityId),
    #[error("player '{0}' has no active bond")]
    NoActiveBond(PlayerId),
    #[error("ability of '{0}' is not unlocked")]
    AbilityLocked(EntityId),
    #[error("ability is cooling down for another {remaining:.1}s")]
    AbilityCoolingDown { remaining: f32 },
}

/// All engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BondError {
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] InvalidOperation),

    /// A policy declared without a required parameter, or with a non-positive one.
    #[error("policy misconfiguration for '{entity_id}': {reason}")]
    PolicyMisconfiguration { entity_id: EntityId, reason: String },

    /// A descriptor whose tier, lineage or rates are inconsistent.
    #[error("invalid descriptor '{entity_id}': {reason}")]
    InvalidDescriptor { entity_id: EntityId, reason: String },

    #[error("entity '{0}' is already registered")]
    DuplicateEntity(EntityId),

    #[error("player '{0}' is already registered")]
    DuplicatePlayer(PlayerId),

    /// Catalog file could not be parsed.
    #[error("catalog parse error: {0}")]
    Catalog(String),
}

impl BondError {
    /// Returns true for rejections of a command against current game state.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, BondError::InvalidOperation(_))
    }
}

pub type BondResult<T> = Result<T, BondError>;

/// Failures reading or writing a tuning file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read tuning file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed tuning: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize tuning: {0}")]
    Serialize(#[from] toml::ser::Error),
}
