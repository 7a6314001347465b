//! Configuration loading for the bond engine.
//!
//! Every tuning constant lives here so designers can rebalance without
//! recompiling. All sections default to the standard rules, so a TOML file
//! only needs to name what it overrides.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use bond_events::Tier;

use crate::error::ConfigError;

/// Default tuning file path
pub const DEFAULT_TUNING_PATH: &str = "bond_tuning.toml";

/// Resource: Complete engine configuration
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub tiers: TierConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub hostile: HostileConfig,
    #[serde(default)]
    pub ability: AbilityConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads from the given path, or falls back to defaults if it cannot be read.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(
                "Could not load {}: {}. Using defaults.",
                path.as_ref().display(),
                e
            );
            Self::default()
        })
    }
}

/// Relationship ledger tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Points per bonded second
    pub base_gain_rate: f32,
    /// Extra points per bonded second while compliant
    pub compliance_bonus_rate: f32,
    pub thresholds: LevelThresholds,
    pub cost_multipliers: CostMultipliers,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_gain_rate: 0.5,
            compliance_bonus_rate: 0.2,
            thresholds: LevelThresholds::default(),
            cost_multipliers: CostMultipliers::default(),
        }
    }
}

/// Point thresholds for each level bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    pub acquainted: f32,
    pub bonded: f32,
    pub devoted: f32,
    pub ascended: f32,
    /// Betrayals needed before the hostile override can apply
    pub hostile_betrayals: u32,
    /// Hostile override only applies below this many points
    pub hostile_points_below: f32,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            acquainted: 20.0,
            bonded: 40.0,
            devoted: 70.0,
            ascended: 100.0,
            hostile_betrayals: 3,
            hostile_points_below: 20.0,
        }
    }
}

/// Drain cost multiplier per level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostMultipliers {
    pub hostile: f32,
    pub stranger: f32,
    pub acquainted: f32,
    pub bonded: f32,
    pub devoted: f32,
    pub ascended: f32,
}

impl Default for CostMultipliers {
    fn default() -> Self {
        Self {
            hostile: 1.5,
            stranger: 1.0,
            acquainted: 0.9,
            bonded: 0.8,
            devoted: 0.65,
            ascended: 0.5,
        }
    }
}

/// Bond session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum resource fraction for a voluntary sever to be clean
    pub safe_sever_threshold: f32,
    /// Flat points granted on every clean sever
    pub clean_sever_bonus: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            safe_sever_threshold: 0.2,
            clean_sever_bonus: 5.0,
        }
    }
}

/// Numeric parameters that specialize shared logic per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProfile {
    /// Multiplier on the entity's base drain rate
    pub drain_discount: f32,
    /// Whether a break turns the entity hostile
    pub supports_hostile: bool,
    /// Points lost on a break
    pub betrayal_penalty: f32,
    /// Multiplier on compliance punishment damage
    pub punishment_scale: f32,
    /// Seconds between compliance checks; 0 evaluates every tick
    pub compliance_check_interval: f32,
    /// Fraction of bonded time credited to the lineage parent
    pub lineage_gain_fraction: f32,
    /// Multiplier on the entity's own credited bonded time
    pub gain_acceleration: f32,
    /// Points added on top of the standard clean-sever bonus
    pub extra_clean_sever_bonus: f32,
    /// Replace the declared policy with an always-satisfied one
    pub unconditional_compliance: bool,
}

impl TierProfile {
    pub fn primary() -> Self {
        Self {
            drain_discount: 1.0,
            supports_hostile: true,
            betrayal_penalty: 15.0,
            punishment_scale: 1.0,
            compliance_check_interval: 0.0,
            lineage_gain_fraction: 0.0,
            gain_acceleration: 1.0,
            extra_clean_sever_bonus: 0.0,
            unconditional_compliance: false,
        }
    }

    pub fn descendant() -> Self {
        Self {
            drain_discount: 0.8,
            supports_hostile: true,
            betrayal_penalty: 15.0,
            punishment_scale: 0.5,
            compliance_check_interval: 1.0,
            lineage_gain_fraction: 0.5,
            gain_acceleration: 1.0,
            extra_clean_sever_bonus: 0.0,
            unconditional_compliance: false,
        }
    }

    pub fn junior() -> Self {
        Self {
            drain_discount: 0.5,
            supports_hostile: false,
            betrayal_penalty: 5.0,
            punishment_scale: 1.0,
            compliance_check_interval: 0.0,
            lineage_gain_fraction: 0.3,
            gain_acceleration: 1.5,
            extra_clean_sever_bonus: 3.0,
            unconditional_compliance: true,
        }
    }
}

/// Tier profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub primary: TierProfile,
    pub descendant: TierProfile,
    pub junior: TierProfile,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            primary: TierProfile::primary(),
            descendant: TierProfile::descendant(),
            junior: TierProfile::junior(),
        }
    }
}

impl TierConfig {
    pub fn profile(&self, tier: Tier) -> &TierProfile {
        match tier {
            Tier::Primary => &self.primary,
            Tier::Descendant => &self.descendant,
            Tier::Junior => &self.junior,
        }
    }
}

/// Compliance evaluation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Minimum seconds between two Passive punishments
    pub passive_punish_cooldown: f32,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            passive_punish_cooldown: 1.0,
        }
    }
}

/// Hostile behavior tuning shared by all variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostileConfig {
    /// Seconds between nearest-target scans
    pub target_refresh_interval: f32,
    /// Distance at which a targeted attack lands
    pub contact_range: f32,
    /// Per-tick chance that a chaotic entity lurches in a random direction
    pub chaotic_move_probability: f32,
    /// Chance that a chaotic attack is an area attack
    pub chaotic_area_attack_probability: f32,
    /// Damage multiplier for chaotic area attacks
    pub area_damage_factor: f32,
    /// Radius multiplier (on detection radius) for chaotic area attacks
    pub area_radius_factor: f32,
    /// Fraction of attack damage dealt to a player whose rebind fails
    pub rebind_penalty_factor: f32,
}

impl Default for HostileConfig {
    fn default() -> Self {
        Self {
            target_refresh_interval: 0.5,
            contact_range: 1.5,
            chaotic_move_probability: 0.3,
            chaotic_area_attack_probability: 0.4,
            area_damage_factor: 0.5,
            area_radius_factor: 1.5,
            rebind_penalty_factor: 0.5,
        }
    }
}

/// Unlocked ability tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityConfig {
    /// Seconds between two activations by the same player
    pub cooldown: f32,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self { cooldown: 30.0 }
    }
}
