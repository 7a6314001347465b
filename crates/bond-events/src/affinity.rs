//! Affinity Vocabulary
//!
//! Tiers, relationship levels, bond outcomes and hostile variants shared by the
//! engine and its consumers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Power class of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Most powerful; no lineage parent
    Primary,
    /// Mid tier; descends from a Primary
    Descendant,
    /// Weakest and most forgiving; descends from a Primary
    Junior,
}

impl Tier {
    /// Returns true if this tier must declare a lineage parent.
    pub fn requires_lineage(self) -> bool {
        !matches!(self, Tier::Primary)
    }

    /// Returns all tier variants.
    pub fn all() -> &'static [Tier] {
        &[Tier::Primary, Tier::Descendant, Tier::Junior]
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Primary => write!(f, "primary"),
            Tier::Descendant => write!(f, "descendant"),
            Tier::Junior => write!(f, "junior"),
        }
    }
}

/// Relationship level derived from points and betrayal history.
///
/// Ordered from worst to best; `Hostile` overrides the points-based bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffinityLevel {
    Hostile,
    Stranger,
    Acquainted,
    Bonded,
    Devoted,
    Ascended,
}

impl AffinityLevel {
    /// Returns all levels, worst first.
    pub fn all() -> &'static [AffinityLevel] {
        &[
            AffinityLevel::Hostile,
            AffinityLevel::Stranger,
            AffinityLevel::Acquainted,
            AffinityLevel::Bonded,
            AffinityLevel::Devoted,
            AffinityLevel::Ascended,
        ]
    }

    pub fn is_hostile(self) -> bool {
        matches!(self, AffinityLevel::Hostile)
    }
}

impl fmt::Display for AffinityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AffinityLevel::Hostile => "Hostile",
            AffinityLevel::Stranger => "Stranger",
            AffinityLevel::Acquainted => "Acquainted",
            AffinityLevel::Bonded => "Bonded",
            AffinityLevel::Devoted => "Devoted",
            AffinityLevel::Ascended => "Ascended",
        };
        f.write_str(name)
    }
}

/// How a bond session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondOutcome {
    /// Session still active
    #[default]
    None,
    /// Voluntary termination above the safety threshold
    CleanSever,
    /// Forced termination
    Break,
}

impl fmt::Display for BondOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BondOutcome::None => write!(f, "none"),
            BondOutcome::CleanSever => write!(f, "clean_sever"),
            BondOutcome::Break => write!(f, "break"),
        }
    }
}

/// Autonomous behavior an entity falls into after a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostileVariant {
    /// Hunts the nearest player
    Aggressive,
    /// Wanders randomly, sometimes lashing out in an area
    Chaotic,
    /// Pursues only the player who broke the bond
    Vengeful,
    /// Periodic area attacks regardless of targets
    Destructive,
}

impl fmt::Display for HostileVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostileVariant::Aggressive => write!(f, "aggressive"),
            HostileVariant::Chaotic => write!(f, "chaotic"),
            HostileVariant::Vengeful => write!(f, "vengeful"),
            HostileVariant::Destructive => write!(f, "destructive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(AffinityLevel::Hostile < AffinityLevel::Stranger);
        assert!(AffinityLevel::Devoted < AffinityLevel::Ascended);
        assert_eq!(AffinityLevel::all().len(), 6);
    }

    #[test]
    fn test_tier_lineage_requirement() {
        assert!(!Tier::Primary.requires_lineage());
        assert!(Tier::Descendant.requires_lineage());
        assert!(Tier::Junior.requires_lineage());
    }

    #[test]
    fn test_snake_case_serialization() {
        let json = serde_json::to_string(&BondOutcome::CleanSever).unwrap();
        assert_eq!(json, "\"clean_sever\"");
        let variant: HostileVariant = serde_json::from_str("\"vengeful\"").unwrap();
        assert_eq!(variant, HostileVariant::Vengeful);
    }
}
