//! Entity Descriptors
//!
//! Immutable definitions of bondable entity types and the catalog that holds
//! them. Descriptors are validated when built, so a misconfigured policy or a
//! broken lineage fails at load time rather than mid-bond.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use bond_events::{EntityId, HostileVariant, Tier};

use crate::compliance::{CompliancePolicy, PolicySpec};
use crate::config::{TierConfig, TierProfile};
use crate::error::{BondError, BondResult};

/// How an entity behaves once its bond breaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostileProfile {
    pub variant: HostileVariant,
    /// Seconds the entity stays hostile
    pub duration: f32,
    /// Minimum seconds between attacks
    pub attack_interval: f32,
    pub damage: f32,
    pub detection_radius: f32,
    /// Units per second
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
}

fn default_move_speed() -> f32 {
    3.0
}

impl HostileProfile {
    pub fn new(variant: HostileVariant, duration: f32, attack_interval: f32, damage: f32) -> Self {
        Self {
            variant,
            duration,
            attack_interval,
            damage,
            detection_radius: 10.0,
            move_speed: default_move_speed(),
        }
    }

    pub fn with_detection_radius(mut self, radius: f32) -> Self {
        self.detection_radius = radius;
        self
    }

    pub fn with_move_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    fn validate(&self, entity_id: &EntityId) -> BondResult<()> {
        let checks = [
            ("duration", self.duration),
            ("attack_interval", self.attack_interval),
            ("detection_radius", self.detection_radius),
        ];
        for (name, value) in checks {
            if !(value > 0.0) {
                return Err(BondError::InvalidDescriptor {
                    entity_id: entity_id.clone(),
                    reason: format!("hostile {} must be positive", name),
                });
            }
        }
        if self.damage < 0.0 || self.move_speed < 0.0 {
            return Err(BondError::InvalidDescriptor {
                entity_id: entity_id.clone(),
                reason: "hostile damage and move_speed must not be negative".into(),
            });
        }
        Ok(())
    }
}

/// Validated, immutable definition of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub id: EntityId,
    pub name: String,
    pub tier: Tier,
    /// Primary this entity descends from (Descendant and Junior only)
    pub lineage: Option<EntityId>,
    /// Resource per second before discounts
    pub base_drain_rate: f32,
    /// Tier parameters captured when the descriptor was built
    pub profile: TierProfile,
    /// Effective policy (Junior tiers are already replaced by Unconditional)
    pub policy: CompliancePolicy,
    /// Present for every tier that can turn hostile
    pub hostile: Option<HostileProfile>,
}

impl EntityDescriptor {
    pub fn tier_discount(&self) -> f32 {
        self.profile.drain_discount
    }

    pub fn supports_hostile(&self) -> bool {
        self.profile.supports_hostile && self.hostile.is_some()
    }
}

/// Unvalidated entity definition, as written in a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    pub tier: Tier,
    #[serde(default)]
    pub lineage: Option<EntityId>,
    pub base_drain_rate: f32,
    #[serde(default)]
    pub policy: PolicySpec,
    #[serde(default)]
    pub hostile: Option<HostileProfile>,
}

impl EntityDef {
    pub fn new(id: impl Into<EntityId>, tier: Tier, base_drain_rate: f32) -> Self {
        Self {
            id: id.into(),
            name: None,
            tier,
            lineage: None,
            base_drain_rate,
            policy: PolicySpec::default(),
            hostile: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_lineage(mut self, parent: impl Into<EntityId>) -> Self {
        self.lineage = Some(parent.into());
        self
    }

    pub fn with_policy(mut self, policy: PolicySpec) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_hostile(mut self, hostile: HostileProfile) -> Self {
        self.hostile = Some(hostile);
        self
    }

    /// Validates the definition against the tier rules.
    pub fn build(self, tiers: &TierConfig) -> BondResult<EntityDescriptor> {
        let invalid = |reason: &str| BondError::InvalidDescriptor {
            entity_id: self.id.clone(),
            reason: reason.to_string(),
        };

        if !(self.base_drain_rate > 0.0) {
            return Err(invalid("base_drain_rate must be positive"));
        }
        match (self.tier.requires_lineage(), &self.lineage) {
            (true, None) => return Err(invalid("descendant and junior tiers require a lineage")),
            (false, Some(_)) => return Err(invalid("primary tier cannot declare a lineage")),
            (true, Some(parent)) if *parent == self.id => {
                return Err(invalid("an entity cannot descend from itself"))
            }
            _ => {}
        }

        let profile = tiers.profile(self.tier).clone();

        // The declared policy is validated even when the tier overrides it, so
        // a broken catalog entry never goes unnoticed.
        let declared = CompliancePolicy::from_spec(&self.id, &self.policy)?;
        let policy = if profile.unconditional_compliance {
            CompliancePolicy::Unconditional
        } else {
            declared
        };

        let hostile = if profile.supports_hostile {
            let hostile = self
                .hostile
                .clone()
                .ok_or_else(|| invalid("tier supports hostile behavior but no profile is set"))?;
            hostile.validate(&self.id)?;
            Some(hostile)
        } else {
            None
        };

        Ok(EntityDescriptor {
            name: self.name.clone().unwrap_or_else(|| self.id.to_string()),
            id: self.id,
            tier: self.tier,
            lineage: self.lineage,
            base_drain_rate: self.base_drain_rate,
            profile,
            policy,
            hostile,
        })
    }
}

/// Catalog file layout: a list of `[[entity]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub entity: Vec<EntityDef>,
}

/// Resource: Every registered entity type
#[derive(Resource, Debug, Default, Clone)]
pub struct EntityCatalog {
    entities: HashMap<EntityId, EntityDescriptor>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor. A lineage parent must already be registered
    /// and must be a Primary.
    pub fn register(&mut self, descriptor: EntityDescriptor) -> BondResult<()> {
        if self.entities.contains_key(&descriptor.id) {
            return Err(BondError::DuplicateEntity(descriptor.id));
        }
        if let Some(parent_id) = &descriptor.lineage {
            match self.entities.get(parent_id) {
                Some(parent) if parent.tier == Tier::Primary => {}
                Some(_) => {
                    return Err(BondError::InvalidDescriptor {
                        entity_id: descriptor.id.clone(),
                        reason: format!("lineage parent '{}' is not a primary", parent_id),
                    })
                }
                None => {
                    return Err(BondError::InvalidDescriptor {
                        entity_id: descriptor.id.clone(),
                        reason: format!("lineage parent '{}' is not registered", parent_id),
                    })
                }
            }
        }
        self.entities.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Builds and registers a set of definitions. Primaries are registered
    /// first so children may appear before their parent in the list.
    pub fn from_defs(defs: Vec<EntityDef>, tiers: &TierConfig) -> BondResult<Self> {
        let mut catalog = Self::new();
        let (primaries, children): (Vec<_>, Vec<_>) =
            defs.into_iter().partition(|d| d.tier == Tier::Primary);
        for def in primaries.into_iter().chain(children) {
            catalog.register(def.build(tiers)?)?;
        }
        Ok(catalog)
    }

    /// Parses a TOML catalog.
    pub fn from_toml_str(content: &str, tiers: &TierConfig) -> BondResult<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| BondError::Catalog(e.to_string()))?;
        Self::from_defs(file.entity, tiers)
    }

    /// Loads a TOML catalog from disk.
    pub fn from_file(path: &Path, tiers: &TierConfig) -> BondResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BondError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content, tiers)
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityDescriptor> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::PolicyKind;

    fn wraith() -> EntityDef {
        EntityDef::new("ember_wraith", Tier::Primary, 10.0)
            .with_policy(PolicySpec::aggressive(3.0, 4.0))
            .with_hostile(HostileProfile::new(HostileVariant::Vengeful, 60.0, 2.0, 8.0))
    }

    #[test]
    fn test_build_primary() {
        let descriptor = wraith().build(&TierConfig::default()).unwrap();
        assert_eq!(descriptor.tier_discount(), 1.0);
        assert!(descriptor.supports_hostile());
        assert_eq!(descriptor.name, "ember_wraith");
    }

    #[test]
    fn test_junior_policy_becomes_unconditional() {
        let descriptor = EntityDef::new("ash_sprite", Tier::Junior, 4.0)
            .with_lineage("ember_wraith")
            .with_policy(PolicySpec::aggressive(3.0, 4.0))
            .build(&TierConfig::default())
            .unwrap();
        assert_eq!(descriptor.policy, CompliancePolicy::Unconditional);
        assert!(!descriptor.supports_hostile());
        assert_eq!(descriptor.tier_discount(), 0.5);
    }

    #[test]
    fn test_missing_policy_parameter_fails_fast() {
        let mut spec = PolicySpec::of(PolicyKind::Rhythmic);
        spec.tolerance = Some(0.3);
        spec.punish_damage = Some(2.0);

        let err = wraith()
            .with_policy(spec)
            .build(&TierConfig::default())
            .unwrap_err();
        assert!(matches!(err, BondError::PolicyMisconfiguration { .. }));
    }

    #[test]
    fn test_lineage_rules() {
        let tiers = TierConfig::default();

        let orphan = EntityDef::new("cinder_child", Tier::Descendant, 5.0)
            .with_hostile(HostileProfile::new(HostileVariant::Chaotic, 30.0, 1.0, 4.0));
        assert!(matches!(
            orphan.build(&tiers),
            Err(BondError::InvalidDescriptor { .. })
        ));

        let with_parent = wraith().with_lineage("someone");
        assert!(with_parent.build(&tiers).is_err());
    }

    #[test]
    fn test_hostile_tier_requires_profile() {
        let def = EntityDef::new("bare", Tier::Primary, 10.0);
        assert!(matches!(
            def.build(&TierConfig::default()),
            Err(BondError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_catalog_registration_order_and_duplicates() {
        let tiers = TierConfig::default();
        let child = EntityDef::new("cinder_child", Tier::Descendant, 5.0)
            .with_lineage("ember_wraith")
            .with_hostile(HostileProfile::new(HostileVariant::Chaotic, 30.0, 1.0, 4.0));

        let catalog = EntityCatalog::from_defs(vec![child.clone(), wraith()], &tiers).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.ids(),
            vec![EntityId::from("cinder_child"), EntityId::from("ember_wraith")]
        );

        let mut catalog = catalog;
        let err = catalog.register(wraith().build(&tiers).unwrap()).unwrap_err();
        assert!(matches!(err, BondError::DuplicateEntity(_)));
    }

    #[test]
    fn test_catalog_from_toml() {
        let toml = r#"
            [[entity]]
            id = "ember_wraith"
            name = "Ember Wraith"
            tier = "primary"
            base_drain_rate = 10.0
            [entity.policy]
            kind = "passive"
            aggression_threshold = 2.0
            punish_damage = 3.0
            [entity.hostile]
            variant = "aggressive"
            duration = 45.0
            attack_interval = 1.5
            damage = 6.0
            detection_radius = 12.0

            [[entity]]
            id = "ash_sprite"
            tier = "junior"
            lineage = "ember_wraith"
            base_drain_rate = 4.0
        "#;

        let catalog = EntityCatalog::from_toml_str(toml, &TierConfig::default()).unwrap();
        let wraith = catalog.get(&EntityId::from("ember_wraith")).unwrap();
        assert_eq!(wraith.name, "Ember Wraith");
        assert_eq!(wraith.hostile.as_ref().unwrap().move_speed, 3.0);
        assert!(catalog.contains(&EntityId::from("ash_sprite")));
    }
}
