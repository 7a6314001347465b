//! Relationship Ledger
//!
//! Long-lived affinity per entity type. Records are created lazily on first
//! access and live until an explicit reset. Level is never stored: it is
//! recomputed from (points, betrayal_count) after every mutation, and level
//! transitions are queued as events for the tick driver to publish.
//!
//! The ledger is the single write path for affinity. Lineage propagation,
//! clean-sever bonuses and betrayals from concurrent sessions all go through
//! its `&mut self` methods, so the tick driver serializes every write.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use bond_events::{
    AffinityLevel, BondEvent, EntityId, LedgerSnapshot, RelationshipSnapshot,
};

use crate::config::{CostMultipliers, LedgerConfig, LevelThresholds};

/// Upper bound of relationship points.
pub const MAX_POINTS: f32 = 100.0;

/// Affinity state for one entity type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationshipRecord {
    /// Always within 0..=100
    pub points: f32,
    /// Monotonic until reset
    pub betrayal_count: u32,
    pub successful_bond_count: u32,
    pub cumulative_bonded_time: f32,
    /// Sticky once points have reached 100
    pub ability_unlocked: bool,
}

impl RelationshipRecord {
    pub fn level(&self, thresholds: &LevelThresholds) -> AffinityLevel {
        classify_level(self.points, self.betrayal_count, thresholds)
    }

    fn to_snapshot(&self) -> RelationshipSnapshot {
        RelationshipSnapshot {
            points: self.points,
            betrayal_count: self.betrayal_count,
            successful_bond_count: self.successful_bond_count,
            cumulative_bonded_time: self.cumulative_bonded_time,
            ability_unlocked: self.ability_unlocked,
        }
    }

    fn from_snapshot(snapshot: &RelationshipSnapshot) -> Self {
        Self {
            points: clamp_points(snapshot.points),
            betrayal_count: snapshot.betrayal_count,
            successful_bond_count: snapshot.successful_bond_count,
            cumulative_bonded_time: snapshot.cumulative_bonded_time.max(0.0),
            ability_unlocked: snapshot.ability_unlocked,
        }
    }
}

/// Classifies a relationship. Pure: equal inputs always give equal levels.
pub fn classify_level(points: f32, betrayal_count: u32, t: &LevelThresholds) -> AffinityLevel {
    if betrayal_count >= t.hostile_betrayals && points < t.hostile_points_below {
        AffinityLevel::Hostile
    } else if points >= t.ascended {
        AffinityLevel::Ascended
    } else if points >= t.devoted {
        AffinityLevel::Devoted
    } else if points >= t.bonded {
        AffinityLevel::Bonded
    } else if points >= t.acquainted {
        AffinityLevel::Acquainted
    } else {
        AffinityLevel::Stranger
    }
}

/// Drain multiplier for a level.
pub fn level_cost_multiplier(level: AffinityLevel, m: &CostMultipliers) -> f32 {
    match level {
        AffinityLevel::Hostile => m.hostile,
        AffinityLevel::Stranger => m.stranger,
        AffinityLevel::Acquainted => m.acquainted,
        AffinityLevel::Bonded => m.bonded,
        AffinityLevel::Devoted => m.devoted,
        AffinityLevel::Ascended => m.ascended,
    }
}

/// Lower and upper point bounds of a level's bucket.
fn bucket_bounds(level: AffinityLevel, t: &LevelThresholds) -> (f32, f32) {
    match level {
        AffinityLevel::Hostile => (0.0, t.hostile_points_below),
        AffinityLevel::Stranger => (0.0, t.acquainted),
        AffinityLevel::Acquainted => (t.acquainted, t.bonded),
        AffinityLevel::Bonded => (t.bonded, t.devoted),
        AffinityLevel::Devoted => (t.devoted, t.ascended),
        AffinityLevel::Ascended => (t.ascended, t.ascended),
    }
}

fn clamp_points(points: f32) -> f32 {
    if points.is_nan() {
        0.0
    } else {
        points.clamp(0.0, MAX_POINTS)
    }
}

/// Resource: Affinity records for every entity type
#[derive(Resource, Debug, Default)]
pub struct RelationshipLedger {
    records: HashMap<EntityId, RelationshipRecord>,
    config: LedgerConfig,
    outbox: Vec<BondEvent>,
}

impl RelationshipLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            records: HashMap::new(),
            config,
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Returns the record, creating a zeroed one on first access.
    pub fn get(&mut self, entity_id: &EntityId) -> &RelationshipRecord {
        self.entry(entity_id)
    }

    /// Returns the record without creating it; unknown ids read as zeroed.
    pub fn record(&self, entity_id: &EntityId) -> RelationshipRecord {
        self.records.get(entity_id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.records.contains_key(entity_id)
    }

    pub fn level(&self, entity_id: &EntityId) -> AffinityLevel {
        match self.records.get(entity_id) {
            Some(record) => record.level(&self.config.thresholds),
            None => classify_level(0.0, 0, &self.config.thresholds),
        }
    }

    /// Continuous affinity accrual for `elapsed` bonded seconds.
    pub fn add_continuous_gain(&mut self, entity_id: &EntityId, elapsed: f32, compliant: bool) {
        let elapsed = elapsed.max(0.0);
        let mut gain = self.config.base_gain_rate * elapsed;
        if compliant {
            gain += self.config.compliance_bonus_rate * elapsed;
        }
        self.entry(entity_id).cumulative_bonded_time += elapsed;
        self.adjust_points(entity_id, gain);
    }

    /// One-off affinity bonus (e.g. a clean sever).
    pub fn add_flat_gain(&mut self, entity_id: &EntityId, amount: f32) {
        self.adjust_points(entity_id, amount);
    }

    /// Records a betrayal and removes `penalty` points.
    pub fn apply_betrayal(&mut self, entity_id: &EntityId, penalty: f32) {
        let before = self.level(entity_id);
        let thresholds = self.config.thresholds.clone();
        let record = self.entry(entity_id);
        record.betrayal_count += 1;
        record.points = clamp_points(record.points - penalty.max(0.0));
        let after = record.level(&thresholds);
        tracing::debug!(
            "Betrayal recorded for {} ({} total)",
            entity_id,
            record.betrayal_count
        );
        self.note_transition(entity_id, before, after);
    }

    pub fn record_successful_bond(&mut self, entity_id: &EntityId) {
        self.entry(entity_id).successful_bond_count += 1;
    }

    pub fn cost_multiplier(&self, entity_id: &EntityId) -> f32 {
        level_cost_multiplier(self.level(entity_id), &self.config.cost_multipliers)
    }

    /// Progress through the current level's bucket, 0..=1. Ascended is 1.
    pub fn progress_to_next_level(&self, entity_id: &EntityId) -> f32 {
        let level = self.level(entity_id);
        if level == AffinityLevel::Ascended {
            return 1.0;
        }
        let (lower, upper) = bucket_bounds(level, &self.config.thresholds);
        if upper <= lower {
            return 1.0;
        }
        let points = self.record(entity_id).points;
        ((points - lower) / (upper - lower)).clamp(0.0, 1.0)
    }

    /// Points as a percentage of the maximum.
    pub fn relationship_percentage(&self, entity_id: &EntityId) -> f32 {
        self.record(entity_id).points / MAX_POINTS * 100.0
    }

    pub fn is_ability_unlocked(&self, entity_id: &EntityId) -> bool {
        self.records
            .get(entity_id)
            .is_some_and(|r| r.ability_unlocked)
    }

    /// Human-readable one-line summary for debugging.
    pub fn affinity_summary(&self, entity_id: &EntityId) -> String {
        let record = self.record(entity_id);
        format!(
            "{}: {} ({:.1}/100, {:.0}% to next) | betrayals {} | bonds {} | bonded {:.1}s | ability {} | cost x{:.2}",
            entity_id,
            self.level(entity_id),
            record.points,
            self.progress_to_next_level(entity_id) * 100.0,
            record.betrayal_count,
            record.successful_bond_count,
            record.cumulative_bonded_time,
            if record.ability_unlocked { "unlocked" } else { "locked" },
            self.cost_multiplier(entity_id),
        )
    }

    /// Forgets everything about one entity type, including betrayals.
    pub fn reset(&mut self, entity_id: &EntityId) {
        let before = self.level(entity_id);
        if self.records.remove(entity_id).is_some() {
            let after = self.level(entity_id);
            self.note_transition(entity_id, before, after);
        }
    }

    /// Forgets every record. No level events are emitted.
    pub fn reset_all(&mut self) {
        self.records.clear();
    }

    /// Exports every record for persistence.
    pub fn export(&self) -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::new();
        for (id, record) in &self.records {
            snapshot.insert(id.clone(), record.to_snapshot());
        }
        snapshot
    }

    /// Replaces all records with a persisted snapshot. Points are clamped.
    pub fn import(&mut self, snapshot: &LedgerSnapshot) {
        self.records = snapshot
            .records
            .iter()
            .map(|(id, s)| (id.clone(), RelationshipRecord::from_snapshot(s)))
            .collect();
    }

    /// Takes queued level events in emission order.
    pub fn drain_events(&mut self) -> Vec<BondEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn entry(&mut self, entity_id: &EntityId) -> &mut RelationshipRecord {
        self.records.entry(entity_id.clone()).or_default()
    }

    fn adjust_points(&mut self, entity_id: &EntityId, delta: f32) {
        let before = self.level(entity_id);
        let thresholds = self.config.thresholds.clone();
        let record = self.entry(entity_id);
        record.points = clamp_points(record.points + delta);
        let after = record.level(&thresholds);
        self.note_transition(entity_id, before, after);
    }

    fn note_transition(&mut self, entity_id: &EntityId, before: AffinityLevel, after: AffinityLevel) {
        if before == after {
            return;
        }
        tracing::info!("{} affinity {} -> {}", entity_id, before, after);
        self.outbox.push(BondEvent::LevelChanged {
            entity_id: entity_id.clone(),
            previous: before,
            level: after,
        });
        if after == AffinityLevel::Ascended {
            self.entry(entity_id).ability_unlocked = true;
            tracing::info!("{} ability unlocked", entity_id);
            self.outbox.push(BondEvent::AbilityUnlocked {
                entity_id: entity_id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> RelationshipLedger {
        RelationshipLedger::new(LedgerConfig::default())
    }

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    #[test]
    fn test_lazy_zeroed_record() {
        let mut ledger = ledger();
        assert!(!ledger.contains(&id("ember_wraith")));
        let record = ledger.get(&id("ember_wraith")).clone();
        assert_eq!(record, RelationshipRecord::default());
        assert!(ledger.contains(&id("ember_wraith")));
        assert_eq!(ledger.level(&id("ember_wraith")), AffinityLevel::Stranger);
    }

    #[test]
    fn test_continuous_gain_with_and_without_compliance() {
        let mut ledger = ledger();
        ledger.add_continuous_gain(&id("a"), 5.0, true);
        assert!((ledger.record(&id("a")).points - 3.5).abs() < 1e-5);

        ledger.add_continuous_gain(&id("b"), 5.0, false);
        let b = ledger.record(&id("b"));
        assert!((b.points - 2.5).abs() < 1e-5);
        assert_eq!(b.cumulative_bonded_time, 5.0);
    }

    #[test]
    fn test_points_clamped_to_range() {
        let mut ledger = ledger();
        ledger.add_flat_gain(&id("a"), 250.0);
        assert_eq!(ledger.record(&id("a")).points, 100.0);

        ledger.apply_betrayal(&id("a"), 500.0);
        assert_eq!(ledger.record(&id("a")).points, 0.0);

        ledger.add_flat_gain(&id("a"), -10.0);
        assert_eq!(ledger.record(&id("a")).points, 0.0);
    }

    #[test]
    fn test_level_thresholds() {
        let t = LevelThresholds::default();
        assert_eq!(classify_level(0.0, 0, &t), AffinityLevel::Stranger);
        assert_eq!(classify_level(19.9, 0, &t), AffinityLevel::Stranger);
        assert_eq!(classify_level(20.0, 0, &t), AffinityLevel::Acquainted);
        assert_eq!(classify_level(40.0, 0, &t), AffinityLevel::Bonded);
        assert_eq!(classify_level(70.0, 0, &t), AffinityLevel::Devoted);
        assert_eq!(classify_level(100.0, 0, &t), AffinityLevel::Ascended);
    }

    #[test]
    fn test_hostile_override_is_a_trapdoor() {
        let t = LevelThresholds::default();
        assert_eq!(classify_level(19.0, 3, &t), AffinityLevel::Hostile);
        assert_eq!(classify_level(19.0, 2, &t), AffinityLevel::Stranger);
        // Enough points escape regardless of history
        assert_eq!(classify_level(20.0, 10, &t), AffinityLevel::Acquainted);
    }

    #[test]
    fn test_level_is_pure_across_ledgers() {
        let mut first = ledger();
        first.add_flat_gain(&id("x"), 60.0);
        for _ in 0..3 {
            first.apply_betrayal(&id("x"), 15.0);
        }

        let mut second = ledger();
        second.import(&first.export());

        assert_eq!(first.record(&id("x")).points, 15.0);
        assert_eq!(first.level(&id("x")), AffinityLevel::Hostile);
        assert_eq!(first.level(&id("x")), second.level(&id("x")));
    }

    #[test]
    fn test_betrayal_increments_by_one() {
        let mut ledger = ledger();
        ledger.add_flat_gain(&id("a"), 30.0);
        ledger.apply_betrayal(&id("a"), 15.0);
        let record = ledger.record(&id("a"));
        assert_eq!(record.betrayal_count, 1);
        assert_eq!(record.points, 15.0);
    }

    #[test]
    fn test_level_changed_and_ability_events() {
        let mut ledger = ledger();
        ledger.add_flat_gain(&id("a"), 25.0);
        let events = ledger.drain_events();
        assert_eq!(
            events,
            vec![BondEvent::LevelChanged {
                entity_id: id("a"),
                previous: AffinityLevel::Stranger,
                level: AffinityLevel::Acquainted,
            }]
        );

        ledger.add_flat_gain(&id("a"), 5.0);
        assert!(ledger.drain_events().is_empty());

        ledger.add_flat_gain(&id("a"), 100.0);
        let events = ledger.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], BondEvent::AbilityUnlocked { .. }));
        assert!(ledger.is_ability_unlocked(&id("a")));

        // Staying at 100 does not unlock again
        ledger.add_flat_gain(&id("a"), 10.0);
        assert!(ledger.drain_events().is_empty());

        // Falling and re-crossing counts as a new crossing; the flag stays set
        ledger.apply_betrayal(&id("a"), 15.0);
        assert!(ledger.is_ability_unlocked(&id("a")));
        ledger.drain_events();
        ledger.add_flat_gain(&id("a"), 15.0);
        let unlocks = ledger
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, BondEvent::AbilityUnlocked { .. }))
            .count();
        assert_eq!(unlocks, 1);
    }

    #[test]
    fn test_cost_multiplier_table() {
        let mut ledger = ledger();
        assert_eq!(ledger.cost_multiplier(&id("a")), 1.0);
        ledger.add_flat_gain(&id("a"), 75.0);
        assert_eq!(ledger.cost_multiplier(&id("a")), 0.65);
        ledger.add_flat_gain(&id("a"), 25.0);
        assert_eq!(ledger.cost_multiplier(&id("a")), 0.5);

        ledger.add_flat_gain(&id("h"), 10.0);
        for _ in 0..3 {
            ledger.apply_betrayal(&id("h"), 0.0);
        }
        assert_eq!(ledger.cost_multiplier(&id("h")), 1.5);
    }

    #[test]
    fn test_progress_to_next_level() {
        let mut ledger = ledger();
        assert_eq!(ledger.progress_to_next_level(&id("a")), 0.0);
        ledger.add_flat_gain(&id("a"), 10.0);
        assert!((ledger.progress_to_next_level(&id("a")) - 0.5).abs() < 1e-6);
        ledger.add_flat_gain(&id("a"), 45.0);
        // 55 points: halfway between 40 and 70
        assert!((ledger.progress_to_next_level(&id("a")) - 0.5).abs() < 1e-6);
        ledger.add_flat_gain(&id("a"), 100.0);
        assert_eq!(ledger.progress_to_next_level(&id("a")), 1.0);
    }

    #[test]
    fn test_reset_clears_betrayals() {
        let mut ledger = ledger();
        for _ in 0..3 {
            ledger.apply_betrayal(&id("a"), 5.0);
        }
        assert_eq!(ledger.level(&id("a")), AffinityLevel::Hostile);
        ledger.drain_events();

        ledger.reset(&id("a"));
        assert_eq!(ledger.record(&id("a")).betrayal_count, 0);
        assert_eq!(ledger.level(&id("a")), AffinityLevel::Stranger);
        assert_eq!(ledger.drain_events().len(), 1);
    }

    #[test]
    fn test_import_export_preserves_fields() {
        let snapshot = bond_events::fixtures::sample_ledger();
        let mut ledger = ledger();
        ledger.import(&snapshot);

        assert_eq!(ledger.export(), snapshot);
        assert_eq!(ledger.level(&id("ember_wraith")), AffinityLevel::Hostile);
        assert_eq!(ledger.level(&id("ash_sprite")), AffinityLevel::Ascended);
        assert!(ledger.is_ability_unlocked(&id("ember_wraith")));
    }

    #[test]
    fn test_affinity_summary_mentions_level() {
        let mut ledger = ledger();
        ledger.add_flat_gain(&id("ember_wraith"), 45.0);
        let summary = ledger.affinity_summary(&id("ember_wraith"));
        assert!(summary.starts_with("ember_wraith: Bonded"));
        assert!(summary.contains("45.0/100"));
    }
}
