//! Hostile Behavior
//!
//! After a break, entities of tiers that support it turn on the players for a
//! fixed duration. Each instance lives in the [`HostileArena`] keyed by entity
//! id. Per tick the instance first checks expiry, then runs its variant:
//!
//! - Aggressive: chase the nearest player, rescanning at a bounded cadence.
//! - Chaotic: lurch randomly and mix targeted and area attacks.
//! - Vengeful: hunt only the betrayer.
//! - Destructive: area attacks on a fixed cadence, drifting toward players.
//!
//! Behavior is a pure decision over a snapshot of player positions; the
//! context resolves the resulting [`Strike`] against player vitality.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::BTreeMap;
use std::f32::consts::TAU;

use bond_events::{
    AttackKind, BondEvent, EntityId, HostileExitReason, HostileVariant, PlayerId, RebindResult,
};

use crate::components::entity::HostileProfile;
use crate::components::player::Position;
use crate::config::HostileConfig;
use crate::context::BondContext;
use crate::error::{BondResult, InvalidOperation};

/// A player visible to hostile behavior this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub player_id: PlayerId,
    pub position: Position,
}

/// An attack decided by a hostile instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Strike {
    /// Hits one player
    Targeted { player_id: PlayerId, damage: f32 },
    /// Hits every player within `radius` of `center`
    Area {
        center: Position,
        radius: f32,
        damage: f32,
    },
}

/// An entity that broke its bond and is acting on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct HostileInstance {
    pub entity_id: EntityId,
    pub profile: HostileProfile,
    pub entered_at: f32,
    pub position: Position,
    pub betrayer: PlayerId,
    pub betrayer_last_known: Position,
    pub target: Option<PlayerId>,
    pub last_attack: f32,
    pub last_target_refresh: Option<f32>,
}

impl HostileInstance {
    /// Anchors a new instance at the betrayer's position. The first attack is
    /// available one attack interval after entry.
    pub fn new(
        entity_id: EntityId,
        profile: HostileProfile,
        betrayer: PlayerId,
        anchor: Position,
        now: f32,
    ) -> Self {
        Self {
            entity_id,
            profile,
            entered_at: now,
            position: anchor,
            betrayer,
            betrayer_last_known: anchor,
            target: None,
            last_attack: now,
            last_target_refresh: None,
        }
    }

    pub fn variant(&self) -> HostileVariant {
        self.profile.variant
    }

    pub fn is_expired(&self, now: f32) -> bool {
        now - self.entered_at >= self.profile.duration
    }

    pub fn remaining(&self, now: f32) -> f32 {
        (self.entered_at + self.profile.duration - now).max(0.0)
    }

    fn attack_ready(&self, now: f32) -> bool {
        now - self.last_attack >= self.profile.attack_interval
    }

    fn scan_due(&self, now: f32, interval: f32) -> bool {
        self.last_target_refresh
            .map_or(true, |last| now - last >= interval)
    }

    fn nearest<'a>(&self, sightings: &'a [Sighting], radius: f32) -> Option<&'a Sighting> {
        sightings
            .iter()
            .map(|s| (s, self.position.distance_to(&s.position)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s)
    }

    /// Re-picks the nearest detected player when a scan is due.
    fn refresh_target(&mut self, sightings: &[Sighting], now: f32, config: &HostileConfig) {
        if !self.scan_due(now, config.target_refresh_interval) {
            return;
        }
        self.last_target_refresh = Some(now);
        self.target = self
            .nearest(sightings, self.profile.detection_radius)
            .map(|s| s.player_id.clone());
    }

    fn target_position(&self, sightings: &[Sighting]) -> Option<Position> {
        let target = self.target.as_ref()?;
        sightings
            .iter()
            .find(|s| &s.player_id == target)
            .map(|s| s.position)
    }

    /// Runs one tick of behavior. Expiry is the caller's concern.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        sightings: &[Sighting],
        now: f32,
        dt: f32,
        config: &HostileConfig,
        rng: &mut R,
    ) -> Option<Strike> {
        let stride = self.profile.move_speed * dt;
        match self.profile.variant {
            HostileVariant::Aggressive => {
                self.refresh_target(sightings, now, config);
                let Some(target_pos) = self.target_position(sightings) else {
                    self.target = None;
                    return None;
                };
                self.position.step_toward(&target_pos, stride);
                if self.position.distance_to(&target_pos) <= config.contact_range
                    && self.attack_ready(now)
                {
                    self.last_attack = now;
                    let player_id = self.target.clone()?;
                    return Some(Strike::Targeted {
                        player_id,
                        damage: self.profile.damage,
                    });
                }
                None
            }
            HostileVariant::Chaotic => {
                if rng.gen::<f32>() < config.chaotic_move_probability {
                    let angle = rng.gen_range(0.0..TAU);
                    self.position.step_along(angle, stride);
                }
                if !self.attack_ready(now) {
                    return None;
                }
                self.last_attack = now;
                if rng.gen::<f32>() < config.chaotic_area_attack_probability {
                    Some(Strike::Area {
                        center: self.position,
                        radius: self.profile.detection_radius * config.area_radius_factor,
                        damage: self.profile.damage * config.area_damage_factor,
                    })
                } else {
                    self.nearest(sightings, config.contact_range)
                        .map(|s| Strike::Targeted {
                            player_id: s.player_id.clone(),
                            damage: self.profile.damage,
                        })
                }
            }
            HostileVariant::Vengeful => {
                self.target = Some(self.betrayer.clone());
                let betrayer = sightings.iter().find(|s| s.player_id == self.betrayer);
                if self.scan_due(now, config.target_refresh_interval) {
                    self.last_target_refresh = Some(now);
                    if let Some(seen) = betrayer {
                        if self.position.distance_to(&seen.position) <= self.profile.detection_radius {
                            self.betrayer_last_known = seen.position;
                        }
                    }
                }
                let goal = self.betrayer_last_known;
                self.position.step_toward(&goal, stride);
                let in_reach = betrayer.is_some_and(|s| {
                    self.position.distance_to(&s.position) <= config.contact_range
                });
                if in_reach && self.attack_ready(now) {
                    self.last_attack = now;
                    return Some(Strike::Targeted {
                        player_id: self.betrayer.clone(),
                        damage: self.profile.damage,
                    });
                }
                None
            }
            HostileVariant::Destructive => {
                self.refresh_target(sightings, now, config);
                if let Some(target_pos) = self.target_position(sightings) {
                    self.position.step_toward(&target_pos, stride);
                }
                if !self.attack_ready(now) {
                    return None;
                }
                self.last_attack = now;
                Some(Strike::Area {
                    center: self.position,
                    radius: self.profile.detection_radius,
                    damage: self.profile.damage,
                })
            }
        }
    }
}

/// Resource: Active hostile instances by entity id
#[derive(Resource, Debug, Default)]
pub struct HostileArena {
    instances: BTreeMap<EntityId, HostileInstance>,
}

impl HostileArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&HostileInstance> {
        self.instances.get(entity_id)
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.instances.contains_key(entity_id)
    }

    /// Active entity ids in order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.instances.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostileInstance> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn insert(&mut self, instance: HostileInstance) {
        self.instances.insert(instance.entity_id.clone(), instance);
    }

    fn remove(&mut self, entity_id: &EntityId) -> Option<HostileInstance> {
        self.instances.remove(entity_id)
    }
}

impl BondContext<'_, '_> {
    pub(crate) fn enter_hostile(
        &mut self,
        entity_id: &EntityId,
        profile: HostileProfile,
        betrayer: &PlayerId,
        anchor: Position,
    ) {
        let variant = profile.variant;
        let instance = HostileInstance::new(
            entity_id.clone(),
            profile,
            betrayer.clone(),
            anchor,
            self.now(),
        );
        tracing::info!(
            "{} turned hostile ({:?}) against {} for {:.0}s",
            entity_id,
            variant,
            betrayer,
            instance.profile.duration
        );
        self.arena.insert(instance);
        self.emit(BondEvent::HostileEntered {
            entity_id: entity_id.clone(),
            variant,
            betrayer: betrayer.clone(),
        });
    }

    fn exit_hostile(&mut self, entity_id: &EntityId, reason: HostileExitReason) {
        if self.arena.remove(entity_id).is_none() {
            return;
        }
        tracing::info!("{} is dormant again ({:?})", entity_id, reason);
        self.emit(BondEvent::HostileExited {
            entity_id: entity_id.clone(),
            reason,
        });
    }

    /// Tries to calm a hostile entity. Succeeds with probability equal to the
    /// player's vitality fraction; a failure lashes back at the player.
    pub fn attempt_rebind(&mut self, player_id: &PlayerId, entity_id: &EntityId) -> BondResult<RebindResult> {
        let body = self.player_entity(player_id)?;
        if !self.catalog.contains(entity_id) {
            return Err(self.rejected(InvalidOperation::UnknownEntity(entity_id.clone())));
        }
        let damage = match self.arena.get(entity_id) {
            Some(instance) => instance.profile.damage,
            None => return Err(self.rejected(InvalidOperation::EntityNotHostile(entity_id.clone()))),
        };

        let chance = self.vitality_of(body).map(|v| v.fraction()).unwrap_or(0.0);
        let roll: f32 = self.rng.0.gen();
        let result = if roll < chance {
            RebindResult::Success
        } else {
            RebindResult::Failure
        };
        tracing::info!(
            "{} attempted to rebind {} ({:.0}% chance): {:?}",
            player_id,
            entity_id,
            chance * 100.0,
            result
        );
        self.emit(BondEvent::RebindAttempted {
            entity_id: entity_id.clone(),
            player_id: player_id.clone(),
            chance,
            result,
        });

        match result {
            RebindResult::Success => self.exit_hostile(entity_id, HostileExitReason::Rebound),
            RebindResult::Failure => {
                let backlash = damage * self.config.hostile.rebind_penalty_factor;
                let dealt = self.damage_player(body, backlash);
                self.emit(BondEvent::HostileAttack {
                    entity_id: entity_id.clone(),
                    player_id: player_id.clone(),
                    attack: AttackKind::RebindBacklash,
                    damage: dealt,
                });
            }
        }
        Ok(result)
    }

    /// Advances every hostile instance. Expiry is checked before any combat.
    pub fn tick_hostiles(&mut self) {
        let now = self.clock.now;
        let dt = self.clock.dt;
        let config = self.config.hostile.clone();

        for entity_id in self.arena.ids() {
            let expired = self.arena.get(&entity_id).is_some_and(|h| h.is_expired(now));
            if expired {
                self.exit_hostile(&entity_id, HostileExitReason::Expired);
                continue;
            }

            let sightings = self.sightings();
            let Some(instance) = self.arena.instances.get_mut(&entity_id) else {
                continue;
            };
            let strike = instance.step(&sightings, now, dt, &config, &mut self.rng.0);
            if let Some(strike) = strike {
                self.resolve_strike(&entity_id, strike);
            }
        }
    }

    /// Players that can still be targeted, in id order.
    fn sightings(&self) -> Vec<Sighting> {
        let mut sightings: Vec<Sighting> = self
            .bodies
            .iter()
            .filter(|(_, vitality, _, _)| !vitality.is_depleted())
            .map(|(player, _, position, _)| Sighting {
                player_id: player.id.clone(),
                position: *position,
            })
            .collect();
        sightings.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        sightings
    }

    fn resolve_strike(&mut self, entity_id: &EntityId, strike: Strike) {
        let hits: Vec<(PlayerId, AttackKind, f32)> = match strike {
            Strike::Targeted { player_id, damage } => match self.players.get(&player_id) {
                Some(body) => {
                    let dealt = self.damage_player(body, damage);
                    vec![(player_id, AttackKind::Targeted, dealt)]
                }
                None => Vec::new(),
            },
            Strike::Area {
                center,
                radius,
                damage,
            } => {
                let mut hits = Vec::new();
                for (player, mut vitality, position, mut inbox) in self.bodies.iter_mut() {
                    if position.distance_to(&center) > radius {
                        continue;
                    }
                    let dealt = vitality.apply_damage(damage);
                    inbox.record_damage(dealt);
                    hits.push((player.id.clone(), AttackKind::Area, dealt));
                }
                hits.sort_by(|a, b| a.0.cmp(&b.0));
                hits
            }
        };

        for (player_id, attack, dealt) in hits {
            if dealt <= 0.0 {
                continue;
            }
            tracing::debug!("{} hit {} for {:.1} ({:?})", entity_id, player_id, dealt, attack);
            self.emit(BondEvent::HostileAttack {
                entity_id: entity_id.clone(),
                player_id,
                attack,
                damage: dealt,
            });
        }
    }
}
