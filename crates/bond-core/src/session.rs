//! Bond Sessions
//!
//! A session is the live bond between one player and one entity type. It
//! drains the player's vitality every tick, feeds the compliance evaluator,
//! accrues affinity in the ledger and decides how the bond ends:
//!
//! - a clean sever rewards the relationship and leaves the entity dormant;
//! - a break (exhaustion, or a sever below the safety threshold) records a
//!   betrayal and, for tiers that support it, releases a hostile instance.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

use bond_events::{BondEvent, BondOutcome, EntityId, PlayerId, SessionId};

use crate::compliance::ComplianceEvaluator;
use crate::components::entity::EntityDescriptor;
use crate::context::BondContext;
use crate::error::{BondResult, InvalidOperation};
use crate::ledger::RelationshipLedger;

/// Drain rate for an entity at its current affinity level.
pub fn effective_drain_rate(descriptor: &EntityDescriptor, ledger: &RelationshipLedger) -> f32 {
    descriptor.base_drain_rate * descriptor.tier_discount() * ledger.cost_multiplier(&descriptor.id)
}

/// An active bond.
#[derive(Debug, Clone)]
pub struct BondSession {
    pub id: SessionId,
    pub player_id: PlayerId,
    /// ECS entity carrying the player's components
    pub player: Entity,
    pub descriptor: EntityDescriptor,
    pub started_at: f32,
    /// Seconds the bond has been sustained
    pub duration: f32,
    /// Resource per second, recomputed every tick
    pub drain_rate: f32,
    /// Latest compliance verdict
    pub compliant: bool,
    /// Stays `None` while the bond is active
    pub outcome: BondOutcome,
    evaluator: ComplianceEvaluator,
}

impl BondSession {
    fn new(
        id: SessionId,
        player_id: PlayerId,
        player: Entity,
        descriptor: EntityDescriptor,
        drain_rate: f32,
        evaluator: ComplianceEvaluator,
        now: f32,
    ) -> Self {
        Self {
            id,
            player_id,
            player,
            descriptor,
            started_at: now,
            duration: 0.0,
            drain_rate,
            compliant: evaluator.is_compliant(),
            outcome: BondOutcome::None,
            evaluator,
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.descriptor.id
    }

    pub fn evaluator(&self) -> &ComplianceEvaluator {
        &self.evaluator
    }
}

/// Resource: Active bonds, at most one per player and one per entity
#[derive(Resource, Debug, Default)]
pub struct BondSessions {
    by_player: BTreeMap<PlayerId, BondSession>,
    /// Earliest time each player may activate an ability again
    ability_ready_at: HashMap<PlayerId, f32>,
}

impl BondSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&BondSession> {
        self.by_player.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &PlayerId) -> Option<&mut BondSession> {
        self.by_player.get_mut(player_id)
    }

    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.by_player.contains_key(player_id)
    }

    /// The player currently bonded to an entity, if any.
    pub fn bonded_player(&self, entity_id: &EntityId) -> Option<&PlayerId> {
        self.by_player
            .values()
            .find(|s| s.entity_id() == entity_id)
            .map(|s| &s.player_id)
    }

    pub fn is_entity_bonded(&self, entity_id: &EntityId) -> bool {
        self.bonded_player(entity_id).is_some()
    }

    /// Bonded players in id order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.by_player.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BondSession> {
        self.by_player.values()
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }

    fn insert(&mut self, session: BondSession) {
        self.by_player.insert(session.player_id.clone(), session);
    }

    fn remove(&mut self, player_id: &PlayerId) -> Option<BondSession> {
        self.by_player.remove(player_id)
    }

    fn ability_ready_at(&self, player_id: &PlayerId) -> Option<f32> {
        self.ability_ready_at.get(player_id).copied()
    }
}

impl BondContext<'_, '_> {
    /// Bonds a player to an entity type.
    pub fn begin_bond(&mut self, player_id: &PlayerId, entity_id: &EntityId) -> BondResult<SessionId> {
        let body = self.player_entity(player_id)?;
        let descriptor = match self.catalog.get(entity_id) {
            Some(descriptor) => descriptor.clone(),
            None => return Err(self.rejected(InvalidOperation::UnknownEntity(entity_id.clone()))),
        };
        if self.sessions.contains_player(player_id) {
            return Err(self.rejected(InvalidOperation::PlayerAlreadyBonded(player_id.clone())));
        }
        if self.sessions.is_entity_bonded(entity_id) {
            return Err(self.rejected(InvalidOperation::EntityAlreadyBonded(entity_id.clone())));
        }
        if self.arena.contains(entity_id) {
            return Err(self.rejected(InvalidOperation::EntityHostile(entity_id.clone())));
        }

        // Input reported before the bond belongs to no session.
        if let Ok((_, _, _, mut inbox)) = self.bodies.get_mut(body) {
            inbox.take();
        }

        let now = self.now();
        let drain_rate = effective_drain_rate(&descriptor, &self.ledger);
        let evaluator = ComplianceEvaluator::new(
            descriptor.policy.clone(),
            &descriptor.profile,
            &self.config.compliance,
            now,
        );
        let session_id = SessionId::from_random_bytes(self.rng.0.gen());
        let session = BondSession::new(
            session_id,
            player_id.clone(),
            body,
            descriptor.clone(),
            drain_rate,
            evaluator,
            now,
        );
        self.sessions.insert(session);
        self.hooks.apply(&descriptor);

        tracing::info!(
            "{} bonded with {} ({:?}, {:.2}/s)",
            player_id,
            entity_id,
            descriptor.tier,
            drain_rate
        );
        self.emit(BondEvent::BondStarted {
            session_id,
            player_id: player_id.clone(),
            entity_id: entity_id.clone(),
            tier: descriptor.tier,
            drain_rate,
        });
        Ok(session_id)
    }

    /// Ends the bond voluntarily. Clean above the safety threshold, a break below it.
    pub fn sever(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        let body = self.active_body(player_id)?;
        let fraction = self.vitality_of(body).map(|v| v.fraction()).unwrap_or(0.0);
        if fraction >= self.config.session.safe_sever_threshold {
            self.conclude_clean(player_id)
        } else {
            tracing::info!(
                "{} severed at {:.0}% vitality, below the safe threshold",
                player_id,
                fraction * 100.0
            );
            self.conclude_break(player_id)
        }
    }

    /// Ends the bond cleanly regardless of the player's state.
    pub fn sever_cleanly(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        self.active_body(player_id)?;
        self.conclude_clean(player_id)
    }

    /// Ends the bond as a betrayal.
    pub fn force_break(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        self.active_body(player_id)?;
        self.conclude_break(player_id)
    }

    /// Uses the bonded entity's unlocked ability.
    pub fn activate_ability(&mut self, player_id: &PlayerId) -> BondResult<EntityId> {
        self.active_body(player_id)?;
        let entity_id = match self.sessions.get(player_id) {
            Some(session) => session.entity_id().clone(),
            None => return Err(self.rejected(InvalidOperation::NoActiveBond(player_id.clone()))),
        };
        if !self.ledger.is_ability_unlocked(&entity_id) {
            return Err(self.rejected(InvalidOperation::AbilityLocked(entity_id)));
        }
        let now = self.now();
        if let Some(ready_at) = self.sessions.ability_ready_at(player_id) {
            if now < ready_at {
                return Err(self.rejected(InvalidOperation::AbilityCoolingDown {
                    remaining: ready_at - now,
                }));
            }
        }

        let cooldown = self.config.ability.cooldown;
        self.sessions
            .ability_ready_at
            .insert(player_id.clone(), now + cooldown);
        tracing::info!("{} activated the ability of {}", player_id, entity_id);
        self.emit(BondEvent::AbilityActivated {
            player_id: player_id.clone(),
            entity_id: entity_id.clone(),
        });
        Ok(entity_id)
    }

    /// Feeds input gathered since the last tick to each bonded player's evaluator.
    pub fn ingest_player_input(&mut self) {
        for (player, _, _, mut inbox) in self.bodies.iter_mut() {
            let (mut actions, damage) = inbox.take();
            let Some(session) = self.sessions.get_mut(&player.id) else {
                continue;
            };
            actions.retain(|a| a.timestamp >= session.started_at);
            actions.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            for action in actions {
                session.evaluator.observe_action(action);
            }
            if damage > 0.0 {
                session.evaluator.observe_damage(damage);
            }
        }
    }

    /// Advances every active bond by the current tick.
    pub fn tick_sessions(&mut self) {
        let dt = self.clock.dt;
        let now = self.clock.now;

        for player_id in self.sessions.player_ids() {
            let Some(session) = self.sessions.get(&player_id) else {
                continue;
            };
            let body = session.player;
            let descriptor = session.descriptor.clone();

            let drain_rate = effective_drain_rate(&descriptor, &self.ledger);
            let cost = drain_rate * dt;
            let sustained = match self.bodies.get_mut(body) {
                Ok((_, mut vitality, _, _)) if vitality.current > cost => {
                    vitality.current -= cost;
                    true
                }
                Ok(_) => false,
                Err(_) => {
                    tracing::warn!("Bonded player {} has no body, breaking bond", player_id);
                    false
                }
            };

            if !sustained {
                tracing::info!("{} exhausted by {}", player_id, descriptor.id);
                // The session was just looked up, so this cannot be rejected.
                let _ = self.conclude_break(&player_id);
                continue;
            }

            let verdict = match self.sessions.get_mut(&player_id) {
                Some(session) => {
                    session.drain_rate = drain_rate;
                    session.duration += dt;
                    let verdict = session.evaluator.evaluate(now);
                    session.compliant = verdict.compliant;
                    verdict
                }
                None => continue,
            };

            if let Some(damage) = verdict.punish {
                let dealt = match self.bodies.get_mut(body) {
                    Ok((_, mut vitality, _, _)) => vitality.apply_damage(damage),
                    Err(_) => 0.0,
                };
                tracing::debug!("{} punished {} for {:.1}", descriptor.id, player_id, dealt);
                self.emit(BondEvent::CompliancePunished {
                    player_id: player_id.clone(),
                    entity_id: descriptor.id.clone(),
                    damage: dealt,
                });
            }

            self.accrue(&descriptor, dt, verdict.compliant);
            self.collect_ledger_events();
        }
    }

    /// Continuous affinity for the bonded entity and its lineage.
    fn accrue(&mut self, descriptor: &EntityDescriptor, dt: f32, compliant: bool) {
        let profile = &descriptor.profile;
        self.ledger
            .add_continuous_gain(&descriptor.id, dt * profile.gain_acceleration, compliant);
        if let Some(parent) = &descriptor.lineage {
            if profile.lineage_gain_fraction > 0.0 {
                self.ledger
                    .add_continuous_gain(parent, dt * profile.lineage_gain_fraction, compliant);
            }
        }
    }

    fn active_body(&self, player_id: &PlayerId) -> BondResult<Entity> {
        self.player_entity(player_id)?;
        match self.sessions.get(player_id) {
            Some(session) => Ok(session.player),
            None => Err(self.rejected(InvalidOperation::NoActiveBond(player_id.clone()))),
        }
    }

    fn conclude_clean(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        let Some(mut session) = self.sessions.remove(player_id) else {
            return Err(self.rejected(InvalidOperation::NoActiveBond(player_id.clone())));
        };
        session.outcome = BondOutcome::CleanSever;

        let entity_id = session.entity_id().clone();
        let bonus = self.config.session.clean_sever_bonus
            + session.descriptor.profile.extra_clean_sever_bonus;
        self.ledger.add_flat_gain(&entity_id, bonus);
        self.ledger.record_successful_bond(&entity_id);

        tracing::info!(
            "{} severed cleanly from {} after {:.1}s (+{})",
            player_id,
            entity_id,
            session.duration,
            bonus
        );
        self.emit(BondEvent::BondEnded {
            session_id: session.id,
            player_id: player_id.clone(),
            entity_id,
            outcome: session.outcome,
            duration: session.duration,
        });
        self.collect_ledger_events();
        Ok(session.outcome)
    }

    fn conclude_break(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        let Some(mut session) = self.sessions.remove(player_id) else {
            return Err(self.rejected(InvalidOperation::NoActiveBond(player_id.clone())));
        };
        session.outcome = BondOutcome::Break;

        let entity_id = session.entity_id().clone();
        let penalty = session.descriptor.profile.betrayal_penalty;
        self.ledger.apply_betrayal(&entity_id, penalty);

        tracing::info!(
            "Bond between {} and {} broke after {:.1}s (-{})",
            player_id,
            entity_id,
            session.duration,
            penalty
        );
        self.emit(BondEvent::BondEnded {
            session_id: session.id,
            player_id: player_id.clone(),
            entity_id: entity_id.clone(),
            outcome: session.outcome,
            duration: session.duration,
        });
        self.collect_ledger_events();

        match (&session.descriptor.hostile, session.descriptor.supports_hostile()) {
            (Some(profile), true) => {
                let anchor = self.position_of(session.player).unwrap_or_default();
                self.enter_hostile(&entity_id, profile.clone(), player_id, anchor);
            }
            _ => {
                tracing::info!("{} slipped away without turning hostile", entity_id);
            }
        }
        Ok(session.outcome)
    }
}
