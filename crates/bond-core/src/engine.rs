//! Bond Engine facade
//!
//! Owns the ECS world and the tick schedule. Hosts register players, feed
//! input, issue commands between ticks and read queries and events; all of it
//! goes through this type.

use bevy_ecs::prelude::*;
use bevy_ecs::system::SystemState;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use bond_events::{
    AffinityLevel, BondOutcome, EntityId, EventEnvelope, LedgerSnapshot, PlayerId, RebindResult,
    SessionId,
};

use crate::components::entity::EntityCatalog;
use crate::components::player::{
    ActionInbox, Player, PlayerActionEvent, PlayerIndex, Position, Vitality,
};
use crate::config::EngineConfig;
use crate::context::{BondContext, EngineClock, EnvironmentHook, EnvironmentHooks};
use crate::error::{BondError, BondResult, InvalidOperation};
use crate::events::{EventLog, EventQueue, SubscriptionId};
use crate::hostile::{HostileArena, HostileInstance};
use crate::ledger::{RelationshipLedger, RelationshipRecord};
use crate::session::{BondSession, BondSessions};
use crate::systems::build_schedule;
use crate::SimRng;

pub struct BondEngine {
    world: World,
    schedule: Schedule,
    context: SystemState<BondContext<'static, 'static>>,
}

impl BondEngine {
    pub fn new(config: EngineConfig, catalog: EntityCatalog, seed: u64) -> Self {
        let mut world = World::new();
        world.insert_resource(RelationshipLedger::new(config.ledger.clone()));
        world.insert_resource(config);
        world.insert_resource(catalog);
        world.insert_resource(PlayerIndex::new());
        world.insert_resource(BondSessions::new());
        world.insert_resource(HostileArena::new());
        world.insert_resource(EventQueue::new());
        world.insert_resource(EnvironmentHooks::default());
        world.insert_resource(SimRng(SmallRng::seed_from_u64(seed)));
        world.insert_resource(EngineClock::default());

        let context = SystemState::new(&mut world);
        Self {
            world,
            schedule: build_schedule(),
            context,
        }
    }

    fn with_context<R>(&mut self, f: impl FnOnce(&mut BondContext) -> R) -> R {
        let mut ctx = self.context.get_mut(&mut self.world);
        f(&mut ctx)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &EngineConfig {
        self.world.resource::<EngineConfig>()
    }

    pub fn catalog(&self) -> &EntityCatalog {
        self.world.resource::<EntityCatalog>()
    }

    pub fn ledger(&self) -> &RelationshipLedger {
        self.world.resource::<RelationshipLedger>()
    }

    pub fn now(&self) -> f32 {
        self.world.resource::<EngineClock>().now
    }

    pub fn tick_count(&self) -> u64 {
        self.world.resource::<EngineClock>().tick
    }

    // ---- Players ----

    pub fn spawn_player(
        &mut self,
        id: impl Into<PlayerId>,
        vitality: Vitality,
        position: Position,
    ) -> BondResult<Entity> {
        let id = id.into();
        if self.world.resource::<PlayerIndex>().contains(&id) {
            return Err(BondError::DuplicatePlayer(id));
        }
        let entity = self
            .world
            .spawn((
                Player::new(id.clone()),
                vitality,
                position,
                ActionInbox::default(),
            ))
            .id();
        self.world.resource_mut::<PlayerIndex>().insert(id, entity);
        Ok(entity)
    }

    fn body(&self, player_id: &PlayerId) -> BondResult<Entity> {
        self.world
            .resource::<PlayerIndex>()
            .get(player_id)
            .ok_or_else(|| InvalidOperation::UnknownPlayer(player_id.clone()).into())
    }

    pub fn vitality(&self, player_id: &PlayerId) -> Option<Vitality> {
        let body = self.body(player_id).ok()?;
        self.world.get::<Vitality>(body).copied()
    }

    /// Overwrites the player's current resource, clamped to its maximum.
    pub fn set_vitality(&mut self, player_id: &PlayerId, current: f32) -> BondResult<()> {
        let body = self.body(player_id)?;
        if let Some(mut vitality) = self.world.get_mut::<Vitality>(body) {
            let max = vitality.max;
            *vitality = Vitality::new(current, max);
        }
        Ok(())
    }

    pub fn position(&self, player_id: &PlayerId) -> Option<Position> {
        let body = self.body(player_id).ok()?;
        self.world.get::<Position>(body).copied()
    }

    pub fn set_position(&mut self, player_id: &PlayerId, position: Position) -> BondResult<()> {
        let body = self.body(player_id)?;
        if let Some(mut current) = self.world.get_mut::<Position>(body) {
            *current = position;
        }
        Ok(())
    }

    /// Reports a player action at engine time `timestamp`.
    pub fn record_action(&mut self, player_id: &PlayerId, timestamp: f32) -> BondResult<()> {
        let body = self.body(player_id)?;
        if let Some(mut inbox) = self.world.get_mut::<ActionInbox>(body) {
            inbox.push_action(PlayerActionEvent { timestamp });
        }
        Ok(())
    }

    /// Applies damage from outside the engine. Returns the damage dealt.
    pub fn record_damage(&mut self, player_id: &PlayerId, amount: f32) -> BondResult<f32> {
        let body = self.body(player_id)?;
        let dealt = match self.world.get_mut::<Vitality>(body) {
            Some(mut vitality) => vitality.apply_damage(amount),
            None => 0.0,
        };
        if let Some(mut inbox) = self.world.get_mut::<ActionInbox>(body) {
            inbox.record_damage(dealt);
        }
        Ok(dealt)
    }

    pub fn add_environment_hook(&mut self, hook: impl EnvironmentHook + 'static) {
        self.world.resource_mut::<EnvironmentHooks>().add(hook);
    }

    // ---- Ticking ----

    /// Runs one tick of `dt` seconds and dispatches its events.
    pub fn tick(&mut self, dt: f32) {
        self.world
            .resource_mut::<EngineClock>()
            .advance(dt.max(0.0));
        self.schedule.run(&mut self.world);
    }

    pub fn run(&mut self, ticks: u64, dt: f32) {
        for _ in 0..ticks {
            self.tick(dt);
        }
    }

    // ---- Commands ----

    pub fn begin_bond(&mut self, player_id: &PlayerId, entity_id: &EntityId) -> BondResult<SessionId> {
        self.with_context(|ctx| ctx.begin_bond(player_id, entity_id))
    }

    pub fn sever(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        self.with_context(|ctx| ctx.sever(player_id))
    }

    pub fn sever_cleanly(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        self.with_context(|ctx| ctx.sever_cleanly(player_id))
    }

    pub fn force_break(&mut self, player_id: &PlayerId) -> BondResult<BondOutcome> {
        self.with_context(|ctx| ctx.force_break(player_id))
    }

    pub fn activate_ability(&mut self, player_id: &PlayerId) -> BondResult<EntityId> {
        self.with_context(|ctx| ctx.activate_ability(player_id))
    }

    pub fn attempt_rebind(&mut self, player_id: &PlayerId, entity_id: &EntityId) -> BondResult<RebindResult> {
        self.with_context(|ctx| ctx.attempt_rebind(player_id, entity_id))
    }

    // ---- Queries ----

    pub fn session(&self, player_id: &PlayerId) -> Option<&BondSession> {
        self.world.resource::<BondSessions>().get(player_id)
    }

    pub fn current_drain_rate(&self, player_id: &PlayerId) -> Option<f32> {
        self.session(player_id).map(|s| s.drain_rate)
    }

    pub fn session_duration(&self, player_id: &PlayerId) -> Option<f32> {
        self.session(player_id).map(|s| s.duration)
    }

    pub fn is_compliant(&self, player_id: &PlayerId) -> Option<bool> {
        self.session(player_id).map(|s| s.compliant)
    }

    pub fn relationship(&self, entity_id: &EntityId) -> RelationshipRecord {
        self.ledger().record(entity_id)
    }

    pub fn level(&self, entity_id: &EntityId) -> AffinityLevel {
        self.ledger().level(entity_id)
    }

    pub fn relationship_percentage(&self, entity_id: &EntityId) -> f32 {
        self.ledger().relationship_percentage(entity_id)
    }

    pub fn progress_to_next_level(&self, entity_id: &EntityId) -> f32 {
        self.ledger().progress_to_next_level(entity_id)
    }

    /// True while the entity has an active hostile instance.
    pub fn is_hostile(&self, entity_id: &EntityId) -> bool {
        self.world.resource::<HostileArena>().contains(entity_id)
    }

    pub fn hostile(&self, entity_id: &EntityId) -> Option<&HostileInstance> {
        self.world.resource::<HostileArena>().get(entity_id)
    }

    pub fn affinity_summary(&self, entity_id: &EntityId) -> String {
        self.ledger().affinity_summary(entity_id)
    }

    // ---- Events ----

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&EventEnvelope) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.world.resource_mut::<EventQueue>().subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.world.resource_mut::<EventQueue>().unsubscribe(id)
    }

    pub fn attach_event_log(&mut self, log: EventLog) {
        self.world.resource_mut::<EventQueue>().attach_log(log);
    }

    pub fn detach_event_log(&mut self) -> Option<EventLog> {
        self.world.resource_mut::<EventQueue>().detach_log()
    }

    /// Dispatches events raised by commands since the last tick.
    pub fn flush_events(&mut self) -> usize {
        self.world.resource_mut::<EventQueue>().dispatch()
    }

    // ---- Persistence ----

    pub fn export_ledger(&self) -> LedgerSnapshot {
        self.ledger().export()
    }

    pub fn import_ledger(&mut self, snapshot: &LedgerSnapshot) {
        self.world
            .resource_mut::<RelationshipLedger>()
            .import(snapshot);
    }

    /// Forgets one entity's history, betrayals included.
    pub fn reset_relationship(&mut self, entity_id: &EntityId) {
        self.with_context(|ctx| {
            ctx.ledger.reset(entity_id);
            ctx.collect_ledger_events();
        });
    }

    pub fn reset_all_relationships(&mut self) {
        self.world.resource_mut::<RelationshipLedger>().reset_all();
    }
}
