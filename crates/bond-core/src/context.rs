//! Engine Context
//!
//! The process-scoped state every bond operation works against: clock,
//! configuration, catalog, ledger, session table, hostile arena, event queue,
//! environment hooks, RNG and the player bodies. Systems receive it as a
//! single system parameter; the [`BondEngine`](crate::engine::BondEngine)
//! facade borrows it through a cached `SystemState` to run commands between
//! ticks.

use bevy_ecs::prelude::*;
use bevy_ecs::system::SystemParam;

use bond_events::{BondEvent, EngineTimestamp, PlayerId};

use crate::components::entity::{EntityCatalog, EntityDescriptor};
use crate::components::player::{ActionInbox, Player, PlayerIndex, Position, Vitality};
use crate::config::EngineConfig;
use crate::error::{BondError, InvalidOperation};
use crate::events::EventQueue;
use crate::hostile::HostileArena;
use crate::ledger::RelationshipLedger;
use crate::session::BondSessions;
use crate::SimRng;

/// Resource: Engine time
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineClock {
    /// Ticks run so far
    pub tick: u64,
    /// Simulated seconds since start
    pub now: f32,
    /// Length of the current tick
    pub dt: f32,
}

impl EngineClock {
    pub fn advance(&mut self, dt: f32) {
        self.tick += 1;
        self.now += dt;
        self.dt = dt;
    }

    pub fn timestamp(&self) -> EngineTimestamp {
        EngineTimestamp::new(self.tick, self.now)
    }
}

/// World-side reaction to a bond taking hold (lighting, physics, ambience).
///
/// Invoked once per successful begin, after the session is registered.
pub trait EnvironmentHook: Send + Sync {
    fn apply(&mut self, entity: &EntityDescriptor);
}

impl<F> EnvironmentHook for F
where
    F: FnMut(&EntityDescriptor) + Send + Sync,
{
    fn apply(&mut self, entity: &EntityDescriptor) {
        self(entity)
    }
}

/// Resource: Registered environment hooks
#[derive(Resource, Default)]
pub struct EnvironmentHooks {
    hooks: Vec<Box<dyn EnvironmentHook>>,
}

impl EnvironmentHooks {
    pub fn add(&mut self, hook: impl EnvironmentHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn apply(&mut self, entity: &EntityDescriptor) {
        for hook in self.hooks.iter_mut() {
            hook.apply(entity);
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Player bodies as seen by the engine.
pub type PlayerBodies<'w, 's> = Query<
    'w,
    's,
    (
        &'static Player,
        &'static mut Vitality,
        &'static Position,
        &'static mut ActionInbox,
    ),
>;

/// Everything a bond or hostile operation may read or write.
#[derive(SystemParam)]
pub struct BondContext<'w, 's> {
    pub clock: Res<'w, EngineClock>,
    pub config: Res<'w, EngineConfig>,
    pub catalog: Res<'w, EntityCatalog>,
    pub players: Res<'w, PlayerIndex>,
    pub sessions: ResMut<'w, BondSessions>,
    pub ledger: ResMut<'w, RelationshipLedger>,
    pub arena: ResMut<'w, HostileArena>,
    pub events: ResMut<'w, EventQueue>,
    pub hooks: ResMut<'w, EnvironmentHooks>,
    pub rng: ResMut<'w, SimRng>,
    pub bodies: PlayerBodies<'w, 's>,
}

impl BondContext<'_, '_> {
    pub fn now(&self) -> f32 {
        self.clock.now
    }

    /// Queues an event stamped with the current engine time.
    pub(crate) fn emit(&mut self, event: BondEvent) {
        let timestamp = self.clock.timestamp();
        self.events.push(timestamp, event);
    }

    /// Moves level events raised by the ledger into the queue.
    pub(crate) fn collect_ledger_events(&mut self) {
        let timestamp = self.clock.timestamp();
        let events = self.ledger.drain_events();
        self.events.extend(timestamp, events);
    }

    pub(crate) fn rejected(&self, reason: InvalidOperation) -> BondError {
        tracing::warn!("Rejected command: {}", reason);
        reason.into()
    }

    pub(crate) fn player_entity(&self, player_id: &PlayerId) -> Result<Entity, BondError> {
        self.players
            .get(player_id)
            .ok_or_else(|| self.rejected(InvalidOperation::UnknownPlayer(player_id.clone())))
    }

    /// The player's resource state, if the body exists.
    pub(crate) fn vitality_of(&self, body: Entity) -> Option<Vitality> {
        self.bodies.get(body).ok().map(|(_, vitality, _, _)| *vitality)
    }

    pub(crate) fn position_of(&self, body: Entity) -> Option<Position> {
        self.bodies.get(body).ok().map(|(_, _, position, _)| *position)
    }

    /// Deals damage to a player and records it as damage taken. Returns the
    /// amount actually removed.
    pub(crate) fn damage_player(&mut self, body: Entity, amount: f32) -> f32 {
        match self.bodies.get_mut(body) {
            Ok((_, mut vitality, _, mut inbox)) => {
                let dealt = vitality.apply_damage(amount);
                inbox.record_damage(dealt);
                dealt
            }
            Err(_) => 0.0,
        }
    }
}
