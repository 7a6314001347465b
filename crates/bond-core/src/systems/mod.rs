//! ECS Systems
//!
//! One tick runs, in order: player input, bond sessions (compliance, drain,
//! ledger), hostile behavior (expiry first), event dispatch.

use bevy_ecs::prelude::*;

use crate::context::BondContext;
use crate::events::EventQueue;

/// Hands actions and damage reported since the last tick to the evaluators.
pub fn ingest_player_input(mut ctx: BondContext) {
    ctx.ingest_player_input();
}

/// Drains vitality, judges compliance and accrues affinity for every bond.
pub fn tick_bond_sessions(mut ctx: BondContext) {
    ctx.tick_sessions();
}

/// Expires, moves and attacks with every hostile instance.
pub fn tick_hostile_behavior(mut ctx: BondContext) {
    ctx.tick_hostiles();
}

/// Delivers everything queued during the tick to observers.
pub fn dispatch_events(mut queue: ResMut<EventQueue>) {
    let sent = queue.dispatch();
    if sent > 0 {
        tracing::debug!("Dispatched {} events", sent);
    }
}

/// The per-tick schedule.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            ingest_player_input,
            tick_bond_sessions,
            tick_hostile_behavior,
            dispatch_events,
        )
            .chain(),
    );
    schedule
}
