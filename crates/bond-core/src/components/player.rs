//! Player Components
//!
//! Components attached to player entities: identity, the shared resource the
//! bond drains, position for hostile targeting, and the input inbox.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use bond_events::PlayerId;

/// Component: Marks an entity as a player
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>) -> Self {
        Self { id: id.into() }
    }
}

/// Component: The player's shared resource (health)
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitality {
    pub current: f32,
    pub max: f32,
}

impl Vitality {
    pub fn new(current: f32, max: f32) -> Self {
        let max = max.max(0.0);
        Self {
            current: current.clamp(0.0, max),
            max,
        }
    }

    pub fn full(max: f32) -> Self {
        Self::new(max, max)
    }

    /// Current over max, 0 when max is 0.
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    /// Removes up to `amount`, never dropping below zero. Returns the damage dealt.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        let dealt = amount.max(0.0).min(self.current);
        self.current -= dealt;
        dealt
    }
}

/// Component: Position on the play field
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Moves toward `target` by at most `max_step`, stopping on it.
    pub fn step_toward(&mut self, target: &Position, max_step: f32) {
        let distance = self.distance_to(target);
        if distance <= max_step || distance <= f32::EPSILON {
            *self = *target;
            return;
        }
        let ratio = max_step / distance;
        self.x += (target.x - self.x) * ratio;
        self.y += (target.y - self.y) * ratio;
    }

    /// Moves `distance` along the given angle (radians).
    pub fn step_along(&mut self, angle: f32, distance: f32) {
        self.x += angle.cos() * distance;
        self.y += angle.sin() * distance;
    }
}

/// A discrete player action, as reported by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerActionEvent {
    /// Engine time of the action, in seconds
    pub timestamp: f32,
}

/// Component: Input reported since the last tick
#[derive(Component, Debug, Clone, Default)]
pub struct ActionInbox {
    pub actions: Vec<PlayerActionEvent>,
    /// Damage taken from outside the engine (combat, hazards)
    pub damage_taken: f32,
}

impl ActionInbox {
    pub fn push_action(&mut self, action: PlayerActionEvent) {
        self.actions.push(action);
    }

    pub fn record_damage(&mut self, amount: f32) {
        self.damage_taken += amount.max(0.0);
    }

    /// Takes all pending input, leaving the inbox empty.
    pub fn take(&mut self) -> (Vec<PlayerActionEvent>, f32) {
        let actions = std::mem::take(&mut self.actions);
        let damage = std::mem::replace(&mut self.damage_taken, 0.0);
        (actions, damage)
    }
}

/// Resource: Lookup from player id to ECS entity
#[derive(Resource, Debug, Default)]
pub struct PlayerIndex {
    entities: HashMap<PlayerId, Entity>,
}

impl PlayerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: PlayerId, entity: Entity) {
        self.entities.insert(id, entity);
    }

    pub fn get(&self, id: &PlayerId) -> Option<Entity> {
        self.entities.get(id).copied()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<Entity> {
        self.entities.remove(id)
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

    #[test]
    fn test_vitality_damage_never_goes_negative() {
        let mut vitality = Vitality::full(100.0);
        assert_eq!(vitality.apply_damage(30.0), 30.0);
        assert_eq!(vitality.apply_damage(500.0), 70.0);
        assert!(vitality.is_depleted());
        assert_eq!(vitality.fraction(), 0.0);
    }

    #[test]
    fn test_vitality_fraction() {
        assert_eq!(Vitality::new(25.0, 100.0).fraction(), 0.25);
        assert_eq!(Vitality::new(10.0, 0.0).fraction(), 0.0);
    }

    #[test]
    fn test_step_toward_stops_on_target() {
        let mut pos = Position::new(0.0, 0.0);
        let target = Position::new(3.0, 4.0);

        pos.step_toward(&target, 2.5);
        assert!((pos.distance_to(&target) - 2.5).abs() < 1e-5);

        pos.step_toward(&target, 10.0);
        assert_eq!(pos, target);
    }

    #[test]
    fn test_inbox_take_clears() {
        let mut inbox = ActionInbox::default();
        inbox.push_action(PlayerActionEvent { timestamp: 1.0 });
        inbox.record_damage(4.0);
        inbox.record_damage(-2.0);

        let (actions, damage) = inbox.take();
        assert_eq!(actions.len(), 1);
        assert_eq!(damage, 4.0);
        assert!(inbox.actions.is_empty());
        assert_eq!(inbox.damage_taken, 0.0);
    }
}
