//! ECS Components
//!
//! Player-side components and the entity catalog.

pub mod entity;
pub mod player;

pub use entity::*;
pub use player::*;
