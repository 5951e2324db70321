//! Core simulation types for the 2-D arena.
//!
//! This module holds the vector primitive, the particle record, the
//! per-substep contact bookkeeping and the collision engine itself.

pub mod contact;
pub mod particle;
pub mod scene;
pub mod vec2;

pub use contact::{Axis, Contact, ContactKind};
pub use particle::Particle;
pub use scene::Scene;
pub use vec2::Vec2;
