//! Entity bookkeeping shared by the scene subsystems
//!
//! Entities are plain ids. Each subsystem stores its own per-entity data;
//! [`ComponentPool`] is the storage the render passes use and [`TagStore`]
//! records which subsystems an entity participates in.

pub mod entity;
pub mod pool;
pub mod tags;

pub use entity::{Entity, World};
pub use pool::ComponentPool;
pub use tags::TagStore;
