//! Core engine systems

pub mod config;

pub use config::{EngineConfig, RenderConfig, RenderPassDef};
