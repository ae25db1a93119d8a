//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Name hashing for passes and render targets
//! - Logging and the programmer-contract layer

pub mod hash;
pub mod logging;
pub mod math;
