//! # XR Engine
//!
//! An entity-component engine core for real-time 3D and VR.
//!
//! ## Features
//!
//! - **Cameras**: full world-to-pixel matrix stack per camera, stereo-ready
//! - **Camera registry**: cameras per render target with pixel and ray queries
//! - **Sort orders**: deterministic draw order derived from the hierarchy
//! - **Multi-pass rendering**: per-pass state, layered blending, view-aware sorting
//! - **Two backends**: fixed pipeline and material graph, chosen by configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xr_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         engine.scene.cameras_mut().create_screen_camera(
//!             0.01,
//!             200.0,
//!             std::f32::consts::FRAC_PI_2,
//!             Viewport::new(0, 0, 1280, 720),
//!         );
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
//!         engine.quit();
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::new(EngineConfig::default())?;
//!     engine.run(&mut MyApp)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod camera;
pub mod config;
pub mod core;
pub mod ecs;
pub mod events;
pub mod foundation;
pub mod render;
pub mod scene;

mod application;
mod engine;

pub use application::{AppError, Application};
pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        camera::{Camera, CameraHandle, CameraManager},
        config::Config,
        core::{EngineConfig, RenderConfig, RenderPassDef},
        ecs::Entity,
        events::{Dispatcher, Event, EventType},
        foundation::math::{Mat4, Quat, Sqt, Vec2, Vec3, Vec4, Viewport},
        render::{
            BackendKind, CullMode, RenderDef, RenderState, RenderSystem, RenderView, SortMode,
            StencilMode, MAIN, OPAQUE, OVER_DRAW, OVER_DRAW_GLOW, PANO,
        },
        scene::Scene,
        AppError, Application, Engine, EngineError,
    };
}
