//! Application callbacks driven by the engine

use crate::config::ConfigError;
use crate::engine::{Engine, EngineError};
use crate::render::RenderError;
use thiserror::Error;

/// Per-frame hooks for code built on the engine
///
/// The engine calls [`initialize`](Application::initialize) once, then
/// `update` and `render` every frame until [`Engine::quit`] is called, then
/// [`cleanup`](Application::cleanup).
pub trait Application {
    /// Build the initial scene: entities, cameras, asset requests
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Advance the application by `delta_time` seconds
    ///
    /// Runs before the scene polls its assets, so components created here
    /// can become ready in the same frame.
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError>;

    /// Draw the frame; the default renders the scene for its screen cameras
    fn render(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        engine.render();
        Ok(())
    }

    /// Release application state after the last frame
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Errors returned from [`Application`] callbacks
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Render system error, usually from a `try_*` call
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Application configuration could not be used
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Anything else
    #[error("Application error: {0}")]
    Custom(String),
}
