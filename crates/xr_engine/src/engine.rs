//! Core engine implementation

use crate::{
    application::Application,
    config::ConfigError,
    core::config::EngineConfig,
    foundation::logging,
    render::{
        assets::{AssetLoader, DeferredAssetLoader},
        device::{GraphicsDevice, RecordingDevice},
        RenderError,
    },
    scene::Scene,
};
use std::time::Instant;
use thiserror::Error;

/// Main engine struct
///
/// The engine owns the scene and drives the application once per frame.
pub struct Engine {
    /// Entities, cameras and the render system
    pub scene: Scene,

    config: EngineConfig,
    last_frame: Instant,
    frame_count: u64,
    running: bool,
}

impl Engine {
    /// Create an engine drawing through a headless [`RecordingDevice`]
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_device(
            config,
            Box::new(RecordingDevice::new()),
            Box::new(DeferredAssetLoader::new()),
        )
    }

    /// Create an engine drawing through `device`
    pub fn with_device(
        config: EngineConfig,
        device: Box<dyn GraphicsDevice>,
        loader: Box<dyn AssetLoader>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init_with_level(config.level_filter()?);
        if let Some(fatal) = config.fatal_contracts {
            logging::set_fatal_contracts(fatal);
        }
        log::info!("Initializing engine...");

        let scene = Scene::new(&config.render, device, loader)
            .map_err(|e| EngineError::InitializationFailed(format!("Scene: {e}")))?;

        Ok(Self {
            scene,
            config,
            last_frame: Instant::now(),
            frame_count: 0,
            running: true,
        })
    }

    /// Run frames until the application calls [`Engine::quit`]
    pub fn run<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        app.initialize(self)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {e}")))?;

        log::info!("Starting main loop...");
        while self.running {
            self.frame(app)?;
        }

        app.cleanup(self);
        log::info!("Engine shutdown complete after {} frames", self.frame_count);
        Ok(())
    }

    /// Run a single frame: update, then render
    pub fn frame<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        let now = Instant::now();
        let delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        app.update(self, delta_time)
            .map_err(|e| EngineError::ApplicationError(format!("App update: {e}")))?;
        self.scene.update();
        app.render(self)
            .map_err(|e| EngineError::ApplicationError(format!("App render: {e}")))?;

        self.frame_count += 1;
        Ok(())
    }

    /// Draw the scene for its screen cameras
    pub fn render(&mut self) {
        self.scene.render();
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the main loop keeps going
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Frames completed so far
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Configuration the engine was created with
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// A subsystem failed to start
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Render system error
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The application returned an error
    #[error("Application error: {0}")]
    ApplicationError(String),
}
