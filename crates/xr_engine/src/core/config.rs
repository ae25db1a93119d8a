//! Engine and render configuration
//!
//! Every struct here is plain serde data, loadable from `.toml` or `.ron`
//! through the [`Config`] trait. Missing fields take their defaults.

use crate::render::backend::BackendKind;
use crate::render::pass::{ClearParams, CullMode, SortMode};
use crate::render::state::RenderState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

pub use crate::config::{Config, ConfigError};

/// A pass created or reconfigured at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPassDef {
    /// Pass name, hashed into its id
    pub name: String,
    /// Ordering strategy
    pub sort_mode: SortMode,
    /// Visibility strategy
    pub cull_mode: CullMode,
    /// Fixed-function state, the pass's current state when absent
    pub render_state: Option<RenderState>,
    /// Buffers cleared before drawing
    pub clear_params: Option<ClearParams>,
    /// Offscreen target name
    pub render_target: Option<String>,
}

impl Default for RenderPassDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            sort_mode: SortMode::None,
            cull_mode: CullMode::None,
            render_state: None,
            clear_params: None,
            render_target: None,
        }
    }
}

/// Render system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Backend to create
    pub backend: BackendKind,
    /// Draw stereo views with one draw call when the device allows it
    pub stereo_multiview: bool,
    /// Pass used when none is given
    pub default_pass: String,
    /// Color the frame is cleared to
    pub clear_color: [f32; 4],
    /// Passes applied on top of the built-in ones
    pub passes: Vec<RenderPassDef>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::MaterialGraph,
            stereo_multiview: false,
            default_pass: "Main".to_owned(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            passes: Vec::new(),
        }
    }
}

impl RenderConfig {
    /// Select the backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Add a pass definition
    pub fn with_pass(mut self, pass: RenderPassDef) -> Self {
        self.passes.push(pass);
        self
    }

    /// Check for inconsistencies
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_pass.is_empty() {
            return Err(ConfigError::Invalid("default_pass must not be empty".into()));
        }
        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("clear_color must be finite".into()));
        }
        let mut names = HashSet::new();
        for pass in &self.passes {
            if pass.name.is_empty() {
                return Err(ConfigError::Invalid("pass names must not be empty".into()));
            }
            if !names.insert(pass.name.as_str()) {
                return Err(ConfigError::Invalid(format!("pass {} defined twice", pass.name)));
            }
            if pass.render_target.is_some() && self.backend == BackendKind::FixedPipeline {
                return Err(ConfigError::Invalid(format!(
                    "pass {} uses a render target, which the {} backend cannot draw into",
                    pass.name, self.backend
                )));
            }
        }
        Ok(())
    }
}

impl Config for RenderConfig {}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level: off, error, warn, info, debug or trace
    pub log_level: String,
    /// Panic on contract violations; the build profile decides when absent
    pub fatal_contracts: Option<bool>,
    /// Render system settings
    pub render: RenderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            fatal_contracts: None,
            render: RenderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the render configuration
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Parsed log level
    pub fn level_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        log::LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {}", self.log_level)))
    }

    /// Check for inconsistencies
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level_filter()?;
        self.render.validate()
    }
}

impl Config for EngineConfig {}
