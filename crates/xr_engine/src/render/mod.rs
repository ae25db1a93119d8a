//! Render core: passes, sort orders, materials and the render system
//!
//! Passes are identified by the hash of their name. Five passes exist by
//! default and are drawn in this order: [`PANO`], [`OPAQUE`], [`MAIN`],
//! [`OVER_DRAW`] and [`OVER_DRAW_GLOW`].

pub mod assets;
pub mod backend;
pub mod buffered;
pub mod component;
pub mod culling;
pub mod def;
pub mod device;
pub mod material;
pub mod pass;
pub mod sort_order;
pub mod sorting;
pub mod state;
pub mod system;
pub mod view;

pub use backend::{BackendCapabilities, BackendKind, RenderBackend};
pub use component::RenderComponent;
pub use def::RenderDef;
pub use device::{GraphicsDevice, RecordingDevice};
pub use material::{Material, MaterialInfo, MaterialPtr};
pub use pass::{CullMode, SortMode};
pub use sort_order::{RenderSortOrder, SortOrderManager};
pub use state::{RenderState, StencilMode};
pub use system::{GroupParams, RenderSystem, RenderTargetDesc};
pub use view::RenderView;

use crate::foundation::hash::{hash, HashValue};
use thiserror::Error;

/// Background pass drawn with eye-centered views
pub const PANO: HashValue = hash("Pano");
/// Opaque geometry, sorted front to back
pub const OPAQUE: HashValue = hash("Opaque");
/// Default pass, sorted by hierarchy
pub const MAIN: HashValue = hash("Main");
/// Drawn over everything without depth testing
pub const OVER_DRAW: HashValue = hash("OverDraw");
/// Additive overlay
pub const OVER_DRAW_GLOW: HashValue = hash("OverDrawGlow");

/// Render system errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// No pass with this id
    #[error("Unknown render pass {0:#010x}")]
    UnknownPass(HashValue),

    /// No render target with this id
    #[error("Unknown render target {0:#010x}")]
    UnknownRenderTarget(HashValue),

    /// The active backend lacks a capability
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        /// What was attempted
        operation: &'static str,
        /// Active backend
        backend: BackendKind,
    },

    /// An asset could not be loaded
    #[error("Asset error: {0}")]
    Asset(String),

    /// Render configuration is inconsistent
    #[error("Invalid render configuration: {0}")]
    InvalidConfig(String),
}
