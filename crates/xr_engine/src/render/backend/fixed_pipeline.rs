//! Fixed-pipeline backend

use super::{BackendCapabilities, BackendKind, RenderBackend};
use crate::render::material::Material;
use crate::render::pass::LayerType;
use crate::render::state::RenderState;

/// Draws every pass as a single list with the pass's declared state.
///
/// Render targets, groups and multiview are not available.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPipelineBackend;

impl RenderBackend for FixedPipelineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FixedPipeline
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::empty()
    }

    fn classify(&self, _pass_state: &RenderState, _material: &Material) -> LayerType {
        LayerType::Opaque
    }
}
