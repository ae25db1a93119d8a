//! Material-graph backend

use super::{BackendCapabilities, BackendKind, RenderBackend};
use crate::render::material::Material;
use crate::render::pass::LayerType;
use crate::render::state::RenderState;

/// Splits passes into opaque and blended layers and supports every optional
/// feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialGraphBackend;

impl RenderBackend for MaterialGraphBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MaterialGraph
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::all()
    }

    fn classify(&self, pass_state: &RenderState, material: &Material) -> LayerType {
        if pass_state.blend.enabled || material.requires_blending() {
            LayerType::BlendEnabled
        } else {
            LayerType::Opaque
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::material::COLOR_UNIFORM;
    use crate::render::state::BlendState;

    #[test]
    fn test_layer_assignment() {
        let backend = MaterialGraphBackend;
        let opaque_pass = RenderState::default();
        let blended_pass = RenderState {
            blend: BlendState::premultiplied_alpha(),
            ..RenderState::default()
        };

        let mut material = Material::default();
        assert_eq!(backend.classify(&opaque_pass, &material), LayerType::Opaque);
        assert_eq!(backend.classify(&blended_pass, &material), LayerType::BlendEnabled);

        material.set_uniform(COLOR_UNIFORM, &[1.0, 1.0, 1.0, 0.5], 4, 1);
        assert_eq!(backend.classify(&opaque_pass, &material), LayerType::BlendEnabled);
    }

    #[test]
    fn test_capabilities() {
        let backend = MaterialGraphBackend;
        assert!(backend.supports(BackendCapabilities::RENDER_TARGETS | BackendCapabilities::MULTIVIEW));
        assert_eq!(backend.kind(), BackendKind::MaterialGraph);
    }
}
