//! Render backends
//!
//! Both backends drive the same [`GraphicsDevice`]. They differ in what they
//! can do, advertised through [`BackendCapabilities`], and in how objects are
//! assigned to a pass's layers.

mod fixed_pipeline;
mod material_graph;

pub use fixed_pipeline::FixedPipelineBackend;
pub use material_graph::MaterialGraphBackend;

use super::culling::Frustum;
use super::device::GraphicsDevice;
use super::material::Material;
use super::pass::{CullMode, LayerType, RenderObject, RenderPassDrawContainer};
use super::sorting::sort_objects_using_view;
use super::state::{FrontFace, RenderState, StencilMode, StencilState};
use super::view::RenderView;
use crate::foundation::math::Mat4;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// Single draw list per pass using the pass state
    FixedPipeline,
    /// Layered passes, render targets, groups and multiview
    #[default]
    MaterialGraph,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedPipeline => f.write_str("fixed-pipeline"),
            Self::MaterialGraph => f.write_str("material-graph"),
        }
    }
}

bitflags! {
    /// Optional features of a backend
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BackendCapabilities: u32 {
        /// Passes may draw into offscreen targets
        const RENDER_TARGETS = 1 << 0;
        /// Entities may join groups with shared parameters
        const GROUPS = 1 << 1;
        /// Stereo views drawn with a single draw call
        const MULTIVIEW = 1 << 2;
        /// Objects needing blending get their own layer
        const BLEND_LAYERS = 1 << 3;
    }
}

/// Per-frame drawing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSettings {
    /// Multiview requested by the application
    pub multiview: bool,
    /// Front face used when no mirroring is involved
    pub front_face: FrontFace,
}

/// Strategy for turning pass containers into device commands
pub trait RenderBackend: fmt::Debug {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Supported optional features
    fn capabilities(&self) -> BackendCapabilities;

    /// Whether every feature in `capabilities` is supported
    fn supports(&self, capabilities: BackendCapabilities) -> bool {
        self.capabilities().contains(capabilities)
    }

    /// Layer an object with `material` goes to in a pass with `pass_state`
    fn classify(&self, pass_state: &RenderState, material: &Material) -> LayerType;

    /// Draw one pass for `views`
    fn draw_pass(
        &self,
        device: &mut dyn GraphicsDevice,
        container: &mut RenderPassDrawContainer,
        views: &[RenderView],
        settings: DrawSettings,
    ) {
        let render_target = container
            .render_target
            .filter(|_| self.supports(BackendCapabilities::RENDER_TARGETS));
        if render_target.is_some() {
            device.set_render_target(render_target);
        }
        if !container.clear_params.flags.is_empty() {
            device.clear(&container.clear_params);
        }

        let multiview = settings.multiview
            && views.len() >= 2
            && self.supports(BackendCapabilities::MULTIVIEW)
            && device.supports_multiview();

        for layer in &mut container.layers {
            if layer.objects.is_empty() {
                continue;
            }
            device.set_render_state(&layer.render_state);
            if !layer.sort_mode.is_view_independent() && !views.is_empty() {
                sort_objects_using_view(&mut layer.objects, layer.sort_mode, views);
            }
            let frustums: Vec<Frustum> = match layer.cull_mode {
                CullMode::None => Vec::new(),
                CullMode::VisibleInAnyView => views
                    .iter()
                    .map(|view| Frustum::from_clip_from_world(&view.clip_from_world))
                    .collect(),
            };
            draw_objects(device, &layer.objects, views, &frustums, multiview, settings.front_face);
        }

        if render_target.is_some() {
            device.set_render_target(None);
        }
    }
}

/// Create the backend for `kind`
pub fn create_backend(kind: BackendKind) -> Box<dyn RenderBackend> {
    match kind {
        BackendKind::FixedPipeline => Box::new(FixedPipelineBackend),
        BackendKind::MaterialGraph => Box::new(MaterialGraphBackend),
    }
}

fn is_visible(object: &RenderObject, frustums: &[Frustum]) -> bool {
    if frustums.is_empty() {
        return true;
    }
    let Some(mesh) = object.mesh.data() else {
        return false;
    };
    let sphere = mesh.aabb.world_sphere(&object.world_from_entity);
    frustums.iter().any(|frustum| frustum.intersects_sphere(&sphere))
}

fn draw_objects(
    device: &mut dyn GraphicsDevice,
    objects: &[RenderObject],
    views: &[RenderView],
    frustums: &[Frustum],
    multiview: bool,
    front_face: FrontFace,
) {
    let visible = || objects.iter().filter(|object| is_visible(object, frustums));
    if multiview {
        device.set_viewport(views[0].viewport, views[0].dimensions);
        for object in visible() {
            render_at(device, object, &views[..2], front_face);
        }
    } else {
        for view in views {
            device.set_viewport(view.viewport, view.dimensions);
            for object in visible() {
                render_at(device, object, std::slice::from_ref(view), front_face);
            }
        }
    }
}

fn render_at(device: &mut dyn GraphicsDevice, object: &RenderObject, views: &[RenderView], front_face: FrontFace) {
    let material = object.material.borrow();
    let Some(shader) = material.shader() else {
        return;
    };
    if !shader.is_loaded() || !object.mesh.is_loaded() {
        return;
    }

    let mut clip_from_model = [Mat4::identity(); 2];
    for (slot, view) in clip_from_model.iter_mut().zip(views) {
        *slot = view.clip_from_world * object.world_from_entity;
    }
    let view_count = views.len().min(clip_from_model.len());

    // A mirroring transform reverses the winding.
    let mirrored = object.world_from_entity.fixed_view::<3, 3>(0, 0).determinant() < 0.0;
    if mirrored {
        device.set_front_face(front_face.flipped());
    }
    let stencil = object.stencil_mode != StencilMode::Disabled;
    if stencil {
        device.set_stencil(&object.stencil_mode.to_state(object.stencil_value));
    }

    device.bind_shader(shader);
    for (unit, texture) in material.textures() {
        device.bind_texture(unit, texture);
    }
    for (name, uniform) in material.uniforms() {
        device.bind_uniform(name, uniform);
    }
    device.draw(&object.mesh, &clip_from_model[..view_count], object.submesh);

    if stencil {
        device.set_stencil(&StencilState::default());
    }
    if mirrored {
        device.set_front_face(front_face);
    }
}
