//! Render pass containers
//!
//! A [`RenderPassObject`] is the persistent definition of a pass together with
//! the components drawn in it. Each frame its visible components are flattened
//! into [`RenderObject`]s and split into the two layers of a
//! [`RenderPassDrawContainer`].

use super::assets::MeshPtr;
use super::component::RenderComponent;
use super::material::MaterialPtr;
use super::sort_order::{RenderSortOrder, SortOrderManager};
use super::state::{
    BlendState, CompareFunction, CullFace, CullState, DepthState, RenderState, StencilMode,
};
use super::{MAIN, OPAQUE, OVER_DRAW, OVER_DRAW_GLOW, PANO};
use crate::camera::RenderTargetId;
use crate::ecs::{ComponentPool, Entity};
use crate::foundation::hash::HashValue;
use crate::foundation::math::Mat4;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// How the objects of a layer are ordered before drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortMode {
    /// Submission order
    #[default]
    None,
    /// Ascending sort order key
    SortOrderIncreasing,
    /// Descending sort order key
    SortOrderDecreasing,
    /// Nearest first along the averaged view direction
    AverageSpaceOriginFrontToBack,
    /// Farthest first along the averaged view direction
    AverageSpaceOriginBackToFront,
    /// Descending world z
    WorldSpaceZFrontToBack,
    /// Ascending world z
    WorldSpaceZBackToFront,
    /// Ascending world z, outermost x first within equal z
    WorldSpaceZBackToFrontXOutToMiddle,
    /// Grouped by shader and mesh to reduce state changes
    Optimized,
}

impl SortMode {
    /// Whether the order can be computed without knowing the views
    pub const fn is_view_independent(self) -> bool {
        !matches!(
            self,
            Self::AverageSpaceOriginFrontToBack | Self::AverageSpaceOriginBackToFront
        )
    }
}

/// Per-object visibility test against the views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullMode {
    /// Draw everything
    #[default]
    None,
    /// Drop objects whose bounds miss every view frustum
    VisibleInAnyView,
}

bitflags! {
    /// Buffers cleared before a pass draws
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ClearFlags: u32 {
        /// Color buffer
        const COLOR = 1 << 0;
        /// Depth buffer
        const DEPTH = 1 << 1;
        /// Stencil buffer
        const STENCIL = 1 << 2;
    }
}

/// What a pass clears and to which values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearParams {
    /// Buffers to clear
    pub flags: ClearFlags,
    /// Clear color
    pub color: [f32; 4],
    /// Clear depth
    pub depth: f32,
    /// Clear stencil value
    pub stencil: i32,
}

impl Default for ClearParams {
    fn default() -> Self {
        Self {
            flags: ClearFlags::empty(),
            color: [0.0, 0.0, 0.0, 0.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// A pass definition and the components drawn in it
#[derive(Debug, Default)]
pub struct RenderPassObject {
    /// Fixed-function state for the opaque layer
    pub render_state: RenderState,
    /// Buffers cleared before drawing
    pub clear_params: ClearParams,
    /// Ordering strategy
    pub sort_mode: SortMode,
    /// Visibility strategy
    pub cull_mode: CullMode,
    /// Offscreen target, `None` for the current framebuffer
    pub render_target: Option<RenderTargetId>,
    /// Components in this pass
    pub components: ComponentPool<RenderComponent>,
    /// Offsets and key computation for `components`
    pub sort_order_manager: SortOrderManager,
}

impl RenderPassObject {
    /// Pass with the given ordering and state
    pub fn new(sort_mode: SortMode, render_state: RenderState) -> Self {
        Self {
            render_state,
            sort_mode,
            ..Self::default()
        }
    }
}

/// One drawable: a component's mesh (or one submesh of it) with one material
#[derive(Debug, Clone)]
pub struct RenderObject {
    /// Owning entity
    pub entity: Entity,
    /// Geometry
    pub mesh: MeshPtr,
    /// Shader, uniforms and textures
    pub material: MaterialPtr,
    /// World transform at submission time
    pub world_from_entity: Mat4,
    /// Hierarchy draw-order key
    pub sort_order: RenderSortOrder,
    /// Group offset, compared before `sort_order`
    pub group_offset: i32,
    /// Submesh to draw, `None` for the whole mesh
    pub submesh: Option<usize>,
    /// Stencil behaviour
    pub stencil_mode: StencilMode,
    /// Stencil reference value
    pub stencil_value: i32,
}

/// The two layers of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    /// Drawn with the pass state as declared
    Opaque = 0,
    /// Drawn with blending forced on
    BlendEnabled = 1,
}

/// Objects drawn with one state and ordering
#[derive(Debug, Clone, Default)]
pub struct RenderLayer {
    /// State used for every object in the layer
    pub render_state: RenderState,
    /// Ordering strategy
    pub sort_mode: SortMode,
    /// Visibility strategy
    pub cull_mode: CullMode,
    /// Objects in draw order
    pub objects: Vec<RenderObject>,
}

/// Everything needed to draw one pass this frame
#[derive(Debug, Clone, Default)]
pub struct RenderPassDrawContainer {
    /// Buffers cleared before drawing
    pub clear_params: ClearParams,
    /// Offscreen target, if any
    pub render_target: Option<RenderTargetId>,
    /// Opaque and blended layers, indexed by [`LayerType`]
    pub layers: [RenderLayer; 2],
}

impl RenderPassDrawContainer {
    /// Empty container configured from a pass definition
    pub fn from_pass(pass: &RenderPassObject) -> Self {
        let layer = |render_state| RenderLayer {
            render_state,
            sort_mode: pass.sort_mode,
            cull_mode: pass.cull_mode,
            objects: Vec::new(),
        };
        Self {
            clear_params: pass.clear_params,
            render_target: pass.render_target,
            layers: [
                layer(pass.render_state),
                layer(pass.render_state.blend_layer_state()),
            ],
        }
    }

    /// Layer by type
    pub fn layer(&self, layer: LayerType) -> &RenderLayer {
        &self.layers[layer as usize]
    }

    /// Mutable layer by type
    pub fn layer_mut(&mut self, layer: LayerType) -> &mut RenderLayer {
        &mut self.layers[layer as usize]
    }

    /// Total objects across layers
    pub fn object_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.objects.len()).sum()
    }
}

/// Passes every render system starts with, in draw order
pub fn default_passes() -> Vec<(HashValue, RenderPassObject)> {
    let depth_test = |write_enabled| DepthState {
        test_enabled: true,
        write_enabled,
        function: CompareFunction::LessEqual,
    };
    let cull_back = CullState {
        enabled: true,
        face: CullFace::Back,
        ..CullState::default()
    };
    let no_depth = DepthState {
        test_enabled: false,
        write_enabled: false,
        function: CompareFunction::LessEqual,
    };

    let pano = RenderPassObject::new(
        SortMode::None,
        RenderState {
            blend: BlendState::premultiplied_alpha(),
            ..RenderState::default()
        },
    );
    let opaque = RenderPassObject::new(
        SortMode::AverageSpaceOriginFrontToBack,
        RenderState {
            depth: depth_test(true),
            cull: cull_back,
            ..RenderState::default()
        },
    );
    let main = RenderPassObject::new(
        SortMode::SortOrderIncreasing,
        RenderState {
            blend: BlendState::premultiplied_alpha(),
            depth: depth_test(false),
            cull: cull_back,
            ..RenderState::default()
        },
    );
    let over_draw = RenderPassObject::new(
        SortMode::None,
        RenderState {
            blend: BlendState::premultiplied_alpha(),
            depth: no_depth,
            cull: cull_back,
            ..RenderState::default()
        },
    );
    let over_draw_glow = RenderPassObject::new(
        SortMode::None,
        RenderState {
            blend: BlendState::additive(),
            depth: no_depth,
            ..RenderState::default()
        },
    );

    vec![
        (PANO, pano),
        (OPAQUE, opaque),
        (MAIN, main),
        (OVER_DRAW, over_draw),
        (OVER_DRAW_GLOW, over_draw_glow),
    ]
}
