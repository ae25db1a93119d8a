//! Per-entity, per-pass render data

use super::assets::MeshPtr;
use super::material::MaterialPtr;
use super::sort_order::{RenderSortOrder, SortOrderLookup};
use super::state::StencilMode;
use crate::ecs::{ComponentPool, Entity};
use crate::foundation::hash::HashValue;
use crate::foundation::math::Vec4;
use std::collections::BTreeSet;

/// Everything needed to draw one entity in one pass
#[derive(Debug, Clone)]
pub struct RenderComponent {
    /// Owning entity
    pub entity: Entity,
    /// Pass the component is drawn in
    pub pass: HashValue,
    /// Geometry, shared and possibly still loading
    pub mesh: Option<MeshPtr>,
    /// One material per submesh; a single material draws the whole mesh
    pub materials: Vec<MaterialPtr>,
    /// Color restored by callers after temporary tints
    pub default_color: Vec4,
    /// Stencil behaviour
    pub stencil_mode: StencilMode,
    /// Stencil reference value
    pub stencil_value: i32,
    /// Draw-order key, maintained by the pass's sort order manager
    pub sort_order: RenderSortOrder,
    /// Group whose parameters adjust ordering
    pub group_id: Option<HashValue>,
    pub(crate) ready_sent: bool,
    pub(crate) textures_reported: BTreeSet<u32>,
}

impl RenderComponent {
    /// Empty component for `entity` in `pass`
    pub fn new(entity: Entity, pass: HashValue) -> Self {
        Self {
            entity,
            pass,
            mesh: None,
            materials: Vec::new(),
            default_color: Vec4::repeat(1.0),
            stencil_mode: StencilMode::Disabled,
            stencil_value: 0,
            sort_order: RenderSortOrder::default(),
            group_id: None,
            ready_sent: false,
            textures_reported: BTreeSet::new(),
        }
    }

    /// Hidden when it has materials and every one of them is hidden
    pub fn is_hidden(&self) -> bool {
        !self.materials.is_empty() && self.materials.iter().all(|material| material.borrow().is_hidden())
    }

    /// Whether the mesh (if any) and every bound texture have loaded
    pub fn is_ready(&self) -> bool {
        if self.mesh.as_ref().is_some_and(|mesh| !mesh.is_loaded()) {
            return false;
        }
        self.materials.iter().all(|material| material.borrow().textures_loaded())
    }

    /// Forget readiness so the ready events fire again
    pub(crate) fn reset_readiness(&mut self) {
        self.ready_sent = false;
        self.textures_reported.clear();
    }
}

impl SortOrderLookup for ComponentPool<RenderComponent> {
    fn sort_order_mut(&mut self, entity: Entity) -> Option<&mut RenderSortOrder> {
        self.get_mut(entity).map(|component| &mut component.sort_order)
    }
}
