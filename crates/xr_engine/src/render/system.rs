//! The render system
//!
//! Owns the passes and their components, turns them into per-frame draw
//! lists and hands those lists to the active backend. A frame runs in two
//! phases:
//!
//! 1. [`RenderSystem::submit_render_data`] walks every pass, drops hidden,
//!    disabled and unready components, splits the rest into layers and sorts
//!    the view-independent ones. The result is published through a double
//!    buffer.
//! 2. Between [`begin_rendering`](RenderSystem::begin_rendering) and
//!    [`end_rendering`](RenderSystem::end_rendering),
//!    [`render`](RenderSystem::render) draws the published lists for the
//!    given views.
//!
//! Methods taking `pass: Option<HashValue>` act on the component in that
//! pass, or on every component of the entity when `None`. Getters given
//! `None` read the entity's first component in pass order.

use super::assets::{AssetLoader, MeshPtr, ShaderPtr, TexturePtr};
use super::backend::{create_backend, BackendCapabilities, BackendKind, DrawSettings, RenderBackend};
use super::buffered::BufferedData;
use super::component::RenderComponent;
use super::def::RenderDef;
use super::device::GraphicsDevice;
use super::material::{Material, MaterialInfo, MaterialPtr, UniformType, COLOR_UNIFORM};
use super::pass::{
    default_passes, ClearFlags, ClearParams, CullMode, RenderObject, RenderPassDrawContainer,
    RenderPassObject, SortMode,
};
use super::sort_order::RenderSortOrder;
use super::sorting::sort_objects;
use super::state::{FrontFace, RenderState, StencilMode};
use super::view::RenderView;
use super::{RenderError, PANO};
use crate::camera::RenderTargetId;
use crate::core::config::{RenderConfig, RenderPassDef};
use crate::dfatal;
use crate::ecs::Entity;
use crate::events::Event;
use crate::foundation::hash::{hash, HashValue};
use crate::foundation::math::{Mat4, Vec4};
use crate::scene::transform::TransformProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

/// Parameters shared by every entity in a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupParams {
    /// Added in front of each member's sort order when sorting
    pub sort_order_offset: i32,
}

/// Size of an offscreen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTargetDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

type RenderData = HashMap<HashValue, RenderPassDrawContainer>;

/// Multi-pass renderer for entity components
pub struct RenderSystem {
    backend: Box<dyn RenderBackend>,
    device: Box<dyn GraphicsDevice>,
    loader: Box<dyn AssetLoader>,
    passes: HashMap<HashValue, RenderPassObject>,
    pass_order: Vec<HashValue>,
    default_pass: HashValue,
    render_data: BufferedData<RenderData>,
    rendering: bool,
    multiview: bool,
    clear_color: Vec4,
    front_face: FrontFace,
    groups: HashMap<HashValue, GroupParams>,
    render_targets: HashMap<RenderTargetId, RenderTargetDesc>,
    events: Vec<Event>,
}

impl std::fmt::Debug for RenderSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSystem")
            .field("backend", &self.backend.kind())
            .field("passes", &self.pass_order.len())
            .field("rendering", &self.rendering)
            .field("multiview", &self.multiview)
            .finish_non_exhaustive()
    }
}

impl RenderSystem {
    /// Create a render system with the default passes plus those in `config`
    pub fn new(
        config: &RenderConfig,
        device: Box<dyn GraphicsDevice>,
        loader: Box<dyn AssetLoader>,
    ) -> Result<Self, RenderError> {
        config
            .validate()
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))?;

        let mut system = Self {
            backend: create_backend(config.backend),
            device,
            loader,
            passes: HashMap::new(),
            pass_order: Vec::new(),
            default_pass: hash(&config.default_pass),
            render_data: BufferedData::new(),
            rendering: false,
            multiview: config.stereo_multiview,
            clear_color: Vec4::from(config.clear_color),
            front_face: FrontFace::CounterClockwise,
            groups: HashMap::new(),
            render_targets: HashMap::new(),
            events: Vec::new(),
        };
        for (id, pass) in default_passes() {
            system.insert_pass(id, pass);
        }
        for def in &config.passes {
            system.apply_pass_def(def)?;
        }
        if !system.passes.contains_key(&system.default_pass) {
            system.insert_pass(system.default_pass, RenderPassObject::default());
        }

        log::info!(
            "Render system created with the {} backend and {} passes",
            system.backend.kind(),
            system.pass_order.len()
        );
        Ok(system)
    }

    fn insert_pass(&mut self, id: HashValue, pass: RenderPassObject) {
        if self.passes.insert(id, pass).is_none() {
            self.pass_order.push(id);
        }
    }

    fn pass_mut_or_create(&mut self, id: HashValue) -> &mut RenderPassObject {
        if !self.passes.contains_key(&id) {
            log::debug!("Creating render pass {id:#010x}");
            self.insert_pass(id, RenderPassObject::default());
        }
        self.passes.entry(id).or_default()
    }

    /// Create or reconfigure a pass from its definition
    pub fn apply_pass_def(&mut self, def: &RenderPassDef) -> Result<(), RenderError> {
        let id = hash(&def.name);
        let render_target = def.render_target.as_deref().map(hash);
        if render_target.is_some() {
            self.require(BackendCapabilities::RENDER_TARGETS, "Render targets")?;
        }
        let pass = self.pass_mut_or_create(id);
        pass.sort_mode = def.sort_mode;
        pass.cull_mode = def.cull_mode;
        if let Some(state) = def.render_state {
            pass.render_state = state;
        }
        if let Some(params) = def.clear_params {
            pass.clear_params = params;
        }
        pass.render_target = render_target;
        Ok(())
    }

    fn require(&self, capability: BackendCapabilities, operation: &'static str) -> Result<(), RenderError> {
        if self.backend.supports(capability) {
            Ok(())
        } else {
            Err(RenderError::Unsupported {
                operation,
                backend: self.backend.kind(),
            })
        }
    }

    /// Active backend
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Optional features of the active backend
    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }

    /// The graphics device
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// The graphics device, mutably
    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    /// The graphics device as its concrete type
    pub fn device_as<T: 'static>(&self) -> Option<&T> {
        self.device.as_any().downcast_ref()
    }

    /// The graphics device as its concrete type, mutably
    pub fn device_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.device.as_any_mut().downcast_mut()
    }

    /// Take the events raised since the last call
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ----------------------------------------------------------------------
    // Passes

    /// Whether a pass exists
    pub fn has_pass(&self, pass: HashValue) -> bool {
        self.passes.contains_key(&pass)
    }

    /// Pass ids in draw order
    pub fn passes(&self) -> &[HashValue] {
        &self.pass_order
    }

    /// Pass used when components are created without one
    pub fn set_default_render_pass(&mut self, pass: HashValue) {
        self.pass_mut_or_create(pass);
        self.default_pass = pass;
    }

    /// Pass used when components are created without one
    pub fn default_render_pass(&self) -> HashValue {
        self.default_pass
    }

    /// Set a pass's ordering
    pub fn set_sort_mode(&mut self, pass: HashValue, mode: SortMode) {
        self.pass_mut_or_create(pass).sort_mode = mode;
    }

    /// A pass's ordering
    pub fn sort_mode(&self, pass: HashValue) -> Option<SortMode> {
        self.passes.get(&pass).map(|p| p.sort_mode)
    }

    /// Set a pass's visibility test
    pub fn set_cull_mode(&mut self, pass: HashValue, mode: CullMode) {
        self.pass_mut_or_create(pass).cull_mode = mode;
    }

    /// A pass's visibility test
    pub fn cull_mode(&self, pass: HashValue) -> Option<CullMode> {
        self.passes.get(&pass).map(|p| p.cull_mode)
    }

    /// Set a pass's fixed-function state
    pub fn set_render_state(&mut self, pass: HashValue, state: RenderState) {
        self.pass_mut_or_create(pass).render_state = state;
    }

    /// A pass's fixed-function state
    pub fn render_state(&self, pass: HashValue) -> Option<&RenderState> {
        self.passes.get(&pass).map(|p| &p.render_state)
    }

    /// Set what a pass clears before drawing
    pub fn set_clear_params(&mut self, pass: HashValue, params: ClearParams) {
        self.pass_mut_or_create(pass).clear_params = params;
    }

    /// Front face winding used for unmirrored objects
    pub fn set_default_front_face(&mut self, face: FrontFace) {
        self.front_face = face;
    }

    /// Color the frame is cleared to
    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    /// Color the frame is cleared to
    pub fn clear_color(&self) -> Vec4 {
        self.clear_color
    }

    /// Draw both stereo views with one draw call when supported
    pub fn set_stereo_multiview_enabled(&mut self, enabled: bool) {
        self.multiview = enabled;
    }

    /// Whether multiview was requested
    pub fn is_stereo_multiview_enabled(&self) -> bool {
        self.multiview
    }

    // ----------------------------------------------------------------------
    // Render targets

    /// Register an offscreen target
    pub fn try_create_render_target(&mut self, name: RenderTargetId, desc: RenderTargetDesc) -> Result<(), RenderError> {
        self.require(BackendCapabilities::RENDER_TARGETS, "Render targets")?;
        self.render_targets.insert(name, desc);
        Ok(())
    }

    /// Register an offscreen target, reporting unsupported backends as a
    /// contract violation
    pub fn create_render_target(&mut self, name: RenderTargetId, desc: RenderTargetDesc) {
        if let Err(e) = self.try_create_render_target(name, desc) {
            dfatal!("{e}");
        }
    }

    /// Description of a registered target
    pub fn render_target(&self, name: RenderTargetId) -> Option<&RenderTargetDesc> {
        self.render_targets.get(&name)
    }

    /// Draw a pass into an offscreen target
    pub fn try_set_render_target(&mut self, pass: HashValue, target: RenderTargetId) -> Result<(), RenderError> {
        self.require(BackendCapabilities::RENDER_TARGETS, "Render targets")?;
        if !self.render_targets.contains_key(&target) {
            return Err(RenderError::UnknownRenderTarget(target));
        }
        let pass = self.passes.get_mut(&pass).ok_or(RenderError::UnknownPass(pass))?;
        pass.render_target = Some(target);
        Ok(())
    }

    /// Draw a pass into an offscreen target, reporting failures as a contract
    /// violation
    pub fn set_render_target(&mut self, pass: HashValue, target: RenderTargetId) {
        if let Err(e) = self.try_set_render_target(pass, target) {
            dfatal!("{e}");
        }
    }

    // ----------------------------------------------------------------------
    // Groups

    /// Put the entity's components in a group, or take them out with `None`
    pub fn set_group_id(&mut self, entity: Entity, group_id: Option<HashValue>) {
        if let Err(e) = self.require(BackendCapabilities::GROUPS, "Groups") {
            dfatal!("{e}");
            return;
        }
        self.for_each_component_mut(entity, None, |component| component.group_id = group_id);
    }

    /// Group of the entity's first component
    pub fn group_id(&self, entity: Entity) -> Option<HashValue> {
        if let Err(e) = self.require(BackendCapabilities::GROUPS, "Groups") {
            dfatal!("{e}");
            return None;
        }
        self.component(entity, None).and_then(|component| component.group_id)
    }

    /// Set a group's parameters
    pub fn set_group_params(&mut self, group_id: HashValue, params: GroupParams) {
        if let Err(e) = self.require(BackendCapabilities::GROUPS, "Groups") {
            dfatal!("{e}");
            return;
        }
        self.groups.insert(group_id, params);
    }

    /// A group's parameters
    pub fn group_params(&self, group_id: HashValue) -> Option<&GroupParams> {
        if let Err(e) = self.require(BackendCapabilities::GROUPS, "Groups") {
            dfatal!("{e}");
            return None;
        }
        self.groups.get(&group_id)
    }

    // ----------------------------------------------------------------------
    // Component lookup

    fn component(&self, entity: Entity, pass: Option<HashValue>) -> Option<&RenderComponent> {
        match pass {
            Some(pass) => self.passes.get(&pass)?.components.get(entity),
            None => self
                .pass_order
                .iter()
                .find_map(|pass| self.passes.get(pass)?.components.get(entity)),
        }
    }

    fn for_each_component_mut(
        &mut self,
        entity: Entity,
        pass: Option<HashValue>,
        mut f: impl FnMut(&mut RenderComponent),
    ) {
        for id in &self.pass_order {
            if pass.is_some_and(|pass| pass != *id) {
                continue;
            }
            if let Some(component) = self.passes.get_mut(id).and_then(|p| p.components.get_mut(entity)) {
                f(component);
            }
        }
    }

    /// The entity's component in `pass`, or its first one
    pub fn get_component(&self, entity: Entity, pass: Option<HashValue>) -> Option<&RenderComponent> {
        self.component(entity, pass)
    }

    // ----------------------------------------------------------------------
    // Lifecycle

    /// Give the entity a component in `pass`
    pub fn create(&mut self, entity: Entity, pass: HashValue, transforms: &dyn TransformProvider) {
        let render_pass = self.pass_mut_or_create(pass);
        if render_pass.components.contains(entity) {
            log::warn!("Entity {} already has a component in pass {pass:#010x}", entity.id());
            return;
        }
        render_pass.components.emplace(entity, RenderComponent::new(entity, pass));
        let RenderPassObject {
            components,
            sort_order_manager,
            ..
        } = render_pass;
        sort_order_manager.update_sort_order(entity, transforms, components);
    }

    /// Create a component from a definition
    pub fn create_from_def(&mut self, entity: Entity, def: &RenderDef, transforms: &dyn TransformProvider) {
        let pass = hash(&def.pass);
        self.create(entity, pass, transforms);

        let shader = def.shader.as_deref().map(|path| self.loader.load_shader(path));
        let mut material = Material::new(shader);
        for (unit, path) in (0u32..).zip(&def.textures) {
            material.set_texture(unit, self.loader.load_texture(path, def.create_mips));
        }
        if let Some(color) = def.color {
            material.set_uniform(COLOR_UNIFORM, &color, 4, 1);
        }
        for uniform in &def.uniforms {
            material.set_uniform(&uniform.name, &uniform.values, uniform.dimension, uniform.count);
        }
        material.set_hidden(def.hidden);
        let mesh = def.mesh.as_deref().map(|path| self.loader.load_mesh(path));

        if let Some(component) = self.passes.get_mut(&pass).and_then(|p| p.components.get_mut(entity)) {
            component.materials = vec![material.into_ptr()];
            component.mesh = mesh;
            component.stencil_mode = def.stencil_mode;
            component.stencil_value = def.stencil_value;
            if let Some(color) = def.color {
                component.default_color = Vec4::from(color);
            }
        }
        if def.mesh.is_some() {
            self.events.push(Event::MeshChanged { target: entity, pass });
        }
        if let Some(group) = &def.group {
            self.set_group_id(entity, Some(hash(group)));
        }
        if let Some(offset) = def.sort_order_offset {
            self.set_sort_order_offset(entity, Some(pass), offset, transforms);
        }
    }

    /// Remove every component of the entity
    pub fn destroy(&mut self, entity: Entity) {
        for pass in self.passes.values_mut() {
            pass.components.remove(entity);
            pass.sort_order_manager.destroy(entity);
        }
    }

    /// Remove the entity's component in one pass
    pub fn destroy_in_pass(&mut self, entity: Entity, pass: HashValue) {
        if let Some(pass) = self.passes.get_mut(&pass) {
            pass.components.remove(entity);
            pass.sort_order_manager.destroy(entity);
        }
    }

    /// Move the entity's first component into `pass`
    ///
    /// The explicit sort order offset moves with it. The target pass must not
    /// already hold a component for the entity.
    pub fn set_render_pass(&mut self, entity: Entity, pass: HashValue, transforms: &dyn TransformProvider) {
        let Some(old_pass) = self.render_pass(entity) else {
            return;
        };
        if old_pass == pass {
            return;
        }
        if self.passes.get(&pass).is_some_and(|p| p.components.contains(entity)) {
            dfatal!("Entity {} already has a component in pass {pass:#010x}", entity.id());
            return;
        }
        let Some(old) = self.passes.get_mut(&old_pass) else {
            return;
        };
        let Some(mut component) = old.components.remove(entity) else {
            return;
        };
        let offset = old.sort_order_manager.get_offset(entity);
        old.sort_order_manager.destroy(entity);

        component.pass = pass;
        component.reset_readiness();
        let new_pass = self.pass_mut_or_create(pass);
        new_pass.components.emplace(entity, component);
        if let Some(offset) = offset {
            new_pass.sort_order_manager.set_offset(entity, offset);
        }
        let RenderPassObject {
            components,
            sort_order_manager,
            ..
        } = new_pass;
        sort_order_manager.update_sort_order(entity, transforms, components);
    }

    /// Pass of the entity's first component
    pub fn render_pass(&self, entity: Entity) -> Option<HashValue> {
        self.component(entity, None).map(|component| component.pass)
    }

    /// Every pass the entity has a component in, in draw order
    pub fn render_passes(&self, entity: Entity) -> Vec<HashValue> {
        self.pass_order
            .iter()
            .copied()
            .filter(|id| self.passes.get(id).is_some_and(|p| p.components.contains(entity)))
            .collect()
    }

    // ----------------------------------------------------------------------
    // Visibility

    /// Hide all of the entity's materials
    pub fn hide(&mut self, entity: Entity) {
        self.set_hidden(entity, true);
    }

    /// Show all of the entity's materials
    pub fn show(&mut self, entity: Entity) {
        self.set_hidden(entity, false);
    }

    fn set_hidden(&mut self, entity: Entity, hidden: bool) {
        let was_hidden = self.is_hidden(entity);
        self.for_each_component_mut(entity, None, |component| {
            for material in &component.materials {
                material.borrow_mut().set_hidden(hidden);
            }
        });
        if self.component(entity, None).is_none() || was_hidden == hidden {
            return;
        }
        self.events.push(if hidden {
            Event::Hidden { target: entity }
        } else {
            Event::Unhidden { target: entity }
        });
    }

    /// Whether the entity's first component is hidden
    pub fn is_hidden(&self, entity: Entity) -> bool {
        self.component(entity, None).is_some_and(RenderComponent::is_hidden)
    }

    // ----------------------------------------------------------------------
    // Color and uniforms

    /// Color restored after temporary tints, white if the entity has none
    pub fn default_color(&self, entity: Entity) -> Vec4 {
        self.component(entity, None)
            .map_or_else(|| Vec4::repeat(1.0), |component| component.default_color)
    }

    /// Set the color restored after temporary tints
    pub fn set_default_color(&mut self, entity: Entity, color: Vec4) {
        self.for_each_component_mut(entity, None, |component| component.default_color = color);
    }

    /// Current tint from the `color` uniform
    pub fn color(&self, entity: Entity) -> Option<Vec4> {
        let component = self.component(entity, None)?;
        let material = component.materials.first()?;
        material.borrow().color()
    }

    /// Set the `color` uniform on every material of the entity
    pub fn set_color(&mut self, entity: Entity, color: Vec4) {
        self.set_uniform(entity, None, COLOR_UNIFORM, color.as_slice(), 4, 1);
    }

    /// Set a float uniform on every material of the selected components
    ///
    /// Components without materials get one first.
    pub fn set_uniform(
        &mut self,
        entity: Entity,
        pass: Option<HashValue>,
        name: &str,
        data: &[f32],
        dimension: usize,
        count: usize,
    ) {
        self.for_each_component_mut(entity, pass, |component| {
            ensure_material(component);
            for material in &component.materials {
                material.borrow_mut().set_uniform(name, data, dimension, count);
            }
        });
    }

    /// Set a uniform from raw little-endian `f32` bytes
    ///
    /// A byte length that does not match `ty` and `count` is a contract
    /// violation and leaves the uniform untouched.
    pub fn set_uniform_bytes(
        &mut self,
        entity: Entity,
        pass: Option<HashValue>,
        name: &str,
        ty: UniformType,
        bytes: &[u8],
        count: usize,
    ) {
        self.for_each_component_mut(entity, pass, |component| {
            ensure_material(component);
            for material in &component.materials {
                material.borrow_mut().set_uniform_bytes(name, ty, bytes, count);
            }
        });
    }

    /// Copy a uniform of the selected component into `out`
    pub fn uniform(&self, entity: Entity, pass: Option<HashValue>, name: &str, out: &mut [f32]) -> bool {
        self.component(entity, pass)
            .and_then(|component| component.materials.first())
            .is_some_and(|material| material.borrow().copy_uniform(name, out))
    }

    /// Copy every uniform from `source`'s first material onto `entity`'s
    /// materials
    pub fn copy_uniforms(&mut self, entity: Entity, source: Entity) {
        let Some(source_material) = self.component(source, None).and_then(|c| c.materials.first()).cloned() else {
            return;
        };
        let uniforms: Vec<(String, Vec<f32>, usize, usize)> = source_material
            .borrow()
            .uniforms()
            .map(|(name, uniform)| {
                (
                    name.to_owned(),
                    uniform.as_floats().to_vec(),
                    uniform.ty().dimension(),
                    uniform.count(),
                )
            })
            .collect();
        self.for_each_component_mut(entity, None, |component| {
            ensure_material(component);
            for material in &component.materials {
                if Rc::ptr_eq(material, &source_material) {
                    continue;
                }
                let mut material = material.borrow_mut();
                for (name, values, dimension, count) in &uniforms {
                    material.set_uniform(name, values, *dimension, *count);
                }
            }
        });
    }

    // ----------------------------------------------------------------------
    // Textures, meshes, shaders and materials

    /// Bind a texture on every material of the selected components
    pub fn set_texture(&mut self, entity: Entity, pass: Option<HashValue>, unit: u32, texture: &TexturePtr) {
        self.for_each_component_mut(entity, pass, |component| {
            ensure_material(component);
            for material in &component.materials {
                material.borrow_mut().set_texture(unit, Rc::clone(texture));
            }
            component.textures_reported.remove(&unit);
            component.ready_sent = false;
        });
    }

    /// Load a texture and bind it on every component of the entity
    pub fn set_texture_file(&mut self, entity: Entity, unit: u32, path: &str, create_mips: bool) {
        let texture = self.loader.load_texture(path, create_mips);
        self.set_texture(entity, None, unit, &texture);
    }

    /// Texture bound at `unit` on the entity's first material
    pub fn texture(&self, entity: Entity, unit: u32) -> Option<TexturePtr> {
        let material = self.component(entity, None)?.materials.first()?;
        material.borrow().texture(unit).cloned()
    }

    /// Whether a texture is bound at `unit`
    pub fn is_texture_set(&self, entity: Entity, unit: u32) -> bool {
        self.texture(entity, unit).is_some()
    }

    /// Whether the texture bound at `unit` has loaded
    pub fn is_texture_loaded(&self, entity: Entity, unit: u32) -> bool {
        self.texture(entity, unit).is_some_and(|texture| texture.is_loaded())
    }

    /// Replace the mesh of the selected components
    pub fn set_mesh(&mut self, entity: Entity, pass: Option<HashValue>, mesh: Option<MeshPtr>) {
        let mut changed = Vec::new();
        self.for_each_component_mut(entity, pass, |component| {
            component.mesh.clone_from(&mesh);
            component.ready_sent = false;
            changed.push(component.pass);
        });
        self.events
            .extend(changed.into_iter().map(|pass| Event::MeshChanged { target: entity, pass }));
    }

    /// Load a mesh and use it for every component of the entity
    pub fn set_mesh_file(&mut self, entity: Entity, path: &str) {
        let mesh = self.loader.load_mesh(path);
        self.set_mesh(entity, None, Some(mesh));
    }

    /// Mesh of the selected component
    pub fn mesh(&self, entity: Entity, pass: Option<HashValue>) -> Option<MeshPtr> {
        self.component(entity, pass)?.mesh.clone()
    }

    /// Set the shader on every material of the selected components
    pub fn set_shader(&mut self, entity: Entity, pass: Option<HashValue>, shader: &ShaderPtr) {
        self.for_each_component_mut(entity, pass, |component| {
            ensure_material(component);
            for material in &component.materials {
                material.borrow_mut().set_shader(Some(Rc::clone(shader)));
            }
        });
    }

    /// Load a shader and use it for every component of the entity
    pub fn set_shader_file(&mut self, entity: Entity, path: &str) {
        let shader = self.loader.load_shader(path);
        self.set_shader(entity, None, &shader);
    }

    /// Shader of the selected component's first material
    pub fn shader(&self, entity: Entity, pass: Option<HashValue>) -> Option<ShaderPtr> {
        let material = self.component(entity, pass)?.materials.first()?;
        material.borrow().shader().cloned()
    }

    /// Material `index` of the selected component
    pub fn material(&self, entity: Entity, pass: Option<HashValue>, index: usize) -> Option<MaterialPtr> {
        self.component(entity, pass)?.materials.get(index).cloned()
    }

    /// Replace material `index` with one built from `info`
    ///
    /// Growing the material list fills the gap with copies of the last
    /// material so that no two slots share state.
    pub fn set_material(&mut self, entity: Entity, pass: Option<HashValue>, index: usize, info: &MaterialInfo) {
        let material = self.build_material(info);
        self.for_each_component_mut(entity, pass, |component| {
            while component.materials.len() <= index {
                let copy = component
                    .materials
                    .last()
                    .map_or_else(Material::default, |last| last.borrow().clone());
                component.materials.push(copy.into_ptr());
            }
            component.materials[index] = material.clone().into_ptr();
            component.reset_readiness();
        });
    }

    fn build_material(&mut self, info: &MaterialInfo) -> Material {
        let shader = info.shader.as_deref().map(|path| self.loader.load_shader(path));
        let mut material = Material::new(shader);
        for (unit, path) in (0u32..).zip(&info.textures) {
            material.set_texture(unit, self.loader.load_texture(path, false));
        }
        for uniform in &info.uniforms {
            material.set_uniform(&uniform.name, &uniform.values, uniform.dimension, uniform.count);
        }
        material.set_blend_state(info.blend_state);
        material
    }

    // ----------------------------------------------------------------------
    // Sort order and stencil

    /// Sort order of the entity's first component
    pub fn sort_order(&self, entity: Entity) -> Option<RenderSortOrder> {
        self.component(entity, None).map(|component| component.sort_order)
    }

    /// Explicit sort order offset in the entity's first pass
    pub fn sort_order_offset(&self, entity: Entity) -> Option<i32> {
        let pass = self.render_pass(entity)?;
        self.passes.get(&pass)?.sort_order_manager.get_offset(entity)
    }

    /// Set the sort order offset and refresh the subtree's keys
    pub fn set_sort_order_offset(
        &mut self,
        entity: Entity,
        pass: Option<HashValue>,
        offset: i32,
        transforms: &dyn TransformProvider,
    ) {
        for id in &self.pass_order {
            if pass.is_some_and(|pass| pass != *id) {
                continue;
            }
            let Some(render_pass) = self.passes.get_mut(id) else {
                continue;
            };
            if !render_pass.components.contains(entity) {
                continue;
            }
            let RenderPassObject {
                components,
                sort_order_manager,
                ..
            } = render_pass;
            sort_order_manager.set_offset(entity, offset);
            sort_order_manager.update_sort_order(entity, transforms, components);
        }
    }

    /// Recompute sort orders of `entity` and its descendants in every pass
    pub fn update_sort_order(&mut self, entity: Entity, transforms: &dyn TransformProvider) {
        for render_pass in self.passes.values_mut() {
            let RenderPassObject {
                components,
                sort_order_manager,
                ..
            } = render_pass;
            sort_order_manager.update_sort_order(entity, transforms, components);
        }
    }

    /// Set how the selected components interact with the stencil buffer
    pub fn set_stencil_mode(&mut self, entity: Entity, pass: Option<HashValue>, mode: StencilMode, value: i32) {
        self.for_each_component_mut(entity, pass, |component| {
            component.stencil_mode = mode;
            component.stencil_value = value;
        });
    }

    /// React to hierarchy changes that affect sort orders
    pub fn handle_event(&mut self, event: &Event, transforms: &dyn TransformProvider) {
        match event {
            Event::ParentChangedImmediate { target, .. } | Event::ChildIndexChangedImmediate { target, .. } => {
                self.update_sort_order(*target, transforms);
            }
            _ => {}
        }
    }

    // ----------------------------------------------------------------------
    // Assets

    /// Request a texture
    pub fn load_texture(&mut self, path: &str, create_mips: bool) -> TexturePtr {
        self.loader.load_texture(path, create_mips)
    }

    /// Request a mesh
    pub fn load_mesh(&mut self, path: &str) -> MeshPtr {
        self.loader.load_mesh(path)
    }

    /// Request a shader
    pub fn load_shader(&mut self, path: &str) -> ShaderPtr {
        self.loader.load_shader(path)
    }

    /// Whether the selected component's mesh and textures have loaded
    pub fn is_ready_to_render(&self, entity: Entity, pass: Option<HashValue>) -> bool {
        self.component(entity, pass).is_some_and(RenderComponent::is_ready)
    }

    /// Pump the asset loader and raise readiness events
    pub fn process_tasks(&mut self) {
        self.loader.process();
        self.poll_readiness();
    }

    /// Resolve every outstanding asset request, then raise readiness events
    pub fn wait_for_assets_to_load(&mut self) {
        self.loader.wait_for_all();
        self.poll_readiness();
    }

    fn poll_readiness(&mut self) {
        for id in &self.pass_order {
            let Some(pass) = self.passes.get_mut(id) else {
                continue;
            };
            for (entity, component) in pass.components.iter_mut() {
                if component.ready_sent {
                    continue;
                }
                let loaded_units: Vec<u32> = component
                    .materials
                    .iter()
                    .flat_map(|material| {
                        material
                            .borrow()
                            .textures()
                            .filter(|(_, texture)| texture.is_loaded())
                            .map(|(unit, _)| unit)
                            .collect::<Vec<_>>()
                    })
                    .collect();
                for unit in loaded_units {
                    if component.textures_reported.insert(unit) {
                        self.events.push(Event::TextureReady {
                            target: entity,
                            texture_unit: unit,
                        });
                    }
                }
                if component.is_ready() {
                    component.ready_sent = true;
                    self.events.push(Event::ReadyToRender {
                        target: entity,
                        pass: *id,
                    });
                }
            }
        }
    }

    // ----------------------------------------------------------------------
    // Frame

    /// Build and publish this frame's draw lists
    pub fn submit_render_data(&mut self, transforms: &dyn TransformProvider) {
        let data = self.render_data.write_buffer();
        data.clear();

        for id in &self.pass_order {
            let Some(pass) = self.passes.get(id) else {
                continue;
            };
            let mut container = RenderPassDrawContainer::from_pass(pass);
            for (entity, component) in pass.components.iter() {
                if component.is_hidden() || !component.is_ready() {
                    continue;
                }
                let Some(world_from_entity) = transforms.world_from_entity(entity) else {
                    continue;
                };
                if !transforms.is_enabled(entity) {
                    continue;
                }
                let Some(mesh) = &component.mesh else {
                    continue;
                };
                let submesh_count = mesh.data().map_or(0, |data| data.submesh_count);
                if submesh_count == 0 {
                    continue;
                }
                let group_offset = component
                    .group_id
                    .and_then(|group| self.groups.get(&group))
                    .map_or(0, |params| params.sort_order_offset);

                let per_submesh = component.materials.len() > 1;
                for (index, material) in component.materials.iter().enumerate() {
                    if per_submesh && index >= submesh_count {
                        break;
                    }
                    let layer = {
                        let material = material.borrow();
                        if material.is_hidden() {
                            continue;
                        }
                        self.backend.classify(&pass.render_state, &material)
                    };
                    container.layer_mut(layer).objects.push(RenderObject {
                        entity,
                        mesh: Rc::clone(mesh),
                        material: Rc::clone(material),
                        world_from_entity: *world_from_entity,
                        sort_order: component.sort_order,
                        group_offset,
                        submesh: per_submesh.then_some(index),
                        stencil_mode: component.stencil_mode,
                        stencil_value: component.stencil_value,
                    });
                }
            }
            for layer in &mut container.layers {
                if layer.sort_mode.is_view_independent() {
                    sort_objects(&mut layer.objects, layer.sort_mode);
                }
            }
            data.insert(*id, container);
        }

        self.render_data.publish();
    }

    /// Hand the start of a frame to the device
    pub fn begin_frame(&mut self) {
        self.device.begin_frame();
    }

    /// Hand the end of a frame to the device
    pub fn end_frame(&mut self) {
        self.device.end_frame();
    }

    /// Clear the frame and open the published draw lists
    pub fn begin_rendering(&mut self) {
        let params = ClearParams {
            flags: ClearFlags::all(),
            color: self.clear_color.into(),
            ..ClearParams::default()
        };
        self.device.clear(&params);
        self.rendering = true;
    }

    /// Close the draw lists
    pub fn end_rendering(&mut self) {
        self.rendering = false;
    }

    /// Draw every pass in order
    ///
    /// The panorama pass uses eye-centered copies of the views so it appears
    /// infinitely far away.
    pub fn render(&mut self, views: &[RenderView]) {
        let pano_views: Vec<RenderView> = views.iter().map(eye_centered).collect();
        for pass in self.pass_order.clone() {
            if pass == PANO {
                self.render_single_pass(&pano_views, pass);
            } else {
                self.render_single_pass(views, pass);
            }
        }
    }

    /// Draw one pass
    pub fn render_single_pass(&mut self, views: &[RenderView], pass: HashValue) {
        if !self.rendering {
            dfatal!("Render between begin_rendering() and end_rendering()!");
            return;
        }
        let Some(container) = self
            .render_data
            .read_buffer_mut()
            .and_then(|data| data.get_mut(&pass))
        else {
            return;
        };
        if container.object_count() == 0 {
            return;
        }
        let settings = DrawSettings {
            multiview: self.multiview,
            front_face: self.front_face,
        };
        self.backend
            .draw_pass(self.device.as_mut(), container, views, settings);
        self.device.set_render_state(&RenderState::default());
    }

    /// Number of objects published for `pass`
    pub fn submitted_object_count(&self, pass: HashValue) -> usize {
        self.render_data
            .read_buffer()
            .and_then(|data| data.get(&pass))
            .map_or(0, RenderPassDrawContainer::object_count)
    }

    /// Published draw data of a pass
    pub fn submitted(&self, pass: HashValue) -> Option<&RenderPassDrawContainer> {
        self.render_data.read_buffer()?.get(&pass)
    }
}

fn ensure_material(component: &mut RenderComponent) {
    if component.materials.is_empty() {
        component.materials.push(Material::default().into_ptr());
    }
}

/// Copy of `view` with the eye moved to the world origin
fn eye_centered(view: &RenderView) -> RenderView {
    let mut world_from_eye = view.world_from_eye;
    world_from_eye.m14 = 0.0;
    world_from_eye.m24 = 0.0;
    world_from_eye.m34 = 0.0;
    let eye_from_world = world_from_eye.try_inverse().unwrap_or_else(Mat4::identity);
    RenderView {
        world_from_eye,
        eye_from_world,
        clip_from_world: view.clip_from_eye * eye_from_world,
        ..*view
    }
}
