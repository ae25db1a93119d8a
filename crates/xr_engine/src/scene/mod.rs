//! Scene management
//!
//! A [`Scene`] bridges the entity bookkeeping with the render system:
//!
//! ```text
//! World + TransformHierarchy (structure)
//!      ↓ hierarchy events, delivered synchronously
//! RenderSystem (sort orders, draw lists)
//!      ↓ frame
//! CameraManager views → passes → GraphicsDevice
//! ```
//!
//! Hierarchy mutations go through the scene so the resulting
//! `ParentChangedImmediate` and `ChildIndexChangedImmediate` events reach the
//! render system before the next submission.

pub mod transform;

pub use transform::{TransformHierarchy, TransformProvider};

use crate::camera::CameraManager;
use crate::core::config::RenderConfig;
use crate::ecs::{tags::Tag, Entity, TagStore, World};
use crate::events::{Dispatcher, Event};
use crate::foundation::math::Sqt;
use crate::render::assets::AssetLoader;
use crate::render::device::GraphicsDevice;
use crate::render::{RenderDef, RenderError, RenderSystem};

/// Tag carried by entities with at least one render component
#[derive(Debug)]
pub struct Renderable;

impl Tag for Renderable {}

/// Entities, their hierarchy, cameras and the render system
pub struct Scene {
    world: World,
    transforms: TransformHierarchy,
    tags: TagStore,
    cameras: CameraManager,
    render: RenderSystem,
    dispatcher: Dispatcher,
}

impl Scene {
    /// Create an empty scene drawing through `device`
    pub fn new(
        config: &RenderConfig,
        device: Box<dyn GraphicsDevice>,
        loader: Box<dyn AssetLoader>,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            world: World::new(),
            transforms: TransformHierarchy::new(),
            tags: TagStore::new(),
            cameras: CameraManager::new(),
            render: RenderSystem::new(config, device, loader)?,
            dispatcher: Dispatcher::new(),
        })
    }

    /// Create a root entity with a local transform
    pub fn create_entity(&mut self, local: Sqt) -> Entity {
        let entity = self.world.create();
        self.transforms.create(entity, local);
        entity
    }

    /// Destroy an entity and its descendants
    pub fn destroy_entity(&mut self, entity: Entity) {
        let (removed, events) = self.transforms.destroy(entity);
        self.forward(events);
        for entity in removed {
            self.render.destroy(entity);
            self.tags.remove_entity(entity);
            self.world.destroy(entity);
        }
    }

    /// Whether the entity exists
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    /// Move `child` under `parent`, or to the roots with `Entity::NULL`
    pub fn set_parent(&mut self, child: Entity, parent: Entity) {
        let events = self.transforms.set_parent(child, parent);
        self.forward(events);
    }

    /// Insert `child` under `parent` at a sibling index
    pub fn insert_child(&mut self, parent: Entity, child: Entity, index: usize) {
        let events = self.transforms.insert_child(parent, child, index);
        self.forward(events);
    }

    /// Move an entity within its sibling list
    pub fn move_to_index(&mut self, entity: Entity, index: usize) {
        let events = self.transforms.move_to_index(entity, index);
        self.forward(events);
    }

    /// Set an entity's transform relative to its parent
    pub fn set_local_sqt(&mut self, entity: Entity, local: Sqt) {
        self.transforms.set_local_sqt(entity, local);
    }

    /// Enable or disable an entity and, through inheritance, its subtree
    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) {
        self.transforms.set_enabled(entity, enabled);
    }

    /// Give an entity a render component described by `def`
    pub fn create_renderable(&mut self, entity: Entity, def: &RenderDef) {
        self.render.create_from_def(entity, def, &self.transforms);
        self.tags.register::<Renderable>(entity);
    }

    /// Remove every render component of an entity
    pub fn remove_renderable(&mut self, entity: Entity) {
        self.render.destroy(entity);
        while self.tags.release::<Renderable>(entity) {}
    }

    /// Set an explicit sort order offset in every pass the entity is in
    pub fn set_sort_order_offset(&mut self, entity: Entity, offset: i32) {
        self.render
            .set_sort_order_offset(entity, None, offset, &self.transforms);
    }

    fn forward(&mut self, events: Vec<Event>) {
        for event in events {
            self.render.handle_event(&event, &self.transforms);
            self.dispatcher.send(&event);
        }
    }

    /// Poll assets and deliver the render system's events
    pub fn update(&mut self) {
        self.render.process_tasks();
        for event in self.render.drain_events() {
            self.dispatcher.post(event);
        }
        let delivered = self.dispatcher.dispatch();
        if delivered > 0 {
            log::trace!("Delivered {delivered} scene events");
        }
    }

    /// Submit and draw one frame for the screen cameras
    pub fn render(&mut self) {
        self.render.submit_render_data(&self.transforms);
        self.render.begin_frame();
        self.render.begin_rendering();
        let views = self.cameras.screen_render_views();
        self.render.render(&views);
        self.render.end_rendering();
        self.render.end_frame();
    }

    /// Entity allocator
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Transform hierarchy
    pub const fn transforms(&self) -> &TransformHierarchy {
        &self.transforms
    }

    /// Entity tags
    pub const fn tags(&self) -> &TagStore {
        &self.tags
    }

    /// Entity tags, mutably
    pub fn tags_mut(&mut self) -> &mut TagStore {
        &mut self.tags
    }

    /// Camera registry
    pub const fn cameras(&self) -> &CameraManager {
        &self.cameras
    }

    /// Camera registry, mutably
    pub fn cameras_mut(&mut self) -> &mut CameraManager {
        &mut self.cameras
    }

    /// Render system
    pub const fn render_system(&self) -> &RenderSystem {
        &self.render
    }

    /// Render system with the hierarchy its sort-order calls need
    pub fn render_system_mut(&mut self) -> (&mut RenderSystem, &TransformHierarchy) {
        (&mut self.render, &self.transforms)
    }

    /// Event bus
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use crate::render::assets::DeferredAssetLoader;
    use crate::render::device::RecordingDevice;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn scene() -> Scene {
        Scene::new(
            &RenderConfig::default(),
            Box::new(RecordingDevice::new()),
            Box::new(DeferredAssetLoader::new()),
        )
        .unwrap()
    }

    fn quad() -> RenderDef {
        RenderDef {
            mesh: Some("meshes/quad".into()),
            ..RenderDef::default()
        }
    }

    #[test]
    fn test_reparent_updates_sort_order_immediately() {
        let mut scene = scene();
        let a = scene.create_entity(Sqt::default());
        let b = scene.create_entity(Sqt::default());
        let child = scene.create_entity(Sqt::default());
        for entity in [a, b, child] {
            scene.create_renderable(entity, &quad());
        }
        scene.set_parent(child, a);
        let under_a = scene.render_system().sort_order(child).unwrap();

        scene.set_parent(child, b);
        let under_b = scene.render_system().sort_order(child).unwrap();
        assert!(under_a < under_b);
        assert!(scene.render_system().sort_order(b).unwrap() < under_b);
    }

    #[test]
    fn test_sibling_moves_update_sort_order() {
        let mut scene = scene();
        let parent = scene.create_entity(Sqt::default());
        let first = scene.create_entity(Sqt::default());
        let second = scene.create_entity(Sqt::default());
        scene.set_parent(first, parent);
        scene.set_parent(second, parent);
        scene.create_renderable(first, &quad());
        scene.create_renderable(second, &quad());

        let render = scene.render_system();
        assert!(render.sort_order(first) < render.sort_order(second));
        scene.move_to_index(second, 0);
        let render = scene.render_system();
        assert!(render.sort_order(second) < render.sort_order(first));
    }

    #[test]
    fn test_destroy_removes_subtree_everywhere() {
        let mut scene = scene();
        let parent = scene.create_entity(Sqt::default());
        let child = scene.create_entity(Sqt::default());
        scene.set_parent(child, parent);
        scene.create_renderable(child, &quad());
        assert!(scene.tags().has::<Renderable>(child));

        scene.destroy_entity(parent);
        assert!(!scene.is_alive(child));
        assert!(!scene.tags().has::<Renderable>(child));
        assert!(scene.render_system().render_pass(child).is_none());
    }

    #[test]
    fn test_update_delivers_render_events() {
        let mut scene = scene();
        let ready = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&ready);
        scene
            .dispatcher_mut()
            .connect(EventType::ReadyToRender, move |event: &Event| {
                sink.borrow_mut().push(event.target());
                false
            });
        let entity = scene.create_entity(Sqt::default());
        scene.create_renderable(entity, &quad());

        scene.update();
        assert_eq!(*ready.borrow(), vec![entity]);
    }

    #[test]
    fn test_remove_renderable_releases_tag() {
        let mut scene = scene();
        let entity = scene.create_entity(Sqt::default());
        scene.create_renderable(entity, &quad());
        scene.remove_renderable(entity);
        assert!(!scene.tags().has::<Renderable>(entity));
        assert!(scene.render_system().render_passes(entity).is_empty());
    }
}
