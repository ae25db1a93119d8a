//! Camera registry keyed by render target

use super::{Camera, CameraHandle};
use crate::dfatal;
use crate::foundation::hash::{hash, HashValue};
use crate::foundation::math::{Ray, Vec2, Viewport};
use crate::render::view::RenderView;
use std::collections::HashMap;

/// Identifier of a render target (the hash of its name)
pub type RenderTargetId = HashValue;

/// Render target the screen cameras draw into unless changed
pub const DEFAULT_SCREEN_RENDER_TARGET: RenderTargetId = hash("Screen");

/// Tracks which cameras render into which target.
///
/// Cameras are kept in registration order per target, and that order decides
/// both pixel lookups (first match wins) and the order of populated views.
#[derive(Debug)]
pub struct CameraManager {
    cameras: HashMap<RenderTargetId, Vec<CameraHandle>>,
    screen_render_target: RenderTargetId,
}

impl Default for CameraManager {
    fn default() -> Self {
        Self {
            cameras: HashMap::new(),
            screen_render_target: DEFAULT_SCREEN_RENDER_TARGET,
        }
    }
}

impl CameraManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a camera to a target's list.
    ///
    /// Registering the same camera twice for one target is a contract
    /// violation.
    pub fn register_camera(&mut self, camera: &CameraHandle, render_target: RenderTargetId) {
        let list = self.cameras.entry(render_target).or_default();
        if list.iter().any(|c| c.ptr_eq(camera)) {
            dfatal!("Camera is already registered for render target {render_target:#x}");
            return;
        }
        list.push(camera.clone());
    }

    /// Register a camera for the screen target
    pub fn register_screen_camera(&mut self, camera: &CameraHandle) {
        self.register_camera(camera, self.screen_render_target);
    }

    /// Remove a camera from a target. Unknown cameras are ignored.
    pub fn unregister_camera(&mut self, camera: &CameraHandle, render_target: RenderTargetId) {
        let Some(list) = self.cameras.get_mut(&render_target) else {
            return;
        };
        if let Some(pos) = list.iter().position(|c| c.ptr_eq(camera)) {
            list.remove(pos);
        }
        if list.is_empty() {
            self.cameras.remove(&render_target);
        }
    }

    /// Remove a camera from the screen target
    pub fn unregister_screen_camera(&mut self, camera: &CameraHandle) {
        self.unregister_camera(camera, self.screen_render_target);
    }

    /// Convenience for callers without their own camera ownership: build a
    /// camera, register it for the screen and return the shared handle.
    pub fn create_screen_camera(
        &mut self,
        near: f32,
        far: f32,
        vertical_fov: f32,
        viewport: Viewport,
    ) -> CameraHandle {
        let mut camera = Camera::new();
        camera.setup_display(near, far, vertical_fov, viewport);
        let handle = CameraHandle::new(camera);
        self.register_screen_camera(&handle);
        handle
    }

    /// Cameras registered for a target, in registration order
    pub fn cameras(&self, render_target: RenderTargetId) -> Option<&[CameraHandle]> {
        self.cameras.get(&render_target).map(Vec::as_slice)
    }

    /// Cameras registered for the screen target
    pub fn screen_cameras(&self) -> Option<&[CameraHandle]> {
        self.cameras(self.screen_render_target)
    }

    /// Change which target counts as the screen
    pub fn set_screen_render_target(&mut self, render_target: RenderTargetId) {
        self.screen_render_target = render_target;
    }

    /// Current screen target
    pub const fn screen_render_target(&self) -> RenderTargetId {
        self.screen_render_target
    }

    /// Number of cameras registered for a target
    pub fn num_cameras_for_target(&self, render_target: RenderTargetId) -> usize {
        self.cameras.get(&render_target).map_or(0, Vec::len)
    }

    /// Number of screen cameras
    pub fn num_cameras_for_screen(&self) -> usize {
        self.num_cameras_for_target(self.screen_render_target)
    }

    /// First registered camera whose viewport contains the pixel, edges included
    pub fn camera_by_target_pixel(
        &self,
        render_target: RenderTargetId,
        pixel: &Vec2,
    ) -> Option<CameraHandle> {
        self.cameras
            .get(&render_target)?
            .iter()
            .find(|camera| camera.borrow().viewport().contains(pixel))
            .cloned()
    }

    /// Screen camera under the pixel
    pub fn camera_by_screen_pixel(&self, pixel: &Vec2) -> Option<CameraHandle> {
        self.camera_by_target_pixel(self.screen_render_target, pixel)
    }

    /// World ray through a target pixel, using the camera under it
    pub fn world_ray_from_target_pixel(
        &self,
        render_target: RenderTargetId,
        pixel: &Vec2,
    ) -> Option<Ray> {
        let Some(camera) = self.camera_by_target_pixel(render_target, pixel) else {
            log::error!("No camera for target pixel ({}, {})", pixel.x, pixel.y);
            return None;
        };
        let ray = camera.borrow().world_ray_from_pixel(pixel);
        ray
    }

    /// World ray through a screen pixel
    pub fn world_ray_from_screen_pixel(&self, pixel: &Vec2) -> Option<Ray> {
        self.world_ray_from_target_pixel(self.screen_render_target, pixel)
    }

    /// World ray through a UV coordinate of the combined screen rectangle
    pub fn world_ray_from_screen_uv(&self, uv: &Vec2) -> Option<Ray> {
        let pixel = self.pixel_from_screen_uv(uv)?;
        self.world_ray_from_target_pixel(self.screen_render_target, &pixel)
    }

    /// Map a UV coordinate onto the bounding rectangle of all screen
    /// viewports. Side-by-side stereo cameras are treated as one surface.
    pub fn pixel_from_screen_uv(&self, uv: &Vec2) -> Option<Vec2> {
        let cameras = self.screen_cameras()?;
        let bounds = cameras
            .iter()
            .map(|camera| *camera.borrow().viewport())
            .reduce(|acc, viewport| acc.union(&viewport))?;
        let min = bounds.position().cast::<f32>();
        let size = bounds.size().cast::<f32>();
        Some(min + size.component_mul(uv))
    }

    /// Fill `views[i]` from the i-th camera registered for the target.
    ///
    /// `views` must have exactly one slot per registered camera; a mismatch
    /// is a contract violation.
    pub fn populate_render_views_for_target(
        &self,
        render_target: RenderTargetId,
        views: &mut [RenderView],
    ) {
        if views.is_empty() {
            return;
        }
        let Some(cameras) = self.cameras.get(&render_target) else {
            dfatal!("No cameras registered for render target {render_target:#x}");
            return;
        };
        if cameras.len() != views.len() {
            dfatal!(
                "View count mismatch for render target {render_target:#x}: {} cameras, {} views",
                cameras.len(),
                views.len()
            );
        }
        for (eye, (camera, view)) in cameras.iter().zip(views.iter_mut()).enumerate() {
            camera.borrow().populate_render_view(view);
            view.eye = eye;
        }
    }

    /// Fill views from the screen cameras
    pub fn populate_render_views_for_screen(&self, views: &mut [RenderView]) {
        self.populate_render_views_for_target(self.screen_render_target, views);
    }

    /// Views for every screen camera, in registration order
    pub fn screen_render_views(&self) -> Vec<RenderView> {
        let mut views = vec![RenderView::default(); self.num_cameras_for_screen()];
        self.populate_render_views_for_screen(&mut views);
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Vec3};
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;
    const NEAR: f32 = 0.01;
    const FAR: f32 = 200.0;

    fn camera_with_viewport(viewport: Viewport) -> CameraHandle {
        let mut camera = Camera::new();
        camera.setup_display(NEAR, FAR, FRAC_PI_2, viewport);
        CameraHandle::new(camera)
    }

    fn side_by_side() -> (CameraManager, CameraHandle, CameraHandle) {
        let mut manager = CameraManager::new();
        let left = camera_with_viewport(Viewport::new(0, 0, 100, 200));
        let right = camera_with_viewport(Viewport::new(100, 0, 100, 200));
        manager.register_screen_camera(&left);
        manager.register_screen_camera(&right);
        (manager, left, right)
    }

    #[test]
    fn test_camera_registration() {
        let target = DEFAULT_SCREEN_RENDER_TARGET;
        let mut manager = CameraManager::new();
        let camera = CameraHandle::new(Camera::new());
        let camera2 = CameraHandle::new(Camera::new());

        manager.register_screen_camera(&camera);
        assert_eq!(manager.num_cameras_for_target(target), 1);
        manager.register_screen_camera(&camera2);
        let cameras = manager.cameras(target).unwrap();
        assert!(cameras[0].ptr_eq(&camera));
        assert!(cameras[1].ptr_eq(&camera2));

        manager.unregister_screen_camera(&camera);
        assert_eq!(manager.num_cameras_for_target(target), 1);
        assert!(manager.cameras(target).unwrap()[0].ptr_eq(&camera2));
        manager.unregister_screen_camera(&camera2);
        assert_eq!(manager.num_cameras_for_target(target), 0);
        assert!(manager.cameras(target).is_none());

        manager.unregister_screen_camera(&camera);
        manager.unregister_screen_camera(&camera2);
        assert_eq!(manager.num_cameras_for_screen(), 0);
        assert_eq!(camera.strong_count(), 1);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "already registered"))]
    fn test_duplicate_registration() {
        let mut manager = CameraManager::new();
        let camera = CameraHandle::new(Camera::new());
        manager.register_screen_camera(&camera);
        manager.register_screen_camera(&camera);
        assert_eq!(manager.num_cameras_for_screen(), 1);
    }

    #[test]
    fn test_screen_render_target() {
        let target1 = DEFAULT_SCREEN_RENDER_TARGET;
        let target2 = hash("target2");
        let mut manager = CameraManager::new();
        let camera = CameraHandle::new(Camera::new());
        let camera2 = CameraHandle::new(Camera::new());

        manager.register_screen_camera(&camera);
        assert_eq!(manager.num_cameras_for_screen(), 1);
        manager.set_screen_render_target(target2);
        assert_eq!(manager.num_cameras_for_screen(), 0);

        manager.register_screen_camera(&camera2);
        manager.register_camera(&camera2, target1);
        assert_eq!(manager.num_cameras_for_screen(), 1);
        assert_eq!(manager.num_cameras_for_target(target1), 2);

        manager.unregister_camera(&camera2, target2);
        assert_eq!(manager.num_cameras_for_screen(), 0);
        manager.set_screen_render_target(target1);
        let cameras = manager.screen_cameras().unwrap();
        assert!(cameras[0].ptr_eq(&camera));
        assert!(cameras[1].ptr_eq(&camera2));
    }

    #[test]
    fn test_camera_by_pixel() {
        let (mut manager, left, right) = side_by_side();
        assert!(manager
            .camera_by_screen_pixel(&Vec2::new(50.0, 200.0))
            .unwrap()
            .ptr_eq(&left));
        assert!(manager
            .camera_by_screen_pixel(&Vec2::new(150.0, 0.0))
            .unwrap()
            .ptr_eq(&right));
        assert!(manager.camera_by_screen_pixel(&Vec2::new(150.0, 200.1)).is_none());

        // Shared edge goes to the earlier registration.
        assert!(manager
            .camera_by_screen_pixel(&Vec2::new(100.0, 10.0))
            .unwrap()
            .ptr_eq(&left));

        let target2 = hash("target2");
        manager.register_camera(&left, target2);
        assert!(manager
            .camera_by_target_pixel(target2, &Vec2::new(50.0, 100.0))
            .unwrap()
            .ptr_eq(&left));
        assert!(manager
            .camera_by_target_pixel(target2, &Vec2::new(150.0, 100.0))
            .is_none());
        assert!(manager
            .camera_by_target_pixel(hash("unknown"), &Vec2::new(0.0, 0.0))
            .is_none());
    }

    #[test]
    fn test_world_ray_from_pixel() {
        let (manager, _left, right) = side_by_side();
        right.borrow_mut().set_sensor_pose(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2),
        );

        let ray = manager
            .world_ray_from_screen_pixel(&Vec2::new(50.0, 100.0))
            .unwrap();
        assert_relative_eq!(ray.origin, Vec3::zeros(), epsilon = EPSILON);
        assert_relative_eq!(ray.direction, Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);

        let ray = manager
            .world_ray_from_screen_pixel(&Vec2::new(150.0, 100.0))
            .unwrap();
        assert_relative_eq!(ray.origin, Vec3::new(1.0, 2.0, 3.0), epsilon = EPSILON);
        assert_relative_eq!(ray.direction, Vec3::new(-1.0, 0.0, 0.0), epsilon = EPSILON);

        assert!(manager
            .world_ray_from_screen_pixel(&Vec2::new(150.0, 200.1))
            .is_none());
    }

    #[test]
    fn test_pixel_from_screen_uv() {
        let mut manager = CameraManager::new();
        assert!(manager.pixel_from_screen_uv(&Vec2::new(0.5, 0.5)).is_none());

        manager.create_screen_camera(NEAR, FAR, FRAC_PI_2, Viewport::new(10, 20, 100, 200));
        manager.create_screen_camera(NEAR, FAR, FRAC_PI_2, Viewport::new(110, 20, 100, 200));
        assert_eq!(
            manager.pixel_from_screen_uv(&Vec2::new(0.0, 0.0)),
            Some(Vec2::new(10.0, 20.0))
        );
        assert_eq!(
            manager.pixel_from_screen_uv(&Vec2::new(0.5, 1.0)),
            Some(Vec2::new(110.0, 220.0))
        );

        let ray = manager.world_ray_from_screen_uv(&Vec2::new(0.25, 0.5)).unwrap();
        assert_relative_eq!(ray.direction, Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_populate_render_views() {
        let (manager, left, right) = side_by_side();
        let views = manager.screen_render_views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0], {
            let mut view = left.borrow().render_view();
            view.eye = 0;
            view
        });
        assert_eq!(views[1].viewport, right.borrow().viewport().position());
        assert_eq!(views[1].eye, 1);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "View count mismatch"))]
    fn test_populate_render_views_count_mismatch() {
        let (manager, _left, _right) = side_by_side();
        let mut views = [RenderView::default(); 3];
        manager.populate_render_views_for_screen(&mut views);
        assert_eq!(views[2], RenderView::default());
    }
}
