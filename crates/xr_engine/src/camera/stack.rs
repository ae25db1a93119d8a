//! Camera matrix stack

use super::math::{
    clip_from_uv, fov_from_vertical, invert_or_identity, invert_perspective, perspective_from_fov,
    project_point, uv_from_clip,
};
use crate::foundation::math::{
    transform_matrix, translation_of, Mat4, Quat, Ray, Rect, Vec2, Vec3, Viewport,
};
use crate::render::view::RenderView;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Rotation of the display relative to the device's natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayRotation {
    /// Natural orientation
    #[default]
    Rotation0,
    /// Rotated 90 degrees
    Rotation90,
    /// Rotated 180 degrees
    Rotation180,
    /// Rotated 270 degrees
    Rotation270,
}

/// Physical orientation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOrientation {
    /// Orientation could not be determined
    Unknown,
    /// Upright portrait
    Portrait,
    /// Landscape, rotated counter-clockwise
    Landscape,
    /// Landscape, rotated clockwise
    ReverseLandscape,
}

impl DisplayRotation {
    /// Device orientation implied by this display rotation.
    /// Upside-down portrait is reported as unknown.
    pub const fn orientation(self) -> DeviceOrientation {
        match self {
            Self::Rotation0 => DeviceOrientation::Portrait,
            Self::Rotation90 => DeviceOrientation::Landscape,
            Self::Rotation180 => DeviceOrientation::Unknown,
            Self::Rotation270 => DeviceOrientation::ReverseLandscape,
        }
    }

    /// Display rotation for a device orientation
    pub const fn from_orientation(orientation: DeviceOrientation) -> Self {
        match orientation {
            DeviceOrientation::Unknown | DeviceOrientation::Portrait => Self::Rotation0,
            DeviceOrientation::Landscape => Self::Rotation90,
            DeviceOrientation::ReverseLandscape => Self::Rotation270,
        }
    }

    /// Rotation in degrees
    pub const fn degrees(self) -> u32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }
}

fn aspect_of(viewport: &Viewport) -> f32 {
    if viewport.is_empty() {
        1.0
    } else {
        viewport.width as f32 / viewport.height as f32
    }
}

/// A camera with its full matrix stack.
///
/// Inputs are the projection (near/far planes, field of view, clip scale),
/// the placement of the tracking space in the world (`world_from_sensor_start`),
/// the live sensor pose and the eye offset (`camera_from_sensor`). Every
/// setter recomputes the derived matrices eagerly.
#[derive(Debug, Clone)]
pub struct Camera {
    clip_from_world: Mat4,
    world_from_clip: Mat4,
    clip_from_camera: Mat4,
    camera_from_clip: Mat4,
    camera_from_world: Mat4,
    world_from_camera: Mat4,
    world_from_sensor_start: Mat4,
    sensor_start_from_world: Mat4,
    camera_from_sensor: Mat4,
    sensor_from_camera: Mat4,

    sensor_pos_local: Vec3,
    sensor_rot_local: Quat,

    near_clip: f32,
    far_clip: f32,
    fov: Rect,
    vertical_fov: Option<f32>,
    viewport: Viewport,
    clip_scale: Vec3,
    display_rotation: DisplayRotation,
    tracking: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            clip_from_world: Mat4::identity(),
            world_from_clip: Mat4::identity(),
            clip_from_camera: Mat4::identity(),
            camera_from_clip: Mat4::identity(),
            camera_from_world: Mat4::identity(),
            world_from_camera: Mat4::identity(),
            world_from_sensor_start: Mat4::identity(),
            sensor_start_from_world: Mat4::identity(),
            camera_from_sensor: Mat4::identity(),
            sensor_from_camera: Mat4::identity(),
            sensor_pos_local: Vec3::zeros(),
            sensor_rot_local: Quat::identity(),
            near_clip: 0.01,
            far_clip: 200.0,
            fov: Rect::default(),
            vertical_fov: None,
            viewport: Viewport::default(),
            clip_scale: Vec3::new(1.0, 1.0, 1.0),
            display_rotation: DisplayRotation::Rotation0,
            tracking: false,
        }
    }
}

impl Camera {
    /// Create a camera with identity matrices and no viewport
    pub fn new() -> Self {
        Self::default()
    }

    // --- Setters --------------------------------------------------------

    /// Configure the projection from a full vertical field of view (radians).
    /// The horizontal field of view follows from the viewport's aspect ratio,
    /// including viewports set later through [`Camera::set_viewport`].
    pub fn setup_display(&mut self, near: f32, far: f32, vertical_fov: f32, viewport: Viewport) {
        let fov = fov_from_vertical(vertical_fov, aspect_of(&viewport));
        self.setup_display_with_fov(near, far, fov, viewport);
        self.vertical_fov = Some(vertical_fov);
    }

    /// Configure the projection from explicit half-angles (radians)
    pub fn setup_display_with_fov(&mut self, near: f32, far: f32, fov: Rect, viewport: Viewport) {
        if !(near > 0.0 && near < far) {
            log::warn!("Camera clip planes must satisfy 0 < near < far (near {near}, far {far})");
        }
        self.near_clip = near;
        self.far_clip = far;
        self.fov = fov;
        self.vertical_fov = None;
        self.viewport = viewport;
        self.update_projection();
    }

    /// Replace the projection matrix directly, bypassing near/far/fov
    pub fn set_clip_from_camera(&mut self, clip_from_camera: Mat4) {
        self.clip_from_camera = clip_from_camera;
        self.vertical_fov = None;
        self.camera_from_clip = invert_perspective(&clip_from_camera);
        self.update_view();
    }

    /// Change the viewport
    ///
    /// Cameras configured with [`Camera::setup_display`] keep their vertical
    /// field of view and re-derive the horizontal one from the new aspect
    /// ratio. Explicit half-angles and projection matrices are left alone.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(vertical_fov) = self.vertical_fov {
            self.fov = fov_from_vertical(vertical_fov, aspect_of(&viewport));
            self.update_projection();
        }
    }

    /// Per-axis scale applied on top of the projection
    pub fn set_clip_scale(&mut self, clip_scale: Vec3) {
        self.clip_scale = clip_scale;
        self.update_projection();
    }

    /// Place the tracking origin in the world
    pub fn set_world_from_sensor_start(&mut self, world_from_sensor_start: Mat4) {
        self.world_from_sensor_start = world_from_sensor_start;
        self.sensor_start_from_world = invert_or_identity(&world_from_sensor_start);
        self.update_view();
    }

    /// Live sensor pose relative to the tracking origin
    pub fn set_sensor_pose(&mut self, position: Vec3, rotation: Quat) {
        self.sensor_pos_local = position;
        self.sensor_rot_local = rotation;
        self.update_view();
    }

    /// Eye offset from the sensor
    pub fn set_camera_from_sensor(&mut self, camera_from_sensor: Mat4) {
        self.camera_from_sensor = camera_from_sensor;
        self.sensor_from_camera = invert_or_identity(&camera_from_sensor);
        self.update_view();
    }

    /// Set the display rotation
    pub fn set_display_rotation(&mut self, rotation: DisplayRotation) {
        self.display_rotation = rotation;
    }

    /// Mark whether the camera follows a tracked device
    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    fn update_projection(&mut self) {
        let projection = perspective_from_fov(&self.fov, self.near_clip, self.far_clip);
        self.clip_from_camera = Mat4::new_nonuniform_scaling(&self.clip_scale) * projection;
        self.camera_from_clip = invert_perspective(&self.clip_from_camera);
        self.update_view();
    }

    fn update_view(&mut self) {
        let sensor_start_from_sensor = transform_matrix(
            &self.sensor_pos_local,
            &self.sensor_rot_local,
            &Vec3::new(1.0, 1.0, 1.0),
        );
        self.world_from_camera =
            self.world_from_sensor_start * sensor_start_from_sensor * self.sensor_from_camera;
        self.camera_from_world = invert_or_identity(&self.world_from_camera);
        self.clip_from_world = self.clip_from_camera * self.camera_from_world;
        self.world_from_clip = self.world_from_camera * self.camera_from_clip;
    }

    // --- Matrix stack ---------------------------------------------------

    /// View-projection matrix
    pub const fn clip_from_world(&self) -> &Mat4 {
        &self.clip_from_world
    }

    /// Inverse view-projection matrix
    pub const fn world_from_clip(&self) -> &Mat4 {
        &self.world_from_clip
    }

    /// Projection matrix
    pub const fn clip_from_camera(&self) -> &Mat4 {
        &self.clip_from_camera
    }

    /// Inverse projection matrix
    pub const fn camera_from_clip(&self) -> &Mat4 {
        &self.camera_from_clip
    }

    /// View matrix
    pub const fn camera_from_world(&self) -> &Mat4 {
        &self.camera_from_world
    }

    /// Camera placement in the world
    pub const fn world_from_camera(&self) -> &Mat4 {
        &self.world_from_camera
    }

    /// Tracking origin placement in the world
    pub const fn world_from_sensor_start(&self) -> &Mat4 {
        &self.world_from_sensor_start
    }

    /// Inverse of [`Camera::world_from_sensor_start`]
    pub const fn sensor_start_from_world(&self) -> &Mat4 {
        &self.sensor_start_from_world
    }

    /// Eye offset from the sensor
    pub const fn camera_from_sensor(&self) -> &Mat4 {
        &self.camera_from_sensor
    }

    /// Inverse eye offset
    pub const fn sensor_from_camera(&self) -> &Mat4 {
        &self.sensor_from_camera
    }

    // --- Inputs ---------------------------------------------------------

    /// Sensor position relative to the tracking origin
    pub const fn local_position(&self) -> &Vec3 {
        &self.sensor_pos_local
    }

    /// Sensor rotation relative to the tracking origin
    pub const fn local_rotation(&self) -> &Quat {
        &self.sensor_rot_local
    }

    /// Camera position in world space
    pub fn world_position(&self) -> Vec3 {
        translation_of(&self.world_from_camera)
    }

    /// Camera rotation in world space
    pub fn world_rotation(&self) -> Quat {
        let rotation = self.world_from_camera.fixed_view::<3, 3>(0, 0).into_owned();
        Quat::from_matrix(&rotation)
    }

    /// Near clip plane distance
    pub const fn near_clip(&self) -> f32 {
        self.near_clip
    }

    /// Far clip plane distance
    pub const fn far_clip(&self) -> f32 {
        self.far_clip
    }

    /// Field of view half-angles
    pub const fn fov(&self) -> &Rect {
        &self.fov
    }

    /// Pixel viewport
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Projection scale
    pub const fn clip_scale(&self) -> &Vec3 {
        &self.clip_scale
    }

    /// Display rotation
    pub const fn display_rotation(&self) -> DisplayRotation {
        self.display_rotation
    }

    /// Device orientation implied by the display rotation
    pub const fn orientation(&self) -> DeviceOrientation {
        self.display_rotation.orientation()
    }

    /// Whether the camera follows a tracked device
    pub const fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Viewport width in pixels
    pub const fn width(&self) -> i32 {
        self.viewport.width
    }

    /// Viewport height in pixels
    pub const fn height(&self) -> i32 {
        self.viewport.height
    }

    /// Fill a render view from this camera
    pub fn populate_render_view(&self, view: &mut RenderView) {
        view.viewport = self.viewport.position();
        view.dimensions = self.viewport.size();
        view.world_from_eye = self.world_from_camera;
        view.eye_from_world = self.camera_from_world;
        view.clip_from_eye = self.clip_from_camera;
        view.clip_from_world = self.clip_from_world;
    }

    /// Render view for this camera
    pub fn render_view(&self) -> RenderView {
        let mut view = RenderView::default();
        self.populate_render_view(&mut view);
        view
    }

    // --- Derived queries ------------------------------------------------

    /// Ray from the camera through the far-plane point under `clip_point`'s x/y.
    pub fn world_ray_from_clip_point(&self, clip_point: &Vec3) -> Ray {
        let origin = self.world_position();
        let far_point = self.world_point_from_clip(&Vec3::new(clip_point.x, clip_point.y, 1.0));
        Ray::new(origin, (far_point - origin).normalize())
    }

    /// Ray through a UV coordinate
    pub fn world_ray_from_uv(&self, uv: &Vec2) -> Ray {
        self.world_ray_from_clip_point(&clip_from_uv(uv))
    }

    /// Ray through a pixel. `None` if the viewport is empty.
    pub fn world_ray_from_pixel(&self, pixel: &Vec2) -> Option<Ray> {
        self.clip_from_pixel(pixel)
            .map(|clip| self.world_ray_from_clip_point(&clip))
    }

    /// Pixel a world point projects to. `None` if the viewport is empty.
    ///
    /// Points on or behind the camera plane produce non-finite coordinates.
    pub fn pixel_from_world_point(&self, world_point: &Vec3) -> Option<Vec2> {
        self.pixel_from_clip(&self.clip_from_world_point(world_point))
    }

    /// World point for a clip-space point
    pub fn world_point_from_clip(&self, clip_point: &Vec3) -> Vec3 {
        project_point(&self.world_from_clip, clip_point)
    }

    /// Clip-space point for a world point
    pub fn clip_from_world_point(&self, world_point: &Vec3) -> Vec3 {
        project_point(&self.clip_from_world, world_point)
    }

    /// UV coordinate of a world point
    pub fn uv_from_world_point(&self, world_point: &Vec3) -> Vec2 {
        uv_from_clip(&self.clip_from_world_point(world_point))
    }

    /// Clip-space point (z = 0) under a pixel. `None` if the viewport is empty.
    pub fn clip_from_pixel(&self, pixel: &Vec2) -> Option<Vec3> {
        self.uv_from_pixel(pixel).map(|uv| clip_from_uv(&uv))
    }

    /// Pixel for a clip-space point. `None` if the viewport is empty.
    pub fn pixel_from_clip(&self, clip_point: &Vec3) -> Option<Vec2> {
        self.pixel_from_uv(&uv_from_clip(clip_point))
    }

    /// UV coordinate of a pixel. `None` if the viewport is empty.
    pub fn uv_from_pixel(&self, pixel: &Vec2) -> Option<Vec2> {
        if self.viewport.is_empty() {
            return None;
        }
        let position = self.viewport.position().cast::<f32>();
        let size = self.viewport.size().cast::<f32>();
        Some((pixel - position).component_div(&size))
    }

    /// Pixel for a UV coordinate. `None` if the viewport is empty.
    pub fn pixel_from_uv(&self, uv: &Vec2) -> Option<Vec2> {
        if self.viewport.is_empty() {
            return None;
        }
        let position = self.viewport.position().cast::<f32>();
        let size = self.viewport.size().cast::<f32>();
        Some(position + uv.component_mul(&size))
    }
}

/// Shared handle to a camera.
///
/// Cameras are owned jointly by whoever created them and every registry they
/// are registered with. Identity comparisons use [`CameraHandle::ptr_eq`].
#[derive(Debug, Clone, Default)]
pub struct CameraHandle(Rc<RefCell<Camera>>);

impl CameraHandle {
    /// Wrap a camera in a new shared handle
    pub fn new(camera: Camera) -> Self {
        Self(Rc::new(RefCell::new(camera)))
    }

    /// Borrow the camera
    pub fn borrow(&self) -> Ref<'_, Camera> {
        self.0.borrow()
    }

    /// Mutably borrow the camera
    pub fn borrow_mut(&self) -> RefMut<'_, Camera> {
        self.0.borrow_mut()
    }

    /// Whether both handles refer to the same camera
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this camera
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}
