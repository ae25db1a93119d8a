//! Per-eye view description consumed by the render passes

use crate::foundation::math::{translation_of, Mat4, Vec2i, Vec3};

/// Matrices and viewport for one rendered view (one eye in stereo)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Top-left corner of the viewport in pixels
    pub viewport: Vec2i,
    /// Viewport size in pixels
    pub dimensions: Vec2i,
    /// Eye-to-world transform
    pub world_from_eye: Mat4,
    /// World-to-eye transform
    pub eye_from_world: Mat4,
    /// Projection
    pub clip_from_eye: Mat4,
    /// View-projection
    pub clip_from_world: Mat4,
    /// Index of the eye this view is for
    pub eye: usize,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            viewport: Vec2i::zeros(),
            dimensions: Vec2i::zeros(),
            world_from_eye: Mat4::identity(),
            eye_from_world: Mat4::identity(),
            clip_from_eye: Mat4::identity(),
            clip_from_world: Mat4::identity(),
            eye: 0,
        }
    }
}

impl RenderView {
    /// Eye position in world space
    pub fn world_position(&self) -> Vec3 {
        translation_of(&self.world_from_eye)
    }

    /// The eye's +Z axis in world space (the view direction is its negation)
    pub fn world_z_axis(&self) -> Vec3 {
        Vec3::new(
            self.world_from_eye.m13,
            self.world_from_eye.m23,
            self.world_from_eye.m33,
        )
    }
}
