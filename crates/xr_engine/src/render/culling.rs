//! Bounding volumes and view-frustum tests

use crate::foundation::math::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from its corners
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half the diagonal length
    pub fn radius(&self) -> f32 {
        (self.max - self.min).norm() * 0.5
    }

    /// Bounding sphere of the box after `world_from_local`
    ///
    /// The radius grows with the largest axis scale of the matrix.
    pub fn world_sphere(&self, world_from_local: &Mat4) -> Sphere {
        let center = world_from_local.transform_point(&self.center().into()).coords;
        let scale = (0..3)
            .map(|axis| world_from_local.fixed_view::<3, 1>(0, axis).norm())
            .fold(0.0_f32, f32::max);
        Sphere {
            center,
            radius: self.radius() * scale,
        }
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center in world space
    pub center: Vec3,
    /// Radius
    pub radius: f32,
}

/// Plane `normal . p + distance = 0`, positive on the inside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the kept half-space
    pub normal: Vec3,
    /// Offset from the origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Plane from unnormalized `(a, b, c, d)` coefficients
    fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.xyz();
        let length = normal.norm();
        if length <= f32::EPSILON {
            return Self {
                normal: Vec3::zeros(),
                distance: 0.0,
            };
        }
        Self {
            normal: normal / length,
            distance: coefficients.w / length,
        }
    }

    /// Signed distance from the plane to the point
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Six clipping planes of a view volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes of a `clip_from_world` matrix (Gribb-Hartmann).
    ///
    /// Clip depth is assumed to span `[-w, w]`.
    pub fn from_clip_from_world(clip_from_world: &Mat4) -> Self {
        let row = |i: usize| clip_from_world.row(i).transpose();
        let (x, y, z, w) = (row(0), row(1), row(2), row(3));
        Self {
            planes: [
                Plane::from_coefficients(w + x),
                Plane::from_coefficients(w - x),
                Plane::from_coefficients(w + y),
                Plane::from_coefficients(w - y),
                Plane::from_coefficients(w + z),
                Plane::from_coefficients(w - z),
            ],
        }
    }

    /// Whether any part of the sphere lies inside
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(&sphere.center) >= -sphere.radius)
    }

    /// Whether any part of the box lies inside
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            // Corner furthest along the normal.
            let corner = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.distance_to_point(&corner) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::math::{fov_from_vertical, perspective_from_fov};
    use approx::assert_relative_eq;

    fn frustum() -> Frustum {
        let fov = fov_from_vertical(std::f32::consts::FRAC_PI_2, 1.0);
        Frustum::from_clip_from_world(&perspective_from_fov(&fov, 1.0, 10.0))
    }

    #[test]
    fn test_planes_are_normalized() {
        for plane in frustum().planes {
            assert_relative_eq!(plane.normal.norm(), 1.0, epsilon = 1e-5);
        }
        let near = frustum().planes[4];
        assert_relative_eq!(near.normal, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(near.distance, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_visibility() {
        let frustum = frustum();
        let inside = Sphere { center: Vec3::new(0.0, 0.0, -5.0), radius: 0.5 };
        let behind = Sphere { center: Vec3::new(0.0, 0.0, 5.0), radius: 0.5 };
        let too_far = Sphere { center: Vec3::new(0.0, 0.0, -20.0), radius: 1.0 };
        let straddling = Sphere { center: Vec3::new(6.0, 0.0, -5.0), radius: 1.5 };
        assert!(frustum.intersects_sphere(&inside));
        assert!(!frustum.intersects_sphere(&behind));
        assert!(!frustum.intersects_sphere(&too_far));
        assert!(frustum.intersects_sphere(&straddling));
    }

    #[test]
    fn test_aabb_visibility() {
        let frustum = frustum();
        let visible = Aabb::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        let hidden = Aabb::new(Vec3::new(20.0, -1.0, -6.0), Vec3::new(22.0, 1.0, -4.0));
        assert!(frustum.intersects_aabb(&visible));
        assert!(!frustum.intersects_aabb(&hidden));
    }

    #[test]
    fn test_world_sphere_scales_radius() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let world = Mat4::new_translation(&Vec3::new(0.0, 2.0, 0.0)) * Mat4::new_scaling(2.0);
        let sphere = aabb.world_sphere(&world);
        assert_relative_eq!(sphere.center, Vec3::new(0.0, 2.0, 0.0));
        assert_relative_eq!(sphere.radius, 2.0 * 3.0_f32.sqrt(), epsilon = 1e-5);
    }
}
