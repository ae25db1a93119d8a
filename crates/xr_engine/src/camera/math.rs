//! Projection and clip-space conversions
//!
//! Stateless helpers used by [`Camera`](super::Camera). Projections follow the
//! OpenGL frustum convention: the camera looks down -Z, clip x/y span [-1, 1]
//! with +Y up, and the near and far planes map to clip z = -1 and z = 1.
//! UV space spans [0, 1] with the origin at the top left and +Y down.

use crate::foundation::math::{Mat4, Rect, Vec2, Vec3, Vec4};

const FRUSTUM_EPSILON: f32 = 1e-6;

fn nearly_equal(a: f32, b: f32) -> bool {
    (a - b).abs() <= FRUSTUM_EPSILON
}

/// Perspective projection from the frustum's edges at the near plane.
///
/// Degenerate frustums log an error and yield the identity matrix.
pub fn perspective_from_frustum(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    if nearly_equal(left, right)
        || nearly_equal(bottom, top)
        || nearly_equal(near, far)
        || near <= 0.0
        || far <= 0.0
    {
        log::error!("Invalid frustum dimensions, defaulting to the identity projection");
        return Mat4::identity();
    }

    let x = (2.0 * near) / (right - left);
    let y = (2.0 * near) / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = (near + far) / (near - far);
    let d = (2.0 * near * far) / (near - far);

    // Row-major arguments: columns are (x,0,0,0), (0,y,0,0), (a,b,c,-1), (0,0,d,0).
    Mat4::new(
        x, 0.0, a, 0.0, //
        0.0, y, b, 0.0, //
        0.0, 0.0, c, d, //
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Perspective projection from four half-angles (radians) around the view axis.
pub fn perspective_from_fov(fov: &Rect, near: f32, far: f32) -> Mat4 {
    perspective_from_frustum(
        -fov.left.tan() * near,
        fov.right.tan() * near,
        -fov.bottom.tan() * near,
        fov.top.tan() * near,
        near,
        far,
    )
}

/// Symmetric half-angle field of view from a full vertical angle and an
/// aspect ratio (width / height).
pub fn fov_from_vertical(vertical_fov: f32, aspect: f32) -> Rect {
    let half_vertical = vertical_fov / 2.0;
    let half_horizontal = (half_vertical.tan() * aspect).atan();
    Rect::new(half_horizontal, half_horizontal, half_vertical, half_vertical)
}

/// Apply `matrix` to a point and divide by w.
pub fn project_point(matrix: &Mat4, point: &Vec3) -> Vec3 {
    let h = matrix * Vec4::new(point.x, point.y, point.z, 1.0);
    Vec3::new(h.x / h.w, h.y / h.w, h.z / h.w)
}

/// Map a clip-space point to UV space, flipping Y.
pub fn uv_from_clip(clip: &Vec3) -> Vec2 {
    Vec2::new((clip.x + 1.0) * 0.5, (1.0 - clip.y) * 0.5)
}

/// Map a UV coordinate to clip space at z = 0, flipping Y.
pub fn clip_from_uv(uv: &Vec2) -> Vec3 {
    Vec3::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0)
}

/// Inverse of a projection built by [`perspective_from_frustum`], optionally
/// scaled per axis.
///
/// Solved in closed form so unprojection keeps exact zeros off the frustum
/// axes. Matrices of any other shape go through [`invert_or_identity`].
pub fn invert_perspective(matrix: &Mat4) -> Mat4 {
    let p = matrix[(0, 0)];
    let q = matrix[(0, 2)];
    let r = matrix[(1, 1)];
    let s = matrix[(1, 2)];
    let t = matrix[(2, 2)];
    let u = matrix[(2, 3)];
    let expected = Mat4::new(
        p, 0.0, q, 0.0, //
        0.0, r, s, 0.0, //
        0.0, 0.0, t, u, //
        0.0, 0.0, -1.0, 0.0,
    );
    if *matrix != expected || p == 0.0 || r == 0.0 || u == 0.0 {
        return invert_or_identity(matrix);
    }
    Mat4::new(
        1.0 / p, 0.0, 0.0, q / p, //
        0.0, 1.0 / r, 0.0, s / r, //
        0.0, 0.0, 0.0, -1.0, //
        0.0, 0.0, 1.0 / u, t / u,
    )
}

/// Invert a matrix, logging and falling back to identity when singular.
pub fn invert_or_identity(matrix: &Mat4) -> Mat4 {
    matrix.try_inverse().unwrap_or_else(|| {
        log::error!("Attempted to invert a singular matrix");
        Mat4::identity()
    })
}
