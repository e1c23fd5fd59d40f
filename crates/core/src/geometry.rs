//! Small vector kernel over `[f32; 3]` and `[f32; 2]`.
//!
//! Everything here is pure and allocation-free; the plane fitter and the hull
//! build on these primitives rather than pulling in a linear algebra crate.

/// A point or direction in 3D.
pub type Vec3 = [f32; 3];

/// A point in the (x, y) comparison plane used by the hull.
pub type Vec2 = [f32; 2];

#[inline]
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean length, `sqrt(dot(v, v))`.
#[inline]
pub fn length(v: &Vec3) -> f32 {
    dot(v, v).sqrt()
}

/// Scales `v` by `1 / len`. Returns `None` when `len` is zero or not finite.
#[inline]
pub fn scale_inv(v: &Vec3, len: f32) -> Option<Vec3> {
    if len == 0.0 || !len.is_finite() {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}

/// Orientation of the turn `a -> b -> c` in the plane.
///
/// Positive for a counter-clockwise (left) turn, negative for clockwise,
/// zero when the three points are collinear.
#[inline]
pub fn ccw(a: &Vec2, b: &Vec2, c: &Vec2) -> f32 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

#[inline]
pub fn distance_squared_2d(a: &Vec2, b: &Vec2) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dx * dx + dy * dy
}
