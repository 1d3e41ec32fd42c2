//! Double-precision vector, quaternion, and rigid-transform math.
//!
//! The compression pipeline works in f64 throughout so that quantization
//! error measurements are not polluted by working-precision error; only the
//! serialized format narrows to f32. The decoder widens back into these
//! types.
//!
//! Conventions:
//! - Quaternions are `[x, y, z, w]` with `w` the scalar part.
//! - `Quat::mul(a, b)` applies `b` first, then `a`.
//! - `Transform::mul(local, parent)` composes a child local transform with
//!   its parent object-space transform (scale, then rotation, then
//!   translation).

// ── Vec3 ─────────────────────────────────────────────────────────────────────

/// A 3-component f64 vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline]
    pub const fn one() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    #[inline]
    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    #[inline]
    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Component-wise multiply.
    #[inline]
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    #[inline]
    pub fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    #[inline]
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    #[inline]
    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn distance(self, rhs: Self) -> f64 {
        self.sub(rhs).length()
    }

    #[inline]
    pub fn lerp(self, rhs: Self, alpha: f64) -> Self {
        Self::new(
            self.x + (rhs.x - self.x) * alpha,
            self.y + (rhs.y - self.y) * alpha,
            self.z + (rhs.z - self.z) * alpha,
        )
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    #[inline]
    pub fn max_component(self) -> f64 {
        self.x.max(self.y).max(self.z)
    }

    #[inline]
    pub fn near_equal(self, rhs: Self, threshold: f64) -> bool {
        self.sub(rhs).abs().max_component() < threshold
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ── Vec4 ─────────────────────────────────────────────────────────────────────

/// A 4-component f64 vector. Track streams store every sample as a `Vec4`;
/// 3-component channels leave `w` at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec4 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Vec4 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    #[inline]
    pub const fn splat(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::splat(0.0)
    }

    #[inline]
    pub const fn from_vec3(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z, 0.0)
    }

    #[inline]
    pub const fn xyz(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.w + rhs.w)
    }

    #[inline]
    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.w - rhs.w)
    }

    #[inline]
    pub fn min(self, rhs: Self) -> Self {
        Self::new(
            self.x.min(rhs.x),
            self.y.min(rhs.y),
            self.z.min(rhs.z),
            self.w.min(rhs.w),
        )
    }

    #[inline]
    pub fn max(self, rhs: Self) -> Self {
        Self::new(
            self.x.max(rhs.x),
            self.y.max(rhs.y),
            self.z.max(rhs.z),
            self.w.max(rhs.w),
        )
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs(), self.w.abs())
    }

    /// Component access by index: 0 = x, 1 = y, 2 = z, 3 = w.
    #[inline]
    pub fn get(self, component: usize) -> f64 {
        match component {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => self.w,
        }
    }

    #[inline]
    pub fn set(&mut self, component: usize, value: f64) {
        match component {
            0 => self.x = value,
            1 => self.y = value,
            2 => self.z = value,
            _ => self.w = value,
        }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

// ── Quat ─────────────────────────────────────────────────────────────────────

/// A unit quaternion, `[x, y, z, w]` with `w` scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Threshold under which a rotation is considered the identity, expressed as
/// a geodesic angle in radians.
pub const QUAT_NEAR_IDENTITY_THRESHOLD: f64 = 0.00284714461;

impl Quat {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub const fn from_vec4(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }

    #[inline]
    pub const fn to_vec4(self) -> Vec4 {
        Vec4::new(self.x, self.y, self.z, self.w)
    }

    #[inline]
    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z + self.w * rhs.w
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[inline]
    pub fn normalize(self) -> Self {
        let inv_len = 1.0 / self.length();
        Self::new(
            self.x * inv_len,
            self.y * inv_len,
            self.z * inv_len,
            self.w * inv_len,
        )
    }

    #[inline]
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    #[inline]
    pub fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }

    /// Hamilton product; `mul(a, b)` rotates by `b` first, then `a`.
    #[inline]
    pub fn mul(a: Self, b: Self) -> Self {
        Self::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }

    /// Rotate a vector by this quaternion (assumed unit length).
    #[inline]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let qv = Vec3::new(self.x, self.y, self.z);
        let t = qv.cross(v).scale(2.0);
        v.add(t.scale(self.w)).add(qv.cross(t))
    }

    /// Flip the sign so the scalar part is non-negative. Both signs encode
    /// the same rotation; drop-w packing requires the positive cover.
    #[inline]
    pub fn ensure_positive_w(self) -> Self {
        if self.w < 0.0 {
            self.neg()
        } else {
            self
        }
    }

    /// Geodesic angle between two rotations, in radians.
    #[inline]
    pub fn angle_between(a: Self, b: Self) -> f64 {
        2.0 * a.dot(b).abs().min(1.0).acos()
    }

    #[inline]
    pub fn near_identity(self) -> bool {
        Self::angle_between(self, Self::identity()) < QUAT_NEAR_IDENTITY_THRESHOLD
    }

    /// Linear blend with hemisphere correction, renormalized. The two keys a
    /// decoder interpolates are at most one sample apart, where lerp and
    /// slerp agree to well below quantization error.
    #[inline]
    pub fn lerp(from: Self, to: Self, alpha: f64) -> Self {
        let to = if from.dot(to) < 0.0 { to.neg() } else { to };
        let v = Vec4::new(
            from.x + (to.x - from.x) * alpha,
            from.y + (to.y - from.y) * alpha,
            from.z + (to.z - from.z) * alpha,
            from.w + (to.w - from.w) * alpha,
        );
        Self::from_vec4(v).normalize()
    }

    /// Build from a unit axis and an angle in radians.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let half = angle * 0.5;
        let s = half.sin();
        Self::new(axis.x * s, axis.y * s, axis.z * s, half.cos())
    }

    /// Reconstruct the scalar part of a positive-cover unit quaternion from
    /// its vector part.
    #[inline]
    pub fn from_positive_w(x: f64, y: f64, z: f64) -> Self {
        let w_squared = 1.0 - x * x - y * y - z * z;
        // Quantization drift can push the squared length slightly above one.
        let w = w_squared.max(0.0).sqrt();
        Self::new(x, y, z, w)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

// ── Transform ────────────────────────────────────────────────────────────────

/// A rigid transform with non-uniform scale: rotation, translation, scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    #[inline]
    pub const fn new(rotation: Quat, translation: Vec3, scale: Vec3) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self::new(Quat::identity(), Vec3::zero(), Vec3::one())
    }

    /// Compose a child local transform with its parent object-space
    /// transform. Scale is applied first, then rotation, then translation.
    #[inline]
    pub fn mul(local: Self, parent: Self) -> Self {
        let rotation = Quat::mul(parent.rotation, local.rotation).normalize();
        let translation = parent
            .rotation
            .rotate(local.translation.mul(parent.scale))
            .add(parent.translation);
        let scale = local.scale.mul(parent.scale);
        Self::new(rotation, translation, scale)
    }

    /// Transform a point from this space into the parent space.
    #[inline]
    pub fn transform_point(self, point: Vec3) -> Vec3 {
        self.rotation
            .rotate(point.mul(self.scale))
            .add(self.translation)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.rotation.is_finite() && self.translation.is_finite() && self.scale.is_finite()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1.0e-12;

    #[test]
    fn quat_mul_applies_right_hand_side_first() {
        let ninety_y = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f64::consts::FRAC_PI_2);
        let ninety_x = Quat::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), std::f64::consts::FRAC_PI_2);

        // Rotate +Z by 90° about Y (→ +X), then 90° about X (stays +X).
        let combined = Quat::mul(ninety_x, ninety_y);
        let rotated = combined.rotate(Vec3::new(0.0, 0.0, 1.0));
        assert!(rotated.near_equal(Vec3::new(1.0, 0.0, 0.0), 1.0e-9));
    }

    #[test]
    fn quat_rotate_y_axis() {
        let q = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f64::consts::FRAC_PI_4);
        let v = q.rotate(Vec3::new(0.0, 0.0, 1.0));
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert!(v.near_equal(Vec3::new(s, 0.0, s), 1.0e-9));
    }

    #[test]
    fn quat_double_cover_fold() {
        let q = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 1.0);
        let folded = q.neg().ensure_positive_w();
        assert!(folded.w >= 0.0);
        // Same rotation either way.
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert!(q.rotate(v).near_equal(folded.rotate(v), EPSILON));
    }

    #[test]
    fn quat_positive_w_reconstruction() {
        let q = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.7).ensure_positive_w();
        let r = Quat::from_positive_w(q.x, q.y, q.z);
        assert!((r.w - q.w).abs() < EPSILON);
    }

    #[test]
    fn quat_lerp_hemisphere_correction() {
        let a = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.1);
        let b = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.2).neg();
        let mid = Quat::lerp(a, b, 0.5);
        let expected = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.15);
        assert!(Quat::angle_between(mid, expected) < 1.0e-6);
    }

    #[test]
    fn transform_mul_child_offset() {
        // Parent rotated 45° about Y, child offset one unit along Z.
        let parent = Transform::new(
            Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f64::consts::FRAC_PI_4),
            Vec3::zero(),
            Vec3::one(),
        );
        let child = Transform::new(Quat::identity(), Vec3::new(0.0, 0.0, 1.0), Vec3::one());

        let object = Transform::mul(child, parent);
        let s = std::f64::consts::FRAC_1_SQRT_2;
        assert!(object.translation.near_equal(Vec3::new(s, 0.0, s), 1.0e-9));
    }

    #[test]
    fn transform_mul_applies_parent_scale_to_child_translation() {
        let parent = Transform::new(Quat::identity(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        let child = Transform::new(Quat::identity(), Vec3::new(0.0, 0.0, 3.0), Vec3::one());

        let object = Transform::mul(child, parent);
        assert!(object.translation.near_equal(Vec3::new(1.0, 0.0, 6.0), EPSILON));
        assert!(object.scale.near_equal(Vec3::new(2.0, 2.0, 2.0), EPSILON));
    }

    #[test]
    fn transform_point_scales_then_rotates_then_translates() {
        let t = Transform::new(
            Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f64::consts::FRAC_PI_2),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(2.0, 1.0, 1.0),
        );
        let p = t.transform_point(Vec3::new(1.0, 0.0, 0.0));
        // (2, 0, 0) rotated 90° about Y → (0, 0, -2), plus translation.
        assert!(p.near_equal(Vec3::new(0.0, 5.0, -2.0), 1.0e-9));
    }
}
