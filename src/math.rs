//! Math primitives for gaze geometry — vectors, quaternions, rays,
//! and the head pose used to lift head-local rays into world space.

// ── Vec3 ─────────────────────────────────────────────────────

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Self {
        let len = self.length();
        if len < 1e-10 {
            return Self::ZERO;
        }
        Self {
            x: self.x / len,
            y: self.y / len,
            z: self.z / len,
        }
    }

    /// Angle between two directions in degrees.
    pub fn angle_to_deg(self, other: Self) -> f32 {
        let dot = self.normalize().dot(other.normalize()).clamp(-1.0, 1.0);
        dot.acos().to_degrees()
    }
}

// ── Quat ─────────────────────────────────────────────────────

/// Quaternion for rotations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Create quaternion from Euler angles (yaw, pitch, roll) in radians.
    pub fn from_euler(yaw: f32, pitch: f32, roll: f32) -> Self {
        let (sy, cy) = (yaw * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sr, cr) = (roll * 0.5).sin_cos();

        Self {
            x: cr * sp * cy + sr * cp * sy,
            y: cr * cp * sy - sr * sp * cy,
            z: sr * cp * cy - cr * sp * sy,
            w: cr * cp * cy + sr * sp * sy,
        }
    }

    /// Rotate a vector by this quaternion.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        // t = 2 * (q.xyz × v); v' = v + w*t + q.xyz × t
        let tx = 2.0 * (self.y * v.z - self.z * v.y);
        let ty = 2.0 * (self.z * v.x - self.x * v.z);
        let tz = 2.0 * (self.x * v.y - self.y * v.x);
        Vec3::new(
            v.x + self.w * tx + (self.y * tz - self.z * ty),
            v.y + self.w * ty + (self.z * tx - self.x * tz),
            v.z + self.w * tz + (self.x * ty - self.y * tx),
        )
    }
}

// ── Ray ──────────────────────────────────────────────────────

/// A ray in 3D space. Direction is kept unit-length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Evaluate the point at parameter t along the ray.
    pub fn at(&self, t: f32) -> Vec3 {
        Vec3::new(
            self.origin.x + self.direction.x * t,
            self.origin.y + self.direction.y * t,
            self.origin.z + self.direction.z * t,
        )
    }
}

// ── Head pose ────────────────────────────────────────────────

/// Head pose (position + orientation) in world space.
#[derive(Debug, Clone, Copy)]
pub struct HeadPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for HeadPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl HeadPose {
    /// Lift a head-local ray into world space.
    pub fn transform_ray(&self, local: &Ray) -> Ray {
        let rotated = self.rotation.rotate(local.origin);
        let origin = Vec3::new(
            self.position.x + rotated.x,
            self.position.y + rotated.y,
            self.position.z + rotated.z,
        );
        Ray::new(origin, self.rotation.rotate(local.direction))
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_normalize_unit_length() {
        let v = Vec3::new(3.0, 4.0, 0.0).normalize();
        assert!((v.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_degenerate_is_zero() {
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_angle_between_axes() {
        let a = Vec3::new(0.0, 0.0, 1.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        assert!((a.angle_to_deg(b) - 90.0).abs() < 1e-3);
        assert!(a.angle_to_deg(a).abs() < 1e-3);
    }

    #[test]
    fn test_identity_rotation_is_noop() {
        let v = Vec3::new(0.3, -0.7, 2.0);
        let r = Quat::IDENTITY.rotate(v);
        assert!((r.x - v.x).abs() < 1e-6);
        assert!((r.y - v.y).abs() < 1e-6);
        assert!((r.z - v.z).abs() < 1e-6);
    }

    #[test]
    fn test_yaw_quarter_turn() {
        // 90° yaw about +Y takes +Z to +X.
        let q = Quat::from_euler(FRAC_PI_2, 0.0, 0.0);
        let r = q.rotate(Vec3::new(0.0, 0.0, 1.0));
        assert!((r.x - 1.0).abs() < 1e-5, "got {:?}", r);
        assert!(r.z.abs() < 1e-5);
    }

    #[test]
    fn test_ray_direction_normalized() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0));
        assert!((ray.direction.length() - 1.0).abs() < 1e-6);
        let p = ray.at(2.5);
        assert!((p.z - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_head_pose_translates_ray_origin() {
        let pose = HeadPose {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
        };
        let local = Ray::new(Vec3::new(0.03, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let world = pose.transform_ray(&local);
        assert!((world.origin.x - 1.03).abs() < 1e-6);
        assert!((world.origin.y - 2.0).abs() < 1e-6);
        assert!((world.origin.z - 3.0).abs() < 1e-6);
        assert_eq!(world.direction, local.direction);
    }

    #[test]
    fn test_head_pose_rotates_ray() {
        let pose = HeadPose {
            position: Vec3::ZERO,
            rotation: Quat::from_euler(FRAC_PI_2, 0.0, 0.0),
        };
        let local = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        let world = pose.transform_ray(&local);
        assert!((world.direction.x - 1.0).abs() < 1e-5);
    }
}
