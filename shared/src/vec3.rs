/// 3D vector utilities for ball, paddle and spin state.
/// Axis convention: x runs along the table (toward P2), y across it, z is up.

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Shorthand constructor
pub fn vec3(x: f64, y: f64, z: f64) -> Vec3 {
    Vec3::new(x, y, z)
}

/// Dot product
pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

/// Cross product
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    Vec3 {
        x: a.y * b.z - a.z * b.y,
        y: a.z * b.x - a.x * b.z,
        z: a.x * b.y - a.y * b.x,
    }
}

/// Vector length
pub fn length(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

/// Scale vector by scalar
pub fn scale(v: Vec3, s: f64) -> Vec3 {
    Vec3::new(v.x * s, v.y * s, v.z * s)
}

/// Add two vectors
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(a.x + b.x, a.y + b.y, a.z + b.z)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(a.x - b.x, a.y - b.y, a.z - b.z)
}

/// Clamp every component into [-limit, limit].
pub fn clamp_components(v: Vec3, limit: f64) -> Vec3 {
    Vec3::new(
        v.x.clamp(-limit, limit),
        v.y.clamp(-limit, limit),
        v.z.clamp(-limit, limit),
    )
}

/// Rescale `v` so its length lies in [min, max].
/// A zero-length vector is returned unchanged since it has no direction to keep.
pub fn clamp_length(v: Vec3, min: f64, max: f64) -> Vec3 {
    let len = length(v);
    if len < 1e-10 {
        return v;
    }
    if len > max {
        scale(v, max / len)
    } else if len < min {
        scale(v, min / len)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "Expected {} to be close to {}",
            actual,
            expected
        );
    }

    #[test]
    fn dot_orthogonal_is_zero() {
        assert_eq!(dot(vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0)), 0.0);
    }

    #[test]
    fn cross_follows_right_hand_rule() {
        let z = cross(vec3(1.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0));
        assert_eq!(z, vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn clamp_length_caps_fast_vectors() {
        let v = clamp_length(vec3(30.0, 40.0, 0.0), 1.0, 10.0);
        assert_close(length(v), 10.0);
        assert_close(v.x / v.y, 0.75);
    }

    #[test]
    fn clamp_length_lifts_slow_vectors() {
        let v = clamp_length(vec3(0.0, 0.5, 0.0), 2.0, 10.0);
        assert_close(length(v), 2.0);
    }

    #[test]
    fn clamp_length_leaves_zero_vector_alone() {
        assert_eq!(clamp_length(Vec3::ZERO, 2.0, 10.0), Vec3::ZERO);
    }

    #[test]
    fn clamp_components_is_symmetric() {
        let v = clamp_components(vec3(0.5, -0.5, 0.01), 0.12);
        assert_eq!(v, vec3(0.12, -0.12, 0.01));
    }
}
