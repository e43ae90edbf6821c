//! Rays for terrain picking

use crate::core::types::Vec3;
use super::aabb::Aabb;

const TRIANGLE_EPSILON: f32 = 1.0e-7;

/// Half-line from `origin` along a unit `direction`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// `direction` is normalized here
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Ray from the near point through the far point of a pick segment
    pub fn through(near: Vec3, far: Vec3) -> Self {
        Self::new(near, far - near)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Entry and exit parameters through a box (slab test)
    ///
    /// The entry is clamped to 0 when the origin is inside.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let inv = self.direction.recip();
        let a = (aabb.min - self.origin) * inv;
        let b = (aabb.max - self.origin) * inv;

        let enter = a.min(b).max_element();
        let exit = a.max(b).min_element();
        (enter <= exit && exit >= 0.0).then(|| (enter.max(0.0), exit))
    }

    /// Möller–Trumbore ray/triangle test, returns the ray parameter of the hit
    pub fn intersects_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        let ab = b - a;
        let ac = c - a;
        let p = self.direction.cross(ac);
        let det = ab.dot(p);
        if det.abs() < TRIANGLE_EPSILON {
            return None;
        }

        let inv_det = det.recip();
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(ab);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = ac.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_through_normalizes() {
        let ray = Ray::through(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -10.0));
        assert_eq!(ray.direction, Vec3::NEG_Z);
        assert_eq!(ray.at(4.0), Vec3::new(0.0, 0.0, 6.0));
    }

    #[test]
    fn test_intersects_aabb() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);

        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::X);
        let (enter, exit) = ray.intersects_aabb(&aabb).unwrap();
        assert!((enter - 2.0).abs() < 0.001);
        assert!((exit - 3.0).abs() < 0.001);

        let miss = Ray::new(Vec3::new(-2.0, 5.0, 0.5), Vec3::X);
        assert!(miss.intersects_aabb(&aabb).is_none());

        let inside = Ray::new(Vec3::splat(0.5), Vec3::Y);
        assert_eq!(inside.intersects_aabb(&aabb).map(|(enter, _)| enter), Some(0.0));

        let away = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::NEG_X);
        assert!(away.intersects_aabb(&aabb).is_none());
    }

    #[test]
    fn test_intersects_triangle() {
        let down = Vec3::NEG_Z;
        let hit = Ray::new(Vec3::new(0.25, 0.25, 5.0), down);
        let t = hit.intersects_triangle(Vec3::ZERO, Vec3::X, Vec3::Y).unwrap();
        assert!((t - 5.0).abs() < 1.0e-5);

        let outside = Ray::new(Vec3::new(0.9, 0.9, 5.0), down);
        assert!(outside.intersects_triangle(Vec3::ZERO, Vec3::X, Vec3::Y).is_none());

        let behind = Ray::new(Vec3::new(0.25, 0.25, -5.0), down);
        assert!(behind.intersects_triangle(Vec3::ZERO, Vec3::X, Vec3::Y).is_none());

        let parallel = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::X);
        assert!(parallel.intersects_triangle(Vec3::ZERO, Vec3::X, Vec3::Y).is_none());
    }
}
