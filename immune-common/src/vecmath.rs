use serde::{Serialize, Deserialize};
use std::ops::{Add, Sub, Mul};

/// A point or direction on the floor plane. `x` runs across the floor, `y` along its depth
/// (the engine's `z` axis); height is never simulated.
#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline(always)]
    pub fn new(x: f32, y: f32) -> Self { Self { x, y } }
    #[inline(always)]
    pub fn zero() -> Self { Self::new(0.0, 0.0) }
    #[inline(always)]
    pub fn length_squared(self) -> f32 { self.x * self.x + self.y * self.y }
    #[inline(always)]
    pub fn length(self) -> f32 { self.length_squared().sqrt() }
    #[inline(always)]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x; let dy = self.y - other.y; dx * dx + dy * dy
    }
    #[inline(always)]
    pub fn distance(self, other: Self) -> f32 { self.distance_squared(other).sqrt() }
    #[inline(always)]
    pub fn scale(self, scalar: f32) -> Self { Self::new(self.x * scalar, self.y * scalar) }

    /// Normalizes the vector, returning a zero vector if the length is zero or very small.
    pub fn normalize_or_zero(self) -> Vec2 {
        let len_sq = self.length_squared();
        if len_sq > 1e-12 { // Use a small epsilon to avoid division by near-zero
            self.scale(1.0 / len_sq.sqrt())
        } else {
            Vec2::zero()
        }
    }

    /// Moves from `self` towards `target` by at most `max_delta`, never overshooting.
    pub fn move_towards(self, target: Vec2, max_delta: f32) -> Vec2 {
        let offset = target - self;
        let dist = offset.length();
        if dist <= max_delta || dist < 1e-9 {
            target
        } else {
            self + offset.scale(max_delta / dist)
        }
    }

    /// Clamps each component into `[-half_width, half_width] x [-half_height, half_height]`.
    pub fn clamp_centered(self, half_width: f32, half_height: f32) -> Vec2 {
        Vec2::new(
            clamp(self.x, -half_width, half_width),
            clamp(self.y, -half_height, half_height),
        )
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self { Self::new(self.x + other.x, self.y + other.y) }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self { Self::new(self.x - other.x, self.y - other.y) }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self { self.scale(scalar) }
}

#[inline(always)]
pub fn angle_to_vec(theta: f32) -> Vec2 { Vec2::new(theta.cos(), theta.sin()) }
#[inline(always)]
pub fn clamp(val: f32, min: f32, max: f32) -> f32 { val.max(min).min(max) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_towards_stops_at_target() {
        let start = Vec2::new(0.0, 0.0);
        let target = Vec2::new(3.0, 4.0);
        assert_eq!(start.move_towards(target, 10.0), target);

        let partial = start.move_towards(target, 2.5);
        assert!((partial.length() - 2.5).abs() < 1e-5);
        assert!((partial.x - 1.5).abs() < 1e-5);
    }

    #[test]
    fn clamp_centered_keeps_points_on_floor() {
        let p = Vec2::new(120.0, -300.0).clamp_centered(100.0, 50.0);
        assert_eq!(p, Vec2::new(100.0, -50.0));
    }
}
