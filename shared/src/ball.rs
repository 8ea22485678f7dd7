use std::collections::VecDeque;

use crate::types::Side;
use crate::vec3::{clamp_components, length, Vec3};

/// Cosmetic history point; only the presentation layer reads these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub position: Vec3,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Private so every assignment goes through the clamp in `set_spin`.
    spin: Vec3,
    pub trail: VecDeque<TrailPoint>,
    pub last_hit_by: Option<Side>,
    pub active: bool,
}

impl Ball {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            spin: Vec3::ZERO,
            trail: VecDeque::new(),
            last_hit_by: None,
            active: false,
        }
    }

    pub fn spin(&self) -> Vec3 {
        self.spin
    }

    pub fn set_spin(&mut self, spin: Vec3, max_spin: f64) {
        self.spin = clamp_components(spin, max_spin);
    }

    pub fn clear_spin(&mut self) {
        self.spin = Vec3::ZERO;
    }

    pub fn speed(&self) -> f64 {
        length(self.velocity)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.spin.is_finite()
    }

    /// Record the current position and fade older points.
    pub fn push_trail(&mut self, max_len: usize, fade: f64) {
        for point in self.trail.iter_mut() {
            point.alpha *= fade;
        }
        self.trail.push_back(TrailPoint {
            position: self.position,
            alpha: 1.0,
        });
        while self.trail.len() > max_len {
            self.trail.pop_front();
        }
    }

    /// Stop the ball at `position` until the next serve.
    pub fn park(&mut self, position: Vec3) {
        self.position = position;
        self.velocity = Vec3::ZERO;
        self.spin = Vec3::ZERO;
        self.trail.clear();
        self.last_hit_by = None;
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3::vec3;

    #[test]
    fn set_spin_clamps_every_axis() {
        let mut ball = Ball::new(Vec3::ZERO);
        ball.set_spin(vec3(1.0, -1.0, 0.05), 0.12);
        assert_eq!(ball.spin(), vec3(0.12, -0.12, 0.05));
    }

    #[test]
    fn trail_is_bounded_and_fades() {
        let mut ball = Ball::new(Vec3::ZERO);
        for i in 0..40 {
            ball.position = vec3(i as f64, 0.0, 0.0);
            ball.push_trail(25, 0.88);
        }
        assert_eq!(ball.trail.len(), 25);
        let newest = ball.trail.back().unwrap();
        let oldest = ball.trail.front().unwrap();
        assert_eq!(newest.alpha, 1.0);
        assert!(oldest.alpha < newest.alpha);
        assert_eq!(newest.position.x, 39.0);
    }

    #[test]
    fn park_deactivates_and_clears() {
        let mut ball = Ball::new(Vec3::ZERO);
        ball.velocity = vec3(5.0, 1.0, 0.0);
        ball.set_spin(vec3(0.1, 0.1, 0.0), 0.12);
        ball.active = true;
        ball.last_hit_by = Some(Side::P1);
        ball.park(vec3(1.0, 2.0, 0.0));
        assert!(!ball.active);
        assert_eq!(ball.velocity, Vec3::ZERO);
        assert_eq!(ball.spin(), Vec3::ZERO);
        assert_eq!(ball.last_hit_by, None);
    }
}
