use crate::config::{PaddleShape, PhysicsConfig};
use crate::types::Side;
use crate::vec3::{scale, sub, vec3, Vec3};

/// Table paddles may reach this far past either side edge.
const TABLE_SIDE_REACH: f64 = 0.1;
/// Table paddle height band above the table top.
const TABLE_LOW: f64 = 0.03;
const TABLE_HIGH: f64 = 0.4;
const TABLE_HOME: f64 = 0.12;

/// Legal paddle positions. The x component is fixed (min.x == max.x).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub home: Vec3,
}

impl PaddleBounds {
    pub fn for_side(config: &PhysicsConfig, side: Side) -> Self {
        let arena = &config.arena;
        let x = match side {
            Side::P1 => config.paddle_inset,
            Side::P2 => arena.length - config.paddle_inset,
        };
        match (arena.table, config.paddle) {
            (Some(table), _) => Self {
                min: vec3(x, -TABLE_SIDE_REACH, table.height + TABLE_LOW),
                max: vec3(x, arena.width + TABLE_SIDE_REACH, table.height + TABLE_HIGH),
                home: vec3(x, arena.mid_y(), table.height + TABLE_HOME),
            },
            (None, shape) => {
                let half = shape.half_span();
                Self {
                    min: vec3(x, half, 0.0),
                    max: vec3(x, arena.width - half, 0.0),
                    home: vec3(x, arena.mid_y(), 0.0),
                }
            }
        }
    }

    pub fn clamp(&self, target: Vec3) -> Vec3 {
        vec3(
            self.min.x,
            target.y.clamp(self.min.y, self.max.y),
            target.z.clamp(self.min.z, self.max.z),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paddle {
    pub side: Side,
    pub position: Vec3,
    pub previous: Vec3,
    /// Units per second, derived from the last move. Feeds spin and power on hits.
    pub velocity: Vec3,
    pub score: u32,
    /// Consecutive hits since the opponent last touched the ball
    pub combo: u32,
    pub shape: PaddleShape,
    bounds: PaddleBounds,
}

impl Paddle {
    pub fn new(config: &PhysicsConfig, side: Side) -> Self {
        let bounds = PaddleBounds::for_side(config, side);
        Self {
            side,
            position: bounds.home,
            previous: bounds.home,
            velocity: Vec3::ZERO,
            score: 0,
            combo: 0,
            shape: config.paddle,
            bounds,
        }
    }

    pub fn bounds(&self) -> &PaddleBounds {
        &self.bounds
    }

    /// Clamp `target` into bounds and derive velocity from the move.
    /// Call every tick, even without input, so velocity falls back to zero.
    pub fn move_to(&mut self, target: Vec3, dt: f64) {
        self.previous = self.position;
        self.position = self.bounds.clamp(target);
        self.velocity = if dt > 0.0 {
            scale(sub(self.position, self.previous), 1.0 / dt)
        } else {
            Vec3::ZERO
        };
    }

    /// Cross-table convenience for the arcade court.
    pub fn move_to_y(&mut self, y: f64, dt: f64) {
        let target = vec3(self.position.x, y, self.position.z);
        self.move_to(target, dt);
    }

    pub fn hold(&mut self, dt: f64) {
        self.move_to(self.position, dt);
    }

    /// Adopt a replicated position and velocity without deriving anything.
    pub fn set_remote(&mut self, position: Vec3, velocity: Vec3) {
        self.previous = self.position;
        self.position = self.bounds.clamp(position);
        self.velocity = velocity;
    }

    pub fn recenter(&mut self) {
        self.position = self.bounds.home;
        self.previous = self.bounds.home;
        self.velocity = Vec3::ZERO;
    }

    pub fn reset(&mut self) {
        self.recenter();
        self.score = 0;
        self.combo = 0;
    }
}
