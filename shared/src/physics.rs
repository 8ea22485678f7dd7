//! Ball flight, bounces and paddle contact for both the arcade court and the
//! table. One `step` advances the ball by `dt` seconds in a fixed order:
//! forces, integration, spin decay, walls or table, paddles, net, out of play.

use rand::Rng;

use crate::ball::Ball;
use crate::config::{
    per_tick, MagnusModel, PaddleShape, PhysicsConfig, PowerShotConfig, RallyRules, TableSpec,
};
use crate::paddle::Paddle;
use crate::power_shot::PowerShot;
use crate::rally::{PointAward, PointReason, RallyTracker};
use crate::types::Side;
use crate::vec3::{add, clamp_length, cross, scale, sub, vec3, Vec3};

/// Gap left between paddle face and ball after a hit, in ball radii.
const HIT_GAP: f64 = 0.15;
/// Disc paddle contact box (meters)
const DISC_DEPTH_BAND: f64 = 0.12;
const DISC_SLACK: f64 = 0.03;
/// Fraction of spin turned into velocity when the ball lands on the table.
const BOUNCE_KICK: f64 = 0.15;
/// Share of vertical speed kept (upward) after clipping the net.
const NET_LIFT: f64 = 0.3;
/// Forward speed floor after a hit, as a fraction of `min_ball_speed`.
const MIN_FORWARD: f64 = 0.5;
/// Below this speed a ball meeting a paddle is treated as a toss.
const STATIONARY_SPEED: f64 = 1e-9;
/// Table tolerance for counting a bounce near an edge
const TABLE_EDGE: f64 = 0.02;
/// Table serve: toss point and launch velocity.
const SERVE_INSET: f64 = 0.2;
const SERVE_HEIGHT: f64 = 0.15;
const SERVE_FORWARD: f64 = 3.0;
const SERVE_DROP: f64 = -2.0;
const SERVE_EDGE: f64 = 0.2;
/// Resting height of a parked ball above the table
const REST_HEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleHit {
    pub side: Side,
    /// Ball speed leaving the paddle
    pub speed: f64,
    pub paddle_speed: f64,
    pub spin_tier: u8,
    pub spin_multiplier: f64,
    pub power_shot: bool,
    pub combo: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsEvent {
    Wall,
    TableBounce { half: Side },
    Net,
    PaddleHit(PaddleHit),
    /// The point is decided; the ball is no longer active.
    Point(PointAward),
    /// Ball state went non-finite and was parked; the next serve recovers.
    Invalidated,
}

/// Mutable state one physics step touches.
#[derive(Debug, Clone)]
pub struct World {
    pub ball: Ball,
    /// Indexed by `side_index`
    pub paddles: [Paddle; 2],
    pub power_shots: [PowerShot; 2],
    pub rally: RallyTracker,
}

pub fn side_index(side: Side) -> usize {
    match side {
        Side::P1 => 0,
        Side::P2 => 1,
    }
}

impl World {
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            ball: Ball::new(rest_position(config)),
            paddles: [Paddle::new(config, Side::P1), Paddle::new(config, Side::P2)],
            power_shots: [PowerShot::Ready; 2],
            rally: RallyTracker::default(),
        }
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        &self.paddles[side_index(side)]
    }

    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        &mut self.paddles[side_index(side)]
    }

    pub fn power_shot(&self, side: Side) -> &PowerShot {
        &self.power_shots[side_index(side)]
    }

    pub fn power_shot_mut(&mut self, side: Side) -> &mut PowerShot {
        &mut self.power_shots[side_index(side)]
    }
}

/// Where a parked ball waits between points.
pub fn rest_position(config: &PhysicsConfig) -> Vec3 {
    let arena = &config.arena;
    let z = arena.table.map_or(0.0, |t| t.height + REST_HEIGHT);
    vec3(arena.mid_x(), arena.mid_y(), z)
}

/// Which half of the table a point along x lies on.
pub fn half_of(config: &PhysicsConfig, x: f64) -> Side {
    if x < config.arena.mid_x() {
        Side::P1
    } else {
        Side::P2
    }
}

#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    power: PowerShotConfig,
    rules: RallyRules,
}

impl PhysicsEngine {
    pub fn new(config: PhysicsConfig, power: PowerShotConfig, rules: RallyRules) -> Self {
        Self {
            config,
            power,
            rules,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn power_config(&self) -> &PowerShotConfig {
        &self.power
    }

    /// Put the ball in play from `server`'s end.
    pub fn serve(&self, world: &mut World, server: Side, rng: &mut impl Rng) {
        let c = &self.config;
        let dir = server.direction();
        let angle = if c.serve_angle > 0.0 {
            rng.gen_range(-c.serve_angle..c.serve_angle)
        } else {
            0.0
        };
        let ball = &mut world.ball;
        ball.park(rest_position(c));
        match c.arena.table {
            None => {
                ball.velocity = vec3(
                    dir * c.min_ball_speed * angle.cos(),
                    c.min_ball_speed * angle.sin(),
                    0.0,
                );
            }
            Some(table) => {
                let x = match server {
                    Side::P1 => SERVE_INSET,
                    Side::P2 => c.arena.length - SERVE_INSET,
                };
                let y = world.paddles[side_index(server)]
                    .position
                    .y
                    .clamp(SERVE_EDGE, c.arena.width - SERVE_EDGE);
                ball.position = vec3(x, y, table.height + SERVE_HEIGHT);
                ball.velocity = vec3(
                    dir * SERVE_FORWARD,
                    SERVE_FORWARD * angle.tan(),
                    SERVE_DROP,
                );
            }
        }
        ball.active = true;
        world.rally.start_serve(server);
        for paddle in world.paddles.iter_mut() {
            paddle.combo = 0;
        }
    }

    pub fn step(&self, dt: f64, world: &mut World) -> Vec<PhysicsEvent> {
        let mut events = Vec::new();
        if !world.ball.active || dt <= 0.0 {
            return events;
        }
        let c = &self.config;
        world.ball.push_trail(c.trail_length, c.trail_fade);
        self.integrate(&mut world.ball, dt);

        match c.arena.table {
            None => self.bounce_walls(&mut world.ball, &mut events),
            Some(table) => self.bounce_table(world, table, dt, &mut events),
        }
        self.check_paddles(world, &mut events);
        if let Some(table) = c.arena.table {
            self.check_net(&mut world.ball, table, &mut events);
        }
        self.check_out(world, &mut events);

        if !world.ball.is_finite() {
            tracing::warn!("ball state went non-finite, parking it");
            world.ball.park(rest_position(c));
            events.push(PhysicsEvent::Invalidated);
        }
        events
    }

    fn integrate(&self, ball: &mut Ball, dt: f64) {
        let c = &self.config;
        let mut v = ball.velocity;
        v.z += c.gravity * dt;

        let drag = per_tick(c.drag, dt);
        v.x *= drag;
        v.y *= drag;

        let heading = v.x;
        let spin = ball.spin();
        match c.magnus {
            MagnusModel::Planar => {
                v.x += spin.y * c.magnus_strength * dt;
                v.y += spin.x * c.magnus_strength * dt;
            }
            MagnusModel::CrossProduct => {
                v = add(v, scale(cross(spin, v), c.magnus_strength * dt));
            }
        }
        // Spin bends the path but never turns the ball around.
        if v.x * heading < 0.0 {
            v.x = -v.x;
        }

        ball.velocity = v;
        ball.position = add(ball.position, scale(v, dt));
        ball.set_spin(scale(spin, per_tick(c.spin_decay, dt)), c.max_spin);
    }

    fn bounce_walls(&self, ball: &mut Ball, events: &mut Vec<PhysicsEvent>) {
        let r = self.config.ball_radius;
        let width = self.config.arena.width;
        let bounce = self.config.bounce;
        if ball.position.y - r < 0.0 {
            ball.position.y = r;
            ball.velocity.y = ball.velocity.y.abs() * bounce;
        } else if ball.position.y + r > width {
            ball.position.y = width - r;
            ball.velocity.y = -ball.velocity.y.abs() * bounce;
        } else {
            return;
        }
        ball.clear_spin();
        events.push(PhysicsEvent::Wall);
    }

    fn bounce_table(
        &self,
        world: &mut World,
        table: TableSpec,
        dt: f64,
        events: &mut Vec<PhysicsEvent>,
    ) {
        let c = &self.config;
        let ball = &mut world.ball;
        let top = table.height + c.ball_radius;
        let p = ball.position;
        let over_table = p.x >= -TABLE_EDGE
            && p.x <= c.arena.length + TABLE_EDGE
            && p.y >= -TABLE_EDGE
            && p.y <= c.arena.width + TABLE_EDGE;
        let was_above = p.z - ball.velocity.z * dt >= top - 1e-9;
        if !(ball.velocity.z < 0.0 && p.z <= top && over_table && was_above) {
            return;
        }

        ball.position.z = top;
        ball.velocity.z = ball.velocity.z.abs() * c.bounce;
        let spin = ball.spin();
        let forward = if ball.velocity.x < 0.0 { -1.0 } else { 1.0 };
        ball.velocity.x += spin.y * BOUNCE_KICK;
        ball.velocity.y += spin.z * BOUNCE_KICK * forward;
        ball.clear_spin();

        let half = half_of(c, ball.position.x);
        events.push(PhysicsEvent::TableBounce { half });
        if let Some(award) = world.rally.on_bounce(half, &self.rules) {
            award_point(world, award, events);
        }
    }

    fn check_paddles(&self, world: &mut World, events: &mut Vec<PhysicsEvent>) {
        for side in [Side::P1, Side::P2] {
            if !world.ball.active {
                return;
            }
            let ball = &world.ball;
            let approaching =
                ball.velocity.x * side.direction() < 0.0 || ball.speed() < STATIONARY_SPEED;
            if approaching && self.touches(ball, world.paddle(side)) {
                let hit = self.resolve_hit(world, side);
                events.push(PhysicsEvent::PaddleHit(hit));
                return;
            }
        }
    }

    pub fn touches(&self, ball: &Ball, paddle: &Paddle) -> bool {
        let r = self.config.ball_radius;
        let d = sub(ball.position, paddle.position);
        match paddle.shape {
            PaddleShape::Box { depth, span } => {
                d.x.abs() < depth * 0.5 + r && d.y.abs() < span * 0.5 + r
            }
            PaddleShape::Disc { radius } => {
                d.x.abs() < DISC_DEPTH_BAND
                    && d.y.abs() < radius + r + DISC_SLACK
                    && d.z.abs() < radius * 1.1 + r + DISC_SLACK
            }
        }
    }

    /// Send the ball back off `side`'s paddle. Assumes contact was already detected.
    pub fn resolve_hit(&self, world: &mut World, side: Side) -> PaddleHit {
        let c = &self.config;
        let dir = side.direction();
        let idx = side_index(side);
        let paddle_pos = world.paddles[idx].position;
        let pv = world.paddles[idx].velocity;
        let shape = world.paddles[idx].shape;
        let ball = &mut world.ball;

        let face = match shape {
            PaddleShape::Box { depth, .. } => depth * 0.5 + c.ball_radius * (1.0 + HIT_GAP),
            PaddleShape::Disc { .. } => c.ball_radius * (1.0 + HIT_GAP),
        };
        ball.position.x = paddle_pos.x + dir * face;

        let hit_offset = ((ball.position.y - paddle_pos.y) / shape.half_span()).clamp(-1.0, 1.0);
        let vertical_offset = match shape {
            PaddleShape::Disc { radius } => ((ball.position.z - paddle_pos.z) / radius).clamp(-1.0, 1.0),
            PaddleShape::Box { .. } => 0.0,
        };

        let paddle_speed = (pv.y * pv.y + pv.z * pv.z).sqrt();
        let (spin_tier, spin_multiplier) = c.spin_tier(paddle_speed);
        let mut spin = match c.magnus {
            MagnusModel::Planar => vec3(
                pv.y * c.spin_transfer * spin_multiplier,
                hit_offset * paddle_speed * c.offset_spin * spin_multiplier * dir,
                0.0,
            ),
            MagnusModel::CrossProduct => vec3(
                0.0,
                pv.z * c.spin_transfer * spin_multiplier * dir,
                (pv.y * c.spin_transfer + hit_offset * paddle_speed * c.offset_spin)
                    * spin_multiplier
                    * dir,
            ),
        };

        let mut v = if ball.speed() < STATIONARY_SPEED {
            vec3(dir * c.min_ball_speed, 0.0, 0.0)
        } else {
            let mut v = ball.velocity;
            v.x = -v.x;
            v
        };

        let power_shot = world.power_shots[idx].consume(&self.power);
        let mut boost = c.base_boost + paddle_speed * c.speed_boost;
        if power_shot {
            boost *= self.power.speed_multiplier;
            spin = scale(spin, self.power.spin_multiplier);
        }
        v.x *= boost;
        v.y += hit_offset * c.offset_deflect + pv.y * c.paddle_carry;
        if c.arena.table.is_some() {
            v.z = c.hit_lift + vertical_offset * c.lift_per_offset + pv.z * c.paddle_carry;
        }
        v.x = dir * v.x.abs().max(c.min_ball_speed * MIN_FORWARD);
        v = clamp_length(v, c.min_ball_speed, c.max_ball_speed);

        ball.velocity = v;
        ball.set_spin(spin, c.max_spin);
        ball.last_hit_by = Some(side);
        let speed = ball.speed();

        world.paddles[idx].combo += 1;
        world.paddles[1 - idx].combo = 0;
        world.rally.on_hit(side);

        PaddleHit {
            side,
            speed,
            paddle_speed,
            spin_tier,
            spin_multiplier,
            power_shot,
            combo: world.paddles[idx].combo,
        }
    }

    fn check_net(&self, ball: &mut Ball, table: TableSpec, events: &mut Vec<PhysicsEvent>) {
        if !ball.active || ball.velocity.x == 0.0 {
            return;
        }
        let c = &self.config;
        let r = c.ball_radius;
        let p = ball.position;
        let dx = p.x - c.arena.mid_x();
        let touching = dx.abs() < table.net_band + r
            && p.z > table.height
            && p.z < table.height + table.net_height + r
            && p.y >= 0.0
            && p.y <= c.arena.width;
        if !touching {
            return;
        }
        let heading = ball.velocity.x.signum();
        ball.velocity.x *= -c.net_restitution;
        ball.velocity.z = ball.velocity.z.abs() * NET_LIFT;
        ball.position.x = c.arena.mid_x() - heading * (table.net_band + r + 1e-3);
        events.push(PhysicsEvent::Net);
    }

    fn check_out(&self, world: &mut World, events: &mut Vec<PhysicsEvent>) {
        if !world.ball.active {
            return;
        }
        let c = &self.config;
        let arena = &c.arena;
        let p = world.ball.position;
        let past_end = p.x < -arena.end_margin || p.x > arena.length + arena.end_margin;
        let award = match arena.table {
            None if past_end => {
                let scorer = if p.x < 0.0 { Side::P2 } else { Side::P1 };
                PointAward {
                    scorer,
                    reason: PointReason::PastEndLine,
                }
            }
            None => return,
            Some(table) => {
                let dead = past_end
                    || p.y < -table.side_margin
                    || p.y > arena.width + table.side_margin
                    || p.z < table.height - table.floor_depth;
                if !dead {
                    return;
                }
                world.rally.on_out(half_of(c, p.x))
            }
        };
        award_point(world, award, events);
    }
}

fn award_point(world: &mut World, award: PointAward, events: &mut Vec<PhysicsEvent>) {
    world.ball.active = false;
    events.push(PhysicsEvent::Point(award));
}
