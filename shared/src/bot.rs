//! Computer opponent for bot matches.
//!
//! The bot only sees the ball and drives its paddle through the normal
//! paddle controller:
//! - Re-aims on a reaction timer that shortens as difficulty rises
//! - Predicts where the ball will cross its paddle line, folding wall bounces
//! - Adds random aim error that shrinks as difficulty rises
//! - Moves toward the aim point at a capped speed

use rand::Rng;

use crate::ball::Ball;
use crate::config::{BotConfig, PhysicsConfig};
use crate::paddle::Paddle;
use crate::timer::Alarm;
use crate::types::Side;
use crate::vec3::{add, length, scale, sub, vec3, Vec3};

/// Integration step for table trajectory prediction (seconds)
const PREDICT_STEP: f64 = 1.0 / 120.0;
/// Give up predicting beyond this much flight time.
const PREDICT_HORIZON: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct BotAi {
    config: BotConfig,
    side: Side,
    reaction: Alarm,
    target: Option<Vec3>,
}

impl BotAi {
    pub fn new(config: BotConfig, side: Side) -> Self {
        Self {
            config,
            side,
            reaction: Alarm::default(),
            target: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn difficulty(&self) -> f64 {
        self.config.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: f64) {
        self.config.difficulty = difficulty.clamp(0.0, 1.0);
    }

    /// Seconds between decisions.
    pub fn reaction_delay(&self) -> f64 {
        self.config.reaction_base + (1.0 - self.config.difficulty) * self.config.reaction_range
    }

    pub fn max_speed(&self) -> f64 {
        self.config.base_speed + self.config.difficulty * self.config.speed_range
    }

    pub fn target(&self) -> Option<Vec3> {
        self.target
    }

    /// Forget the current aim, e.g. between points.
    pub fn reset(&mut self) {
        self.reaction.cancel();
        self.target = None;
    }

    pub fn update(
        &mut self,
        dt: f64,
        ball: &Ball,
        paddle: &mut Paddle,
        physics: &PhysicsConfig,
        rng: &mut impl Rng,
    ) {
        if !self.reaction.is_armed() || self.reaction.advance(dt) > 0 {
            self.target = Some(self.decide(ball, paddle, physics, rng));
            self.reaction.arm_once(self.reaction_delay());
        }
        let Some(target) = self.target else {
            paddle.hold(dt);
            return;
        };

        let approaching = self.is_approaching(ball);
        let mut max_speed = self.max_speed();
        if approaching
            && self.config.difficulty > self.config.aggressive_difficulty
            && (ball.position.x - paddle.position.x).abs() < self.config.aggressive_distance
        {
            max_speed += self.config.aggressive_boost;
        }

        let gap = sub(target, paddle.position);
        let gap = vec3(0.0, gap.y, gap.z);
        let distance = length(gap);
        if distance <= self.config.dead_zone {
            paddle.hold(dt);
            return;
        }
        let reach = max_speed * dt;
        let step = if distance > reach {
            scale(gap, reach / distance)
        } else {
            gap
        };
        paddle.move_to(add(paddle.position, step), dt);
    }

    fn is_approaching(&self, ball: &Ball) -> bool {
        ball.active && ball.velocity.x * self.side.direction() < 0.0
    }

    fn decide(
        &self,
        ball: &Ball,
        paddle: &Paddle,
        physics: &PhysicsConfig,
        rng: &mut impl Rng,
    ) -> Vec3 {
        let home = paddle.bounds().home;
        let skill_gap = 1.0 - self.config.difficulty;
        if !self.is_approaching(ball) {
            let jitter = (rng.gen::<f64>() - 0.5) * self.config.centering_jitter;
            return vec3(home.x, home.y + jitter, home.z);
        }

        let predicted = match physics.arena.table {
            None => vec3(
                home.x,
                self.predict_court_y(ball, paddle.position.x, physics),
                home.z,
            ),
            Some(_) => self
                .predict_table(ball, paddle.position.x, physics)
                .unwrap_or(home),
        };
        let error = (rng.gen::<f64>() - 0.5) * self.config.error_range * skill_gap;
        vec3(home.x, predicted.y + error, predicted.z)
    }

    /// Cross-court position where the ball meets `paddle_x`, with wall bounces folded in.
    pub fn predict_court_y(&self, ball: &Ball, paddle_x: f64, physics: &PhysicsConfig) -> f64 {
        let vx = ball.velocity.x;
        if vx == 0.0 {
            return ball.position.y;
        }
        let t = ((paddle_x - ball.position.x) / vx).max(0.0);
        let mut y = ball.position.y + ball.velocity.y * t + ball.spin().x * self.config.spin_lead * t;

        let lo = physics.ball_radius;
        let hi = physics.arena.width - physics.ball_radius;
        for _ in 0..self.config.bounce_limit {
            if y < lo {
                y = 2.0 * lo - y;
            } else if y > hi {
                y = 2.0 * hi - y;
            } else {
                break;
            }
        }
        y.clamp(lo, hi)
    }

    /// March a gravity-only copy of the ball forward until it reaches `paddle_x`.
    pub fn predict_table(&self, ball: &Ball, paddle_x: f64, physics: &PhysicsConfig) -> Option<Vec3> {
        let table = physics.arena.table?;
        let top = table.height + physics.ball_radius;
        let mut p = ball.position;
        let mut v = ball.velocity;
        let lateral_lead = ball.spin().z * self.config.spin_lead;
        let mut t = 0.0;
        while t < PREDICT_HORIZON {
            if (paddle_x - p.x) * v.x <= 0.0 {
                return Some(p);
            }
            v.z += physics.gravity * PREDICT_STEP;
            v.y += lateral_lead * PREDICT_STEP;
            p = add(p, scale(v, PREDICT_STEP));
            if p.z < top && v.z < 0.0 && p.x >= 0.0 && p.x <= physics.arena.length {
                p.z = top;
                v.z = -v.z * physics.bounce;
            }
            t += PREDICT_STEP;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f64 = 1.0 / 60.0;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn ball(position: Vec3, velocity: Vec3) -> Ball {
        let mut ball = Ball::new(position);
        ball.velocity = velocity;
        ball.active = true;
        ball
    }

    fn perfect_bot() -> BotAi {
        BotAi::new(
            BotConfig {
                difficulty: 1.0,
                ..BotConfig::arcade()
            },
            Side::P2,
        )
    }

    #[test]
    fn harder_bots_react_faster_and_move_faster() {
        let mut bot = BotAi::new(BotConfig::arcade(), Side::P2);
        bot.set_difficulty(0.2);
        let (slow_delay, slow_speed) = (bot.reaction_delay(), bot.max_speed());
        bot.set_difficulty(0.9);
        assert!(bot.reaction_delay() < slow_delay);
        assert!(bot.max_speed() > slow_speed);
    }

    #[test]
    fn predicts_straight_line_intercept() {
        let physics = PhysicsConfig::arcade();
        let bot = perfect_bot();
        let b = ball(vec3(640.0, 300.0, 0.0), vec3(1200.0, 120.0, 0.0));
        // 570 px to go at 1200 px/s is 0.475 s, drifting 57 px.
        let y = bot.predict_court_y(&b, 1210.0, &physics);
        assert!((y - 357.0).abs() < 1e-9);
    }

    #[test]
    fn prediction_folds_wall_bounces() {
        let physics = PhysicsConfig::arcade();
        let bot = perfect_bot();
        let b = ball(vec3(640.0, 650.0, 0.0), vec3(1200.0, 400.0, 0.0));
        let y = bot.predict_court_y(&b, 1210.0, &physics);
        // Unfolded y would be 840, past the 706 wall by 134.
        assert!((y - 572.0).abs() < 1e-9);
    }

    #[test]
    fn prediction_accounts_for_spin() {
        let physics = PhysicsConfig::arcade();
        let bot = perfect_bot();
        let mut b = ball(vec3(640.0, 360.0, 0.0), vec3(1200.0, 0.0, 0.0));
        let plain = bot.predict_court_y(&b, 1210.0, &physics);
        b.set_spin(vec3(0.05, 0.0, 0.0), physics.max_spin);
        assert!(bot.predict_court_y(&b, 1210.0, &physics) > plain);
    }

    #[test]
    fn perfect_bot_reaches_predicted_line() {
        let physics = PhysicsConfig::arcade();
        let mut bot = perfect_bot();
        let mut paddle = Paddle::new(&physics, Side::P2);
        let mut rng = test_rng();
        let b = ball(vec3(640.0, 300.0, 0.0), vec3(1200.0, 120.0, 0.0));

        for _ in 0..60 {
            bot.update(DT, &b, &mut paddle, &physics, &mut rng);
        }
        assert!((paddle.position.y - 357.0).abs() <= 3.0 + 1e-9);
    }

    #[test]
    fn bot_speed_is_capped() {
        let physics = PhysicsConfig::arcade();
        let mut bot = perfect_bot();
        let mut paddle = Paddle::new(&physics, Side::P2);
        let mut rng = test_rng();
        let b = ball(vec3(640.0, 100.0, 0.0), vec3(1200.0, 0.0, 0.0));

        let start = paddle.position.y;
        bot.update(DT, &b, &mut paddle, &physics, &mut rng);
        let cap = (bot.max_speed() + BotConfig::arcade().aggressive_boost) * DT;
        assert!((paddle.position.y - start).abs() <= cap + 1e-9);
        assert!(paddle.velocity.y < 0.0);
    }

    #[test]
    fn receding_ball_sends_bot_home() {
        let physics = PhysicsConfig::arcade();
        let mut bot = BotAi::new(BotConfig::arcade(), Side::P2);
        let mut paddle = Paddle::new(&physics, Side::P2);
        paddle.move_to_y(120.0, DT);
        let mut rng = test_rng();
        let b = ball(vec3(640.0, 100.0, 0.0), vec3(-1200.0, 0.0, 0.0));

        bot.update(DT, &b, &mut paddle, &physics, &mut rng);
        let target = bot.target().unwrap();
        assert!((target.y - 360.0).abs() <= 40.0);
    }

    #[test]
    fn reaction_delay_holds_aim_between_decisions() {
        let physics = PhysicsConfig::arcade();
        let mut bot = BotAi::new(BotConfig::arcade(), Side::P2);
        let mut paddle = Paddle::new(&physics, Side::P2);
        let mut rng = test_rng();
        let mut b = ball(vec3(640.0, 300.0, 0.0), vec3(1200.0, 0.0, 0.0));

        bot.update(DT, &b, &mut paddle, &physics, &mut rng);
        let first = bot.target();
        b.velocity.y = 600.0;
        bot.update(DT, &b, &mut paddle, &physics, &mut rng);
        assert_eq!(bot.target(), first);
    }

    #[test]
    fn table_prediction_meets_paddle_line() {
        let physics = PhysicsConfig::table();
        let bot = BotAi::new(BotConfig::table(), Side::P2);
        let b = ball(vec3(1.5, 0.7, 0.9), vec3(3.0, 0.1, 1.0));
        let x = physics.arena.length - physics.paddle_inset;
        let p = bot.predict_table(&b, x, &physics).unwrap();
        assert!((p.x - x).abs() < 0.05);
        assert!(p.z > 0.76);
        assert!(p.y > 0.7);
    }
}
