//! Server-stepped ball for rooms running with authoritative physics.
//!
//! The room keeps a reference arcade court and drives the shared physics
//! engine with the paddles the peers report. Points are decided here
//! instead of trusting score reports.

use pingpong_shared::config::GameConfig;
use pingpong_shared::online::Normalizer;
use pingpong_shared::physics::{rest_position, PhysicsEngine, PhysicsEvent, World};
use pingpong_shared::protocol::{BallWire, PaddleWire, PaddlesWire};
use pingpong_shared::timer::Alarm;
use pingpong_shared::types::Side;
use pingpong_shared::vec3::vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug)]
pub struct AuthoritativeSim {
    engine: PhysicsEngine,
    world: World,
    normalizer: Normalizer,
    rng: ChaCha8Rng,
    serve: Alarm,
    server: Side,
    point_delay: f64,
}

impl AuthoritativeSim {
    pub fn new(seed: u64) -> Self {
        let config = GameConfig::arcade();
        let engine = PhysicsEngine::new(
            config.physics.clone(),
            config.power_shot,
            config.rules.rally,
        );
        Self {
            world: World::new(&config.physics),
            normalizer: Normalizer::new(&config.physics.arena),
            engine,
            rng: ChaCha8Rng::seed_from_u64(seed),
            serve: Alarm::default(),
            server: Side::P1,
            point_delay: config.rules.point_delay,
        }
    }

    /// First serve of the match, launched by P1 right away.
    pub fn start(&mut self) {
        self.server = Side::P1;
        self.serve.cancel();
        self.engine.serve(&mut self.world, self.server, &mut self.rng);
    }

    pub fn stop(&mut self) {
        self.serve.cancel();
        self.world.ball.park(rest_position(self.engine.config()));
    }

    pub fn ball_active(&self) -> bool {
        self.world.ball.active
    }

    pub fn set_paddle(&mut self, side: Side, wire: PaddleWire) {
        let (y, vy) = self.normalizer.paddle_from_wire(wire);
        let paddle = self.world.paddle_mut(side);
        let position = vec3(paddle.position.x, y, paddle.position.z);
        paddle.set_remote(position, vec3(0.0, vy, 0.0));
    }

    /// Advance one tick. Returns the scorer when a point was decided.
    pub fn step(&mut self, dt: f64) -> Option<Side> {
        if self.serve.advance(dt) > 0 {
            self.engine.serve(&mut self.world, self.server, &mut self.rng);
        }

        let mut scorer = None;
        for event in self.engine.step(dt, &mut self.world) {
            match event {
                PhysicsEvent::Point(award) => {
                    self.world.ball.park(rest_position(self.engine.config()));
                    self.server = award.scorer;
                    self.serve.arm_once(self.point_delay);
                    scorer = Some(award.scorer);
                }
                PhysicsEvent::Invalidated => self.serve.arm_once(self.point_delay),
                _ => {}
            }
        }
        scorer
    }

    pub fn ball_wire(&self) -> BallWire {
        self.normalizer.ball_to_wire(&self.world.ball)
    }

    pub fn paddles_wire(&self) -> PaddlesWire {
        PaddlesWire {
            p1: self.normalizer.paddle_to_wire(self.world.paddle(Side::P1)),
            p2: self.normalizer.paddle_to_wire(self.world.paddle(Side::P2)),
        }
    }
}
