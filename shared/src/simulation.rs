//! One match: ball, paddles, power shots, phase machine, bot and RNG in a
//! single value. A tick runs the match clock, input, the opponent paddle,
//! power-shot timers, physics and scoring in that order.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::ball::Ball;
use crate::bot::BotAi;
use crate::config::{per_tick, GameConfig};
use crate::match_state::{MatchEvent, MatchPhase, MatchState};
use crate::paddle::Paddle;
use crate::physics::{rest_position, PhysicsEngine, PhysicsEvent, World};
use crate::power_shot::{PowerShot, PowerShotTransition};
use crate::rally::RallyTracker;
use crate::types::{GameMode, Role, Scores, Side};
use crate::vec3::{vec3, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    Match(MatchEvent),
    Physics(PhysicsEvent),
    PowerShotActivated(Side),
    PowerShot(Side, PowerShotTransition),
}

pub struct MatchSimulation {
    config: GameConfig,
    engine: PhysicsEngine,
    world: World,
    state: MatchState,
    bot: BotAi,
    rng: ChaCha8Rng,
    local: Side,
    pointer: Option<Vec3>,
    /// Offline and on the host this simulation launches serves; a guest
    /// waits for the host's ball state instead.
    launches_serves: bool,
    elapsed: f64,
}

impl MatchSimulation {
    pub fn new(config: GameConfig, seed: u64) -> Result<Self, String> {
        config.validate()?;
        let engine = PhysicsEngine::new(
            config.physics.clone(),
            config.power_shot,
            config.rules.rally,
        );
        Ok(Self {
            world: World::new(&config.physics),
            state: MatchState::new(config.rules),
            bot: BotAi::new(config.bot, Side::P2),
            rng: ChaCha8Rng::seed_from_u64(seed),
            local: Side::P1,
            pointer: None,
            launches_serves: true,
            elapsed: 0.0,
            engine,
            config,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn ball(&self) -> &Ball {
        &self.world.ball
    }

    pub fn paddle(&self, side: Side) -> &Paddle {
        self.world.paddle(side)
    }

    pub fn power_shot(&self, side: Side) -> &PowerShot {
        self.world.power_shot(side)
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase()
    }

    pub fn scores(&self) -> Scores {
        self.state.scores()
    }

    pub fn mode(&self) -> GameMode {
        self.state.mode()
    }

    pub fn match_state(&self) -> &MatchState {
        &self.state
    }

    pub fn local_side(&self) -> Side {
        self.local
    }

    pub fn launches_serves(&self) -> bool {
        self.launches_serves
    }

    pub fn bot_mut(&mut self) -> &mut BotAi {
        &mut self.bot
    }

    /// Simulated seconds of play, paused time excluded.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    fn reset_entities(&mut self) {
        for paddle in self.world.paddles.iter_mut() {
            paddle.reset();
        }
        for shot in self.world.power_shots.iter_mut() {
            shot.reset();
        }
        self.world.rally = RallyTracker::default();
        self.world.ball.park(rest_position(&self.config.physics));
        self.bot.reset();
        self.pointer = None;
    }

    /// Offline match against the bot or the practice wall. The player is P1.
    pub fn start(&mut self, mode: GameMode) -> Vec<SimEvent> {
        self.local = Side::P1;
        self.launches_serves = true;
        self.reset_entities();
        let events = self.state.start(mode);
        self.handle_match_events(events)
    }

    /// Join an online match as `role` and wait for the room's countdown.
    pub fn start_online(&mut self, role: Role) {
        self.local = role.side();
        self.launches_serves = role == Role::Host;
        self.reset_entities();
        self.state.prepare_online();
    }

    pub fn restart(&mut self) -> Vec<SimEvent> {
        self.reset_entities();
        let events = self.state.restart();
        self.handle_match_events(events)
    }

    pub fn pause(&mut self) -> bool {
        self.state.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.state.resume()
    }

    /// Abandon the match. Pending countdown and serve alarms die with it.
    pub fn quit(&mut self) {
        self.state.quit();
        self.reset_entities();
    }

    /// Latest pointer target for the local paddle, in arena units.
    pub fn set_pointer(&mut self, target: Vec3) {
        self.pointer = Some(target);
    }

    /// Pointer target on the cross-table axis only.
    pub fn set_pointer_y(&mut self, y: f64) {
        let current = self.pointer.unwrap_or(self.paddle(self.local).position);
        self.pointer = Some(vec3(current.x, y, current.z));
    }

    pub fn activate_power_shot(&mut self) -> Option<SimEvent> {
        self.activate_power_shot_for(self.local)
    }

    pub fn activate_power_shot_for(&mut self, side: Side) -> Option<SimEvent> {
        let config = self.config.power_shot;
        self.world
            .power_shot_mut(side)
            .activate(&config)
            .then_some(SimEvent::PowerShotActivated(side))
    }

    pub fn tick(&mut self, dt: f64) -> Vec<SimEvent> {
        let mut events = Vec::new();
        if dt <= 0.0 || matches!(self.phase(), MatchPhase::Paused | MatchPhase::Menu) {
            return events;
        }
        self.elapsed += dt;

        let clock = self.state.advance(dt);
        events.extend(self.handle_match_events(clock));

        self.move_local_paddle(dt);
        self.move_opponent_paddle(dt);

        let power = self.config.power_shot;
        for side in [Side::P1, Side::P2] {
            if let Some(transition) = self.world.power_shot_mut(side).update(dt, &power) {
                events.push(SimEvent::PowerShot(side, transition));
            }
        }

        if self.state.is_playing() {
            for event in self.engine.step(dt, &mut self.world) {
                events.push(SimEvent::Physics(event));
                events.extend(self.handle_physics_event(event));
            }
        }
        events
    }

    fn move_local_paddle(&mut self, dt: f64) {
        let side = self.local;
        let paddle = self.world.paddle_mut(side);
        match self.pointer {
            Some(target) => paddle.move_to(target, dt),
            None => paddle.hold(dt),
        }
    }

    fn move_opponent_paddle(&mut self, dt: f64) {
        let side = self.local.opponent();
        match self.state.mode() {
            GameMode::Bot => {
                let paddle = &mut self.world.paddles[crate::physics::side_index(side)];
                self.bot.update(
                    dt,
                    &self.world.ball,
                    paddle,
                    &self.config.physics,
                    &mut self.rng,
                );
            }
            GameMode::Practice => {
                let target = self.practice_target(dt);
                self.world.paddle_mut(side).move_to(target, dt);
            }
            // Replicated from the peer through apply_remote_paddle.
            GameMode::Online => {}
        }
    }

    /// The practice wall eases toward where the ball is about to be.
    fn practice_target(&self, dt: f64) -> Vec3 {
        let rules = &self.config.rules;
        let paddle = self.world.paddle(self.local.opponent());
        let ball = &self.world.ball;
        if !ball.active {
            return paddle.bounds().home;
        }
        let aim = vec3(
            paddle.position.x,
            ball.position.y + ball.velocity.y * rules.practice_lead,
            ball.position.z + ball.velocity.z * rules.practice_lead,
        );
        let ease = 1.0 - per_tick(1.0 - rules.practice_tracking, dt);
        vec3(
            paddle.position.x,
            paddle.position.y + (aim.y - paddle.position.y) * ease,
            paddle.position.z + (aim.z - paddle.position.z) * ease,
        )
    }

    fn handle_match_events(&mut self, events: Vec<MatchEvent>) -> Vec<SimEvent> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            if let MatchEvent::Serve(server) = event {
                self.serve(server);
            }
            out.push(SimEvent::Match(event));
        }
        out
    }

    /// A guest leaves the ball alone: it was parked when the point ended and
    /// the host's serve may already have been replicated onto it.
    fn serve(&mut self, server: Side) {
        self.bot.reset();
        if self.launches_serves {
            self.engine.serve(&mut self.world, server, &mut self.rng);
        }
    }

    fn handle_physics_event(&mut self, event: PhysicsEvent) -> Vec<SimEvent> {
        match event {
            PhysicsEvent::Point(award) => {
                self.world.ball.park(rest_position(&self.config.physics));
                // Online scores come back from the room, not from local physics.
                if self.state.mode() == GameMode::Online {
                    return Vec::new();
                }
                let events = self.state.point_scored(award.scorer);
                self.handle_match_events(events)
            }
            PhysicsEvent::Invalidated if self.state.is_playing() => {
                let server = self.state.server();
                self.serve(server);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    // Online replication.

    /// Adopt the peer's paddle. Position and velocity are in arena units.
    pub fn apply_remote_paddle(&mut self, side: Side, position: Vec3, velocity: Vec3) {
        self.world.paddle_mut(side).set_remote(position, velocity);
    }

    /// Replace the ball with the authoritative state from a ball-hit.
    pub fn apply_ball_state(&mut self, position: Vec3, velocity: Vec3, spin: Vec3) {
        let max_spin = self.config.physics.max_spin;
        let ball = &mut self.world.ball;
        if !(position.is_finite() && velocity.is_finite() && spin.is_finite()) {
            tracing::warn!("ignoring non-finite replicated ball state");
            return;
        }
        // A motionless ball is the room's parked ball between points.
        if velocity == Vec3::ZERO {
            ball.park(position);
            return;
        }
        ball.position = position;
        ball.velocity = velocity;
        ball.set_spin(spin, max_spin);
        ball.active = true;
        let hitter = if velocity.x >= 0.0 { Side::P1 } else { Side::P2 };
        ball.last_hit_by = Some(hitter);
        self.world.rally.on_hit(hitter);
    }

    pub fn apply_countdown(&mut self, count: u32) -> Vec<SimEvent> {
        if self.phase() == MatchPhase::Menu || matches!(self.phase(), MatchPhase::Ended { .. }) {
            self.reset_entities();
        }
        let events = self.state.apply_countdown(count);
        self.handle_match_events(events)
    }

    pub fn apply_game_start(&mut self) -> Vec<SimEvent> {
        let events = self.state.apply_game_start();
        self.handle_match_events(events)
    }

    pub fn apply_scores(&mut self, scores: Scores, scorer: Side) -> Vec<SimEvent> {
        self.world.ball.park(rest_position(&self.config.physics));
        let events = self.state.apply_scores(scores, scorer);
        self.handle_match_events(events)
    }

    pub fn apply_game_over(&mut self, winner: Side, scores: Scores) -> Vec<SimEvent> {
        self.world.ball.park(rest_position(&self.config.physics));
        let events = self.state.apply_game_over(winner, scores);
        self.handle_match_events(events)
    }
}
