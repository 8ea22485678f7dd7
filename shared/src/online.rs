//! Client side of an online match: turns local simulation events into
//! `ClientMsg`s and room broadcasts back into simulation calls.

use crate::ball::Ball;
use crate::config::Arena;
use crate::match_state::MatchEvent;
use crate::paddle::Paddle;
use crate::physics::PhysicsEvent;
use crate::protocol::{round4, BallWire, ClientMsg, PaddleWire, ServerMsg, SpinWire};
use crate::simulation::{MatchSimulation, SimEvent};
use crate::types::Role;
use crate::vec3::{vec3, Vec3};

/// Two wire ball states closer than this in every field are the same hit.
const ECHO_TOLERANCE: f64 = 1e-6;

/// Converts between arena units and the resolution-independent wire range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    length: f64,
    width: f64,
}

impl Normalizer {
    pub fn new(arena: &Arena) -> Self {
        Self {
            length: arena.length,
            width: arena.width,
        }
    }

    pub fn paddle_to_wire(&self, paddle: &Paddle) -> PaddleWire {
        PaddleWire {
            y: round4(paddle.position.y / self.width),
            vy: round4(paddle.velocity.y / self.width),
        }
    }

    /// Returns (y, vy) in arena units.
    pub fn paddle_from_wire(&self, wire: PaddleWire) -> (f64, f64) {
        (wire.y * self.width, wire.vy * self.width)
    }

    pub fn ball_to_wire(&self, ball: &Ball) -> BallWire {
        let spin = ball.spin();
        BallWire {
            x: round4(ball.position.x / self.length),
            y: round4(ball.position.y / self.width),
            vx: round4(ball.velocity.x / self.length),
            vy: round4(ball.velocity.y / self.width),
            spin: SpinWire {
                x: spin.x,
                y: spin.y,
            },
        }
    }

    /// Returns (position, velocity, spin) in arena units.
    pub fn ball_from_wire(&self, wire: &BallWire) -> (Vec3, Vec3, Vec3) {
        (
            vec3(wire.x * self.length, wire.y * self.width, 0.0),
            vec3(wire.vx * self.length, wire.vy * self.width, 0.0),
            vec3(wire.spin.x, wire.spin.y, 0.0),
        )
    }
}

fn same_ball(a: &BallWire, b: &BallWire) -> bool {
    [
        a.x - b.x,
        a.y - b.y,
        a.vx - b.vx,
        a.vy - b.vy,
        a.spin.x - b.spin.x,
        a.spin.y - b.spin.y,
    ]
    .iter()
    .all(|d| d.abs() < ECHO_TOLERANCE)
}

pub struct OnlineSession {
    room_code: String,
    role: Role,
    normalizer: Normalizer,
    /// Only the authority reports points to the room.
    reports_scores: bool,
    /// Adopt the ball from game-state snapshots (server-simulated rooms).
    follow_snapshots: bool,
    last_paddle: Option<PaddleWire>,
    last_ball: Option<BallWire>,
    closed: bool,
}

impl OnlineSession {
    pub fn new(room_code: impl Into<String>, role: Role, arena: &Arena) -> Self {
        Self {
            room_code: room_code.into(),
            role,
            normalizer: Normalizer::new(arena),
            reports_scores: role == Role::Host,
            follow_snapshots: false,
            last_paddle: None,
            last_ball: None,
            closed: false,
        }
    }

    pub fn with_snapshots(mut self, follow: bool) -> Self {
        self.follow_snapshots = follow;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// The opponent left or the room expired; the match is over for good.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Messages owed to the room after a local tick that produced `events`.
    pub fn outbound(&mut self, sim: &MatchSimulation, events: &[SimEvent]) -> Vec<ClientMsg> {
        let mut out = Vec::new();
        if self.closed {
            return out;
        }
        let local = self.role.side();

        let paddle = self.normalizer.paddle_to_wire(sim.paddle(local));
        if self.last_paddle != Some(paddle) {
            self.last_paddle = Some(paddle);
            out.push(ClientMsg::PaddleMove {
                room_code: self.room_code.clone(),
                y: paddle.y,
                vy: paddle.vy,
            });
        }

        for event in events {
            match event {
                SimEvent::Physics(PhysicsEvent::PaddleHit(hit)) if hit.side == local => {
                    out.push(self.ball_hit(sim));
                }
                SimEvent::Match(MatchEvent::Serve(_))
                    if sim.launches_serves() && sim.ball().active =>
                {
                    out.push(self.ball_hit(sim));
                }
                SimEvent::Physics(PhysicsEvent::Point(award)) if self.reports_scores => {
                    out.push(ClientMsg::ScoreUpdate {
                        room_code: self.room_code.clone(),
                        scorer: award.scorer,
                    });
                }
                _ => {}
            }
        }
        out
    }

    fn ball_hit(&mut self, sim: &MatchSimulation) -> ClientMsg {
        let ball_state = self.normalizer.ball_to_wire(sim.ball());
        self.last_ball = Some(ball_state);
        ClientMsg::BallHit {
            room_code: self.room_code.clone(),
            ball_state,
        }
    }

    /// Feed one room broadcast into the local simulation.
    pub fn apply(&mut self, sim: &mut MatchSimulation, msg: &ServerMsg) -> Vec<SimEvent> {
        match msg {
            ServerMsg::OpponentMove(m) if m.role != self.role => {
                self.apply_paddle(sim, m.role, PaddleWire { y: m.y, vy: m.vy });
                Vec::new()
            }
            ServerMsg::BallUpdate(m) => {
                // The room echoes our own hits back; replaying them would rewind the ball.
                if self.last_ball.is_some_and(|sent| same_ball(&sent, &m.ball_state)) {
                    return Vec::new();
                }
                self.apply_ball(sim, &m.ball_state);
                Vec::new()
            }
            ServerMsg::Countdown(m) => sim.apply_countdown(m.count),
            ServerMsg::GameStart => sim.apply_game_start(),
            ServerMsg::ScoreChanged(m) => {
                self.last_ball = None;
                sim.apply_scores(m.scores, m.scorer)
            }
            ServerMsg::GameOver(m) => sim.apply_game_over(m.winner, m.scores),
            ServerMsg::GameState(m) if self.follow_snapshots => {
                self.apply_ball(sim, &m.ball);
                let opponent = match self.role {
                    Role::Host => Role::Guest,
                    Role::Guest => Role::Host,
                };
                self.apply_paddle(sim, opponent, m.paddles.get(opponent.side()));
                Vec::new()
            }
            ServerMsg::OpponentDisconnected | ServerMsg::RoomExpired => {
                tracing::info!(room = %self.room_code, "online match abandoned");
                self.closed = true;
                sim.quit();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn apply_paddle(&self, sim: &mut MatchSimulation, role: Role, wire: PaddleWire) {
        let side = role.side();
        let (y, vy) = self.normalizer.paddle_from_wire(wire);
        let current = sim.paddle(side).position;
        sim.apply_remote_paddle(side, vec3(current.x, y, current.z), vec3(0.0, vy, 0.0));
    }

    fn apply_ball(&self, sim: &mut MatchSimulation, wire: &BallWire) {
        let (position, velocity, spin) = self.normalizer.ball_from_wire(wire);
        sim.apply_ball_state(position, velocity, spin);
    }
}
