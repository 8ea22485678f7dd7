use std::collections::HashMap;
use std::time::Instant;

use pingpong_shared::protocol::{
    BallUpdateMsg, BallWire, CountdownMsg, GameOverMsg, GameStateMsg, OpponentJoinedMsg,
    OpponentMoveMsg, PaddleWire, RoomResultMsg, ScoreChangedMsg, ServerMsg, WelcomeMsg,
    PROTOCOL_VERSION,
};
use pingpong_shared::types::{Role, Side};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::authoritative::AuthoritativeSim;
use crate::config::{ScoreAuthority, ServerConfig};
use crate::room::{ConnId, Room, RoomState, ScoreOutcome};
use crate::rooms::{normalize_code, InMemoryRooms, RoomRepository};

/// Outbound queue of one connection.
pub type Outbox = mpsc::Sender<ServerMsg>;

/// Relay state owned by the game loop task.
pub struct RelayState {
    config: ServerConfig,
    rooms: InMemoryRooms,
    connections: HashMap<ConnId, Outbox>,
    next_conn_id: ConnId,
    /// Seeds each room's server-side ball
    sim_seeds: ChaCha8Rng,
}

/// Queue `msg` for `conn`. A peer whose queue is full is dropped, which
/// closes its socket; relayed hits must not be lost silently.
fn deliver(connections: &mut HashMap<ConnId, Outbox>, conn: ConnId, msg: ServerMsg) {
    let Some(outbox) = connections.get(&conn) else {
        return;
    };
    match outbox.try_send(msg) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Connection {} fell behind, dropping it", conn);
            connections.remove(&conn);
        }
        Err(TrySendError::Closed(_)) => {
            connections.remove(&conn);
        }
    }
}

fn deliver_room(connections: &mut HashMap<ConnId, Outbox>, room: &Room, msg: &ServerMsg) {
    for member in room.members() {
        deliver(connections, member, msg.clone());
    }
}

fn announce_score(
    connections: &mut HashMap<ConnId, Outbox>,
    room: &Room,
    scorer: Side,
    outcome: ScoreOutcome,
) {
    if outcome == ScoreOutcome::Ignored {
        return;
    }
    tracing::info!(
        "Room {} score {}-{} ({:?} scored)",
        room.code,
        room.scores.p1,
        room.scores.p2,
        scorer
    );
    deliver_room(
        connections,
        room,
        &ServerMsg::ScoreChanged(ScoreChangedMsg {
            scores: room.scores,
            scorer,
        }),
    );
    if let ScoreOutcome::Won(winner) = outcome {
        tracing::info!("Room {} game over, {:?} wins", room.code, winner);
        deliver_room(
            connections,
            room,
            &ServerMsg::GameOver(GameOverMsg {
                winner,
                scores: room.scores,
            }),
        );
    }
}

/// Room `conn` addresses by `room_code`, with the sender's role there.
fn member_room<'a>(
    rooms: &'a mut InMemoryRooms,
    conn: ConnId,
    room_code: &str,
) -> Option<(&'a mut Room, Role)> {
    let room = rooms.find_mut(&normalize_code(room_code))?;
    let role = room.role_of(conn)?;
    Some((room, role))
}

fn is_finite_ball(ball: &BallWire) -> bool {
    [ball.x, ball.y, ball.vx, ball.vy, ball.spin.x, ball.spin.y]
        .iter()
        .all(|v| v.is_finite())
}

impl RelayState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: InMemoryRooms::new(ChaCha8Rng::seed_from_u64(config.rng_seed)),
            sim_seeds: ChaCha8Rng::seed_from_u64(config.rng_seed.wrapping_add(1)),
            connections: HashMap::new(),
            next_conn_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn rooms(&self) -> &InMemoryRooms {
        &self.rooms
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Register a connection and build its welcome.
    pub fn connect(&mut self, outbox: Outbox) -> WelcomeMsg {
        let conn = self.next_conn_id;
        self.next_conn_id += 1;
        self.connections.insert(conn, outbox);
        WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            connection_id: conn,
        }
    }

    /// Forget the connection and tear down any room it was in.
    pub fn disconnect(&mut self, conn: ConnId) {
        self.connections.remove(&conn);
        let Some(code) = self.rooms.room_of(conn) else {
            return;
        };
        if let Some(room) = self.rooms.delete(&code) {
            for member in room.members().filter(|&m| m != conn) {
                deliver(
                    &mut self.connections,
                    member,
                    ServerMsg::OpponentDisconnected,
                );
            }
            tracing::info!("Room {} torn down, connection {} left", code, conn);
        }
    }

    pub fn create_room(&mut self, conn: ConnId, now: Instant) -> RoomResultMsg {
        match self.rooms.create(conn, now) {
            Ok(code) => {
                tracing::info!("Room {} created by connection {}", code, conn);
                RoomResultMsg::joined(&code, Role::Host)
            }
            Err(e) => {
                tracing::debug!("Connection {} cannot create a room: {}", conn, e);
                RoomResultMsg::failed(e.to_string())
            }
        }
    }

    pub fn join_room(&mut self, conn: ConnId, room_code: &str, now: Instant) -> RoomResultMsg {
        let room = match self.rooms.join(room_code, conn, now) {
            Ok(room) => room,
            Err(e) => {
                tracing::info!("Connection {} failed to join {}: {}", conn, room_code, e);
                return RoomResultMsg::failed(e.to_string());
            }
        };
        room.schedule_start(self.config.start_delay);
        if self.config.authoritative_physics {
            room.sim = Some(AuthoritativeSim::new(self.sim_seeds.gen()));
        }
        deliver(
            &mut self.connections,
            room.host,
            ServerMsg::OpponentJoined(OpponentJoinedMsg { opponent_id: conn }),
        );
        tracing::info!("Connection {} joined room {}", conn, room.code);
        RoomResultMsg::joined(&room.code, Role::Guest)
    }

    pub fn paddle_move(&mut self, conn: ConnId, room_code: &str, y: f64, vy: f64, now: Instant) {
        if !(y.is_finite() && vy.is_finite()) {
            tracing::debug!("Connection {} sent a non-finite paddle", conn);
            return;
        }
        let y = y.clamp(0.0, 1.0);
        let Some((room, role)) = member_room(&mut self.rooms, conn, room_code) else {
            tracing::debug!("Connection {} moved a paddle outside its room", conn);
            return;
        };
        room.touch(now);
        room.set_paddle(role, PaddleWire { y, vy });
        if let Some(peer) = room.peer_of(conn) {
            deliver(
                &mut self.connections,
                peer,
                ServerMsg::OpponentMove(OpponentMoveMsg { y, vy, role }),
            );
        }
    }

    pub fn ball_hit(&mut self, conn: ConnId, room_code: &str, ball: BallWire, now: Instant) {
        if self.config.authoritative_physics {
            tracing::debug!("Ignoring ball-hit from {}, room ball is server-stepped", conn);
            return;
        }
        if !is_finite_ball(&ball) {
            tracing::debug!("Connection {} sent a non-finite ball", conn);
            return;
        }
        let Some((room, _)) = member_room(&mut self.rooms, conn, room_code) else {
            return;
        };
        room.touch(now);
        room.ball = ball;
        let msg = ServerMsg::BallUpdate(BallUpdateMsg { ball_state: ball });
        deliver_room(&mut self.connections, room, &msg);
    }

    pub fn score_update(&mut self, conn: ConnId, room_code: &str, scorer: Side, now: Instant) {
        if self.config.authoritative_physics {
            tracing::debug!("Ignoring score report from {}, server keeps score", conn);
            return;
        }
        let authority = self.config.score_authority;
        let win_score = self.config.win_score;
        let Some((room, role)) = member_room(&mut self.rooms, conn, room_code) else {
            return;
        };
        if authority == ScoreAuthority::HostOnly && role != Role::Host {
            tracing::debug!("Ignoring guest score report in room {}", room.code);
            return;
        }
        room.touch(now);
        let outcome = room.apply_score(scorer, win_score);
        announce_score(&mut self.connections, room, scorer, outcome);
    }

    /// Advance every room's timers, server ball and snapshots by one tick.
    pub fn tick(&mut self, dt: f64, now: Instant) {
        let every_n = self.config.broadcast_every_n();
        for code in self.rooms.codes() {
            let Some(room) = self.rooms.find_mut(&code) else {
                continue;
            };

            if room.start_alarm.advance(dt) > 0 {
                room.state = RoomState::Countdown {
                    next: self.config.countdown_from,
                };
                room.countdown_alarm
                    .arm_repeating(self.config.countdown_interval.as_secs_f64());
                tracing::info!("Room {} countdown started", room.code);
            }
            for _ in 0..room.countdown_alarm.advance(dt) {
                let RoomState::Countdown { next } = room.state else {
                    break;
                };
                deliver_room(
                    &mut self.connections,
                    room,
                    &ServerMsg::Countdown(CountdownMsg { count: next }),
                );
                if next > 0 {
                    room.state = RoomState::Countdown { next: next - 1 };
                    continue;
                }
                room.countdown_alarm.cancel();
                room.state = RoomState::Playing;
                room.ticks_since_snapshot = 0;
                if let Some(sim) = room.sim.as_mut() {
                    sim.start();
                }
                deliver_room(&mut self.connections, room, &ServerMsg::GameStart);
                tracing::info!("Room {} game started", room.code);
            }

            if room.state != RoomState::Playing {
                continue;
            }
            if let Some(sim) = room.sim.as_mut() {
                let scorer = sim.step(dt);
                room.ball = sim.ball_wire();
                room.paddles = sim.paddles_wire();
                if let Some(scorer) = scorer {
                    let outcome = room.apply_score(scorer, self.config.win_score);
                    announce_score(&mut self.connections, room, scorer, outcome);
                }
            }
            room.ticks_since_snapshot += 1;
            if room.state == RoomState::Playing && room.ticks_since_snapshot >= every_n {
                room.ticks_since_snapshot = 0;
                let msg = ServerMsg::GameState(GameStateMsg {
                    ball: room.ball,
                    paddles: room.paddles,
                    scores: room.scores,
                    timestamp: room.clock_ms(now),
                });
                deliver_room(&mut self.connections, room, &msg);
            }
        }
    }

    /// Drop rooms nobody has touched for the idle timeout.
    pub fn sweep(&mut self, now: Instant) {
        let expired = self
            .rooms
            .sweep_expired(now, self.config.room_idle_timeout);
        for room in &expired {
            deliver_room(&mut self.connections, room, &ServerMsg::RoomExpired);
            tracing::info!("Room {} expired after inactivity", room.code);
        }
    }
}
