use crate::config::ServerConfig;
use crate::room::ConnId;
use crate::state::{Outbox, RelayState};
use pingpong_shared::protocol::{BallWire, RoomResultMsg, WelcomeMsg};
use pingpong_shared::types::Side;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Commands from client connections to the game loop
pub enum GameCommand {
    Connect {
        outbox: Outbox,
        response: oneshot::Sender<WelcomeMsg>,
    },
    Disconnect {
        conn: ConnId,
    },
    CreateRoom {
        conn: ConnId,
        response: oneshot::Sender<RoomResultMsg>,
    },
    JoinRoom {
        conn: ConnId,
        room_code: String,
        response: oneshot::Sender<RoomResultMsg>,
    },
    PaddleMove {
        conn: ConnId,
        room_code: String,
        y: f64,
        vy: f64,
    },
    BallHit {
        conn: ConnId,
        room_code: String,
        ball_state: BallWire,
    },
    ScoreUpdate {
        conn: ConnId,
        room_code: String,
        scorer: Side,
    },
}

fn apply_command(state: &mut RelayState, cmd: GameCommand, now: Instant) {
    match cmd {
        GameCommand::Connect { outbox, response } => {
            let welcome = state.connect(outbox);
            tracing::info!("Connection {} opened", welcome.connection_id);
            if response.send(welcome.clone()).is_err() {
                // Socket went away before the welcome could be written.
                state.disconnect(welcome.connection_id);
            }
        }
        GameCommand::Disconnect { conn } => {
            state.disconnect(conn);
            tracing::info!("Connection {} closed", conn);
        }
        GameCommand::CreateRoom { conn, response } => {
            let _ = response.send(state.create_room(conn, now));
        }
        GameCommand::JoinRoom {
            conn,
            room_code,
            response,
        } => {
            let _ = response.send(state.join_room(conn, &room_code, now));
        }
        GameCommand::PaddleMove {
            conn,
            room_code,
            y,
            vy,
        } => state.paddle_move(conn, &room_code, y, vy, now),
        GameCommand::BallHit {
            conn,
            room_code,
            ball_state,
        } => state.ball_hit(conn, &room_code, ball_state, now),
        GameCommand::ScoreUpdate {
            conn,
            room_code,
            scorer,
        } => state.score_update(conn, &room_code, scorer, now),
    }
}

/// Run the relay loop. Owns every room and connection queue.
pub async fn run_game_loop(mut cmd_rx: mpsc::Receiver<GameCommand>, config: ServerConfig) {
    let dt = config.tick_dt();
    let sweep_every = config.sweep_interval;
    let mut state = RelayState::new(config);

    let mut tick_interval = tokio::time::interval(Duration::from_secs_f64(dt));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut sweep_interval =
        tokio::time::interval_at(tokio::time::Instant::now() + sweep_every, sweep_every);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                state.tick(dt, Instant::now());
            }

            _ = sweep_interval.tick() => {
                state.sweep(Instant::now());
            }

            Some(cmd) = cmd_rx.recv() => {
                apply_command(&mut state, cmd, Instant::now());
            }

            else => break,
        }
    }

    tracing::info!("Game loop ended");
}
