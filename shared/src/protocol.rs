use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Role, Scores, Side};

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    /// Answer to create-room and join-room
    #[serde(rename = "room-result")]
    RoomResult(RoomResultMsg),
    #[serde(rename = "opponent-joined")]
    OpponentJoined(OpponentJoinedMsg),
    #[serde(rename = "opponent-move")]
    OpponentMove(OpponentMoveMsg),
    #[serde(rename = "ball-update")]
    BallUpdate(BallUpdateMsg),
    #[serde(rename = "countdown")]
    Countdown(CountdownMsg),
    #[serde(rename = "game-start")]
    GameStart,
    #[serde(rename = "score-changed")]
    ScoreChanged(ScoreChangedMsg),
    #[serde(rename = "game-over")]
    GameOver(GameOverMsg),
    #[serde(rename = "opponent-disconnected")]
    OpponentDisconnected,
    #[serde(rename = "game-state")]
    GameState(GameStateMsg),
    #[serde(rename = "pong-check")]
    PongCheck(PingMsg),
    #[serde(rename = "room-expired")]
    RoomExpired,
    #[serde(rename = "error")]
    Error(ErrorMsg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub connection_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct RoomResultMsg {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RoomResultMsg {
    pub fn joined(room_code: &str, role: Role) -> Self {
        Self {
            success: true,
            room_code: Some(room_code.to_string()),
            role: Some(role),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            room_code: None,
            role: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct OpponentJoinedMsg {
    pub opponent_id: u64,
}

/// Cross-table paddle position as a fraction of the arena width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct OpponentMoveMsg {
    pub y: f64,
    pub vy: f64,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(rename_all = "camelCase")]
pub struct BallUpdateMsg {
    pub ball_state: BallWire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct CountdownMsg {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct ScoreChangedMsg {
    pub scores: Scores,
    pub scorer: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct GameOverMsg {
    pub winner: Side,
    pub scores: Scores,
}

/// Room snapshot sent at the broadcast rate while a room is playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct GameStateMsg {
    pub ball: BallWire,
    pub paddles: PaddlesWire,
    pub scores: Scores,
    /// Server clock, ms since the room was created
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct PingMsg {
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct ErrorMsg {
    pub message: String,
}

/// Ball state in arena fractions: position in [0, 1] of length and width,
/// velocity in fractions per second. Spin is sent unscaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct BallWire {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub spin: SpinWire,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct SpinWire {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct PaddleWire {
    pub y: f64,
    pub vy: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
pub struct PaddlesWire {
    pub p1: PaddleWire,
    pub p2: PaddleWire,
}

impl PaddlesWire {
    pub fn get(&self, side: Side) -> PaddleWire {
        match side {
            Side::P1 => self.p1,
            Side::P2 => self.p2,
        }
    }

    pub fn set(&mut self, side: Side, paddle: PaddleWire) {
        match side {
            Side::P1 => self.p1 = paddle,
            Side::P2 => self.p2 = paddle,
        }
    }
}

// === Client -> Server ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "create-room")]
    CreateRoom,
    #[serde(rename = "join-room")]
    JoinRoom {
        #[serde(rename = "roomCode")]
        room_code: String,
    },
    #[serde(rename = "paddle-move")]
    PaddleMove {
        #[serde(rename = "roomCode")]
        room_code: String,
        y: f64,
        vy: f64,
    },
    #[serde(rename = "ball-hit")]
    BallHit {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "ballState")]
        ball_state: BallWire,
    },
    #[serde(rename = "score-update")]
    ScoreUpdate {
        #[serde(rename = "roomCode")]
        room_code: String,
        scorer: Side,
    },
    #[serde(rename = "ping-check")]
    PingCheck { timestamp: f64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    Oversized { size: usize, limit: usize },
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse one text frame from a client, rejecting oversized frames unread.
pub fn parse_client_msg(text: &str, limit: usize) -> Result<ClientMsg, ProtocolError> {
    if text.len() > limit {
        return Err(ProtocolError::Oversized {
            size: text.len(),
            limit,
        });
    }
    Ok(serde_json::from_str(text)?)
}

// === Conversion helpers ===

/// Round to 4 decimal places (arena fractions need no more, keeps frames small)
#[inline]
pub fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}
