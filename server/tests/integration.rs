//! Integration tests for the ping-pong relay.
//!
//! These tests start a real server instance and connect via WebSocket
//! to verify end-to-end behavior.

use futures_util::{SinkExt, StreamExt};
use pingpong_server::config::ServerConfig;
use pingpong_shared::protocol::{BallWire, ClientMsg, ServerMsg, PROTOCOL_VERSION};
use pingpong_shared::types::{Role, Scores, Side};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Ws =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn fast_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        start_delay: Duration::from_millis(50),
        countdown_interval: Duration::from_millis(50),
        win_score: 3,
        max_parse_errors: 2,
        ..ServerConfig::default()
    }
}

/// Start a test server on a random available port and return the WebSocket URL.
async fn start_test_server(config: ServerConfig) -> String {
    let listener = TcpListener::bind(&config.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = pingpong_server::build_app(config);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("ws://{}/ws", addr)
}

async fn connect(url: &str) -> Ws {
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

async fn send(ws: &mut Ws, msg: &ClientMsg) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

async fn send_raw(ws: &mut Ws, text: String) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

/// Read the next text message and parse as ServerMsg.
async fn recv_msg(ws: &mut Ws) -> ServerMsg {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text).expect("Failed to parse server message");
            }
            Some(Ok(_)) => continue, // Skip ping/pong
            Some(Err(e)) => panic!("WebSocket error: {}", e),
            None => panic!("WebSocket closed unexpectedly"),
        }
    }
}

/// Read the next text message with a timeout.
async fn recv_msg_timeout(ws: &mut Ws, timeout: Duration) -> Option<ServerMsg> {
    tokio::time::timeout(timeout, recv_msg(ws)).await.ok()
}

/// Skip messages until one matches, failing after two seconds.
async fn recv_until(ws: &mut Ws, mut want: impl FnMut(&ServerMsg) -> bool) -> ServerMsg {
    let found = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let msg = recv_msg(ws).await;
            if want(&msg) {
                return msg;
            }
        }
    })
    .await;
    found.expect("timed out waiting for message")
}

/// True once the server has closed the socket.
async fn closed_within(ws: &mut Ws, timeout: Duration) -> bool {
    let closed = tokio::time::timeout(timeout, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    closed.is_ok()
}

async fn connect_welcomed(url: &str) -> (Ws, u64) {
    let mut ws = connect(url).await;
    match recv_msg(&mut ws).await {
        ServerMsg::Welcome(welcome) => (ws, welcome.connection_id),
        other => panic!("Expected Welcome, got {:?}", other),
    }
}

async fn create_room(ws: &mut Ws) -> String {
    send(ws, &ClientMsg::CreateRoom).await;
    match recv_until(ws, |m| matches!(m, ServerMsg::RoomResult(_))).await {
        ServerMsg::RoomResult(result) => {
            assert!(result.success);
            assert_eq!(result.role, Some(Role::Host));
            result.room_code.unwrap()
        }
        _ => unreachable!(),
    }
}

/// Host and guest in one room, with the game started.
async fn playing_pair(url: &str) -> (Ws, Ws, String) {
    let (mut host, _) = connect_welcomed(url).await;
    let (mut guest, _) = connect_welcomed(url).await;
    let code = create_room(&mut host).await;
    send(
        &mut guest,
        &ClientMsg::JoinRoom {
            room_code: code.clone(),
        },
    )
    .await;
    recv_until(&mut host, |m| matches!(m, ServerMsg::GameStart)).await;
    recv_until(&mut guest, |m| matches!(m, ServerMsg::GameStart)).await;
    (host, guest, code)
}

/// Next message that is not a periodic game-state snapshot.
async fn recv_event(ws: &mut Ws) -> ServerMsg {
    recv_until(ws, |m| !matches!(m, ServerMsg::GameState(_))).await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_connect_and_receive_welcome() {
    let url = start_test_server(fast_config()).await;
    let mut ws = connect(&url).await;

    match recv_msg(&mut ws).await {
        ServerMsg::Welcome(welcome) => {
            assert_eq!(welcome.protocol_version, PROTOCOL_VERSION);
            assert!(welcome.connection_id > 0);
        }
        other => panic!("Expected Welcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_multiple_clients_get_unique_ids() {
    let url = start_test_server(fast_config()).await;
    let (_ws1, id1) = connect_welcomed(&url).await;
    let (_ws2, id2) = connect_welcomed(&url).await;
    assert_ne!(id1, id2, "Each client should get a unique ID");
}

#[tokio::test]
async fn test_join_starts_countdown_then_game() {
    let url = start_test_server(fast_config()).await;
    let (mut host, _) = connect_welcomed(&url).await;
    let (mut guest, guest_id) = connect_welcomed(&url).await;
    let code = create_room(&mut host).await;

    send(
        &mut guest,
        &ClientMsg::JoinRoom {
            room_code: code.to_lowercase(),
        },
    )
    .await;
    match recv_msg(&mut guest).await {
        ServerMsg::RoomResult(result) => {
            assert!(result.success);
            assert_eq!(result.room_code.as_deref(), Some(code.as_str()));
            assert_eq!(result.role, Some(Role::Guest));
        }
        other => panic!("Expected RoomResult, got {:?}", other),
    }
    match recv_msg(&mut host).await {
        ServerMsg::OpponentJoined(joined) => assert_eq!(joined.opponent_id, guest_id),
        other => panic!("Expected OpponentJoined, got {:?}", other),
    }

    let mut counts = Vec::new();
    loop {
        match recv_msg(&mut guest).await {
            ServerMsg::Countdown(c) => counts.push(c.count),
            ServerMsg::GameStart => break,
            other => panic!("Unexpected message before game start: {:?}", other),
        }
    }
    assert_eq!(counts, vec![3, 2, 1, 0]);

    match recv_msg_timeout(&mut guest, Duration::from_millis(500)).await {
        Some(ServerMsg::GameState(state)) => assert_eq!(state.scores, Scores::default()),
        other => panic!("Expected GameState, got {:?}", other),
    }
}

#[tokio::test]
async fn test_third_player_gets_room_full() {
    let url = start_test_server(fast_config()).await;
    let (_host, _guest, code) = playing_pair(&url).await;
    let (mut third, _) = connect_welcomed(&url).await;

    send(&mut third, &ClientMsg::JoinRoom { room_code: code }).await;
    match recv_msg(&mut third).await {
        ServerMsg::RoomResult(result) => {
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some("Room is full"));
            assert_eq!(result.room_code, None);
        }
        other => panic!("Expected RoomResult, got {:?}", other),
    }
}

#[tokio::test]
async fn test_join_unknown_room_fails() {
    let url = start_test_server(fast_config()).await;
    let (mut ws, _) = connect_welcomed(&url).await;

    send(
        &mut ws,
        &ClientMsg::JoinRoom {
            room_code: "ZZZZ".to_string(),
        },
    )
    .await;
    match recv_msg(&mut ws).await {
        ServerMsg::RoomResult(result) => {
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some("Room not found"));
        }
        other => panic!("Expected RoomResult, got {:?}", other),
    }
}

#[tokio::test]
async fn test_paddle_move_is_relayed_to_peer_only() {
    let url = start_test_server(fast_config()).await;
    let (mut host, mut guest, code) = playing_pair(&url).await;

    send(
        &mut host,
        &ClientMsg::PaddleMove {
            room_code: code,
            y: 0.25,
            vy: -0.5,
        },
    )
    .await;
    match recv_event(&mut guest).await {
        ServerMsg::OpponentMove(m) => {
            assert_eq!(m.y, 0.25);
            assert_eq!(m.vy, -0.5);
            assert_eq!(m.role, Role::Host);
        }
        other => panic!("Expected OpponentMove, got {:?}", other),
    }

    // The host only sees snapshots, never its own move echoed back.
    let echoed = tokio::time::timeout(
        Duration::from_millis(200),
        recv_until(&mut host, |m| matches!(m, ServerMsg::OpponentMove(_))),
    )
    .await;
    assert!(echoed.is_err());
}

#[tokio::test]
async fn test_ball_hit_goes_to_both_players() {
    let url = start_test_server(fast_config()).await;
    let (mut host, mut guest, code) = playing_pair(&url).await;
    let ball = BallWire {
        x: 0.1,
        y: 0.5,
        vx: 0.9,
        vy: 0.05,
        ..BallWire::default()
    };

    send(
        &mut host,
        &ClientMsg::BallHit {
            room_code: code,
            ball_state: ball,
        },
    )
    .await;
    for ws in [&mut host, &mut guest] {
        match recv_event(ws).await {
            ServerMsg::BallUpdate(update) => assert_eq!(update.ball_state, ball),
            other => panic!("Expected BallUpdate, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_scores_reach_game_over() {
    let url = start_test_server(fast_config()).await;
    let (mut host, mut guest, code) = playing_pair(&url).await;

    for expected in 1..=3 {
        send(
            &mut host,
            &ClientMsg::ScoreUpdate {
                room_code: code.clone(),
                scorer: Side::P2,
            },
        )
        .await;
        match recv_event(&mut guest).await {
            ServerMsg::ScoreChanged(changed) => {
                assert_eq!(changed.scorer, Side::P2);
                assert_eq!(changed.scores.p2, expected);
            }
            other => panic!("Expected ScoreChanged, got {:?}", other),
        }
    }
    match recv_event(&mut guest).await {
        ServerMsg::GameOver(over) => {
            assert_eq!(over.winner, Side::P2);
            assert_eq!(over.scores, Scores { p1: 0, p2: 3 });
        }
        other => panic!("Expected GameOver, got {:?}", other),
    }
}

#[tokio::test]
async fn test_guest_score_report_is_ignored() {
    let url = start_test_server(fast_config()).await;
    let (mut host, mut guest, code) = playing_pair(&url).await;

    send(
        &mut guest,
        &ClientMsg::ScoreUpdate {
            room_code: code,
            scorer: Side::P2,
        },
    )
    .await;
    let changed = tokio::time::timeout(
        Duration::from_millis(200),
        recv_until(&mut host, |m| matches!(m, ServerMsg::ScoreChanged(_))),
    )
    .await;
    assert!(changed.is_err());
}

#[tokio::test]
async fn test_ping_check_echoes_timestamp() {
    let url = start_test_server(fast_config()).await;
    let (mut ws, _) = connect_welcomed(&url).await;

    send(&mut ws, &ClientMsg::PingCheck { timestamp: 1234.5 }).await;
    match recv_msg(&mut ws).await {
        ServerMsg::PongCheck(pong) => assert_eq!(pong.timestamp, 1234.5),
        other => panic!("Expected PongCheck, got {:?}", other),
    }
}

#[tokio::test]
async fn test_disconnect_notifies_peer_and_frees_code() {
    let url = start_test_server(fast_config()).await;
    let (host, mut guest, code) = playing_pair(&url).await;

    drop(host);
    recv_until(&mut guest, |m| matches!(m, ServerMsg::OpponentDisconnected)).await;

    // The room is gone: joining it again fails.
    let (mut late, _) = connect_welcomed(&url).await;
    send(&mut late, &ClientMsg::JoinRoom { room_code: code }).await;
    match recv_msg(&mut late).await {
        ServerMsg::RoomResult(result) => {
            assert_eq!(result.error.as_deref(), Some("Room not found"))
        }
        other => panic!("Expected RoomResult, got {:?}", other),
    }
}

#[tokio::test]
async fn test_oversized_message_closes_connection() {
    let url = start_test_server(fast_config()).await;
    let (mut ws, _) = connect_welcomed(&url).await;

    let padding = "x".repeat(4096);
    send_raw(
        &mut ws,
        format!(r#"{{"type":"join-room","roomCode":"{}"}}"#, padding),
    )
    .await;
    match recv_msg(&mut ws).await {
        ServerMsg::Error(err) => assert!(err.message.contains("byte limit"), "{}", err.message),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(closed_within(&mut ws, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_repeated_garbage_closes_connection() {
    let url = start_test_server(fast_config()).await;
    let (mut ws, _) = connect_welcomed(&url).await;

    for _ in 0..2 {
        send_raw(&mut ws, "not json".to_string()).await;
    }
    // Still open after the tolerated number of bad messages.
    send(&mut ws, &ClientMsg::PingCheck { timestamp: 1.0 }).await;
    assert!(matches!(recv_msg(&mut ws).await, ServerMsg::PongCheck(_)));

    send_raw(&mut ws, r#"{"type":"teleport"}"#.to_string()).await;
    match recv_msg(&mut ws).await {
        ServerMsg::Error(err) => assert!(err.message.contains("malformed")),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(closed_within(&mut ws, Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_idle_room_expires() {
    let url = start_test_server(ServerConfig {
        room_idle_timeout: Duration::from_millis(150),
        sweep_interval: Duration::from_millis(50),
        ..fast_config()
    })
    .await;
    let (mut host, _) = connect_welcomed(&url).await;
    create_room(&mut host).await;

    match recv_msg_timeout(&mut host, Duration::from_secs(1)).await {
        Some(ServerMsg::RoomExpired) => {}
        other => panic!("Expected RoomExpired, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authoritative_room_steps_the_ball() {
    let url = start_test_server(ServerConfig {
        authoritative_physics: true,
        ..fast_config()
    })
    .await;
    let (mut host, _guest, _code) = playing_pair(&url).await;

    let moving = recv_until(&mut host, |m| match m {
        ServerMsg::GameState(state) => state.ball.vx != 0.0,
        _ => false,
    })
    .await;
    assert!(matches!(moving, ServerMsg::GameState(_)));
}
