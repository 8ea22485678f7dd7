use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pingpong_shared::protocol::{
    parse_client_msg, ClientMsg, ErrorMsg, PingMsg, ProtocolError, RoomResultMsg, ServerMsg,
};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};

use crate::config::ServerConfig;
use crate::game_loop::GameCommand;
use crate::room::ConnId;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub game_tx: mpsc::Sender<GameCommand>,
    pub max_message_bytes: usize,
    pub max_parse_errors: u32,
    pub outbound_buffer: usize,
    pub connection_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(game_tx: mpsc::Sender<GameCommand>, config: &ServerConfig) -> Self {
        Self {
            game_tx,
            max_message_bytes: config.max_message_bytes,
            max_parse_errors: config.max_parse_errors,
            outbound_buffer: config.outbound_buffer,
            connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
        }
    }
}

type WsSink = SplitSink<WebSocket, Message>;

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let permit = match app_state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Connection limit reached, refusing upgrade");
            return (StatusCode::SERVICE_UNAVAILABLE, "server full").into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, permit))
        .into_response()
}

async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode {:?}: {}", msg, e);
            return true;
        }
    };
    sink.send(Message::Text(json.into())).await.is_ok()
}

/// Send a request that expects a room-result and wait for it.
async fn request_room(
    game_tx: &mpsc::Sender<GameCommand>,
    make: impl FnOnce(oneshot::Sender<RoomResultMsg>) -> GameCommand,
) -> Option<RoomResultMsg> {
    let (resp_tx, resp_rx) = oneshot::channel();
    game_tx.send(make(resp_tx)).await.ok()?;
    resp_rx.await.ok()
}

/// What the read side wants done after a client frame.
enum Flow {
    Continue,
    Reply(ServerMsg),
    Close,
}

async fn dispatch(app_state: &AppState, conn: ConnId, msg: ClientMsg) -> Flow {
    let game_tx = &app_state.game_tx;
    let cmd = match msg {
        ClientMsg::PingCheck { timestamp } => {
            return Flow::Reply(ServerMsg::PongCheck(PingMsg { timestamp }));
        }
        ClientMsg::CreateRoom => {
            return match request_room(game_tx, |response| GameCommand::CreateRoom {
                conn,
                response,
            })
            .await
            {
                Some(result) => Flow::Reply(ServerMsg::RoomResult(result)),
                None => Flow::Close,
            };
        }
        ClientMsg::JoinRoom { room_code } => {
            return match request_room(game_tx, |response| GameCommand::JoinRoom {
                conn,
                room_code,
                response,
            })
            .await
            {
                Some(result) => Flow::Reply(ServerMsg::RoomResult(result)),
                None => Flow::Close,
            };
        }
        ClientMsg::PaddleMove { room_code, y, vy } => GameCommand::PaddleMove {
            conn,
            room_code,
            y,
            vy,
        },
        ClientMsg::BallHit {
            room_code,
            ball_state,
        } => GameCommand::BallHit {
            conn,
            room_code,
            ball_state,
        },
        ClientMsg::ScoreUpdate { room_code, scorer } => GameCommand::ScoreUpdate {
            conn,
            room_code,
            scorer,
        },
    };
    if game_tx.send(cmd).await.is_err() {
        return Flow::Close;
    }
    Flow::Continue
}

fn error_msg(message: impl Into<String>) -> ServerMsg {
    ServerMsg::Error(ErrorMsg {
        message: message.into(),
    })
}

async fn handle_socket(socket: WebSocket, app_state: AppState, _permit: OwnedSemaphorePermit) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(app_state.outbound_buffer);

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .game_tx
        .send(GameCommand::Connect {
            outbox: out_tx,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Connect command");
        return;
    }

    let welcome = match resp_rx.await {
        Ok(welcome) => welcome,
        Err(_) => {
            tracing::error!("Failed to receive welcome");
            return;
        }
    };
    let conn = welcome.connection_id;

    if !send_msg(&mut sink, &ServerMsg::Welcome(welcome)).await {
        let _ = app_state
            .game_tx
            .send(GameCommand::Disconnect { conn })
            .await;
        return;
    }

    let mut parse_errors: u32 = 0;

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => continue, // Ignore ping/pong/binary
                };
                let client_msg = match parse_client_msg(text.as_str(), app_state.max_message_bytes) {
                    Ok(client_msg) => client_msg,
                    Err(e @ ProtocolError::Oversized { .. }) => {
                        tracing::warn!("Connection {} sent an oversized message: {}", conn, e);
                        let _ = send_msg(&mut sink, &error_msg(e.to_string())).await;
                        break;
                    }
                    Err(e @ ProtocolError::Malformed(_)) => {
                        parse_errors += 1;
                        tracing::debug!("Connection {}: {}", conn, e);
                        if parse_errors > app_state.max_parse_errors {
                            tracing::warn!(
                                "Connection {} exceeded {} malformed messages, closing",
                                conn,
                                app_state.max_parse_errors
                            );
                            let _ = send_msg(&mut sink, &error_msg("too many malformed messages")).await;
                            break;
                        }
                        continue;
                    }
                };
                match dispatch(&app_state, conn, client_msg).await {
                    Flow::Continue => {}
                    Flow::Reply(reply) => {
                        if !send_msg(&mut sink, &reply).await {
                            break;
                        }
                    }
                    Flow::Close => break,
                }
            }

            // Server -> Client
            outgoing = out_rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        if !send_msg(&mut sink, &msg).await {
                            break;
                        }
                    }
                    // Game loop dropped our queue: we fell behind.
                    None => break,
                }
            }
        }
    }

    let _ = sink.close().await;
    let _ = app_state
        .game_tx
        .send(GameCommand::Disconnect { conn })
        .await;
}
