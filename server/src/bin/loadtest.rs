//! Load test for the ping-pong relay.
//!
//! Spawns pairs of fake WebSocket clients that:
//! - Connect and wait for the welcome
//! - Create a room (host) and join it (guest)
//! - Stream paddle-move messages at a fixed rate
//! - Measure ping-check round trips and count relayed messages
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --pairs N        Number of client pairs (default: 50)
//!   --duration S     Test duration in seconds (default: 30)
//!   --move-rate R    Paddle moves per second per client (default: 30)
//!   --url URL        Server URL (default: ws://127.0.0.1:3000/ws)

use futures_util::{SinkExt, StreamExt};
use pingpong_shared::protocol::{ClientMsg, ServerMsg};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Ws =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// === Metrics ===

struct Metrics {
    connected: AtomicU64,
    rooms_started: AtomicU64,
    messages_received: AtomicU64,
    opponent_moves_received: AtomicU64,
    game_states_received: AtomicU64,
    paddle_moves_sent: AtomicU64,
    errors: AtomicU64,
    rtt_sum_us: AtomicU64,
    rtt_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            rooms_started: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            opponent_moves_received: AtomicU64::new(0),
            game_states_received: AtomicU64::new(0),
            paddle_moves_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            rtt_sum_us: AtomicU64::new(0),
            rtt_count: AtomicU64::new(0),
        }
    }
}

// === Client helpers ===

async fn send(ws: &mut Ws, msg: &ClientMsg) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return false;
    };
    ws.send(Message::Text(json.into())).await.is_ok()
}

/// Wait for the first message matching `pick`, skipping everything else.
async fn wait_for<T>(ws: &mut Ws, mut pick: impl FnMut(ServerMsg) -> Option<T>) -> Option<T> {
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Ok(server_msg) = serde_json::from_str::<ServerMsg>(&text) {
                        if let Some(found) = pick(server_msg) {
                            return Some(found);
                        }
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await;
    found.ok().flatten()
}

async fn connect(url: &str, metrics: &Metrics) -> Option<Ws> {
    let (mut ws, _) = connect_async(url).await.ok()?;
    wait_for(&mut ws, |m| matches!(m, ServerMsg::Welcome(_)).then_some(())).await?;
    metrics.connected.fetch_add(1, Ordering::Relaxed);
    Some(ws)
}

/// Host and guest sockets seated in the same room.
async fn open_room(url: &str, metrics: &Metrics) -> Option<(Ws, Ws, String)> {
    let mut host = connect(url, metrics).await?;
    if !send(&mut host, &ClientMsg::CreateRoom).await {
        return None;
    }
    let code = wait_for(&mut host, |m| match m {
        ServerMsg::RoomResult(result) if result.success => result.room_code,
        _ => None,
    })
    .await?;

    let mut guest = connect(url, metrics).await?;
    let join = ClientMsg::JoinRoom {
        room_code: code.clone(),
    };
    if !send(&mut guest, &join).await {
        return None;
    }
    wait_for(&mut guest, |m| match m {
        ServerMsg::RoomResult(result) => Some(result.success),
        _ => None,
    })
    .await
    .filter(|ok| *ok)?;
    Some((host, guest, code))
}

// === Client task ===

async fn run_client(
    mut ws: Ws,
    room_code: String,
    move_rate: f64,
    duration: Duration,
    epoch: Instant,
    metrics: Arc<Metrics>,
) {
    let move_interval = if move_rate > 0.0 {
        Duration::from_secs_f64(1.0 / move_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut move_timer = tokio::time::interval(move_interval);
    move_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut ping_timer = tokio::time::interval(Duration::from_secs(1));

    let test_end = Instant::now() + duration;
    let mut phase: f64 = 0.0;

    while Instant::now() < test_end {
        tokio::select! {
            _ = move_timer.tick() => {
                phase += 0.05;
                let msg = ClientMsg::PaddleMove {
                    room_code: room_code.clone(),
                    y: 0.5 + 0.4 * phase.sin(),
                    vy: 0.4 * phase.cos(),
                };
                if send(&mut ws, &msg).await {
                    metrics.paddle_moves_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            _ = ping_timer.tick() => {
                let timestamp = epoch.elapsed().as_secs_f64() * 1000.0;
                if !send(&mut ws, &ClientMsg::PingCheck { timestamp }).await {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        match serde_json::from_str::<ServerMsg>(&text) {
                            Ok(ServerMsg::OpponentMove(_)) => {
                                metrics.opponent_moves_received.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::GameState(_)) => {
                                metrics.game_states_received.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::GameStart) => {
                                metrics.rooms_started.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::PongCheck(ping)) => {
                                let now_ms = epoch.elapsed().as_secs_f64() * 1000.0;
                                let rtt_us = ((now_ms - ping.timestamp) * 1000.0).max(0.0);
                                metrics.rtt_sum_us.fetch_add(rtt_us as u64, Ordering::Relaxed);
                                metrics.rtt_count.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::OpponentDisconnected) | Ok(ServerMsg::RoomExpired) => break,
                            _ => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => {
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

async fn run_pair(
    pair_id: u32,
    url: String,
    move_rate: f64,
    duration: Duration,
    epoch: Instant,
    metrics: Arc<Metrics>,
) {
    let Some((host, guest, code)) = open_room(&url, &metrics).await else {
        if pair_id < 5 {
            eprintln!("Pair {} failed to open a room", pair_id);
        }
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        return;
    };
    if pair_id < 3 {
        eprintln!("Pair {} playing in room {}", pair_id, code);
    }
    tokio::join!(
        run_client(host, code.clone(), move_rate, duration, epoch, Arc::clone(&metrics)),
        run_client(guest, code, move_rate, duration, epoch, Arc::clone(&metrics)),
    );
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_pairs: u32 = 50;
    let mut duration_secs: u64 = 30;
    let mut move_rate: f64 = 30.0;
    let mut url = "ws://127.0.0.1:3000/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--pairs" => {
                i += 1;
                num_pairs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(50);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--move-rate" => {
                i += 1;
                move_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Ping-Pong Relay Load Test ===");
    println!("Pairs: {}", num_pairs);
    println!("Duration: {}s", duration_secs);
    println!("Move rate: {}/s per client", move_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::new());
    let duration = Duration::from_secs(duration_secs);
    let epoch = Instant::now();

    let mut handles = Vec::with_capacity(num_pairs as usize);
    for pair_id in 0..num_pairs {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(run_pair(
            pair_id, url, move_rate, duration, epoch, metrics,
        )));

        // Stagger spawns slightly to avoid thundering herd
        if pair_id % 25 == 24 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let elapsed = epoch.elapsed().as_secs();
            if elapsed >= duration_secs + 10 {
                break;
            }
            println!(
                "[{:3}s] connected={}, started={}, msgs={}, opponent_moves={}, game_states={}, sent={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.rooms_started.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.opponent_moves_received.load(Ordering::Relaxed),
                metrics_clone.game_states_received.load(Ordering::Relaxed),
                metrics_clone.paddle_moves_sent.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    stats_handle.abort();

    println!();
    println!("=== Final Results ===");
    let sent = metrics.paddle_moves_sent.load(Ordering::Relaxed);
    let relayed = metrics.opponent_moves_received.load(Ordering::Relaxed);
    let rtt_sum = metrics.rtt_sum_us.load(Ordering::Relaxed);
    let rtt_count = metrics.rtt_count.load(Ordering::Relaxed);

    println!("Rooms started: {}", metrics.rooms_started.load(Ordering::Relaxed));
    println!("Total messages received: {}", metrics.messages_received.load(Ordering::Relaxed));
    println!("Total game-state messages: {}", metrics.game_states_received.load(Ordering::Relaxed));
    println!("Paddle moves sent: {}", sent);
    println!("Opponent moves relayed: {}", relayed);
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));
    if sent > 0 {
        println!("Relay rate: {:.1}%", relayed as f64 / sent as f64 * 100.0);
    }
    if rtt_count > 0 {
        println!("Average ping-check RTT: {:.2}ms", rtt_sum as f64 / rtt_count as f64 / 1000.0);
    }
}
