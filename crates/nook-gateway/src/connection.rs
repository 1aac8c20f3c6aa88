use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nook_types::events::GatewayCommand;

use crate::registry::Outbound;
use crate::relay::Relay;
use crate::session::Connection;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// Serve one websocket. The user was authenticated at the HTTP upgrade; the
/// first command must be `join` or `join-dm` for that same user.
pub async fn handle_connection(socket: WebSocket, relay: Relay, user_id: Uuid, username: String) {
    let (sender, receiver) = socket.split();
    let (mut conn, outbound_rx) = Connection::new(user_id);

    info!("{} ({}) connected to gateway [conn={}]", username, user_id, conn.conn_id());

    let pong_received = Arc::new(AtomicBool::new(true));
    let mut send_task = tokio::spawn(write_loop(sender, outbound_rx, pong_received.clone()));

    // The reader runs inline so `conn` is still here for the cleanup below.
    // Dropping it mid-command is safe: sends run on their own tasks.
    tokio::select! {
        _ = &mut send_task => {}
        _ = read_loop(receiver, &relay, &mut conn, &pong_received, &username) => {
            send_task.abort();
        }
    }

    relay.disconnect(&mut conn);
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    pong_received: Arc<AtomicBool>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(Outbound::Event(event)) => {
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                error!("Failed to encode gateway event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        debug!("Closing connection on relay request");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= MAX_MISSED_PONGS {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn read_loop(
    mut receiver: SplitStream<WebSocket>,
    relay: &Relay,
    conn: &mut Connection,
    pong_received: &AtomicBool,
    username: &str,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                Ok(cmd) => relay.handle(conn, cmd).await,
                Err(e) => {
                    warn!(
                        "{} ({}) bad command: {} -- raw: {}",
                        username,
                        conn.admitted_user(),
                        e,
                        truncate(&text, 200)
                    );
                }
            },
            Message::Pong(_) => pong_received.store(true, Ordering::Release),
            Message::Close(_) => break,
            _ => {}
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 200), "hello");
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("📚📚📚", 1), "📚");
    }
}
