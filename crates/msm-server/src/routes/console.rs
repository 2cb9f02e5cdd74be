//! `GET /servers/{id}/console/ws` (C4, §6 wire protocol). A custom
//! `tokio::select!` loop rather than `ws_util::run_ws_stream`, since the
//! client side here is JSON `command`/`pong` frames, not raw WebSocket
//! ping/pong control frames.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use msm_services::fabric::{self, Frame};
use msm_services::registry::ManagedChild;
use serde::Deserialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/servers/{id}/console/ws", get(upgrade))
}

async fn upgrade(
    State(state): State<AppState>,
    Path(server_id): Path<i64>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.supervisor.registry().get(server_id) {
        Some(child) => ws.on_upgrade(move |socket| run(socket, child)),
        None => ws.on_upgrade(|socket| async move {
            let _ = socket_close_with_error(socket, "server is not running").await;
        }),
    }
}

async fn socket_close_with_error(mut socket: WebSocket, message: &str) -> Result<(), axum::Error> {
    let frame = Frame::Error { message: message.to_string() };
    if let Ok(text) = serde_json::to_string(&frame) {
        socket.send(Message::Text(text.into())).await?;
    }
    socket.close().await
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Command { command: String },
    Pong,
}

async fn run(socket: WebSocket, child: Arc<ManagedChild>) {
    let mut subscription = fabric::subscribe(Arc::clone(&child));
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = subscription.frames.recv() => {
                match frame {
                    Some(frame) => {
                        let Ok(text) = serde_json::to_string(&frame) else { continue };
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                        if matches!(frame, Frame::ServerStopped { .. }) {
                            let _ = sender.close().await;
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Command { command }) => {
                                let ack = fabric::send_command(&child, &command).await;
                                let Ok(text) = serde_json::to_string(&ack) else { continue };
                                if sender.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ClientFrame::Pong) => subscription.pong.mark(),
                            Err(e) => {
                                tracing::debug!(%e, "discarding malformed console client frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%e, "console websocket receive error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
