//! WebSocket transport for the editor page.
//!
//! One socket per open page. Every socket drives the same host, so several
//! pages stay in sync through the shared log feed.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;

use playground_host::HostHandle;

use crate::protocol::{ClientMessage, ServerMessage};

/// WebSocket handler state.
#[derive(Clone)]
pub struct WsState {
    pub host: HostHandle,
}

impl WsState {
    #[must_use]
    pub const fn new(host: HostHandle) -> Self {
        Self { host }
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();
    let host = state.host;

    // Channel for sending messages to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    match host.state().await {
        Ok(current) => {
            let _ = tx.send(current.into());
        }
        Err(e) => {
            let _ = tx.send(ServerMessage::Error {
                message: e.to_string(),
            });
            send_task.abort();
            return;
        }
    }

    // Log history first, then live updates.
    let log_tx = tx.clone();
    let mut logs = host.log_store().history_plus_stream();
    let log_task = tokio::spawn(async move {
        while let Some(update) = logs.next().await {
            if log_tx.send(update.into()).is_err() {
                break;
            }
        }
    });

    let decl_tx = tx.clone();
    let mut declarations = WatchStream::new(host.declarations());
    let declarations_task = tokio::spawn(async move {
        while let Some(declarations) = declarations.next().await {
            if declarations.is_empty() {
                continue;
            }
            if decl_tx
                .send(ServerMessage::Declarations { declarations })
                .is_err()
            {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Invalid client message: {e}");
                let _ = tx.send(ServerMessage::Error {
                    message: format!("Invalid message: {e}"),
                });
                continue;
            }
        };

        let result = match client_msg {
            ClientMessage::Ping => {
                let _ = tx.send(ServerMessage::Pong);
                Ok(())
            }
            ClientMessage::Edit { fragment, text } => host.edit(fragment, text),
            ClientMessage::Run => host.run(),
            ClientMessage::SetAutorun { enabled } => host.set_autorun(enabled),
            ClientMessage::Reload => host.reload(),
            ClientMessage::Snapshot => host.snapshot().await.map(|snapshot| {
                let _ = tx.send(snapshot.into());
            }),
        };
        if let Err(e) = result {
            tracing::warn!("Host command failed: {e}");
            let _ = tx.send(ServerMessage::Error {
                message: e.to_string(),
            });
        }
    }

    log_task.abort();
    declarations_task.abort();
    send_task.abort();
    tracing::debug!("WebSocket disconnected");
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(host));
/// ```
#[must_use]
pub fn create_ws_router(host: HostHandle) -> axum::Router {
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(WsState::new(host))
}
