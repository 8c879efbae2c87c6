//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! A connection watches at most one class day at a time; each subscription runs
//! as its own task and is replaced through its cancellation token.

use crate::web::{
    protocol::{ClientMessage, DaySnapshot, ServerMessage},
    rest::{load_board, load_understanding, load_window},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use classroom_core::{AuthIdentity, ClassDay, DateKey, PortError, PortResult};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::{
    sync::{broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// A running subscription and the token that stops it.
struct Subscription {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    fn stop(self) {
        self.token.cancel();
        self.task.abort();
    }
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthIdentity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, identity))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: AuthIdentity) {
    info!(scope = %identity.scope, name = %identity.name, "WebSocket connection established");

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));
    let mut subscription: Option<Subscription> = None;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text_message(
                    text.as_str(),
                    &app_state,
                    &identity,
                    &ws_sender,
                    &mut subscription,
                )
                .await;
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive failed: {}", e);
                break;
            }
        }
    }

    if let Some(subscription) = subscription.take() {
        subscription.stop();
    }
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    identity: &AuthIdentity,
    ws_sender: &WsSender,
    subscription: &mut Option<Subscription>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            send_message(
                ws_sender,
                &ServerMessage::Error {
                    message: format!("Unreadable message: {}", e),
                },
            )
            .await;
            return;
        }
    };

    // Either way the old scope is finished before anything new is sent.
    if let Some(previous) = subscription.take() {
        previous.stop();
    }

    match client_msg {
        ClientMessage::Subscribe {
            course,
            date_key,
            hide_names,
        } => {
            let day = match date_key.parse::<DateKey>() {
                Ok(date_key) => ClassDay::new(course, date_key),
                Err(e) => {
                    send_message(ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                    return;
                }
            };
            info!(day = %day, hide_names, "Subscribing");

            let token = CancellationToken::new();
            let task = {
                let app_state = app_state.clone();
                let identity = identity.clone();
                let ws_sender = ws_sender.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    subscription_process(app_state, identity, day, hide_names, ws_sender, token)
                        .await;
                })
            };
            *subscription = Some(Subscription { token, task });
        }
        ClientMessage::Unsubscribe => {
            info!("Unsubscribe message received.");
            send_message(ws_sender, &ServerMessage::Unsubscribed).await;
        }
    }
}

/// Sends a snapshot now and again after every change to `day`, until cancelled.
async fn subscription_process(
    app_state: Arc<AppState>,
    identity: AuthIdentity,
    day: ClassDay,
    hide_names: bool,
    ws_sender: WsSender,
    token: CancellationToken,
) {
    // Join the feed before the first read so no write can slip between them.
    let mut changes = app_state.feed.subscribe();

    match push_snapshot(&app_state, &identity, &day, hide_names, &ws_sender).await {
        Ok(true) => {}
        Ok(false) => return,
        Err(e @ (PortError::Forbidden(_) | PortError::NotFound(_))) => {
            // Nothing will ever become visible in this scope.
            send_message(&ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
            return;
        }
        Err(e) => {
            error!("Initial snapshot for {} failed: {:?}", day, e);
        }
    }

    loop {
        let resend = tokio::select! {
            _ = token.cancelled() => break,
            change = changes.recv() => match change {
                Ok(change) => {
                    debug!(day = %change.day, kind = ?change.kind, "Change received");
                    change.day == day
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscription for {} lagged by {} changes; resending", day, skipped);
                    true
                }
                Err(RecvError::Closed) => break,
            },
        };
        if !resend {
            continue;
        }
        match push_snapshot(&app_state, &identity, &day, hide_names, &ws_sender).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => error!("Snapshot for {} failed: {:?}", day, e),
        }
    }
    debug!("Subscription for {} ended", day);
}

async fn build_snapshot(
    app_state: &AppState,
    identity: &AuthIdentity,
    day: &ClassDay,
    hide_names: bool,
) -> PortResult<DaySnapshot> {
    let classroom = &app_state.classroom;
    let understanding = load_understanding(classroom, identity, day, hide_names).await?;
    let questions = load_board(classroom, identity, day, hide_names).await?;
    let window = load_window(classroom, identity, day).await?;
    Ok(DaySnapshot {
        course: day.course.clone(),
        date_key: day.date_key.to_string(),
        can_submit: understanding.can_submit,
        understanding,
        questions,
        window,
    })
}

/// Returns `Ok(false)` once the client can no longer be reached.
async fn push_snapshot(
    app_state: &AppState,
    identity: &AuthIdentity,
    day: &ClassDay,
    hide_names: bool,
    ws_sender: &WsSender,
) -> PortResult<bool> {
    let snapshot = build_snapshot(app_state, identity, day, hide_names).await?;
    Ok(send_message(
        ws_sender,
        &ServerMessage::Snapshot {
            snapshot: Box::new(snapshot),
        },
    )
    .await)
}

/// Returns whether the message reached the socket.
async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {:?}", e);
            return true;
        }
    };
    if ws_sender.lock().await.send(Message::Text(json.into())).await.is_err() {
        warn!("Failed to send message; client is gone.");
        return false;
    }
    true
}
