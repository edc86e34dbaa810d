// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection downstream websocket handling (spec.md §4.4): ACL
//! enforcement, request forwarding, and reply filtering based on
//! subscription state and the connection's last-requested endpoint.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};

use crate::acl;
use crate::endpoint::{Endpoint, Triple};
use crate::error::NOT_FOUND_TEXT;
use crate::state::ProxyState;
use crate::upstream::{BinaryEvent, TextEvent};

/// Per-connection subscription and last-requested-endpoint state (spec.md
/// §3: "Subscription state (per DownstreamConnection)"). Owned exclusively by
/// this connection's task.
#[derive(Default)]
struct ConnState {
    subscribed_to_presentation_status: bool,
    last_requested_endpoint: Option<Endpoint>,
}

/// Drive one accepted downstream websocket session until the socket closes
/// or the proxy is shutting down.
pub async fn handle_downstream(socket: WebSocket, state: Arc<ProxyState>) {
    let (text_id, mut text_rx) = state.upstream.register_text_subscriber().await;
    let (binary_id, mut binary_rx) = state.upstream.register_binary_subscriber().await;

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<Message>();
    let conn = Arc::new(Mutex::new(ConnState::default()));

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let url = text.to_string();
                        let state = Arc::clone(&state);
                        let conn = Arc::clone(&conn);
                        let direct_tx = direct_tx.clone();
                        // Independent task: a slow request never blocks reading the next frame.
                        tokio::spawn(async move {
                            process_request(url, state, conn, direct_tx).await;
                        });
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }

            event = text_rx.recv() => {
                let Some(event) = event else { break };
                if let Some(message) = filter_text_event(&conn, event).await {
                    if ws_tx.send(message).await.is_err() {
                        break;
                    }
                }
            }

            event = binary_rx.recv() => {
                let Some(event) = event else { break };
                if let Some(message) = filter_binary_event(&conn, event).await {
                    if ws_tx.send(message).await.is_err() {
                        break;
                    }
                }
            }

            message = direct_rx.recv() => {
                let Some(message) = message else { break };
                if ws_tx.send(message).await.is_err() {
                    break;
                }
            }
        }
    }

    state.upstream.unregister_text_subscriber(text_id).await;
    state.upstream.unregister_binary_subscriber(binary_id).await;
}

/// Reply-filtering rule for text events (spec.md §4.4): unconditional
/// forwarding for subscribed presentation-status pushes, otherwise forward
/// only a reply that matches this connection's outstanding (non-binary)
/// request, clearing it.
async fn filter_text_event(conn: &Arc<Mutex<ConnState>>, event: TextEvent) -> Option<Message> {
    let mut guard = conn.lock().await;

    if guard.subscribed_to_presentation_status
        && event.resource == "presentation"
        && event.action.as_deref() == Some("status")
    {
        return Some(Message::Text(event.payload.into()));
    }

    let triple =
        Triple { resource: &event.resource, action: event.action.as_deref(), identifier: event.identifier.as_deref() };
    let matches = guard
        .last_requested_endpoint
        .as_ref()
        .is_some_and(|endpoint| !endpoint.expect_binary() && endpoint.matches(&triple));

    if matches {
        guard.last_requested_endpoint = None;
        Some(Message::Text(event.payload.into()))
    } else {
        None
    }
}

/// Reply-filtering rule for binary events: forward iff the outstanding
/// request expects binary and matches, clearing it.
async fn filter_binary_event(conn: &Arc<Mutex<ConnState>>, event: BinaryEvent) -> Option<Message> {
    let mut guard = conn.lock().await;

    let triple =
        Triple { resource: &event.resource, action: event.action.as_deref(), identifier: event.identifier.as_deref() };
    let matches = guard
        .last_requested_endpoint
        .as_ref()
        .is_some_and(|endpoint| endpoint.expect_binary() && endpoint.matches(&triple));

    if matches {
        guard.last_requested_endpoint = None;
        Some(Message::Binary(event.payload))
    } else {
        None
    }
}

/// Handle one downstream request frame (spec.md §4.4 `process_request`).
async fn process_request(
    url: String,
    state: Arc<ProxyState>,
    conn: Arc<Mutex<ConnState>>,
    direct_tx: mpsc::UnboundedSender<Message>,
) {
    let endpoint = Endpoint::parse(&url);

    if !acl::allows(&endpoint) {
        let _ = direct_tx.send(Message::Text(NOT_FOUND_TEXT.into()));
        return;
    }

    if endpoint.resource() == Some("ws") {
        let reply = match url.as_str() {
            "/ws/subscribe/presentation" => {
                conn.lock().await.subscribed_to_presentation_status = true;
                "OK"
            }
            "/ws/unsubscribe/presentation" => {
                conn.lock().await.subscribed_to_presentation_status = false;
                "OK"
            }
            _ => NOT_FOUND_TEXT,
        };
        let _ = direct_tx.send(Message::Text(reply.into()));
        return;
    }

    if state.upstream.request(endpoint.clone()).await {
        conn.lock().await.last_requested_endpoint = Some(endpoint);
    } else {
        let _ = direct_tx.send(Message::Text(NOT_FOUND_TEXT.into()));
    }
}
