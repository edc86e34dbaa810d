// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single persistent websocket to the upstream presentation application.
//!
//! Owns the response cache and pending-request queue exclusively; downstream
//! connections and the HTTP bridge only ever reach these through
//! [`UpstreamClient::request`] and the subscriber channels returned by
//! `register_*_subscriber`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::cache::{Payload, ResponseCache};
use crate::config::ProxyConfig;
use crate::endpoint::{Endpoint, Triple};
use crate::upstream::pending::PendingQueue;
use crate::xml;

/// Delay after connecting before the proxy sends its own presentation
/// subscription, to let the upstream finish its own startup (spec.md §4.3).
const SUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Id returned by `register_*_subscriber`, used to unregister later.
pub type SubscriberId = u64;

/// A correlated text (XML) reply delivered to subscribers.
#[derive(Debug, Clone)]
pub struct TextEvent {
    pub payload: String,
    pub resource: String,
    pub action: Option<String>,
    pub identifier: Option<String>,
}

/// A correlated binary (image) reply delivered to subscribers.
#[derive(Debug, Clone)]
pub struct BinaryEvent {
    pub payload: Bytes,
    pub resource: String,
    pub action: Option<String>,
    pub identifier: Option<String>,
}

/// Cache and pending-queue, guarded together since `request` and the frame
/// reader both need atomic read-modify-write access to both.
struct SharedState {
    cache: ResponseCache,
    pending: PendingQueue,
}

pub struct UpstreamClient {
    config: Arc<ProxyConfig>,
    state: Mutex<SharedState>,
    connected: AtomicBool,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    text_subs: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<TextEvent>>>,
    binary_subs: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<BinaryEvent>>>,
    next_sub_id: AtomicU64,
    shutdown: CancellationToken,
}

impl UpstreamClient {
    pub fn new(config: Arc<ProxyConfig>) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            config,
            state: Mutex::new(SharedState { cache: ResponseCache::new(), pending: PendingQueue::new() }),
            connected: AtomicBool::new(false),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            text_subs: Mutex::new(HashMap::new()),
            binary_subs: Mutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        })
    }

    /// True iff the upstream websocket is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Register to receive correlated text (XML) replies. Returns an id to
    /// pass to `unregister_text_subscriber` plus the receiving half.
    pub async fn register_text_subscriber(&self) -> (SubscriberId, mpsc::UnboundedReceiver<TextEvent>) {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.text_subs.lock().await.insert(id, tx);
        (id, rx)
    }

    pub async fn unregister_text_subscriber(&self, id: SubscriberId) {
        self.text_subs.lock().await.remove(&id);
    }

    /// Register to receive correlated binary (image) replies.
    pub async fn register_binary_subscriber(
        &self,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<BinaryEvent>) {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.binary_subs.lock().await.insert(id, tx);
        (id, rx)
    }

    pub async fn unregister_binary_subscriber(&self, id: SubscriberId) {
        self.binary_subs.lock().await.remove(&id);
    }

    /// Request a resource. Returns whether the send was initiated, not
    /// whether a reply arrived (spec.md §9): `false` means the upstream
    /// socket is down and nothing was sent; `true` means either a cached
    /// reply was scheduled for delivery or the request was forwarded and
    /// queued as pending.
    pub async fn request(&self, endpoint: Endpoint) -> bool {
        if !self.is_connected() {
            return false;
        }

        let now = now_epoch_secs();
        let mut state = self.state.lock().await;
        state.cache.purge();

        if let Some(payload) = state.cache.get_by_url(endpoint.url()).cloned() {
            drop(state);
            self.deliver_cached(&endpoint, payload).await;
            return true;
        }

        state.pending.insert(endpoint.clone(), now);
        drop(state);

        let _ = self.outbound_tx.send(endpoint.url().to_owned());
        true
    }

    /// Signal shutdown: the run loop observes this between frames and exits,
    /// closing the live socket.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    async fn deliver_cached(&self, endpoint: &Endpoint, payload: Payload) {
        match payload {
            Payload::Text(text) => {
                self.fan_out_text(TextEvent {
                    payload: text,
                    resource: endpoint.resource().unwrap_or("").to_owned(),
                    action: endpoint.action().map(str::to_owned),
                    identifier: endpoint.identifier().map(str::to_owned),
                })
                .await;
            }
            Payload::Binary(bytes) => {
                self.fan_out_binary(BinaryEvent {
                    payload: bytes,
                    resource: endpoint.resource().unwrap_or("").to_owned(),
                    action: endpoint.action().map(str::to_owned),
                    identifier: endpoint.identifier().map(str::to_owned),
                })
                .await;
            }
        }
    }

    async fn fan_out_text(&self, event: TextEvent) {
        let subs = self.text_subs.lock().await;
        for tx in subs.values() {
            let _ = tx.send(event.clone());
        }
    }

    async fn fan_out_binary(&self, event: BinaryEvent) {
        let subs = self.binary_subs.lock().await;
        for tx in subs.values() {
            let _ = tx.send(event.clone());
        }
    }

    /// Run the upstream connection loop until `stop()` is called. Reconnects
    /// after `config.reconnect_delay()` on any disconnect.
    pub async fn run(self: &Arc<Self>) {
        let Some(mut outbound_rx) = self.outbound_rx.lock().await.take() else {
            tracing::error!("run() called while already running");
            return;
        };

        let url = format!("ws://{}:{}/ws", self.config.opensong_host, self.config.opensong_port);

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match tokio_tungstenite::connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    tracing::info!(%url, "connected to upstream");
                    self.connected.store(true, Ordering::Release);
                    self.read_until_disconnect(ws_stream, &mut outbound_rx).await;
                    self.connected.store(false, Ordering::Release);
                }
                Err(err) => {
                    tracing::error!(%url, %err, "failed to connect to upstream");
                }
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay()) => {}
            }
        }

        *self.outbound_rx.lock().await = Some(outbound_rx);
    }

    async fn read_until_disconnect(
        &self,
        ws_stream: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) {
        let (mut write, mut read) = ws_stream.split();
        let subscribe_delay = tokio::time::sleep(SUBSCRIBE_DELAY);
        tokio::pin!(subscribe_delay);
        let mut subscribed = false;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.close().await;
                    return;
                }

                _ = &mut subscribe_delay, if !subscribed => {
                    subscribed = true;
                    if write.send(Message::Text("/ws/subscribe/presentation".into())).await.is_err() {
                        tracing::error!("failed to send presentation subscription");
                        return;
                    }
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_frame(text.to_string()).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.handle_binary_frame(Bytes::from(data.to_vec())).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::error!("upstream connection closed");
                            return;
                        }
                        Some(Err(err)) => {
                            tracing::error!(%err, "upstream read failed");
                            return;
                        }
                        _ => {}
                    }
                }

                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(url) => {
                            if write.send(Message::Text(url.into())).await.is_err() {
                                tracing::error!("failed to send request upstream");
                                return;
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    }

    async fn handle_text_frame(&self, text: String) {
        if text == "OK" {
            return;
        }
        if !text.starts_with("<?xml") {
            tracing::debug!(%text, "dropping unexpected upstream text");
            return;
        }

        let Some(attrs) = xml::parse_reply_attrs(&text) else {
            tracing::debug!(%text, "failed to parse upstream XML");
            return;
        };
        let resource = attrs.resource.unwrap_or_default();
        let triple =
            Triple { resource: &resource, action: attrs.action.as_deref(), identifier: attrs.identifier.as_deref() };

        let now = now_epoch_secs();
        let mut state = self.state.lock().await;
        let correlation = state
            .pending
            .take_text_match(&triple, now)
            .unwrap_or_else(|| Endpoint::from_parts(Some(&resource), triple.action, triple.identifier, None));
        state.cache.add(correlation, Payload::Text(text.clone()), None);
        drop(state);

        self.fan_out_text(TextEvent {
            payload: text,
            resource,
            action: attrs.action,
            identifier: attrs.identifier,
        })
        .await;
    }

    async fn handle_binary_frame(&self, data: Bytes) {
        let now = now_epoch_secs();
        let mut state = self.state.lock().await;
        let correlation = state.pending.take_binary_match(now);
        let Some(endpoint) = correlation else {
            drop(state);
            tracing::debug!("binary frame received with no matching pending request");
            return;
        };
        state.cache.add(endpoint.clone(), Payload::Binary(data.clone()), None);
        drop(state);

        self.fan_out_binary(BinaryEvent {
            payload: data,
            resource: endpoint.resource().unwrap_or("").to_owned(),
            action: endpoint.action().map(str::to_owned),
            identifier: endpoint.identifier().map(str::to_owned),
        })
        .await;
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
