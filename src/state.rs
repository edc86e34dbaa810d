// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared proxy state: the upstream client plus the HTTP-bridge awaiter
//! registry that turns its callback API into synchronous request/reply
//! (spec.md §4.5).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::endpoint::{Endpoint, Triple};
use crate::upstream::UpstreamClient;

/// How long an HTTP GET waits for a matching upstream reply before answering
/// `500`. Not specified by spec.md, which only defines the queue-closed case;
/// bounding the wait keeps a request whose reply never arrives from hanging
/// the connection forever. See DESIGN.md.
const HTTP_AWAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// A reply delivered to a waiting HTTP GET.
pub enum HttpReply {
    Text(String),
    Binary(Bytes),
}

/// Why a `request_and_await` call did not yield a reply.
pub enum AwaitFailure {
    /// `upstream.request` returned `false`: the upstream socket is down.
    NotSent,
    /// The wait timed out or the bridge was torn down before a reply arrived.
    Closed,
}

struct HttpAwaiter {
    endpoint: Endpoint,
    reply: oneshot::Sender<HttpReply>,
}

/// Process-wide proxy state shared between the downstream websocket and HTTP
/// front ends.
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    pub upstream: Arc<UpstreamClient>,
    pub shutdown: CancellationToken,
    http_awaiters: Mutex<Vec<HttpAwaiter>>,
}

impl ProxyState {
    /// Build the shared state and spawn the process-wide text/binary
    /// subscriber pair that drains replies into `http_awaiters`. This is the
    /// "awaiters keyed by endpoint" design promoted in SPEC_FULL.md §4.5 in
    /// place of the original single process-wide queue.
    ///
    /// Registers those subscribers before returning, so a caller that spawns
    /// `upstream.run()` right after this call can never race the bridge's own
    /// subscriber registration against the first upstream reply.
    pub async fn new(config: Arc<ProxyConfig>) -> Arc<Self> {
        let upstream = UpstreamClient::new(Arc::clone(&config));
        let (_text_id, text_rx) = upstream.register_text_subscriber().await;
        let (_binary_id, binary_rx) = upstream.register_binary_subscriber().await;

        let state = Arc::new(Self {
            config,
            upstream,
            shutdown: CancellationToken::new(),
            http_awaiters: Mutex::new(Vec::new()),
        });

        let bridge_state = Arc::clone(&state);
        tokio::spawn(async move { bridge_state.run_http_bridge(text_rx, binary_rx).await });

        state
    }

    /// Register interest in the next reply matching `endpoint`. Must be
    /// called before `upstream.request(endpoint)` so a cache-hit delivery
    /// (which happens synchronously inside `request`) is never missed.
    async fn register_http_awaiter(&self, endpoint: Endpoint) -> oneshot::Receiver<HttpReply> {
        let (tx, rx) = oneshot::channel();
        self.http_awaiters.lock().await.push(HttpAwaiter { endpoint, reply: tx });
        rx
    }

    /// Drop whatever awaiter is still registered for `endpoint`, if the
    /// caller gave up (timed out) before a reply arrived.
    async fn remove_http_awaiter(&self, endpoint: &Endpoint) {
        let mut awaiters = self.http_awaiters.lock().await;
        if let Some(index) = awaiters.iter().position(|a| a.endpoint == *endpoint) {
            awaiters.remove(index);
        }
    }

    /// Send `endpoint` upstream and wait for the correlated reply. Returns
    /// `None` if the send could not be initiated (upstream disconnected) or
    /// the wait timed out / the bridge was torn down.
    pub async fn request_and_await(&self, endpoint: Endpoint) -> Result<HttpReply, AwaitFailure> {
        let rx = self.register_http_awaiter(endpoint.clone()).await;

        if !self.upstream.request(endpoint.clone()).await {
            self.remove_http_awaiter(&endpoint).await;
            return Err(AwaitFailure::NotSent);
        }

        match tokio::time::timeout(HTTP_AWAIT_TIMEOUT, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) | Err(_) => {
                self.remove_http_awaiter(&endpoint).await;
                Err(AwaitFailure::Closed)
            }
        }
    }

    async fn run_http_bridge(
        self: Arc<Self>,
        mut text_rx: tokio::sync::mpsc::UnboundedReceiver<crate::upstream::TextEvent>,
        mut binary_rx: tokio::sync::mpsc::UnboundedReceiver<crate::upstream::BinaryEvent>,
    ) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                event = text_rx.recv() => {
                    let Some(event) = event else { break };
                    let triple = Triple {
                        resource: &event.resource,
                        action: event.action.as_deref(),
                        identifier: event.identifier.as_deref(),
                    };
                    let mut awaiters = self.http_awaiters.lock().await;
                    if let Some(index) = awaiters.iter().position(|a| a.endpoint.matches(&triple)) {
                        let awaiter = awaiters.remove(index);
                        drop(awaiters);
                        let _ = awaiter.reply.send(HttpReply::Text(event.payload));
                    }
                }

                event = binary_rx.recv() => {
                    let Some(event) = event else { break };
                    let triple = Triple {
                        resource: &event.resource,
                        action: event.action.as_deref(),
                        identifier: event.identifier.as_deref(),
                    };
                    let mut awaiters = self.http_awaiters.lock().await;
                    if let Some(index) = awaiters.iter().position(|a| a.endpoint.matches(&triple)) {
                        let awaiter = awaiters.remove(index);
                        drop(awaiters);
                        let _ = awaiter.reply.send(HttpReply::Binary(event.payload));
                    }
                }
            }
        }
    }
}
