// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A scripted mock upstream websocket server standing in for the OpenSong
//! presentation application, used by both the HTTP-bridge and downstream
//! websocket integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use opensong_proxy::config::ProxyConfig;
use opensong_proxy::state::ProxyState;

/// A scripted reply the mock upstream sends back the moment it sees the
/// matching request URL come in as a text frame.
#[derive(Clone)]
pub enum Scripted {
    Text(&'static str),
    Binary(&'static [u8]),
}

/// Mock upstream server: accepts one connection at `/ws`, replies to scripted
/// requests, and can push unsolicited frames via `push`.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    outgoing: mpsc::UnboundedSender<WsMessage>,
}

impl MockUpstream {
    pub async fn start(scripted: HashMap<&'static str, Scripted>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock upstream");
        let addr = listener.local_addr().expect("local addr");

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<WsMessage>();

        tokio::spawn(async move {
            let Ok((stream, _peer)) = listener.accept().await else { return };
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else { return };
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    frame = read.next() => {
                        match frame {
                            Some(Ok(WsMessage::Text(text))) => {
                                let text = text.to_string();
                                if let Some(reply) = scripted.get(text.as_str()) {
                                    let message = match reply {
                                        Scripted::Text(t) => WsMessage::Text((*t).into()),
                                        Scripted::Binary(b) => WsMessage::Binary(b.to_vec().into()),
                                    };
                                    let _ = write.send(message).await;
                                }
                                let _ = requests_tx.send(text);
                            }
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            Some(Err(_)) => break,
                            _ => {}
                        }
                    }
                    Some(message) = outgoing_rx.recv() => {
                        if write.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { addr, requests: Arc::new(Mutex::new(requests_rx)), outgoing: outgoing_tx }
    }

    /// Push an unsolicited text frame (e.g. a `presentation/status` push).
    pub fn push_text(&self, text: &str) {
        let _ = self.outgoing.send(WsMessage::Text(text.to_owned().into()));
    }

    /// Wait for the next request URL the proxy sent upstream, skipping the
    /// presentation-subscribe bootstrap frame.
    pub async fn next_request(&self) -> String {
        let mut requests = self.requests.lock().await;
        loop {
            let text = requests.recv().await.expect("mock upstream channel closed");
            if text != "/ws/subscribe/presentation" {
                return text;
            }
        }
    }
}

/// Build a `ProxyState` wired to `mock`'s address, with the upstream
/// connection loop already spawned.
pub async fn proxy_state_for(mock: &MockUpstream) -> Arc<ProxyState> {
    let config = Arc::new(ProxyConfig {
        proxy_host: "127.0.0.1".to_owned(),
        proxy_port: 0,
        opensong_host: mock.addr.ip().to_string(),
        opensong_port: mock.addr.port(),
        reconnect_delay_ms: 50,
    });
    let state = ProxyState::new(config).await;

    let upstream = Arc::clone(&state.upstream);
    tokio::spawn(async move { upstream.run().await });

    for _ in 0..200 {
        if state.upstream.is_connected() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(state.upstream.is_connected(), "upstream never connected to mock server");

    state
}
