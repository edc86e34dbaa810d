// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! opensong-proxy: a websocket/HTTP proxy that multiplexes many downstream
//! clients onto a single upstream OpenSong-style presentation application.

pub mod acl;
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod state;
pub mod transport;
pub mod upstream;
pub mod xml;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::state::ProxyState;
use crate::transport::build_router;

/// Run the proxy until shutdown: bind the listening port, start the upstream
/// connection loop, and serve until the process receives `SIGINT`.
pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr();
    let config = Arc::new(config);
    let state = ProxyState::new(Arc::clone(&config)).await;

    let upstream = Arc::clone(&state.upstream);
    let upstream_task = tokio::spawn(async move { upstream.run().await });

    let signal_shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, shutting down");
            signal_shutdown.cancel();
        }
    });

    tracing::info!(%bind_addr, "opensong-proxy listening");
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&bind_addr).await?;

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    state.upstream.stop();
    let _ = upstream_task.await;

    Ok(())
}
