// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listening-port front end: the same host:port accepts both websocket
//! upgrades (persistent downstream sessions) and plain HTTP GET-style
//! requests (spec.md §4.5).

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{extract::State, Router};

use crate::state::ProxyState;

/// Build the axum `Router`. A single fallback route handles every path: the
/// pre-upgrade hook inspects the `Upgrade` header to decide whether this is a
/// websocket handshake or a one-shot HTTP request.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(get(root_handler)).with_state(state)
}

async fn root_handler(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    if request.headers().get(header::UPGRADE).is_some() {
        let (mut parts, _body) = request.into_parts();
        return match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => upgrade
                .on_upgrade(move |socket| ws::handle_downstream(socket, state))
                .into_response(),
            Err(rejection) => rejection.into_response(),
        };
    }

    http::handle_one_shot(state, request.uri().path()).await
}
