// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot HTTP GET-style read through the same listening port as the
//! downstream websocket sessions (spec.md §4.5).

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::acl;
use crate::endpoint::Endpoint;
use crate::error::ProxyError;
use crate::state::{AwaitFailure, HttpReply, ProxyState};

/// Handle a plain (non-upgrade) HTTP request as a one-shot
/// request/await/reply against the upstream.
pub async fn handle_one_shot(state: Arc<ProxyState>, path: &str) -> Response {
    let endpoint = Endpoint::parse(path);

    if !acl::allows(&endpoint) || endpoint.resource() == Some("ws") || !state.upstream.is_connected() {
        return ProxyError::Unsupported.status().into_response();
    }

    match state.request_and_await(endpoint).await {
        Ok(HttpReply::Text(text)) => {
            let mut response = (StatusCode::OK, text.clone()).into_response();
            if text.starts_with("<?xml") {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/xml"));
            }
            response
        }
        Ok(HttpReply::Binary(bytes)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()
        }
        Err(AwaitFailure::NotSent) => ProxyError::Unsupported.status().into_response(),
        Err(AwaitFailure::Closed) => ProxyError::Internal.status().into_response(),
    }
}
