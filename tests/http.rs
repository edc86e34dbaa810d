// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the HTTP GET-style bridge (spec.md §4.5, §8 S5).
//!
//! Uses `axum_test::TestServer` against a real `ProxyState` wired to a
//! scripted mock upstream websocket server — no real downstream client.

#[path = "support.rs"]
mod support;

use std::collections::HashMap;

use axum::http::StatusCode;
use axum_test::TestServer;

use opensong_proxy::transport::build_router;
use support::{proxy_state_for, MockUpstream, Scripted};

fn test_server_for(state: std::sync::Arc<opensong_proxy::state::ProxyState>) -> TestServer {
    let router = build_router(state);
    TestServer::new(router).expect("create test server")
}

#[tokio::test]
async fn http_get_returns_xml_with_content_type() {
    let mut scripted = HashMap::new();
    scripted.insert(
        "/song/folders",
        Scripted::Text(r#"<?xml version="1.0"?><response resource="song" action="folders"/>"#),
    );
    let mock = MockUpstream::start(scripted).await;
    let state = proxy_state_for(&mock).await;
    let server = test_server_for(state);

    let resp = server.get("/song/folders").await;
    resp.assert_status(StatusCode::OK);
    resp.assert_header("content-type", "text/xml");
    assert!(resp.text().contains(r#"resource="song""#));
}

#[tokio::test]
async fn http_get_returns_binary_with_jpeg_content_type() {
    let mut scripted = HashMap::new();
    scripted.insert("/presentation/slide/1/image", Scripted::Binary(&[0xFF, 0xD8, 0xFF, 0xAA]));
    let mock = MockUpstream::start(scripted).await;
    let state = proxy_state_for(&mock).await;
    let server = test_server_for(state);

    let resp = server.get("/presentation/slide/1/image").await;
    resp.assert_status(StatusCode::OK);
    resp.assert_header("content-type", "image/jpeg");
    assert_eq!(resp.as_bytes().as_ref(), &[0xFFu8, 0xD8, 0xFF, 0xAA][..]);
}

#[tokio::test]
async fn http_get_disallowed_endpoint_returns_501() {
    let mock = MockUpstream::start(HashMap::new()).await;
    let state = proxy_state_for(&mock).await;
    let server = test_server_for(state);

    let resp = server.get("/admin/shutdown").await;
    resp.assert_status(StatusCode::NOT_IMPLEMENTED);
    assert!(resp.as_bytes().is_empty());
}

#[tokio::test]
async fn http_get_ws_resource_returns_501() {
    let mock = MockUpstream::start(HashMap::new()).await;
    let state = proxy_state_for(&mock).await;
    let server = test_server_for(state);

    let resp = server.get("/ws/subscribe/presentation").await;
    resp.assert_status(StatusCode::NOT_IMPLEMENTED);
}
