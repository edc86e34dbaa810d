// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types that need to cross the HTTP boundary. Everything else in the
//! crate propagates through `anyhow::Result`.

use axum::http::StatusCode;

/// Fixed not-found reply text sent to a disallowed or rejected downstream
/// request (spec.md §4.4, §6).
pub const NOT_FOUND_TEXT: &str = "The requested resource could not be found";

/// HTTP-facing proxy error, mapped onto the status codes spec.md §6 defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyError {
    /// Disallowed resource, a `ws`-resource request over HTTP, or the
    /// upstream is disconnected.
    Unsupported,
    /// The response-awaiter registry was torn down before a matching reply
    /// arrived.
    Internal,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unsupported => StatusCode::NOT_IMPLEMENTED,
            ProxyError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
