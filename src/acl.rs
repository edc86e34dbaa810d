// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The static allowed-endpoint ACL table (spec.md §6). No mutation after
//! startup; "first match wins" in list order.

use std::sync::LazyLock;

use crate::endpoint::{Endpoint, Triple};

/// The ordered list of allowed endpoint patterns.
static ALLOWED: LazyLock<Vec<Endpoint>> = LazyLock::new(|| {
    [
        "/presentation/status",
        "/presentation/slide",
        "/presentation/slide/list",
        "/presentation/slide/*",
        "/presentation/slide/*/preview",
        "/presentation/slide/*/image",
        "/song",
        "/song/list",
        "/song/list/*",
        "/song/*/*",
        "/song/detail/*",
        "/song/folders",
        "/set",
        "/set/list",
        "/set/slide/*",
        "/ws/subscribe/*",
        "/ws/unsubscribe/*",
    ]
    .into_iter()
    .map(Endpoint::parse)
    .collect()
});

/// True iff some pattern in the ACL matches the given endpoint.
pub fn allows(endpoint: &Endpoint) -> bool {
    let probe = Triple {
        resource: endpoint.resource().unwrap_or(""),
        action: endpoint.action(),
        identifier: endpoint.identifier(),
    };
    ALLOWED.iter().any(|pattern| pattern.matches(&probe))
}
