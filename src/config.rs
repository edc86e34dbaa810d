// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the proxy: command-line flags override environment
//! variables override defaults (spec.md §4.6).

use std::time::Duration;

/// Proxy configuration. Fields are populated by `clap` from, in decreasing
/// priority, CLI flags, environment variables, then the listed defaults.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "opensong-proxy", about = "OpenSong WebSocket proxy")]
pub struct ProxyConfig {
    /// Address this proxy binds to.
    #[arg(long = "proxy-host", env = "PROXY_HOST", default_value = "localhost")]
    pub proxy_host: String,

    /// Port this proxy accepts connections on.
    #[arg(long = "proxy-port", env = "PROXY_PORT", default_value_t = 8082)]
    pub proxy_port: u16,

    /// Address of the upstream OpenSong application.
    #[arg(long = "opensong-host", env = "OPENSONG_HOST", default_value = "opensong")]
    pub opensong_host: String,

    /// Port of the upstream OpenSong websocket API.
    #[arg(long = "opensong-port", env = "OPENSONG_PORT", default_value_t = 8082)]
    pub opensong_port: u16,

    /// Delay before reconnecting to a dropped upstream connection, in
    /// milliseconds. Spec.md §4.3 calls for a "configurable reconnect delay"
    /// without naming a flag; this is the concrete knob for it.
    #[arg(long = "reconnect-delay-ms", env = "PROXY_RECONNECT_DELAY_MS", default_value_t = 2000)]
    pub reconnect_delay_ms: u64,
}

impl ProxyConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.proxy_host, self.proxy_port)
    }
}
