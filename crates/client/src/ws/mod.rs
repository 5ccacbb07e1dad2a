//! Real-time socket for chat and live features.
//!
//! # Architecture
//!
//! ```text
//!   SocketClient (tokio task per transport)
//!        │ inputs: opened / closed / failed / reconnect due
//!        ▼
//!   ConnectionMachine ──effects──▶ open/close transport, timers, events
//!        │
//!        ▼
//!   Listeners (by frame type, then "message")
//! ```
//!
//! The machine owns every state transition and never touches a timer or a
//! socket, so reconnect behaviour is testable without either.
//!
//! ```rust,ignore
//! let socket = SocketClient::new(config.ws_url.clone(), config.reconnect.clone());
//! socket.on("quiz_update", |frame| println!("{:?}", frame.data));
//! socket.connect("course-42", &token);
//! socket.send("answer", json!({"choice": 2}));
//! ```

mod client;
mod listeners;
mod machine;

use std::time::Duration;

pub use client::{SocketClient, SocketRegistry};
pub use listeners::{ListenerId, Listeners};
pub use machine::{ConnectionMachine, SocketEffect, SocketEvent, SocketInput};

/// Connection state for the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Reconnects allowed after the last successful open before giving up
    pub max_attempts: u32,
    /// Delay before the first reconnect
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect number `attempt` (1-based):
    /// `initial * multiplier^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// `{ws_url}/ws/{scope}?token={token}`
pub fn socket_url(ws_url: &str, scope: &str, token: &str) -> String {
    format!(
        "{}/ws/{}?token={}",
        ws_url.trim_end_matches('/'),
        urlencoding::encode(scope),
        urlencoding::encode(token)
    )
}
