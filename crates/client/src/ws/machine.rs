//! Connection lifecycle as a pure transition function.

use std::time::Duration;

use campus_shared::SocketFrame;
use serde_json::json;

use super::{ConnectionState, ReconnectConfig};

/// Something that happened to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketInput {
    /// Manual `connect()`.
    Connect,
    /// The transport finished its handshake.
    Opened,
    /// The transport closed (server close frame, EOF).
    Closed { reason: String },
    /// The transport failed to open or errored while open.
    Failed { error: String },
    /// A scheduled reconnect timer fired.
    ReconnectDue,
    /// Manual `disconnect()`.
    Disconnect,
}

/// Lifecycle events delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Connected,
    Disconnected { reason: String },
    Error { message: String },
    Reconnecting { attempt: u32, delay: Duration },
    ReconnectFailed { attempts: u32 },
}

impl SocketEvent {
    pub const CONNECTED: &'static str = "connected";
    pub const DISCONNECTED: &'static str = "disconnected";
    pub const ERROR: &'static str = "error";
    pub const RECONNECTING: &'static str = "reconnecting";
    pub const RECONNECT_FAILED: &'static str = "reconnect_failed";

    pub fn name(&self) -> &'static str {
        match self {
            SocketEvent::Connected => Self::CONNECTED,
            SocketEvent::Disconnected { .. } => Self::DISCONNECTED,
            SocketEvent::Error { .. } => Self::ERROR,
            SocketEvent::Reconnecting { .. } => Self::RECONNECTING,
            SocketEvent::ReconnectFailed { .. } => Self::RECONNECT_FAILED,
        }
    }

    /// The frame listeners registered under [`SocketEvent::name`] receive.
    pub fn to_frame(&self) -> SocketFrame {
        let data = match self {
            SocketEvent::Connected => serde_json::Value::Null,
            SocketEvent::Disconnected { reason } => json!({ "reason": reason }),
            SocketEvent::Error { message } => json!({ "message": message }),
            SocketEvent::Reconnecting { attempt, delay } => {
                json!({ "attempt": attempt, "delay_ms": delay.as_millis() as u64 })
            }
            SocketEvent::ReconnectFailed { attempts } => json!({ "attempts": attempts }),
        };
        SocketFrame::new(self.name(), data)
    }
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEffect {
    OpenTransport,
    CloseTransport,
    ScheduleReconnect { attempt: u32, delay: Duration },
    CancelReconnect,
    ClearListeners,
    Emit(SocketEvent),
}

/// Reconnect state machine: `Idle → Connecting → Open → Closed → Connecting`
/// with a bounded number of automatic reconnects.
///
/// The attempt counter resets on every successful open and on a manual
/// connect, and never exceeds `max_attempts`.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    reconnect_pending: bool,
    config: ReconnectConfig,
}

impl ConnectionMachine {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            reconnect_pending: false,
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn handle(&mut self, input: SocketInput) -> Vec<SocketEffect> {
        use ConnectionState::*;

        match (self.state, input) {
            (Idle | Closed, SocketInput::Connect) => {
                let mut effects = self.cancel_reconnect();
                self.attempts = 0;
                self.state = Connecting;
                effects.push(SocketEffect::OpenTransport);
                effects
            }
            (Connecting, SocketInput::Opened) => {
                self.state = Open;
                self.attempts = 0;
                vec![SocketEffect::Emit(SocketEvent::Connected)]
            }
            (Connecting | Open, SocketInput::Closed { reason }) => {
                self.state = Closed;
                let mut effects = vec![SocketEffect::Emit(SocketEvent::Disconnected { reason })];
                effects.extend(self.schedule_or_give_up());
                effects
            }
            (Connecting | Open, SocketInput::Failed { error }) => {
                self.state = Closed;
                let mut effects = vec![SocketEffect::Emit(SocketEvent::Error { message: error })];
                effects.extend(self.schedule_or_give_up());
                effects
            }
            (Closed, SocketInput::ReconnectDue) if self.reconnect_pending => {
                self.reconnect_pending = false;
                self.state = Connecting;
                vec![SocketEffect::OpenTransport]
            }
            (Connecting | Open, SocketInput::Disconnect) => {
                self.state = Closing;
                let mut effects = self.cancel_reconnect();
                effects.push(SocketEffect::CloseTransport);
                effects.push(SocketEffect::ClearListeners);
                effects
            }
            (Idle | Closed | Closing, SocketInput::Disconnect) => {
                self.state = Idle;
                let mut effects = self.cancel_reconnect();
                effects.push(SocketEffect::ClearListeners);
                effects
            }
            // The transport we asked to close has gone.
            (Closing, SocketInput::Closed { .. } | SocketInput::Failed { .. }) => {
                self.state = Idle;
                Vec::new()
            }
            // A handshake that completed after disconnect().
            (Closing | Idle | Closed, SocketInput::Opened) => vec![SocketEffect::CloseTransport],
            _ => Vec::new(),
        }
    }

    fn schedule_or_give_up(&mut self) -> Vec<SocketEffect> {
        if self.attempts >= self.config.max_attempts {
            return vec![SocketEffect::Emit(SocketEvent::ReconnectFailed {
                attempts: self.attempts,
            })];
        }
        self.attempts += 1;
        self.reconnect_pending = true;
        let attempt = self.attempts;
        let delay = self.config.delay_for_attempt(attempt);
        vec![
            SocketEffect::Emit(SocketEvent::Reconnecting { attempt, delay }),
            SocketEffect::ScheduleReconnect { attempt, delay },
        ]
    }

    fn cancel_reconnect(&mut self) -> Vec<SocketEffect> {
        if std::mem::take(&mut self.reconnect_pending) {
            vec![SocketEffect::CancelReconnect]
        } else {
            Vec::new()
        }
    }
}
