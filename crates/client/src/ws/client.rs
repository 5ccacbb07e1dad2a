//! Tokio driver for [`ConnectionMachine`] over tokio-tungstenite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use campus_shared::SocketFrame;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::listeners::{ListenerId, Listeners};
use super::machine::{ConnectionMachine, SocketEffect, SocketInput};
use super::{socket_url, ConnectionState, ReconnectConfig};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    url: String,
    scope: String,
    machine: Mutex<ConnectionMachine>,
    listeners: Listeners,
    state: watch::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Bumped per transport; inputs from older transports are ignored.
    generation: AtomicU64,
}

/// One logical real-time connection for a (scope, token) pair.
///
/// Clones share the connection. Must be used inside a tokio runtime.
#[derive(Clone)]
pub struct SocketClient {
    shared: Arc<Shared>,
}

impl SocketClient {
    pub fn new(ws_url: &str, scope: &str, token: &str, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            shared: Arc::new(Shared {
                url: socket_url(ws_url, scope, token),
                scope: scope.to_string(),
                machine: Mutex::new(ConnectionMachine::new(reconnect)),
                listeners: Listeners::new(),
                state,
                outbound: Mutex::new(None),
                timer: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn scope(&self) -> &str {
        &self.shared.scope
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Observe state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Register a listener for a frame type, a lifecycle event
    /// (`connected`, `disconnected`, `error`, `reconnecting`,
    /// `reconnect_failed`) or `message` for every inbound frame.
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&SocketFrame) + Send + Sync + 'static,
    {
        self.shared.listeners.on(event, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.listeners.off(id)
    }

    /// Open the connection. Also the manual resume after reconnects gave up.
    pub fn connect(&self) {
        self.apply(SocketInput::Connect);
    }

    /// Close the transport, drop every listener and cancel a pending
    /// reconnect. The client is idle when this returns.
    pub fn disconnect(&self) {
        self.apply(SocketInput::Disconnect);
    }

    /// Send `{"type": kind, "data": data}`. While not open the frame is
    /// logged and dropped; nothing is queued for later.
    pub fn send(&self, kind: &str, data: serde_json::Value) -> bool {
        if !self.is_connected() {
            crate::log_warn!("socket {} not open, dropping '{}' frame", self.shared.scope, kind);
            return false;
        }
        let text = match serde_json::to_string(&SocketFrame::new(kind, data)) {
            Ok(text) => text,
            Err(e) => {
                crate::log_error!("failed to encode '{}' frame: {}", kind, e);
                return false;
            }
        };
        match lock(&self.shared.outbound).as_ref() {
            Some(tx) => tx.send(Message::Text(text.into())).is_ok(),
            None => false,
        }
    }

    fn apply(&self, input: SocketInput) {
        let (effects, state) = {
            let mut machine = lock(&self.shared.machine);
            let effects = machine.handle(input);
            (effects, machine.state())
        };
        self.shared.state.send_replace(state);
        for effect in effects {
            self.execute(effect);
        }
    }

    /// Feed an input from transport `generation`, unless it was superseded.
    fn apply_from(&self, generation: u64, input: SocketInput) {
        if self.shared.generation.load(Ordering::SeqCst) != generation {
            crate::log_debug!("ignoring {:?} from stale transport", input);
            return;
        }
        self.apply(input);
    }

    fn execute(&self, effect: SocketEffect) {
        match effect {
            SocketEffect::OpenTransport => {
                let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let (tx, rx) = mpsc::unbounded_channel();
                *lock(&self.shared.outbound) = Some(tx);
                crate::log_info!("connecting socket {}", self.shared.scope);
                tokio::spawn(self.clone().run_transport(generation, rx));
            }
            SocketEffect::CloseTransport => {
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
                if let Some(tx) = lock(&self.shared.outbound).take() {
                    let _ = tx.send(Message::Close(None));
                }
                self.apply(SocketInput::Closed {
                    reason: "client disconnect".to_string(),
                });
            }
            SocketEffect::ScheduleReconnect { attempt, delay } => {
                crate::log_info!(
                    "reconnecting socket {} in {:?} (attempt {})",
                    self.shared.scope,
                    delay,
                    attempt
                );
                let client = self.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    client.apply(SocketInput::ReconnectDue);
                });
                if let Some(old) = lock(&self.shared.timer).replace(handle) {
                    old.abort();
                }
            }
            SocketEffect::CancelReconnect => {
                if let Some(timer) = lock(&self.shared.timer).take() {
                    timer.abort();
                }
            }
            SocketEffect::ClearListeners => self.shared.listeners.clear(),
            SocketEffect::Emit(event) => {
                crate::log_debug!("socket {}: {:?}", self.shared.scope, event);
                self.shared.listeners.emit(event.name(), &event.to_frame());
            }
        }
    }

    async fn run_transport(self, generation: u64, mut outbound: mpsc::UnboundedReceiver<Message>) {
        let stream = match connect_async(self.shared.url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                crate::log_error!("socket {} failed to connect: {}", self.shared.scope, e);
                self.apply_from(generation, SocketInput::Failed { error: e.to_string() });
                return;
            }
        };
        self.apply_from(generation, SocketInput::Opened);

        let (mut write, mut read) = stream.split();
        let ended = loop {
            tokio::select! {
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if self.shared.generation.load(Ordering::SeqCst) == generation {
                            self.shared.listeners.dispatch_text(&text);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                            .unwrap_or_else(|| "closed by server".to_string());
                        break SocketInput::Closed { reason };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SocketInput::Failed { error: e.to_string() },
                    None => break SocketInput::Closed { reason: "stream ended".to_string() },
                },
                queued = outbound.recv() => match queued {
                    Some(message) => {
                        let closing = matches!(message, Message::Close(_));
                        if let Err(e) = write.send(message).await {
                            break SocketInput::Failed { error: e.to_string() };
                        }
                        if closing {
                            break SocketInput::Closed { reason: "client disconnect".to_string() };
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        break SocketInput::Closed { reason: "client disconnect".to_string() };
                    }
                },
            }
        };

        crate::log_info!("socket {} ended: {:?}", self.shared.scope, ended);
        self.apply_from(generation, ended);
    }
}

/// Hands out one [`SocketClient`] per (scope, token).
#[derive(Clone)]
pub struct SocketRegistry {
    ws_url: String,
    reconnect: ReconnectConfig,
    sockets: Arc<Mutex<HashMap<(String, String), SocketClient>>>,
}

impl SocketRegistry {
    pub fn new(ws_url: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect,
            sockets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The socket for `scope` under `token`, created on first use.
    pub fn socket(&self, scope: &str, token: &str) -> SocketClient {
        lock(&self.sockets)
            .entry((scope.to_string(), token.to_string()))
            .or_insert_with(|| SocketClient::new(&self.ws_url, scope, token, self.reconnect.clone()))
            .clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.sockets).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnect and forget every socket.
    pub fn disconnect_all(&self) {
        let sockets: Vec<SocketClient> = lock(&self.sockets).drain().map(|(_, s)| s).collect();
        for socket in sockets {
            socket.disconnect();
        }
    }
}
