//! Event-emitter registry for socket frames.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use campus_shared::{SocketFrame, MESSAGE_EVENT};

type Handler = Arc<dyn Fn(&SocketFrame) + Send + Sync>;

/// Returned by [`Listeners::on`]; pass to [`Listeners::off`] to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners keyed by event name. Clones share the registry.
#[derive(Clone, Default)]
pub struct Listeners {
    handlers: Arc<Mutex<HashMap<String, Vec<(ListenerId, Handler)>>>>,
    next_id: Arc<AtomicU64>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&SocketFrame) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut handlers = self.lock();
        let mut found = false;
        handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            found |= list.len() != before;
            !list.is_empty()
        });
        found
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Call every listener for `event`. Handlers run with the registry
    /// unlocked, so they may register or remove listeners. A panicking
    /// handler is logged and skipped; the rest still run.
    pub fn emit(&self, event: &str, frame: &SocketFrame) {
        let snapshot: Vec<Handler> = self
            .lock()
            .get(event)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in snapshot {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(frame))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                crate::log_error!("'{}' listener panicked: {}", event, reason);
            }
        }
    }

    /// Deliver an inbound text frame: listeners for its type, then the
    /// generic `message` listeners. A frame that does not parse is logged
    /// and dropped. Returns whether it was delivered.
    pub fn dispatch_text(&self, text: &str) -> bool {
        match serde_json::from_str::<SocketFrame>(text) {
            Ok(frame) => {
                self.emit(&frame.kind, &frame);
                if frame.kind != MESSAGE_EVENT {
                    self.emit(MESSAGE_EVENT, &frame);
                }
                true
            }
            Err(e) => {
                crate::log_warn!("dropping malformed socket frame: {}", e);
                false
            }
        }
    }
}
