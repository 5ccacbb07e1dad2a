//! Everything a front-end needs, wired together once per process.

use std::sync::Arc;

use crate::api::Apis;
use crate::api_client::ApiClient;
use crate::auth_session::{AuthError, AuthManager, AuthSession, IdentityProvider, SupabaseAuth};
use crate::config::ClientConfig;
use crate::query::{Clock, QueryClient, SystemClock};
use crate::storage::Storage;
use crate::ws::{SocketClient, SocketRegistry};

/// Transport, domain APIs, query cache, sockets and auth over one config.
///
/// Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct ClientContext {
    pub config: ClientConfig,
    pub http: ApiClient,
    pub api: Apis,
    pub queries: QueryClient,
    pub sockets: SocketRegistry,
    pub auth: AuthManager,
}

impl ClientContext {
    /// Production wiring: platform storage, Supabase when configured, wall clock.
    pub fn new(config: ClientConfig) -> Self {
        let provider = config
            .supabase
            .clone()
            .map(|s| Arc::new(SupabaseAuth::new(s)) as Arc<dyn IdentityProvider>);
        Self::with_parts(config, Storage::platform(), provider, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: ClientConfig,
        storage: Option<Storage>,
        provider: Option<Arc<dyn IdentityProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let http = ApiClient::new().with_base_url(config.api_url.clone());
        let ctx = Self {
            api: Apis::new(&http),
            queries: QueryClient::with_clock(clock),
            sockets: SocketRegistry::new(config.ws_url.clone(), config.reconnect.clone()),
            auth: AuthManager::new(provider, http.clone(), storage),
            http,
            config,
        };

        // Global 401 interceptor: the transport already cleared its
        // credentials; drop everything derived from the old session.
        let auth = ctx.auth.clone();
        let queries = ctx.queries.clone();
        let sockets = ctx.sockets.clone();
        ctx.http.set_auth_expired_handler(move || {
            crate::log_warn!("session expired, signing out locally");
            auth.forget();
            queries.clear();
            sockets.disconnect_all();
        });
        ctx
    }

    /// Pick up a session persisted by an earlier run.
    pub fn restore_session(&self) -> Option<AuthSession> {
        self.auth.restore()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self.auth.sign_in(email, password).await?;
        // Nothing cached or connected under another identity survives.
        self.queries.clear();
        self.sockets.disconnect_all();
        Ok(session)
    }

    /// Sign out remotely and locally, drop the cache and close every socket.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.auth.sign_out().await;
        self.queries.clear();
        self.sockets.disconnect_all();
        result
    }

    /// The socket for `scope` under the current access token. `None` while
    /// signed out or when chat is disabled.
    pub fn socket(&self, scope: &str) -> Option<SocketClient> {
        if !self.config.enable_chat {
            return None;
        }
        let token = self.auth.access_token()?;
        Some(self.sockets.socket(scope, &token))
    }
}
