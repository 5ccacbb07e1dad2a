//! Campus Client - data layer for the campus learning platform
//!
//! This crate contains everything a front-end needs to talk to the campus
//! backend: a typed REST transport, per-domain CRUD APIs, a keyed query
//! cache with stale-while-revalidate reads, reconnecting WebSocket clients
//! and the session lifecycle around them. [`ClientContext`] wires it all
//! together over one [`ClientConfig`].

#[macro_use]
pub mod logging;

pub mod api;
pub mod api_client;
pub mod auth_session;
pub mod config;
pub mod context;
pub mod crud;
pub mod hooks;
pub mod query;
pub mod storage;
pub mod ws;

pub use api_client::ApiClient;
pub use auth_session::{AuthError, AuthManager, AuthSession, IdentityProvider, SupabaseAuth};
pub use config::{ClientConfig, ConfigError};
pub use context::ClientContext;
pub use query::{Query, QueryClient, QueryKey, QueryState, QueryStatus};
pub use storage::Storage;
pub use ws::{ConnectionState, ReconnectConfig, SocketClient, SocketRegistry};
