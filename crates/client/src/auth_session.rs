//! Sign-in/sign-out across the identity provider and the backend cookie
//! session, with the session persisted between runs.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use campus_shared::{ApiError, SessionRequest, SessionResponse, User};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::api_client::ApiClient;
use crate::config::SupabaseConfig;
use crate::storage::Storage;

const STORAGE_KEY: &str = "campus_session";
const SESSION_PATH: &str = "/auth/session";

/// Tokens issued by the identity provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Stored session data
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub csrf_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider is not configured")]
    NotConfigured,
    #[error("sign-in rejected: {0}")]
    Provider(ApiError),
    #[error("backend session failed: {0}")]
    Session(ApiError),
}

/// Third-party identity service that turns credentials into an access token.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, ApiError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError>;
}

/// Supabase GoTrue password grant.
#[derive(Debug, Clone)]
pub struct SupabaseAuth {
    http: Client,
    config: SupabaseConfig,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn check(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        if status.is_success() {
            return Ok(body);
        }
        // A 401 here means bad credentials, not an expired campus session.
        let status = status.as_u16();
        Err(if status >= 500 {
            ApiError::Server { status, body }
        } else {
            ApiError::Client { status, body }
        })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, ApiError> {
        let response = self
            .http
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let body = Self::check(response).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check(response).await.map(|_| ())
    }
}

/// Owns the signed-in session and keeps the transport's credentials in step
/// with it.
#[derive(Clone)]
pub struct AuthManager {
    provider: Option<Arc<dyn IdentityProvider>>,
    api: ApiClient,
    storage: Option<Storage>,
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl AuthManager {
    pub fn new(provider: Option<Arc<dyn IdentityProvider>>, api: ApiClient, storage: Option<Storage>) -> Self {
        Self {
            provider,
            api,
            storage,
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    pub fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    fn install(&self, session: Option<AuthSession>) {
        match &session {
            Some(s) => {
                self.api.set_access_token(Some(s.access_token.clone()));
                self.api.set_csrf_token(Some(s.csrf_token.clone()));
            }
            None => self.api.clear_credentials(),
        }
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Reload a persisted session and put its tokens back on the transport.
    pub fn restore(&self) -> Option<AuthSession> {
        let session: AuthSession = self.storage.as_ref()?.load(STORAGE_KEY)?;
        crate::log_info!("restored session for {}", session.user.email);
        self.install(Some(session.clone()));
        Some(session)
    }

    /// Exchange credentials with the identity provider, then open the
    /// backend cookie session and keep its CSRF token.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let provider = self.provider.as_ref().ok_or(AuthError::NotConfigured)?;
        let tokens = provider
            .sign_in(email, password)
            .await
            .map_err(AuthError::Provider)?;

        self.api.set_access_token(Some(tokens.access_token.clone()));
        let request = SessionRequest {
            access_token: tokens.access_token.clone(),
        };
        let response: SessionResponse = match self.api.post_json(SESSION_PATH, &request).await {
            Ok(response) => response,
            Err(e) => {
                crate::log_error!("backend session for {} failed: {}", email, e);
                self.api.clear_credentials();
                if let Err(e) = provider.sign_out(&tokens.access_token).await {
                    crate::log_warn!("provider sign-out after failed session: {}", e);
                }
                return Err(AuthError::Session(e));
            }
        };

        let session = AuthSession {
            user: response.user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            csrf_token: response.csrf_token,
        };
        self.install(Some(session.clone()));
        if let Some(storage) = &self.storage {
            if !storage.save(STORAGE_KEY, &session) {
                crate::log_warn!("session for {} not persisted", session.user.email);
            }
        }
        crate::log_info!("signed in as {}", session.user.email);
        Ok(session)
    }

    /// End the provider session and the backend cookie session. Local state
    /// is cleared even when a remote step fails; the first failure is
    /// returned.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.session();
        let mut first_error = None;

        if session.is_some() {
            if let Err(e) = self.api.delete(SESSION_PATH).await {
                crate::log_warn!("backend sign-out failed: {}", e);
                first_error.get_or_insert(AuthError::Session(e));
            }
        }
        if let (Some(provider), Some(session)) = (&self.provider, &session) {
            if let Err(e) = provider.sign_out(&session.access_token).await {
                crate::log_warn!("provider sign-out failed: {}", e);
                first_error.get_or_insert(AuthError::Provider(e));
            }
        }

        self.forget();
        first_error.map_or(Ok(()), Err)
    }

    /// Drop the local session without contacting anyone, e.g. after a 401.
    pub fn forget(&self) {
        self.install(None);
        if let Some(storage) = &self.storage {
            storage.remove(STORAGE_KEY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::CSRF_HEADER;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct FakeProvider {
        signed_out: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, ApiError> {
            if password == "wrong" {
                return Err(ApiError::Client {
                    status: 400,
                    body: format!("invalid login for {email}"),
                });
            }
            Ok(ProviderSession {
                access_token: "jwt-1".into(),
                refresh_token: Some("r-1".into()),
                expires_in: Some(3600),
            })
        }

        async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
            self.signed_out.lock().unwrap().push(access_token.to_string());
            Ok(())
        }
    }

    fn user_json() -> serde_json::Value {
        json!({
            "id": uuid::Uuid::nil(),
            "email": "ada@example.edu",
            "full_name": "Ada",
            "role": "student",
            "avatar_url": null
        })
    }

    #[tokio::test]
    async fn sign_in_installs_tokens_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/session"))
            .and(body_json(json!({"access_token": "jwt-1"})))
            .and(header("Authorization", "Bearer jwt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": user_json(),
                "csrf_token": "csrf-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let api = ApiClient::new().with_base_url(server.uri());
        let provider = Arc::new(FakeProvider::default());
        let auth = AuthManager::new(Some(provider), api.clone(), Some(Storage::at(dir.path())));

        let session = auth.sign_in("ada@example.edu", "pw").await.unwrap();
        assert_eq!(session.csrf_token, "csrf-1");
        assert_eq!(api.credentials().csrf_token.as_deref(), Some("csrf-1"));

        // A fresh manager over the same storage picks the session back up.
        let api2 = ApiClient::new();
        let restored = AuthManager::new(None, api2.clone(), Some(Storage::at(dir.path())));
        assert_eq!(restored.restore().map(|s| s.user.email), Some("ada@example.edu".into()));
        assert_eq!(api2.credentials().access_token.as_deref(), Some("jwt-1"));
    }

    #[tokio::test]
    async fn provider_rejection_leaves_transport_clean() {
        let api = ApiClient::new().with_base_url("http://127.0.0.1:9");
        let auth = AuthManager::new(Some(Arc::new(FakeProvider::default())), api.clone(), None);

        let err = auth.sign_in("ada@example.edu", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Provider(ApiError::Client { status: 400, .. })));
        assert_eq!(api.credentials(), Default::default());
    }

    #[tokio::test]
    async fn sign_out_clears_local_state_even_if_backend_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": user_json(),
                "csrf_token": "csrf-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/auth/session"))
            .and(header(CSRF_HEADER, "csrf-1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let api = ApiClient::new().with_base_url(server.uri());
        let provider = Arc::new(FakeProvider::default());
        let auth = AuthManager::new(Some(provider.clone()), api.clone(), Some(Storage::at(dir.path())));
        auth.sign_in("ada@example.edu", "pw").await.unwrap();

        let err = auth.sign_out().await.unwrap_err();
        assert!(matches!(err, AuthError::Session(ApiError::Server { status: 500, .. })));
        assert!(!auth.is_authenticated());
        assert_eq!(api.credentials(), Default::default());
        assert_eq!(*provider.signed_out.lock().unwrap(), vec!["jwt-1".to_string()]);
        assert!(!Storage::at(dir.path()).exists(STORAGE_KEY));
    }

    #[tokio::test]
    async fn supabase_password_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-9",
                "refresh_token": "r-9",
                "expires_in": 3600,
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let supabase = SupabaseAuth::new(SupabaseConfig {
            url: server.uri(),
            anon_key: "anon".into(),
        });
        let session = supabase.sign_in("ada@example.edu", "pw").await.unwrap();
        assert_eq!(session.access_token, "jwt-9");

        let other = SupabaseAuth::new(SupabaseConfig {
            url: server.uri(),
            anon_key: "wrong".into(),
        });
        let err = other.sign_in("ada@example.edu", "pw").await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }
}
