//! HTTP API client: bearer/CSRF credentials, status classification and the
//! global 401 interceptor.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use campus_shared::ApiError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Header carrying the CSRF token on state-changing requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Credentials attached to outgoing requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Sent as `Authorization: Bearer <token>`.
    pub access_token: Option<String>,
    /// Present while a cookie session is active.
    pub csrf_token: Option<String>,
}

/// Called after a 401 cleared the credentials (logout + redirect to login).
pub type AuthExpiredHandler = Arc<dyn Fn() + Send + Sync>;

/// HTTP client for the campus REST API.
///
/// Cloning is cheap; clones share the connection pool, cookie jar and
/// credentials.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<RwLock<Credentials>>,
    on_auth_expired: Arc<RwLock<Option<AuthExpiredHandler>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.credentials().access_token.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        let client = Client::builder().cookie_store(true).build().unwrap_or_else(|e| {
            crate::log_warn!("cookie-enabled HTTP client unavailable ({e}), using defaults");
            Client::new()
        });
        Self {
            client,
            base_url: String::new(),
            credentials: Arc::new(RwLock::new(Credentials::default())),
            on_auth_expired: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the base URL for API requests (`{origin}/api/{version}`)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_access_token(&self, token: Option<String>) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token = token;
    }

    pub fn set_csrf_token(&self, token: Option<String>) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .csrf_token = token;
    }

    pub fn clear_credentials(&self) {
        *self.credentials.write().unwrap_or_else(PoisonError::into_inner) = Credentials::default();
    }

    /// Register the handler run by the 401 interceptor.
    pub fn set_auth_expired_handler(&self, handler: impl Fn() + Send + Sync + 'static) {
        *self
            .on_auth_expired
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let text = self.send(Method::GET, path, None::<&()>, None).await?;
        decode(&text)
    }

    /// Make a GET request with query parameters
    pub async fn get_json_with_query<Q, TRes>(&self, path: &str, query: &Q) -> Result<TRes, ApiError>
    where
        Q: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let text = self.send(Method::GET, path, Some(query), None).await?;
        decode(&text)
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq, TRes>(&self, path: &str, body: &TReq) -> Result<TRes, ApiError>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let text = self
            .send(Method::POST, path, None::<&()>, Some(encode(body)?))
            .await?;
        decode(&text)
    }

    /// Make a POST request with JSON body and query parameters
    pub async fn post_json_with_query<TReq, Q, TRes>(
        &self,
        path: &str,
        body: &TReq,
        query: &Q,
    ) -> Result<TRes, ApiError>
    where
        TReq: Serialize + ?Sized,
        Q: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let text = self
            .send(Method::POST, path, Some(query), Some(encode(body)?))
            .await?;
        decode(&text)
    }

    /// Make a PUT request with JSON body
    pub async fn put_json<TReq, TRes>(&self, path: &str, body: &TReq) -> Result<TRes, ApiError>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let text = self
            .send(Method::PUT, path, None::<&()>, Some(encode(body)?))
            .await?;
        decode(&text)
    }

    /// Make a PATCH request with JSON body
    pub async fn patch_json<TReq, TRes>(&self, path: &str, body: &TReq) -> Result<TRes, ApiError>
    where
        TReq: Serialize + ?Sized,
        TRes: DeserializeOwned,
    {
        let text = self
            .send(Method::PATCH, path, None::<&()>, Some(encode(body)?))
            .await?;
        decode(&text)
    }

    /// Make a DELETE request. The response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None::<&()>, None).await?;
        Ok(())
    }

    async fn send<Q: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<Vec<u8>>,
    ) -> Result<String, ApiError> {
        let url = self.url(path);
        let state_changing = method != Method::GET && method != Method::HEAD && method != Method::OPTIONS;
        let mut rb = self.client.request(method.clone(), &url);

        if let Some(query) = query {
            rb = rb.query(query);
        }

        let creds = self.credentials();
        if let Some(token) = creds.access_token.as_deref() {
            rb = rb.bearer_auth(token);
        }
        if state_changing {
            if let Some(csrf) = creds.csrf_token.as_deref() {
                rb = rb.header(CSRF_HEADER, csrf);
            }
        }

        if let Some(body) = body {
            rb = rb.header(CONTENT_TYPE, "application/json").body(body);
        }

        crate::log_debug!("{} {}", method, url);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(self.reject(status, path, text, state_changing));
        }

        Ok(text)
    }

    /// Classify a failed response and run the cross-cutting side effects.
    fn reject(&self, status: u16, path: &str, body: String, state_changing: bool) -> ApiError {
        let err = ApiError::from_status(status, path, body, state_changing);
        match &err {
            ApiError::AuthExpired => {
                crate::log_warn!("401 on {path}, clearing credentials");
                self.clear_credentials();
                let handler = self
                    .on_auth_expired
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(handler) = handler {
                    handler();
                }
            }
            ApiError::CsrfInvalid(_) => {
                crate::log_warn!("CSRF token rejected on {path}");
            }
            _ => {}
        }
        err
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

fn encode<T: Serialize + ?Sized>(body: &T) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| ApiError::Deserialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn url_joins_base_and_path() {
        let client = ApiClient::new().with_base_url("http://localhost:8000/api/v1/");
        assert_eq!(client.url("/courses"), "http://localhost:8000/api/v1/courses");
        assert_eq!(client.url("notes/1"), "http://localhost:8000/api/v1/notes/1");
        assert_eq!(client.url("https://other.host/x"), "https://other.host/x");
        assert_eq!(ApiClient::new().url("courses"), "/courses");
    }

    #[tokio::test]
    async fn csrf_header_only_on_state_changing_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/notes"))
            .and(header(CSRF_HEADER, "csrf-1"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new().with_base_url(server.uri());
        client.set_access_token(Some("tok".into()));
        client.set_csrf_token(Some("csrf-1".into()));

        let _: Vec<serde_json::Value> = client.get_json("/notes").await.unwrap();
        let _: serde_json::Value = client.post_json("/notes", &serde_json::json!({})).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let get = requests.iter().find(|r| r.method.as_str() == "GET").unwrap();
        assert!(!get.headers.contains_key(CSRF_HEADER));
        assert!(get.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn unauthorized_clears_credentials_and_runs_handler() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = ApiClient::new().with_base_url(server.uri());
        client.set_access_token(Some("tok".into()));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        client.set_auth_expired_handler(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let err = client.get_json::<serde_json::Value>("/me").await.unwrap_err();
        assert_eq!(err, ApiError::AuthExpired);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.credentials(), Credentials::default());
    }

    #[tokio::test]
    async fn forbidden_mutation_is_csrf_invalid_without_logout() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad csrf"))
            .mount(&server)
            .await;

        let client = ApiClient::new().with_base_url(server.uri());
        client.set_access_token(Some("tok".into()));

        let err = client.delete("/notes/1").await.unwrap_err();
        assert_eq!(err, ApiError::CsrfInvalid("bad csrf".into()));
        assert_eq!(client.credentials().access_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = ApiClient::new().with_base_url("http://127.0.0.1:9");
        let err = client.get_json::<serde_json::Value>("/x").await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
