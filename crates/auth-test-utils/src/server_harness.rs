//! Test server harness for E2E testing
//!
//! Provides TestAuthServer for spawning real auth server instances in tests.
//! The router and workflows are the production ones; the directory, the
//! session store and the notifier are in-memory so no Postgres, Redis or
//! mailer is needed.

use crate::fixtures::{test_codec, test_settings};
use auth_service::config::AuthSettings;
use auth_service::crypto::{self, codec::TokenCodec};
use auth_service::handlers::auth_handler::AppState;
use auth_service::models::{Principal, TokenPair};
use auth_service::repositories::principals::mock::InMemoryDirectory;
use auth_service::repositories::session_store::mock::InMemorySessionStore;
use auth_service::routes;
use auth_service::services::auth_service::AuthService;
use auth_service::services::notification::mock::RecordingNotifier;
use auth_service::services::session_registry::SessionRegistry;
use common::secret::SecretString;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Test harness for spawning the auth server in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_e2e() -> Result<()> {
///     let server = TestAuthServer::spawn().await?;
///     server.seed_principal("ana@example.com", "pw", None).await?;
///
///     let response = server
///         .client()
///         .post(format!("{}/api/v1/auth/login", server.url()))
///         .json(&serde_json::json!({"email": "ana@example.com", "password": "pw"}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    directory: InMemoryDirectory,
    store: InMemorySessionStore,
    notifier: RecordingNotifier,
    settings: AuthSettings,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestAuthServer {
    /// Spawn a server whose notifier records every code it is handed.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_notifier(RecordingNotifier::new()).await
    }

    /// Spawn a server with a specific notifier, e.g. `RecordingNotifier::failing()`.
    ///
    /// The server binds to a random available port (127.0.0.1:0) and runs
    /// in the background until dropped.
    pub async fn spawn_with_notifier(notifier: RecordingNotifier) -> Result<Self, anyhow::Error> {
        let directory = InMemoryDirectory::new();
        let store = InMemorySessionStore::new();
        let settings = test_settings();

        let auth = AuthService::new(
            Arc::new(directory.clone()),
            SessionRegistry::new(Arc::new(store.clone())),
            test_codec(),
            Arc::new(notifier.clone()),
            settings.clone(),
        );
        let state = Arc::new(AppState { auth });

        // Initialize metrics recorder for test server
        // Note: This may fail if already installed in the test process.
        // In that case, we create a new recorder without installing it globally.
        let metrics_handle = match routes::init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            directory,
            store,
            notifier,
            settings,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of an endpoint under `/api/v1/auth`
    pub fn auth_url(&self, path: &str) -> String {
        format!("http://{}/api/v1/auth/{}", self.addr, path.trim_start_matches('/'))
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn directory(&self) -> &InMemoryDirectory {
        &self.directory
    }

    pub fn store(&self) -> &InMemorySessionStore {
        &self.store
    }

    pub fn notifier(&self) -> &RecordingNotifier {
        &self.notifier
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Codec sharing the server's signing secret
    pub fn codec(&self) -> TokenCodec {
        test_codec()
    }

    /// Create an active principal with a random ID.
    pub async fn seed_principal(
        &self,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<Principal, anyhow::Error> {
        self.seed_principal_with_id(Uuid::new_v4(), email, password, role)
            .await
    }

    /// Create an active principal with a fixed ID.
    pub async fn seed_principal_with_id(
        &self,
        id: Uuid,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<Principal, anyhow::Error> {
        let password_hash = crypto::hash_password(
            &SecretString::from(password.to_string()),
            self.settings.bcrypt_cost,
        )?;

        let principal = Principal {
            id,
            email: email.to_string(),
            password_hash,
            is_active: true,
            role: role.map(str::to_string),
        };
        self.directory.insert(principal.clone()).await;

        Ok(principal)
    }

    /// Log in over HTTP and return the issued pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, anyhow::Error> {
        let response = self
            .client
            .post(self.auth_url("login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Login failed with status {}", response.status());
        }

        Ok(response.json().await?)
    }

    /// Most recent one-time code handed to the notifier for `email`.
    ///
    /// Codes are delivered on a background task after the forgot-password
    /// response, so this waits for the first delivery.
    pub async fn last_otp(&self, email: &str) -> Option<String> {
        self.notifier.last_code_for(email).await
    }

    /// The `n`th one-time code (1-based) handed to the notifier for `email`.
    pub async fn nth_otp(&self, email: &str, n: usize) -> Option<String> {
        self.notifier.nth_code_for(email, n).await
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends.
        self._handle.abort();
    }
}
