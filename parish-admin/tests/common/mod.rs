//! Shared setup for parish-admin integration tests: a scripted identity
//! provider, the in-memory role directory, and a real homily API served on
//! an ephemeral port.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use homily_api::{
    config::{
        ApiConfig, JwtConfig, RateLimitConfig, SecurityConfig, StorageBackend, StorageConfig,
        SwaggerConfig, SwaggerMode,
    },
    models::{ApiUser, Homily},
    services::{HomilyStore, JwtService, MemoryStore, UserStore},
    utils::hash_password,
};
use http_body_util::BodyExt;
use parish_admin::config::{AncillarySettings, ServerSettings};
use parish_admin::models::{HostedSession, HostedUser};
use parish_admin::services::{
    HomilyApiClient, IdentityProvider, MemoryRoleDirectory, ProviderError, SignUpOutcome,
};
use parish_admin::startup::build_router;
use parish_admin::AppState;
use secrecy::{ExposeSecret, Secret};
use service_core::authz::Role;
use service_core::config::{Config, Environment};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct horse battery";
const HOMILY_API_SECRET: &str = "test-secret-with-at-least-32-bytes!!";

/// Identity provider double. Accounts are registered up front; issued
/// access tokens stay valid until revoked or until `reject_sessions` is set.
#[derive(Default)]
pub struct FakeIdentityProvider {
    accounts: Mutex<HashMap<String, HostedUser>>,
    sessions: Mutex<HashMap<String, HostedUser>>,
    signed_out: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    reject_sessions: AtomicBool,
}

impl FakeIdentityProvider {
    pub fn add_account(&self, email: &str) -> HostedUser {
        let user = HostedUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), user.clone());
        user
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_reject_sessions(&self, reject: bool) {
        self.reject_sessions.store(reject, Ordering::SeqCst);
    }

    pub fn signed_out_count(&self) -> usize {
        self.signed_out.lock().unwrap().len()
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ProviderError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn issue(&self, user: &HostedUser) -> HostedSession {
        let token = format!("access-{}", Uuid::new_v4());
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), user.clone());
        HostedSession {
            access_token: token,
            refresh_token: None,
            expires_at: Utc::now().timestamp() + 3600,
            user: user.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<HostedSession, ProviderError> {
        self.check_available()?;
        let user = self.accounts.lock().unwrap().get(email).cloned();
        match user {
            Some(user) if password.expose_secret() == TEST_PASSWORD => Ok(self.issue(&user)),
            _ => Err(ProviderError::InvalidCredentials),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &Secret<String>,
    ) -> Result<SignUpOutcome, ProviderError> {
        self.check_available()?;
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(ProviderError::Rejected("User already registered".to_string()));
        }
        let user = self.add_account(email);
        Ok(SignUpOutcome::SignedIn(self.issue(&user)))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        self.check_available()?;
        self.sessions.lock().unwrap().remove(access_token);
        self.signed_out
            .lock()
            .unwrap()
            .insert(access_token.to_string());
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<HostedUser, ProviderError> {
        self.check_available()?;
        if self.reject_sessions.load(Ordering::SeqCst) {
            return Err(ProviderError::InvalidCredentials);
        }
        self.sessions
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or(ProviderError::InvalidCredentials)
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<HostedSession, ProviderError> {
        Err(ProviderError::InvalidCredentials)
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), ProviderError> {
        self.check_available()
    }
}

/// A homily API instance listening on 127.0.0.1 with in-memory storage.
pub struct HomilyApiServer {
    pub url: String,
    pub store: Arc<MemoryStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HomilyApiServer {
    pub async fn spawn() -> Self {
        let config = homily_api_config();
        let store = Arc::new(MemoryStore::new());
        let jwt = JwtService::new(&config.jwt).expect("jwt service");
        let login_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
            &config.rate_limit.trusted_proxies,
        );
        let ip_limiter = create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
            &config.rate_limit.trusted_proxies,
        );
        let state = homily_api::AppState::new(
            config,
            jwt,
            store.clone(),
            store.clone(),
            login_limiter,
            ip_limiter,
        );
        let router = homily_api::build_router(state).expect("router");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .await
            .expect("homily api server");
        });

        Self {
            url: format!("http://{}", addr),
            store,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub async fn create_user(&self, email: &str, role: Role) -> ApiUser {
        let hash = hash_password(&Secret::new(TEST_PASSWORD.to_string())).expect("hash");
        let user = ApiUser::new(email, hash, role);
        UserStore::insert(self.store.as_ref(), &user)
            .await
            .expect("insert user");
        user
    }

    pub async fn publish_homily(&self, title: &str) -> Homily {
        let now = Utc::now();
        let homily = Homily {
            id: Uuid::new_v4(),
            title: title.to_string(),
            preached_on: NaiveDate::from_ymd_opt(2024, 3, 24).expect("date"),
            priest: Some("ks. Jan".to_string()),
            audio_url: "https://cdn.parafia.example/homilies/2024-03-24.mp3".to_string(),
            duration_seconds: Some(900),
            description: None,
            published: true,
            created_at: now,
            updated_at: now,
        };
        HomilyStore::insert(self.store.as_ref(), &homily)
            .await
            .expect("insert homily");
        homily
    }

    /// Stop accepting connections and wait for the server to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

fn homily_api_config() -> ApiConfig {
    ApiConfig {
        common: Config { port: 0 },
        environment: Environment::Dev,
        service_name: "homily-api-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new(HOMILY_API_SECRET.to_string()),
            expiry_hours: 24,
        },
        admin_bootstrap: None,
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 10,
            login_window_seconds: 900,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
            // parish-admin connects from loopback and forwards the visitor.
            trusted_proxies: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// The parish-admin router plus a cookie jar holding one session cookie.
/// Requests arrive from `peer`, one browser per app.
pub struct TestApp {
    pub router: Router,
    pub identity: Arc<FakeIdentityProvider>,
    pub roles: Arc<MemoryRoleDirectory>,
    peer: SocketAddr,
    cookie: Mutex<Option<String>>,
}

impl TestApp {
    /// App wired to a homily API at `ancillary_url`.
    pub fn new(ancillary_url: &str) -> Self {
        let identity = Arc::new(FakeIdentityProvider::default());
        let roles = Arc::new(MemoryRoleDirectory::new());
        let ancillary = Arc::new(
            HomilyApiClient::new(&AncillarySettings {
                url: ancillary_url.to_string(),
            })
            .expect("homily api client"),
        );

        let state = AppState::new(identity.clone(), roles.clone(), ancillary);
        let server = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            secure_cookies: false,
            session_hours: 24,
            trusted_proxies: Vec::new(),
        };

        Self {
            router: build_router(state, &server),
            identity,
            roles,
            peer: SocketAddr::from(([203, 0, 113, 1], 50_000)),
            cookie: Mutex::new(None),
        }
    }

    /// Same app, seen from a browser at `ip`.
    pub fn from_peer(mut self, ip: &str) -> Self {
        let ip: IpAddr = ip.parse().expect("peer ip");
        self.peer = SocketAddr::new(ip, 50_000);
        self
    }

    /// App whose homily API address has nothing listening.
    pub fn without_ancillary() -> Self {
        Self::new("http://127.0.0.1:9")
    }

    /// A hosted account holding `roles`, registered with the provider.
    pub fn hosted_account(&self, email: &str, roles: &[Role]) -> HostedUser {
        let user = self.identity.add_account(email);
        self.roles.seed(&user, roles).expect("seed roles");
        user
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = self
            .with_cookie(Request::builder().method("GET").uri(uri))
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    pub async fn post_form(&self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        let body = serde_urlencoded::to_string(form).expect("form body");
        let request = self
            .with_cookie(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    pub async fn sign_in(&self, email: &str) -> TestResponse {
        self.post_form("/login", &[("email", email), ("password", TEST_PASSWORD)])
            .await
    }

    pub async fn podcast_sign_in(&self, email: &str) -> TestResponse {
        self.post_form("/podcast/login", &[("email", email), ("password", TEST_PASSWORD)])
            .await
    }

    fn with_cookie(&self, builder: axum::http::request::Builder) -> axum::http::request::Builder {
        match self.cookie.lock().unwrap().as_deref() {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&self, mut request: Request<Body>) -> TestResponse {
        request.extensions_mut().insert(ConnectInfo(self.peer));
        let response = self.router.clone().oneshot(request).await.expect("response");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            let pair = set_cookie.split(';').next().unwrap_or_default().trim();
            *self.cookie.lock().unwrap() = Some(pair.to_string());
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();

        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
