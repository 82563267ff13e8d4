//! Integration test helpers
//!
//! An in-process mock of the backend endpoints the access layer talks to.

#![allow(dead_code)]

use actfijo_core::ApiConfig;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const VALID_PASSWORD: &str = "correct-horse";

// Tracing is initialised once for the whole test binary
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

/// What the mock backend answers
pub struct MockBackend {
    pub permissions_status: StatusCode,
    pub permissions_body: Value,
    pub permissions_delay: Option<Duration>,
    pub roles_body: Value,
    /// Claims minted into tokens issued by `POST token/`
    pub roles_claim: Vec<String>,
    pub is_admin_claim: bool,
    pub theme: Mutex<Value>,
    pub seen: Mutex<Vec<SeenRequest>>,
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            permissions_status: StatusCode::OK,
            permissions_body: json!([]),
            permissions_delay: None,
            roles_body: json!([]),
            roles_claim: vec!["Empleado".to_string()],
            is_admin_claim: false,
            theme: Mutex::new(json!({
                "theme_preference": "dark",
                "theme_custom_color": "#6366F1",
                "theme_glow_enabled": false,
            })),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl MockBackend {
    pub fn with_permissions(permissions: &[&str]) -> Self {
        Self {
            permissions_body: json!(permissions),
            ..Self::default()
        }
    }

    pub fn failing(status: StatusCode) -> Self {
        Self {
            permissions_status: status,
            permissions_body: json!({"detail": "Server error"}),
            ..Self::default()
        }
    }

    fn record(&self, path: &str, headers: &HeaderMap) {
        let authorization = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.seen.lock().unwrap().push(SeenRequest {
            path: path.to_string(),
            authorization,
        });
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn theme(&self) -> Value {
        self.theme.lock().unwrap().clone()
    }
}

pub struct TestBackend {
    pub address: String,
    pub port: u16,
    pub state: Arc<MockBackend>,
}

impl TestBackend {
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            server_base_url: self.address.clone(),
            timeout_seconds: 1,
            ..ApiConfig::default()
        }
    }
}

pub async fn spawn_backend(mock: MockBackend) -> TestBackend {
    LazyLock::force(&TRACING);

    let state = Arc::new(mock);
    let app = Router::new()
        .route("/api/my-permissions/", get(my_permissions))
        .route("/api/roles/", get(roles))
        .route("/api/token/", post(token))
        .route("/api/me/theme/", patch(update_theme))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestBackend {
        address: format!("http://127.0.0.1:{}", port),
        port,
        state,
    }
}

/// An address nothing listens on
pub async fn unreachable_config() -> ApiConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    ApiConfig {
        server_base_url: format!("http://127.0.0.1:{}", port),
        timeout_seconds: 1,
        ..ApiConfig::default()
    }
}

/// Sign a token the way the backend would; the client never checks the key
pub fn mint_token(username: &str, roles: &[String], is_admin: bool, ttl_seconds: i64) -> String {
    encode(
        &Header::default(),
        &json!({
            "username": username,
            "email": format!("{}@empresa.bo", username),
            "nombre_completo": "Usuario de Prueba",
            "empresa_nombre": "Empresa Demo",
            "roles": roles,
            "is_admin": is_admin,
            "empleado_id": "3c0f9a",
            "theme_preference": "dark",
            "theme_custom_color": "#6366F1",
            "theme_glow_enabled": false,
            "exp": chrono::Utc::now().timestamp() + ttl_seconds,
        }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .unwrap()
}

async fn my_permissions(
    State(state): State<Arc<MockBackend>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.record("/api/my-permissions/", &headers);
    if let Some(delay) = state.permissions_delay {
        tokio::time::sleep(delay).await;
    }
    (state.permissions_status, Json(state.permissions_body.clone()))
}

async fn roles(State(state): State<Arc<MockBackend>>, headers: HeaderMap) -> Json<Value> {
    state.record("/api/roles/", &headers);
    Json(state.roles_body.clone())
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn token(
    State(state): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(credentials): Json<Credentials>,
) -> (StatusCode, Json<Value>) {
    state.record("/api/token/", &headers);
    if credentials.password != VALID_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        );
    }

    let access = mint_token(
        &credentials.username,
        &state.roles_claim,
        state.is_admin_claim,
        3600,
    );
    (
        StatusCode::OK,
        Json(json!({"access": access, "refresh": "refresh-token"})),
    )
}

async fn update_theme(
    State(state): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("/api/me/theme/", &headers);
    if !headers.contains_key(axum::http::header::AUTHORIZATION) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Authentication credentials were not provided."})),
        );
    }

    let mut theme = state.theme.lock().unwrap();
    if let (Some(current), Some(changes)) = (theme.as_object_mut(), patch.as_object()) {
        for (key, value) in changes {
            current.insert(key.clone(), value.clone());
        }
    }
    (StatusCode::OK, Json(theme.clone()))
}
