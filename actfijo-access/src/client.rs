//! HTTP client for the fixed-asset backend
//!
//! Implements the network half of the access layer: the permission list, the
//! role directory, token issuance and the theme preference update.

use crate::permissions::roles::RolesPayload;
use crate::permissions::{PermissionSet, PermissionSource, Role, RoleSource};
use crate::session::{ThemePatch, ThemePrefs};
use actfijo_core::{ActFijoError, ActFijoResult, ApiConfig, ErrorContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const MY_PERMISSIONS_ENDPOINT: &str = "my-permissions/";
const ROLES_ENDPOINT: &str = "roles/";
const TOKEN_ENDPOINT: &str = "token/";
const THEME_ENDPOINT: &str = "me/theme/";

/// Longest slice of an error body kept in error messages
const MAX_ERROR_BODY: usize = 200;

/// Tokens issued by `POST token/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// Everything the controller needs from the backend
#[async_trait]
pub trait AccessBackend: PermissionSource + RoleSource {
    /// Attach (or with `None`, drop) the bearer token sent on every request
    fn set_auth_token(&mut self, token: Option<&str>);

    /// Exchange credentials for a token pair
    async fn obtain_token(&self, username: &str, password: &str) -> ActFijoResult<TokenPair>;

    /// Persist theme preferences server-side; returns the confirmed values
    async fn update_theme(&self, patch: &ThemePatch) -> ActFijoResult<ThemePrefs>;
}

/// reqwest-backed [`AccessBackend`]
pub struct BackendClient {
    client: reqwest::Client,
    config: ApiConfig,
    auth_token: Option<String>,
}

impl BackendClient {
    pub fn new(config: ApiConfig) -> ActFijoResult<Self> {
        let client = create_http_client(&config)?;

        info!(base_url = %config.api_base_url(), "Created backend client");

        Ok(Self {
            client,
            config,
            auth_token: None,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn has_auth_token(&self) -> bool {
        self.auth_token.is_some()
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        let url = self.config.endpoint(endpoint);
        debug!(%method, %url, "Backend request");

        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and turn transport failures and non-2xx answers into errors
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        operation: &str,
    ) -> ActFijoResult<reqwest::Response> {
        let response = builder.send().await.map_err(|e| ActFijoError::Network {
            message: format!("Request failed: {}", e),
            status: None,
            source: Some(Box::new(e)),
            context: ErrorContext::new("backend_client")
                .with_operation(operation)
                .with_suggestion("Check that the backend is reachable"),
        })?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, operation).await);
        }

        Ok(response)
    }

    async fn get_permission_list(&self) -> ActFijoResult<PermissionSet> {
        let operation = "fetch_permissions";
        let response = self
            .send(self.request(reqwest::Method::GET, MY_PERMISSIONS_ENDPOINT), operation)
            .await?;
        let entries = Self::decode::<Vec<Option<String>>>(response, operation).await?;

        // Roles without permissions come back as null entries
        let nulls = entries.iter().filter(|entry| entry.is_none()).count();
        if nulls > 0 {
            debug!(nulls, "Dropping null permission entries");
        }
        Ok(entries.into_iter().flatten().collect())
    }

    async fn decode<T>(response: reqwest::Response, operation: &str) -> ActFijoResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| ActFijoError::Network {
            message: format!("Unexpected response body: {}", e),
            status: Some(status),
            source: Some(Box::new(e)),
            context: ErrorContext::new("backend_client").with_operation(operation),
        })
    }
}

#[async_trait]
impl PermissionSource for BackendClient {
    async fn fetch_permissions(&self) -> ActFijoResult<PermissionSet> {
        self.get_permission_list().await.map_err(into_permission_fetch)
    }
}

#[async_trait]
impl RoleSource for BackendClient {
    async fn fetch_roles(&self) -> ActFijoResult<Vec<Role>> {
        let operation = "fetch_roles";
        let response = self
            .send(self.request(reqwest::Method::GET, ROLES_ENDPOINT), operation)
            .await?;
        let payload = Self::decode::<RolesPayload>(response, operation).await?;
        Ok(payload.into_roles())
    }
}

#[async_trait]
impl AccessBackend for BackendClient {
    fn set_auth_token(&mut self, token: Option<&str>) {
        self.auth_token = token.map(str::to_string);
        debug!(attached = self.auth_token.is_some(), "Bearer token updated");
    }

    async fn obtain_token(&self, username: &str, password: &str) -> ActFijoResult<TokenPair> {
        let operation = "obtain_token";
        // Credentials go out without any stale bearer token
        let builder = self
            .client
            .post(self.config.endpoint(TOKEN_ENDPOINT))
            .json(&Credentials { username, password });

        let response = self.send(builder, operation).await.map_err(|e| match e {
            ActFijoError::Network {
                message,
                status: Some(status @ (400 | 401)),
                source,
                context,
            } => ActFijoError::Network {
                message,
                status: Some(status),
                source,
                context: context.with_suggestion("Check the username and password"),
            },
            other => other,
        })?;

        let tokens = Self::decode::<TokenPair>(response, operation).await?;
        info!(username, "Token issued");
        Ok(tokens)
    }

    async fn update_theme(&self, patch: &ThemePatch) -> ActFijoResult<ThemePrefs> {
        patch.validate()?;

        let operation = "update_theme";
        let response = self
            .send(
                self.request(reqwest::Method::PATCH, THEME_ENDPOINT).json(patch),
                operation,
            )
            .await?;
        Self::decode::<ThemePrefs>(response, operation).await
    }
}

/// Build the shared reqwest client with timeout and default headers
pub(crate) fn create_http_client(config: &ApiConfig) -> ActFijoResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            ActFijoError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?,
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| ActFijoError::Config {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

/// Turn a non-2xx response into a `Network` error carrying the status
pub(crate) async fn handle_response_error(
    response: reqwest::Response,
    operation: &str,
) -> ActFijoError {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();

    let mut context = ErrorContext::new("backend_client")
        .with_operation(operation)
        .with_metadata("url", url.as_str());

    if matches!(status.as_u16(), 401 | 403) {
        context = context.with_suggestion("Log in again");
    }

    ActFijoError::Network {
        message: format!("HTTP {} from {}: {}", status, url.path(), body.trim()),
        status: Some(status.as_u16()),
        source: None,
        context,
    }
}

/// Tag any failure of the permission request as a permission fetch failure
fn into_permission_fetch(error: ActFijoError) -> ActFijoError {
    match error {
        ActFijoError::Network {
            message,
            status,
            source,
            context,
        } => ActFijoError::PermissionFetch {
            message,
            status,
            source,
            context,
        },
        other => ActFijoError::PermissionFetch {
            message: other.to_string(),
            status: None,
            source: Some(Box::new(other)),
            context: ErrorContext::new("backend_client").with_operation("fetch_permissions"),
        },
    }
}
