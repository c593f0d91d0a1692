use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use std::time::Duration;

use crate::api::{ErrorResponse, internal_error};
use crate::config::OAuthConfig;
use crate::state::AppState;
use crate::store;

pub const SESSION_COOKIE: &str = "session";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// The authenticated user on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
}

/// Like [`Principal`], but does not reject anonymous requests
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl FromRequestParts<AppState> for MaybePrincipal {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = cookie_value(&parts.headers, SESSION_COOKIE) else {
            return Ok(MaybePrincipal(None));
        };

        let principal = store::session_principal(&state.pool, token)
            .await
            .map_err(internal_error)?;
        Ok(MaybePrincipal(principal))
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let MaybePrincipal(principal) = MaybePrincipal::from_request_parts(parts, state).await?;
        principal.ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Authentication required".to_string(),
                }),
            )
        })
    }
}

/// Value of the first cookie called `name` across all `Cookie` headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub fn set_cookie(name: &str, value: &str, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Identity provider returned HTTP {0}")]
    StatusError(u16),
    #[error("Failed to parse identity provider response: {0}")]
    ParseError(String),
    #[error("Identity provider did not return a verified email")]
    MissingEmail,
    #[error("Login state mismatch")]
    StateMismatch,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default = "verified_by_default")]
    verified_email: bool,
}

fn verified_by_default() -> bool {
    true
}

/// Authorization-code flow against Google's OAuth2 endpoints
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Where to send the browser to start a login; `state` is echoed back
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&approval_prompt=auto",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode("profile email"),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for the user's verified email
    #[tracing::instrument(skip_all)]
    pub async fn verified_email(&self, code: &str) -> Result<String, AuthError> {
        let access_token = self.exchange_code(code).await?;
        self.fetch_email(&access_token).await
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Token exchange rejected");
            return Err(AuthError::StatusError(response.status().as_u16()));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ParseError(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn fetch_email(&self, access_token: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::StatusError(response.status().as_u16()));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::ParseError(e.to_string()))?;

        match info.email {
            Some(email) if info.verified_email && !email.is_empty() => Ok(email),
            _ => Err(AuthError::MissingEmail),
        }
    }
}
