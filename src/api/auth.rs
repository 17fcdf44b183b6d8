use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_sessions::Session;
use tower_sessions::cookie::{Cookie, SameSite};

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::{Principal, UserId};
use crate::models::{NewUser, User};
use crate::services::AuthError;

pub const SESSION_USER_KEY: &str = "user_id";
pub const REMEMBER_COOKIE: &str = "remember_token";

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid email or password".into()),
            AuthError::UserNotFound => Self::NotFound("User not found".into()),
            AuthError::DuplicateEmail => Self::Conflict("Email is already registered".into()),
            AuthError::ExpiredOrInvalidToken => {
                Self::NotFound("Reset token is invalid or has expired".into())
            }
            AuthError::Forbidden => Self::forbidden(),
            AuthError::Validation(msg) => Self::validation(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::internal(msg),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Only present when the server is configured to expose reset tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Serialize)]
pub struct CheckEmailResponse {
    pub exists: bool,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

// ============================================================================
// Principal resolution
// ============================================================================

/// Resolves the caller from the session, falling back to the remember-me
/// cookie, and stores the [`Principal`] in the request extensions.
///
/// Never rejects: anonymous requests pass through without a principal and
/// the [`Authenticated`] extractor turns that into a 401 where needed.
pub async fn resolve_principal(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve(&state, &session, request.headers()).await {
        Ok(Some(principal)) => {
            tracing::Span::current().record("user_id", principal.id.value());
            request.extensions_mut().insert(principal);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to resolve principal"),
    }

    next.run(request).await
}

async fn resolve(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
) -> Result<Option<Principal>, AuthError> {
    if let Ok(Some(id)) = session.get::<i32>(SESSION_USER_KEY).await {
        // Re-read the account so role changes apply on the next request.
        match state.auth().get_user(UserId::new(id)).await {
            Ok(user) => return Ok(Some(user.principal())),
            Err(AuthError::UserNotFound) => {
                let _ = session.flush().await;
            }
            Err(e) => return Err(e),
        }
    }

    let Some(token) = cookie_value(headers, REMEMBER_COOKIE) else {
        return Ok(None);
    };
    let Some(user) = state.auth().verify_remember_token(&token).await? else {
        return Ok(None);
    };

    session
        .insert(SESSION_USER_KEY, user.id.value())
        .await
        .map_err(|e| AuthError::Internal(format!("Failed to restore session: {e}")))?;
    tracing::debug!(user_id = %user.id, "Session restored from remember-me cookie");

    Ok(Some(user.principal()))
}

/// Extractor for handlers that need a signed-in caller.
pub struct Authenticated(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(Self)
            .ok_or_else(ApiError::unauthenticated)
    }
}

/// Like [`Authenticated`] but lets anonymous callers through.
pub struct MaybeAuthenticated(pub Option<Principal>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeAuthenticated {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().copied()))
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value for the remember-me cookie. `None` expires it.
fn remember_cookie(state: &AppState, token: Option<&str>) -> Result<HeaderValue, ApiError> {
    let max_age = match token {
        Some(_) => time::Duration::days(state.config().security.remember_token_days),
        None => time::Duration::ZERO,
    };

    let cookie = Cookie::build((REMEMBER_COOKIE, token.unwrap_or_default().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config().server.secure_cookies)
        .max_age(max_age)
        .build();

    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| ApiError::internal(format!("Invalid cookie value: {e}")))
}

fn session_error(e: tower_sessions::session::Error) -> ApiError {
    ApiError::internal(format!("Session error: {e}"))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    MaybeAuthenticated(actor): MaybeAuthenticated,
    Json(payload): Json<NewUser>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.auth().register(payload, actor.as_ref()).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let user = state
        .auth()
        .verify_credentials(&payload.email, &payload.password)
        .await?;

    // New session id on privilege change.
    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(SESSION_USER_KEY, user.id.value())
        .await
        .map_err(session_error)?;

    tracing::Span::current().record("user_id", user.id.value());
    tracing::info!(user_id = %user.id, remember_me = payload.remember_me, "User logged in");

    let mut headers = HeaderMap::new();
    if payload.remember_me {
        let token = state.auth().set_remember_token(user.id).await?;
        headers.insert(header::SET_COOKIE, remember_cookie(&state, Some(&token))?);
    }

    Ok((headers, Json(ApiResponse::success(user))).into_response())
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Authenticated(principal): Authenticated,
    session: Session,
) -> Result<Response, ApiError> {
    state.auth().clear_remember_token(principal.id).await?;
    session.flush().await.map_err(session_error)?;

    tracing::info!(user_id = %principal.id, "User logged out");

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, remember_cookie(&state, None)?);
    Ok((
        headers,
        Json(ApiResponse::success(MessageResponse::new(
            "Logged out successfully",
        ))),
    )
        .into_response())
}

/// POST /auth/forgot-password
///
/// There is no mail delivery. The token is only echoed back when
/// `server.expose_reset_tokens` is set.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<ApiResponse<ForgotPasswordResponse>>, ApiError> {
    let reset = state.auth().request_password_reset(&payload.email).await?;

    let (reset_token, expires_at) = if state.config().server.expose_reset_tokens {
        (Some(reset.token), Some(reset.expires_at))
    } else {
        (None, None)
    };

    Ok(Json(ApiResponse::success(ForgotPasswordResponse {
        message: "Password reset token issued".to_string(),
        reset_token,
        expires_at,
    })))
}

/// POST /auth/check-email
///
/// Discloses whether an address is registered; can be switched off with
/// `server.enable_email_check`.
pub async fn check_email(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<ApiResponse<CheckEmailResponse>>, ApiError> {
    if !state.config().server.enable_email_check {
        return Err(ApiError::forbidden());
    }

    if state.auth().email_exists(&payload.email).await? {
        Ok(Json(ApiResponse::success(CheckEmailResponse { exists: true })))
    } else {
        Err(ApiError::NotFound("Email is not registered".to_string()))
    }
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth()
        .consume_reset_token(&payload.token, &payload.password, payload.email.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password has been reset",
    ))))
}
