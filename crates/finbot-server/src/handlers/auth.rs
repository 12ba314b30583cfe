//! Authentication-related handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bot::otp_message;
use crate::session::{cleared_cookie, issue_token, session_cookie};
use crate::{AppError, AppState, JsonBody, MessageResponse};
use finbot_core::auth::{
    hash_password, validate_email, validate_name, validate_password_strength, verify_password,
};
use finbot_core::{linking, Error, User};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub new_password: String,
}

/// Response for signup and login
#[derive(Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

fn session_response(status: StatusCode, user: User, secret: &str) -> Result<Response, AppError> {
    let token = issue_token(user.id, secret)?;
    let cookie = session_cookie(&token);
    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse { user, token }),
    )
        .into_response())
}

/// POST /api/auth/signup - Register and start a session
pub async fn signup(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<Response, AppError> {
    validate_name(&req.name)?;
    validate_email(&req.email)?;
    validate_password_strength(&req.password)?;

    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
    let user = state.db.create_user(&req.name, &req.email, &hash)?;

    info!(user_id = user.id, "User signed up");
    session_response(StatusCode::CREATED, user, &state.config.jwt_secret)
}

/// POST /api/auth/login - Check credentials and start a session
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let user = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or(Error::Unauthorized)?;

    let password = req.password;
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
    if !valid {
        warn!(user_id = user.id, "Failed login");
        return Err(Error::Unauthorized.into());
    }

    info!(user_id = user.id, "User logged in");
    session_response(StatusCode::OK, user, &state.config.jwt_secret)
}

/// POST /api/auth/logout - Clear the session cookie
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, cleared_cookie())],
        MessageResponse::new("Logged out successfully"),
    )
}

/// POST /api/auth/forgot-password - Send a reset OTP to the linked chat
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let (user, otp) = linking::request_password_reset(&state.db, &req.email)?;

    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| Error::Upstream("Chat transport not configured".into()))?;
    let chat_id = user.telegram_chat_id.as_deref().ok_or(Error::NotLinked)?;

    chat.send_message(chat_id, &otp_message(&otp)).await?;

    info!(user_id = user.id, "Reset OTP delivered");
    Ok(MessageResponse::new("OTP sent to your Telegram Bot!"))
}

/// POST /api/auth/reset-password - Replace the password using a valid OTP
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    linking::reset_password(&state.db, &req.email, &req.otp, &req.new_password)?;
    Ok(MessageResponse::new(
        "Password Changed Successfully! Please Login.",
    ))
}
