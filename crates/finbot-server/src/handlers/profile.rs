//! Profile and account-linking handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{AppError, AppState, AuthUser};
use finbot_core::{linking, Error, LinkCode, User};

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_configured: bool,
    pub chat_configured: bool,
}

/// GET /api/health - Liveness and wiring check
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ai_configured: state.ingestor.has_extractor(),
        chat_configured: state.chat.is_some(),
    })
}

/// GET /api/profile/view - The signed-in user
pub async fn view_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;
    Ok(Json(ProfileResponse { user }))
}

/// POST /api/profile/generate-code - Issue a chat linking code
pub async fn generate_code(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<LinkCode>, AppError> {
    let code = linking::generate_link_code(&state.db, user_id, state.config.link_code_ttl)?;
    Ok(Json(code))
}
