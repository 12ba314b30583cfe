//! FinBot Web Server
//!
//! Axum-based REST API and chat bot for the FinBot expense tracker.
//!
//! Security features:
//! - HS256 session tokens (bearer header or `token` cookie) on every non-auth route
//! - Restrictive CORS policy
//! - Upload size limit for receipt images
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use finbot_core::ai::{AIBackend, Extractor};
use finbot_core::db::Database;
use finbot_core::{Ingestor, Notifier, StatsEngine};

pub mod bot;
mod handlers;
pub mod session;

pub use bot::{BotHandler, BotReply, ChatTransport, ChatUpdate};
pub use session::{issue_token, verify_token, AuthUser, TOKEN_COOKIE};

/// Maximum upload size for receipt images (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Environment variable holding the token signing secret
pub const JWT_SECRET_ENV: &str = "FINBOT_JWT_SECRET";

/// Environment variable holding comma-separated CORS origins
pub const ALLOWED_ORIGINS_ENV: &str = "FINBOT_ALLOWED_ORIGINS";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Secret used to sign and verify session tokens
    pub jwt_secret: String,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Lifetime of account-linking codes
    pub link_code_ttl: chrono::Duration,
}

impl ServerConfig {
    /// Build from the environment; the signing secret is mandatory
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var(JWT_SECRET_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("{} must be set to sign session tokens", JWT_SECRET_ENV))?;

        let allowed_origins = std::env::var(ALLOWED_ORIGINS_ENV)
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        Ok(Self {
            jwt_secret,
            allowed_origins,
            link_code_ttl: finbot_core::linking::link_code_ttl_from_env(),
        })
    }
}

pub fn parse_origins(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub ingestor: Ingestor,
    pub stats: StatsEngine,
    pub notifier: Notifier,
    pub config: ServerConfig,
    /// Outbound chat channel, used to deliver password-reset OTPs
    pub chat: Option<Arc<dyn ChatTransport>>,
}

impl AppState {
    pub fn new(
        db: Database,
        extractor: Option<Extractor>,
        config: ServerConfig,
        chat: Option<Arc<dyn ChatTransport>>,
    ) -> Self {
        let notifier = Notifier::new();
        Self {
            ingestor: Ingestor::new(db.clone(), extractor, notifier.clone()),
            stats: StatsEngine::new(db.clone()),
            db,
            notifier,
            config,
            chat,
        }
    }
}

/// Authentication middleware - validates the session token and attaches the user id
///
/// The token is read from `Authorization: Bearer <jwt>` first, then from the
/// `token` cookie set at login.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = session::token_from_headers(request.headers());

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "Unauthorized request - no token");
        return unauthorized("Authentication required");
    };

    match verify_token(&token, &state.config.jwt_secret) {
        Ok(user) => {
            tracing::debug!(user_id = user.0, path = %request.uri().path(), "Authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, path = %request.uri().path(), "Invalid session token");
            unauthorized("Invalid or expired session")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

pub fn create_router(state: AppState, static_dir: Option<&str>) -> Router {
    let state = Arc::new(state);

    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password));

    let protected_routes = Router::new()
        .route("/profile/view", get(handlers::view_profile))
        .route("/profile/generate-code", post(handlers::generate_code))
        .route("/expense/add", post(handlers::add_expense))
        .route("/expense/user-expenses", get(handlers::user_expenses))
        .route("/expense/stats", get(handlers::expense_stats))
        .route("/expense/categories", get(handlers::list_categories))
        .route("/expense/delete/:id", delete(handlers::delete_expense))
        .route("/reports/pdf", get(handlers::report_pdf))
        .route("/events", get(handlers::events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = public_routes.merge(protected_routes);

    // CORS: only explicitly allowed origins; credentials for the cookie
    let cors = if state.config.allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
    };

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    // Serve the web frontend if a directory is provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the HTTP server
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(extractor) = state.ingestor.extractor() {
        check_ai_connection(extractor).await;
    } else {
        info!("AI backend not configured (set GEMINI_API_KEY or AI_BACKEND=ollama)");
    }

    let app = create_router(state, static_dir);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(extractor: &Extractor) {
    let client = extractor.client();
    if client.health_check().await {
        info!(
            "AI backend connected: {} (model: {})",
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "AI backend configured but not responding: {} (model: {})",
            client.host(),
            client.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_gateway(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn from_core(err: finbot_core::Error) -> Self {
        use finbot_core::Error as E;

        let status = match &err {
            E::Validation(_) | E::ExtractionFailed(_) | E::InvalidOrExpiredCode | E::NotLinked => {
                StatusCode::BAD_REQUEST
            }
            E::Unauthorized => StatusCode::UNAUTHORIZED,
            E::NotFound(_) | E::NotFoundOrUnauthorized => StatusCode::NOT_FOUND,
            E::Conflict(_) => StatusCode::CONFLICT,
            E::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => {
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "An internal error occurred".to_string(),
                    internal: Some(err.into()),
                }
            }
        };

        let message = match &err {
            E::NotFound(what) => what.clone(),
            E::Conflict(what) => what.clone(),
            E::NotLinked => "No Telegram account is linked to this user".to_string(),
            E::ExtractionFailed(_) => "Could not read an expense from the receipt".to_string(),
            E::Upstream(_) => "Could not reach the chat service".to_string(),
            other => other.to_string(),
        };

        if status == StatusCode::BAD_GATEWAY {
            warn!(error = %err, "Upstream failure");
        }

        Self {
            status,
            message,
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        match err.downcast::<finbot_core::Error>() {
            Ok(core) => Self::from_core(core),
            Err(err) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}

/// JSON body extractor whose rejections are `400 {"error": ...}`
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

pub(crate) fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::bad_request(&rejection.body_text())
}
