//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for PIN registration, login, and logout.

use crate::web::rest::port_error;
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use classroom_core::{AuthIdentity, AuthSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const SESSION_COOKIE: &str = "session";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegisteredQuery {
    /// A course id, or `ADMIN` for the instructor.
    pub scope: String,
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisteredResponse {
    pub registered: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub scope: String,
    pub name: String,
    pub pin: String,
    pub pin_confirm: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub scope: String,
    pub name: String,
    pub pin: String,
}

#[derive(Serialize, ToSchema)]
pub struct IdentityResponse {
    pub scope: String,
    pub name: String,
    /// `student` or `admin`.
    pub role: String,
}

impl From<&AuthIdentity> for IdentityResponse {
    fn from(identity: &AuthIdentity) -> Self {
        Self {
            scope: identity.scope.clone(),
            name: identity.name.clone(),
            role: identity.role.as_str().to_string(),
        }
    }
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

/// Reads the auth session token out of the `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|token| !token.is_empty())
}

fn session_cookie(state: &AppState, session: &AuthSession) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session.token,
        state.classroom.settings().auth_session_ttl.num_seconds()
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /auth/registered - Whether a PIN exists for the name
#[utoipa::path(
    get,
    path = "/auth/registered",
    params(RegisteredQuery),
    responses(
        (status = 200, description = "Registration status", body = RegisteredResponse),
        (status = 404, description = "Unknown course or name not on the roster")
    )
)]
pub async fn registered_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegisteredQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let registered = state
        .classroom
        .is_registered(&query.scope, &query.name)
        .await
        .map_err(port_error)?;
    Ok(Json(RegisteredResponse { registered }))
}

/// POST /auth/register - Create a PIN and log in
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "PIN created, session cookie set", body = IdentityResponse),
        (status = 400, description = "Malformed or mismatched PIN"),
        (status = 404, description = "Unknown course or name not on the roster"),
        (status = 409, description = "A PIN already exists for this name")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .classroom
        .register(&req.scope, &req.name, &req.pin, &req.pin_confirm)
        .await
        .map_err(port_error)?;

    let cookie = session_cookie(&state, &session);
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(IdentityResponse::from(&session.identity)),
    ))
}

/// POST /auth/login - Log in with an existing PIN
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = IdentityResponse),
        (status = 400, description = "PIN is not 4 digits"),
        (status = 401, description = "Incorrect PIN"),
        (status = 404, description = "No PIN registered for this name")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .classroom
        .login(&req.scope, &req.name, &req.pin)
        .await
        .map_err(port_error)?;
    info!(scope = %session.identity.scope, name = %session.identity.name, "Logged in");

    let cookie = session_cookie(&state, &session);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(IdentityResponse::from(&session.identity)),
    ))
}

/// POST /auth/logout - End the session; the stored PIN stays
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = session_token(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state.classroom.logout(token).await.map_err(|e| {
        error!("Failed to delete auth session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /auth/me - The identity behind the current session
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current identity", body = IdentityResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me_handler(Extension(identity): Extension<AuthIdentity>) -> Json<IdentityResponse> {
    Json(IdentityResponse::from(&identity))
}
