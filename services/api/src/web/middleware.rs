//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use classroom_core::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::{auth::session_token, state::AppState};

/// Middleware that validates the auth session cookie.
///
/// If valid, inserts the `AuthIdentity` into request extensions for handlers to use.
/// If invalid, expired or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let identity = match state.classroom.authenticate(token).await {
        Ok(identity) => identity,
        Err(PortError::BackendUnavailable(e)) => {
            error!("Failed to validate auth session: {}", e);
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
        Err(e) => {
            warn!("Rejected auth session: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
