//! Bearer-token authentication
//!
//! The middleware resolves `Authorization: Bearer <token>` against the token
//! table and injects the user id as a request extension, so handlers behind
//! it can trust [`AuthedUser`] to be present.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use wallet_core::ports::LedgerStore;
use wallet_core::UserId;

use crate::error::ApiError;
use crate::routes::AppState;

/// The authenticated caller, available to every protected handler
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub UserId);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::MissingToken)?;
    let user_id = state
        .ctx
        .store
        .user_by_token(token)?
        .ok_or(ApiError::InvalidToken)?;
    req.extensions_mut().insert(AuthedUser(user_id));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
