//! HTTP routes and handlers
//!
//! Everything under `/wallet` and `/user` sits behind the bearer-token
//! middleware; `/health` stays public. Handlers call the synchronous engine
//! directly - every call is a short embedded-database operation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::{middleware, Extension, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wallet_core::ports::LedgerStore;
use wallet_core::{UserId, WalletContext, WalletId};

use crate::auth::{auth_middleware, AuthedUser};
use crate::error::ApiError;
use crate::models::{
    AmountRequest, BalanceResponse, MutationResponse, TransactionView, TransactionsResponse,
    TransferRequest, TransferResponse,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<WalletContext>,
}

/// Create the API router
pub fn create_router(ctx: Arc<WalletContext>) -> Router {
    let state = AppState { ctx };

    let protected = Router::new()
        .route("/wallet/:wallet_id/balance", get(get_balance))
        .route("/wallet/:wallet_id/deposit", post(deposit))
        .route("/wallet/:wallet_id/withdraw", post(withdraw))
        .route("/user/:user_id/transactions", get(list_transactions))
        .route("/user/:user_id/transfer", post(transfer))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ===== Route Handlers =====

/// Liveness probe, unauthenticated
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_balance(
    State(state): State<AppState>,
    Path(wallet_id): Path<WalletId>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ctx.engine.balance(wallet_id)?;
    Ok(Json(BalanceResponse { balance }))
}

async fn deposit(
    State(state): State<AppState>,
    Path(wallet_id): Path<WalletId>,
    Json(body): Json<AmountRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let balance = state.ctx.engine.deposit(wallet_id, body.amount)?;
    Ok(Json(MutationResponse::ok(balance)))
}

async fn withdraw(
    State(state): State<AppState>,
    Path(wallet_id): Path<WalletId>,
    Json(body): Json<AmountRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let balance = state.ctx.engine.withdraw(wallet_id, body.amount)?;
    Ok(Json(MutationResponse::ok(balance)))
}

/// Operations the user initiated, newest first, with receiver usernames
async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(AuthedUser(authed)): Extension<AuthedUser>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    if user_id != authed {
        return Err(ApiError::PathUserMismatch);
    }
    let records = state.ctx.engine.transactions_by_user(user_id)?;

    // One batched username lookup for the whole page
    let mut receiver_ids: Vec<UserId> = records.iter().map(|r| r.receiver_user_id).collect();
    receiver_ids.sort_unstable();
    receiver_ids.dedup();
    let usernames: HashMap<UserId, String> = state
        .ctx
        .store
        .users_by_ids(&receiver_ids)?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let transactions = records
        .iter()
        .map(|r| TransactionView::from_record(r, &usernames))
        .collect();
    Ok(Json(TransactionsResponse { transactions }))
}

/// Transfer between the authenticated user's wallet and the receiver's,
/// both resolved through their one active wallet
async fn transfer(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(AuthedUser(authed)): Extension<AuthedUser>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    if user_id != authed {
        return Err(ApiError::PathUserMismatch);
    }
    let sender_wallet = state.ctx.store.wallet_by_user(user_id)?;
    let receiver_wallet = state.ctx.store.wallet_by_user(body.receiver_user_id)?;
    let outcome = state.ctx.engine.transfer(
        user_id,
        sender_wallet.id,
        body.receiver_user_id,
        receiver_wallet.id,
        body.amount,
    )?;
    Ok(Json(TransferResponse::ok(outcome)))
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use wallet_core::services::{seed_demo, EngineLimits, SeededUser};

    /// Router over a freshly seeded in-memory database
    fn app_with_seed() -> (Router, SeededUser, SeededUser) {
        let ctx = WalletContext::open_in_memory(EngineLimits::default()).unwrap();
        let mut seeded = seed_demo(ctx.store.as_ref()).unwrap();
        let bob = seeded.pop().unwrap();
        let alice = seeded.pop().unwrap();
        (create_router(Arc::new(ctx)), alice, bob)
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, token: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _, _) = app_with_seed();
        let response = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_requests_without_token_are_unauthorized() {
        let (app, alice, _) = app_with_seed();
        let response = app
            .oneshot(get(&format!("/wallet/{}/balance", alice.wallet_id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_token");
        assert_eq!(body["code"], 401);
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let (app, alice, _) = app_with_seed();
        let response = app
            .oneshot(get(
                &format!("/wallet/{}/balance", alice.wallet_id),
                Some("deadbeef"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_balance_and_deposit_roundtrip() {
        let (app, alice, _) = app_with_seed();

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/wallet/{}/deposit", alice.wallet_id),
                &alice.token,
                r#"{"amount": "25"}"#.to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["balance"], "125");

        let response = app
            .oneshot(get(
                &format!("/wallet/{}/balance", alice.wallet_id),
                Some(&alice.token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["balance"], "125");
    }

    #[tokio::test]
    async fn test_withdraw_beyond_balance_is_forbidden() {
        let (app, alice, _) = app_with_seed();
        let response = app
            .oneshot(post_json(
                &format!("/wallet/{}/withdraw", alice.wallet_id),
                &alice.token,
                r#"{"amount": "500"}"#.to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "insufficient_funds");
    }

    #[tokio::test]
    async fn test_non_positive_deposit_is_bad_request() {
        let (app, alice, _) = app_with_seed();
        let response = app
            .oneshot(post_json(
                &format!("/wallet/{}/deposit", alice.wallet_id),
                &alice.token,
                r#"{"amount": "-5"}"#.to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_amount");
    }

    #[tokio::test]
    async fn test_balance_of_missing_wallet_is_not_found() {
        let (app, alice, _) = app_with_seed();
        let response = app
            .oneshot(get(
                &format!("/wallet/{}/balance", WalletId::new()),
                Some(&alice.token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "wallet_not_found");
    }

    #[tokio::test]
    async fn test_transfer_moves_the_money() {
        let (app, alice, bob) = app_with_seed();
        let response = app
            .oneshot(post_json(
                &format!("/user/{}/transfer", alice.user_id),
                &alice.token,
                format!(r#"{{"receiver_user_id": "{}", "amount": "30"}}"#, bob.user_id),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sender_balance"], "70");
        assert_eq!(body["receiver_balance"], "80");
    }

    #[tokio::test]
    async fn test_history_names_the_receiver() {
        let (app, alice, bob) = app_with_seed();
        app.clone()
            .oneshot(post_json(
                &format!("/user/{}/transfer", alice.user_id),
                &alice.token,
                format!(r#"{{"receiver_user_id": "{}", "amount": "10"}}"#, bob.user_id),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(get(
                &format!("/user/{}/transactions", alice.user_id),
                Some(&alice.token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let transactions = body["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0]["kind"], "transfer");
        assert_eq!(transactions[0]["amount"], "10");
        assert_eq!(transactions[0]["receiver_username"], "bob");
    }

    #[tokio::test]
    async fn test_another_users_history_is_forbidden() {
        let (app, alice, bob) = app_with_seed();
        let response = app
            .oneshot(get(
                &format!("/user/{}/transactions", bob.user_id),
                Some(&alice.token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "user_mismatch");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_not_found() {
        let (app, _, _) = app_with_seed();
        let response = app.oneshot(get("/nope", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["code"], 404);
    }
}
