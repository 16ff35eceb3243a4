use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::{AppState, bearer_token};
use crate::accounts::{AccountError, NewUser, RegisterOutcome, SessionToken, User};

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct GoogleAuthRequest {
    pub email: String,
    pub name: String,
}

fn signed_in(token: &SessionToken, user: &User) -> Response {
    Json(json!({
        "status": "success",
        "token": token,
        "user": user.profile(),
    }))
    .into_response()
}

fn invalid(e: AccountError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "status": "INVALID", "message": e.to_string() })),
    )
        .into_response()
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    let new_user = NewUser {
        name: request.name,
        email: request.email,
        password: Some(request.password),
    };
    match state.accounts.register(new_user) {
        Ok(RegisterOutcome::Registered(_)) => {
            Json(json!({ "status": "REGISTERED" })).into_response()
        }
        Ok(RegisterOutcome::Exists) => Json(json!({ "status": "EXISTS" })).into_response(),
        Err(e) => invalid(e),
    }
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Response {
    match state.accounts.login(&request.email, &request.password) {
        Some((token, user)) => signed_in(&token, &user),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "failed" })),
        )
            .into_response(),
    }
}

pub(super) async fn google_auth(
    State(state): State<AppState>,
    Json(request): Json<GoogleAuthRequest>,
) -> Response {
    match state.accounts.google_auth(&request.email, &request.name) {
        Ok((token, user)) => signed_in(&token, &user),
        Err(e @ AccountError::PasswordAccount(_)) => (
            StatusCode::CONFLICT,
            Json(json!({ "status": "PASSWORD_ACCOUNT", "message": e.to_string() })),
        )
            .into_response(),
        Err(e) => invalid(e),
    }
}

pub(super) async fn current(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_token(&headers).and_then(|token| state.accounts.current(token)) {
        Some(user) => Json(json!({ "status": "ok", "user": user.profile() })).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "anonymous" })),
        )
            .into_response(),
    }
}

pub(super) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = bearer_token(&headers) {
        state.accounts.logout(token);
    }
    Json(json!({ "status": "logged_out" })).into_response()
}
