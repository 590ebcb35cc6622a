use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, ProfilePatch, RegisterRequest, SessionResponse},
        extractors::SignedIn,
        repo_types::{PublicAccount, Role},
        services::validate_registration,
    },
    error::StoreError,
    extract::JsonBody,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/admin/register", post(register_admin))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

fn signed_in(user: PublicAccount, is_admin: bool) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        user: Some(user),
        is_admin,
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<Json<SessionResponse>, StoreError> {
    let payload = payload.normalized();
    validate_registration(&payload, Role::User)?;
    let user = state.stores.lock().await.auth.register(payload)?;
    Ok(signed_in(user, false))
}

#[instrument(skip(state, payload))]
pub async fn register_admin(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<Json<SessionResponse>, StoreError> {
    let payload = payload.normalized();
    validate_registration(&payload, Role::Admin)?;
    let admin = state.stores.lock().await.auth.register_admin(payload)?;
    Ok(signed_in(admin, true))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<SessionResponse>, StoreError> {
    let user = state
        .stores
        .lock()
        .await
        .auth
        .login(&payload.email, &payload.password, payload.as_admin)?;
    Ok(signed_in(user, payload.as_admin))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Result<Json<SessionResponse>, StoreError> {
    state.stores.lock().await.auth.logout()?;
    Ok(Json(SessionResponse {
        success: true,
        user: None,
        is_admin: false,
    }))
}

#[instrument(skip_all)]
pub async fn get_me(SignedIn(session): SignedIn) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        is_admin: session.is_admin(),
        user: session.account().cloned(),
    })
}

#[instrument(skip(state, patch))]
pub async fn update_me(
    State(state): State<AppState>,
    JsonBody(patch): JsonBody<ProfilePatch>,
) -> Result<Json<SessionResponse>, StoreError> {
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(StoreError::InvalidInput("name is required".into()));
    }
    let user = state.stores.lock().await.auth.update_profile(patch)?;
    Ok(signed_in(user, false))
}
