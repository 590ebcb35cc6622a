use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{
    auth::{repo_types::PublicAccount, services::Session},
    error::StoreError,
    state::AppState,
};

/// Any signed-in session, user or admin.
pub struct SignedIn(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for SignedIn {
    type Rejection = StoreError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = state.stores.lock().await.auth.session().clone();
        if session == Session::Anonymous {
            warn!("request without a session");
            return Err(StoreError::Forbidden("no active session"));
        }
        Ok(SignedIn(session))
    }
}

/// A regular user session; admins are turned away.
pub struct UserSession(pub PublicAccount);

#[async_trait]
impl FromRequestParts<AppState> for UserSession {
    type Rejection = StoreError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.stores.lock().await.auth.session() {
            Session::User(user) => Ok(UserSession(user.clone())),
            Session::Admin(_) => Err(StoreError::Forbidden("requires a user session")),
            Session::Anonymous => Err(StoreError::Forbidden("no active session")),
        }
    }
}

/// An admin session.
pub struct AdminSession(pub PublicAccount);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = StoreError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.stores.lock().await.auth.session() {
            Session::Admin(admin) => Ok(AdminSession(admin.clone())),
            _ => {
                warn!("admin route without admin session");
                Err(StoreError::Forbidden("requires an admin session"))
            }
        }
    }
}
