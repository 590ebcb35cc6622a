use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{extractors::AdminSession, repo_types::PublicAccount},
    error::StoreError,
    extract::{Path, Query},
    state::AppState,
    tasks::dto::{DeletedResponse, TaskQuery},
    users::dto::{AdminOverview, AdminTaskRow, UserSearch, UserStats},
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", get(get_user).delete(delete_user))
        .route("/admin/tasks", get(list_all_tasks))
        .route("/admin/overview", get(overview))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
    Query(search): Query<UserSearch>,
) -> Json<Vec<UserStats>> {
    let ws = state.stores.lock().await;
    let term = search.q.as_deref().unwrap_or("");
    Json(ws.users.search_users(ws.tasks.tasks(), term))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
    Path(id): Path<String>,
) -> Result<Json<PublicAccount>, StoreError> {
    let ws = state.stores.lock().await;
    ws.users
        .get_user_by_id(&id)
        .map(Json)
        .ok_or(StoreError::NotFound("user"))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, StoreError> {
    let mut guard = state.stores.lock().await;
    let ws = &mut *guard;
    ws.users.delete_user(&mut ws.tasks, &id)?;
    Ok(Json(DeletedResponse { success: true }))
}

#[instrument(skip(state, _admin))]
pub async fn list_all_tasks(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
    Query(query): Query<TaskQuery>,
) -> Json<Vec<AdminTaskRow>> {
    let ws = state.stores.lock().await;
    Json(ws.users.search_all_tasks(&ws.tasks, &query))
}

#[instrument(skip(state, _admin))]
pub async fn overview(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
) -> Json<AdminOverview> {
    let ws = state.stores.lock().await;
    Json(ws.users.admin_overview(&ws.tasks))
}
