use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{instrument, warn};

use crate::{
    auth::{
        extractors::{SignedIn, UserSession},
        services::Session,
    },
    error::{StoreError, StoreResult},
    extract::{JsonBody, Path, Query},
    state::{AppState, Workspace},
    tasks::{
        dto::{Dashboard, DeletedResponse, NewTask, StatsResponse, TaskPatch, TaskQuery},
        repo_types::Task,
        services::{overdue_count, RECENT_TASKS, UPCOMING_TASKS},
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks/stats", get(task_stats))
        .route("/dashboard", get(dashboard))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:id", patch(update_task).delete(delete_task))
        .route("/tasks/:id/toggle", post(toggle_task))
}

/// Users only reach their own tasks; someone else's task looks absent.
fn ensure_access(ws: &Workspace, session: &Session, id: &str) -> StoreResult<()> {
    match (session, ws.tasks.get_task(id)) {
        (Session::User(user), Some(task)) if task.user_id != user.id => {
            warn!(user_id = %user.id, task_id = %id, "task owned by another user");
            Err(StoreError::NotFound("task"))
        }
        _ => Ok(()),
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_tasks(
    State(state): State<AppState>,
    UserSession(user): UserSession,
    Query(query): Query<TaskQuery>,
) -> Json<Vec<Task>> {
    let ws = state.stores.lock().await;
    Json(ws.tasks.query_tasks(&user.id, &query))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_task(
    State(state): State<AppState>,
    UserSession(user): UserSession,
    JsonBody(mut payload): JsonBody<NewTask>,
) -> Result<(StatusCode, Json<Task>), StoreError> {
    payload.validate(OffsetDateTime::now_utc())?;
    payload.user_id = user.id;
    let task = state.stores.lock().await.tasks.create_task(payload)?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state, session, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<TaskPatch>,
) -> Result<Json<Task>, StoreError> {
    payload.validate(OffsetDateTime::now_utc())?;
    let mut ws = state.stores.lock().await;
    ensure_access(&ws, &session, &id)?;
    Ok(Json(ws.tasks.update_task(&id, payload)?))
}

#[instrument(skip(state, session))]
pub async fn delete_task(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, StoreError> {
    let mut ws = state.stores.lock().await;
    ensure_access(&ws, &session, &id)?;
    ws.tasks.delete_task(&id)?;
    Ok(Json(DeletedResponse { success: true }))
}

#[instrument(skip(state, session))]
pub async fn toggle_task(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    Path(id): Path<String>,
) -> Result<Json<Task>, StoreError> {
    let mut ws = state.stores.lock().await;
    ensure_access(&ws, &session, &id)?;
    Ok(Json(ws.tasks.toggle_task_complete(&id)?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn task_stats(
    State(state): State<AppState>,
    UserSession(user): UserSession,
) -> Json<StatsResponse> {
    let ws = state.stores.lock().await;
    let mine = ws.tasks.get_user_tasks(&user.id);
    Json(StatsResponse {
        stats: ws.tasks.get_task_stats(Some(&user.id)),
        overdue: overdue_count(&mine, OffsetDateTime::now_utc()),
    })
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    UserSession(user): UserSession,
) -> Json<Dashboard> {
    let ws = state.stores.lock().await;
    let mine = ws.tasks.get_user_tasks(&user.id);
    Json(Dashboard {
        stats: ws.tasks.get_task_stats(Some(&user.id)),
        overdue: overdue_count(&mine, OffsetDateTime::now_utc()),
        recent_tasks: ws.tasks.recent_tasks(&user.id, RECENT_TASKS),
        upcoming_tasks: ws.tasks.upcoming_tasks(&user.id, UPCOMING_TASKS),
    })
}
