use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::state::AppState;
use crate::{auth, tasks, users};

/// CORS for the configured browser origins only; `None` when none are listed.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let mut app = Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(tasks::router())
                .merge(users::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 _latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, "response");
                    } else {
                        tracing::info!(%status, "response");
                    }
                },
            ),
    )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::{config::AppConfig, storage::Storage};

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(format!("/api/v1{}", uri))
            .header("content-type", "application/json");
        let req = match body {
            Some(b) => builder.body(Body::from(b.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn ann() -> Value {
        json!({"name": "Ann", "email": "Ann@X.com", "password": "Secret1"})
    }

    #[tokio::test]
    async fn health() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn user_task_flow() {
        let app = build_app(AppState::fake());

        let (status, body) = call(&app, "POST", "/auth/register", Some(ann())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "ann@x.com");
        assert_eq!(body["isAdmin"], false);

        let (status, task) = call(
            &app,
            "POST",
            "/tasks",
            Some(json!({"title": "A", "description": "B", "priority": "High"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["completed"], false);
        assert_eq!(task["userId"], body["user"]["id"]);
        let id = task["id"].as_str().unwrap().to_string();

        let (_, stats) = call(&app, "GET", "/tasks/stats", None).await;
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["pending"], 1);
        assert_eq!(stats["high"], 1);
        assert_eq!(stats["overdue"], 0);

        let (status, toggled) = call(&app, "POST", &format!("/tasks/{}/toggle", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["completed"], true);
        assert!(toggled["completedAt"].is_string());

        let (_, list) = call(&app, "GET", "/tasks?status=completed&q=a", None).await;
        assert_eq!(list.as_array().map(Vec::len), Some(1));

        let (_, dash) = call(&app, "GET", "/dashboard", None).await;
        assert_eq!(dash["recentTasks"].as_array().map(Vec::len), Some(1));
        assert_eq!(dash["stats"]["completed"], 1);

        for _ in 0..2 {
            let (status, deleted) = call(&app, "DELETE", &format!("/tasks/{}", id), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(deleted["success"], true);
        }

        let (status, _) = call(&app, "POST", "/auth/logout", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, err) = call(&app, "GET", "/tasks", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["error"], "forbidden");

        let (status, _) = call(
            &app,
            "POST",
            "/auth/login",
            Some(json!({"email": " ann@x.com", "password": "Secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn structured_errors() {
        let app = build_app(AppState::fake());
        call(&app, "POST", "/auth/register", Some(ann())).await;

        let (status, err) = call(&app, "POST", "/auth/register", Some(ann())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "email_taken");

        let (status, err) = call(
            &app,
            "POST",
            "/auth/register",
            Some(json!({"name": "Bob", "email": "bob@x.com", "password": "weak"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "invalid_input");

        let (status, err) = call(
            &app,
            "POST",
            "/auth/login",
            Some(json!({"email": "ann@x.com", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["error"], "invalid_credentials");

        let (status, err) = call(&app, "PATCH", "/tasks/missing", Some(json!({"title": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["error"], "not_found");
    }

    #[tokio::test]
    async fn profile_update() {
        let app = build_app(AppState::fake());
        call(&app, "POST", "/auth/register", Some(ann())).await;

        let (status, body) = call(&app, "PATCH", "/me", Some(json!({"phone": "555-0100"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["phone"], "555-0100");

        let (_, me) = call(&app, "GET", "/me", None).await;
        assert_eq!(me["user"]["phone"], "555-0100");
    }

    #[tokio::test]
    async fn users_cannot_touch_foreign_tasks() {
        let app = build_app(AppState::fake());
        call(&app, "POST", "/auth/register", Some(ann())).await;
        let (_, task) = call(
            &app,
            "POST",
            "/tasks",
            Some(json!({"title": "Mine", "description": "d", "priority": "Low"})),
        )
        .await;
        let id = task["id"].as_str().unwrap().to_string();

        call(
            &app,
            "POST",
            "/auth/register",
            Some(json!({"name": "Bob", "email": "bob@x.com", "password": "Secret2"})),
        )
        .await;
        let (status, _) = call(&app, "POST", &format!("/tasks/{}/toggle", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, list) = call(&app, "GET", "/tasks", None).await;
        assert_eq!(list.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn admin_flow() {
        let app = build_app(AppState::fake());
        let (_, ann_body) = call(&app, "POST", "/auth/register", Some(ann())).await;
        let ann_id = ann_body["user"]["id"].as_str().unwrap().to_string();
        call(
            &app,
            "POST",
            "/tasks",
            Some(json!({"title": "A", "description": "B", "priority": "Medium"})),
        )
        .await;

        // a user session is not enough
        let (status, _) = call(&app, "GET", "/admin/overview", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            "POST",
            "/admin/register",
            Some(json!({"name": "Root", "email": "root@x.com", "password": "Password9"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isAdmin"], true);

        let (_, overview) = call(&app, "GET", "/admin/overview", None).await;
        assert_eq!(overview["totalUsers"], 1);
        assert_eq!(overview["activeUsers"], 1);

        let (_, rows) = call(&app, "GET", "/admin/tasks?q=ann", None).await;
        assert_eq!(rows[0]["user"]["name"], "Ann");

        let (_, users) = call(&app, "GET", "/admin/users", None).await;
        assert_eq!(users[0]["taskCount"], 1);
        assert!(users[0].get("password").is_none());

        let (status, _) = call(&app, "DELETE", &format!("/admin/users/{}", ann_id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", &format!("/admin/users/{}", ann_id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, rows) = call(&app, "GET", "/admin/tasks", None).await;
        assert_eq!(rows.as_array().map(Vec::len), Some(0));

        // admins have no profile to edit
        let (status, _) = call(&app, "PATCH", "/me", Some(json!({"name": "X"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_bodies_use_error_format() {
        let app = build_app(AppState::fake());
        call(&app, "POST", "/auth/register", Some(ann())).await;

        let (status, err) = call(
            &app,
            "POST",
            "/tasks",
            Some(json!({"title": "A", "description": "B", "priority": "Urgent"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "invalid_input");
        assert!(err["message"].as_str().unwrap().contains("Urgent"));

        let (status, err) = call(&app, "POST", "/auth/login", Some(json!({"email": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "invalid_input");

        let res = app
            .clone()
            .oneshot(
                Request::post("/api/v1/auth/login")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_manages_any_task() {
        let app = build_app(AppState::fake());
        call(&app, "POST", "/auth/register", Some(ann())).await;
        let (_, task) = call(
            &app,
            "POST",
            "/tasks",
            Some(json!({"title": "Ann's", "description": "d", "priority": "Low"})),
        )
        .await;
        let id = task["id"].as_str().unwrap().to_string();

        call(
            &app,
            "POST",
            "/admin/register",
            Some(json!({"name": "Root", "email": "root@x.com", "password": "Password9"})),
        )
        .await;

        let (status, patched) = call(
            &app,
            "PATCH",
            &format!("/tasks/{}", id),
            Some(json!({"priority": "High"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["priority"], "High");
        assert_eq!(patched["userId"], task["userId"]);

        let (status, toggled) = call(&app, "POST", &format!("/tasks/{}/toggle", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["completed"], true);

        let (status, _) = call(&app, "DELETE", &format!("/tasks/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, rows) = call(&app, "GET", "/admin/tasks", None).await;
        assert_eq!(rows.as_array().map(Vec::len), Some(0));
    }

    async fn preflight(app: &Router, origin: &str) -> Option<String> {
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/v1/health")
                    .header("origin", origin)
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        res.headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn cors_only_for_configured_origins() {
        let closed = build_app(AppState::fake());
        assert_eq!(preflight(&closed, "http://evil.example").await, None);

        let config = AppConfig {
            cors_origins: vec!["http://localhost:5173".into()],
            ..AppConfig::in_memory()
        };
        let open = build_app(AppState::from_parts(Arc::new(config), Storage::in_memory()));
        assert_eq!(
            preflight(&open, "http://localhost:5173").await.as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(preflight(&open, "http://evil.example").await, None);
    }
}
