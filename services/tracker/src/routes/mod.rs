//! Tracker service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};
use tracing::warn;

use crate::{middleware::session_middleware, state::AppState};

pub mod auth;
pub mod project;
pub mod task;
pub mod user;

/// `{status, message}` body shared by every non-data response
pub fn message(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "message": message,
        })),
    )
}

/// Create the router for the tracker service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/user", get(user::get_user))
        .route("/api/user/:username", patch(user::patch_user))
        .route("/api/projects", get(project::list_projects))
        .route("/api/project", post(project::create_project))
        .route(
            "/api/project/:uuid",
            get(project::get_project)
                .patch(project::patch_project)
                .delete(project::delete_project),
        )
        .route(
            "/api/project/:uuid/timeperiod",
            post(project::add_time_period),
        )
        .route(
            "/api/project/:uuid/timeperiod/:id",
            delete(project::delete_time_period),
        )
        .route("/api/task", post(task::create_task))
        .route(
            "/api/task/:uuid",
            get(task::get_task)
                .patch(task::patch_task)
                .delete(task::delete_task),
        )
        .route("/api/task/:uuid/dependency", post(task::add_dependency))
        .route(
            "/api/task/:uuid/dependency/:other",
            delete(task::remove_dependency),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/logout", post(auth::logout))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (storage, healthy) = match &state.repositories.pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(healthy) => ("postgres", healthy),
            Err(e) => {
                warn!("Storage health check failed: {}", e);
                ("postgres", false)
            }
        },
        None => ("memory", true),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "tracker",
            "storage": storage,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::Repositories;
    use crate::settings::{Settings, StorageBackend};
    use axum::http::{Method, header};
    use tokio::net::TcpListener;

    /// The service bound to an ephemeral local port, over the memory backend
    struct TestApp {
        base: String,
        client: reqwest::Client,
    }

    async fn app() -> TestApp {
        let settings = Settings {
            storage: StorageBackend::Memory,
            ..Settings::default()
        };
        let router = create_router(AppState::new(Repositories::in_memory(), settings));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestApp {
            base: format!("http://{addr}"),
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        }
    }

    async fn send(
        app: &TestApp,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Option<String>, Value) {
        let method = Method::from_bytes(method.as_bytes()).unwrap();
        let mut request = app.client.request(method, format!("{}{}", app.base, uri));
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string);
        let bytes = response.bytes().await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, set_cookie, json)
    }

    async fn signup(app: &TestApp, username: &str) -> String {
        let (status, cookie, body) = send(
            app,
            "POST",
            "/signup",
            None,
            Some(json!({
                "username": username,
                "password": "pw123456",
                "displayName": username,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        cookie.unwrap()
    }

    async fn create_project(app: &TestApp, cookie: &str, name: &str) -> String {
        let (status, _, body) = send(
            app,
            "POST",
            "/api/project",
            Some(cookie),
            Some(json!({ "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["UUID"].as_str().unwrap().to_string()
    }

    async fn create_task(app: &TestApp, cookie: &str, project: &str, name: &str) -> String {
        let (status, _, body) = send(
            app,
            "POST",
            "/api/task",
            Some(cookie),
            Some(json!({ "projectUUID": project, "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["UUID"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, _, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_owner_sees_project_and_stranger_is_forbidden() {
        let app = app().await;
        let alice = signup(&app, "alice").await;
        assert!(alice.starts_with("sesh="));
        let project = create_project(&app, &alice, "X").await;

        let (status, _, body) =
            send(&app, "GET", &format!("/api/project/{project}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "X");
        assert_eq!(body["owner"], "alice");
        assert_eq!(body["tasks"], json!([]));
        assert_eq!(body["excludedDays"], json!([false, false, false, false, false, false, false]));

        let bob = signup(&app, "bob").await;
        let (status, _, body) =
            send(&app, "GET", &format!("/api/project/{project}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], 403);
    }

    #[tokio::test]
    async fn test_login_flow() {
        let app = app().await;
        signup(&app, "alice").await;

        let (status, cookie, _) = send(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "pw123456" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let cookie = cookie.unwrap();

        let (status, _, body) = send(&app, "GET", "/api/user", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["displayName"], "alice");

        let (status, _, wrong) = send(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "pw1234567" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, _, unknown) = send(
            &app,
            "POST",
            "/login",
            None,
            Some(json!({ "username": "nobody", "password": "pw123456" })),
        )
        .await;
        assert_eq!(wrong["message"], unknown["message"]);
    }

    #[tokio::test]
    async fn test_signup_rejects_taken_username_and_missing_fields() {
        let app = app().await;
        signup(&app, "alice").await;

        let (status, _, body) = send(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({
                "username": "alice",
                "password": "pw123456",
                "displayName": "Again",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");

        let (status, _, _) = send(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({ "username": "carol" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_requests_without_live_session_are_forbidden() {
        let app = app().await;
        let (status, _, _) = send(&app, "GET", "/api/projects", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) =
            send(&app, "GET", "/api/projects", Some("sesh=forged"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let cookie = signup(&app, "alice").await;
        let (status, cleared, _) = send(&app, "POST", "/logout", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared.as_deref(), Some("sesh="));
        let (status, _, _) = send(&app, "GET", "/api/projects", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_task_view_and_dependencies() {
        let app = app().await;
        let alice = signup(&app, "alice").await;
        let project = create_project(&app, &alice, "X").await;
        let a = create_task(&app, &alice, &project, "a").await;
        let b = create_task(&app, &alice, &project, "b").await;

        let (status, _, _) = send(
            &app,
            "PATCH",
            &format!("/api/task/{a}"),
            Some(&alice),
            Some(json!({
                "durationOptimistic": 0.0,
                "durationNormal": 2.0,
                "durationPessimistic": 10.0,
                "startDate": "2024-01-01",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = send(
            &app,
            "POST",
            &format!("/api/task/{a}/dependency"),
            Some(&alice),
            Some(json!({ "dependsOn": b })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, _) = send(
            &app,
            "POST",
            &format!("/api/task/{b}/dependency"),
            Some(&alice),
            Some(json!({ "dependsOn": a })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, view) =
            send(&app, "GET", &format!("/api/task/{a}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["expectedDuration"], 3.0);
        assert_eq!(view["endDate"], "2024-01-04");
        assert_eq!(view["dependentOn"], json!([b]));
        assert_eq!(view["dependencyOf"], json!([]));

        let (_, _, view) = send(&app, "GET", &format!("/api/task/{b}"), Some(&alice), None).await;
        assert_eq!(view["dependencyOf"], json!([a]));

        let (status, _, _) = send(&app, "GET", "/api/task/not-a-uuid", Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(
            &app,
            "PATCH",
            &format!("/api/task/{a}"),
            Some(&alice),
            Some(json!({ "completion": 1.5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_duration_is_rejected_and_views_stay_up() {
        let app = app().await;
        let alice = signup(&app, "alice").await;
        let project = create_project(&app, &alice, "X").await;
        let task = create_task(&app, &alice, &project, "a").await;

        let (status, _, body) = send(
            &app,
            "PATCH",
            &format!("/api/task/{task}"),
            Some(&alice),
            Some(json!({ "durationNormal": 1e15 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, _, view) =
            send(&app, "GET", &format!("/api/task/{task}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["duration"]["normal"], 0.0);

        let (status, _, body) =
            send(&app, "GET", &format!("/api/project/{project}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_owner_forbidden_on_every_endpoint() {
        let app = app().await;
        let alice = signup(&app, "alice").await;
        let project = create_project(&app, &alice, "X").await;
        let task = create_task(&app, &alice, &project, "a").await;
        let bob = signup(&app, "bob").await;

        let attempts = [
            ("GET", format!("/api/project/{project}"), None),
            ("PATCH", format!("/api/project/{project}"), Some(json!({ "name": "Y" }))),
            ("DELETE", format!("/api/project/{project}"), None),
            (
                "POST",
                format!("/api/project/{project}/timeperiod"),
                Some(json!({ "startDate": "2024-01-01", "endDate": "2024-01-02" })),
            ),
            (
                "POST",
                "/api/task".to_string(),
                Some(json!({ "projectUUID": project })),
            ),
            ("GET", format!("/api/task/{task}"), None),
            ("PATCH", format!("/api/task/{task}"), Some(json!({ "name": "z" }))),
            ("DELETE", format!("/api/task/{task}"), None),
            (
                "POST",
                format!("/api/task/{task}/dependency"),
                Some(json!({ "dependsOn": task })),
            ),
            ("PATCH", "/api/user/alice".to_string(), Some(json!({ "displayName": "B" }))),
        ];
        for (method, uri, body) in attempts {
            let (status, _, _) = send(&app, method, &uri, Some(&bob), body).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        }

        let (status, _, body) = send(&app, "GET", "/api/projects", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_project_delete_cascades() {
        let app = app().await;
        let alice = signup(&app, "alice").await;
        let project = create_project(&app, &alice, "X").await;
        let task = create_task(&app, &alice, &project, "a").await;
        let (status, _, _) = send(
            &app,
            "POST",
            &format!("/api/project/{project}/timeperiod"),
            Some(&alice),
            Some(json!({ "startDate": "2024-01-01", "endDate": "2024-01-02" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, _) =
            send(&app, "DELETE", &format!("/api/project/{project}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) =
            send(&app, "GET", &format!("/api/project/{project}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) =
            send(&app, "GET", &format!("/api/task/{task}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_user_rename_keeps_session_and_reports_collision() {
        let app = app().await;
        let alice = signup(&app, "alice").await;
        signup(&app, "bob").await;
        let project = create_project(&app, &alice, "X").await;

        let (status, _, body) = send(
            &app,
            "PATCH",
            "/api/user/alice",
            Some(&alice),
            Some(json!({ "username": "bob", "displayName": "Alice B" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("other fields successfully modified")
        );
        let (_, _, profile) = send(&app, "GET", "/api/user", Some(&alice), None).await;
        assert_eq!(profile["displayName"], "Alice B");

        let (status, _, _) = send(
            &app,
            "PATCH",
            "/api/user/alice",
            Some(&alice),
            Some(json!({ "username": "alicia" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, _, profile) = send(&app, "GET", "/api/user", Some(&alice), None).await;
        assert_eq!(profile["username"], "alicia");
        let (status, _, body) =
            send(&app, "GET", &format!("/api/project/{project}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["owner"], "alicia");
    }

    #[tokio::test]
    async fn test_patch_project_validates_excluded_days() {
        let app = app().await;
        let alice = signup(&app, "alice").await;
        let project = create_project(&app, &alice, "X").await;

        let (status, _, _) = send(
            &app,
            "PATCH",
            &format!("/api/project/{project}"),
            Some(&alice),
            Some(json!({ "excludedDays": [true, false] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let days = json!([false, false, false, false, false, true, true]);
        let (status, _, _) = send(
            &app,
            "PATCH",
            &format!("/api/project/{project}"),
            Some(&alice),
            Some(json!({ "excludedDays": days })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, _, listing) = send(&app, "GET", "/api/projects", Some(&alice), None).await;
        assert_eq!(listing[0]["UUID"], project.as_str());
        assert_eq!(listing[0]["excludedDays"], days);
    }
}
