use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::state::AppState;
use crate::{auth, blogs, uploads};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(blogs::router())
        .merge(uploads::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
        .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractors::ADMIN_SECRET_HEADER;
    use crate::config::AuthMode;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login_token(app: &Router) -> String {
        let res = send(
            app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "Author@Example.com", "password": "password123", "name": "Author"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = send(
            app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "author@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        json_body(res).await["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_validates_and_rejects_duplicates() {
        let app = build_app(AppState::fake());

        let bad = send(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "nope", "password": "password123", "name": "X"})),
        )
        .await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let short = send(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "a@b.co", "password": "short", "name": "X"})),
        )
        .await;
        assert_eq!(short.status(), StatusCode::BAD_REQUEST);

        login_token(&app).await;
        let dup = send(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "author@example.com", "password": "password456", "name": "Again"})),
        )
        .await;
        assert_eq!(dup.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unreadable_bodies_get_json_errors() {
        let app = build_app(AppState::fake());

        let missing = send(&app, Method::POST, "/auth/register", None, Some(json!({"email": "a@b.co"}))).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(missing).await["error"].is_string());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let garbled = app.clone().oneshot(req).await.unwrap();
        assert_eq!(garbled.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(garbled).await["error"].is_string());

        let token = login_token(&app).await;
        let res = send(&app, Method::POST, "/blogs", Some(&token), Some(json!({"title": "A"}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(res).await["error"].is_string());
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let app = build_app(AppState::fake());
        login_token(&app).await;

        let wrong = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "author@example.com", "password": "wrong-password"})),
        )
        .await;
        let unknown = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "ghost@example.com", "password": "wrong-password"})),
        )
        .await;

        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(wrong).await, json_body(unknown).await);
    }

    #[tokio::test]
    async fn me_returns_claims() {
        let app = build_app(AppState::fake());
        let token = login_token(&app).await;
        let res = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["kind"], "user");
        assert_eq!(body["sub"], "author@example.com");
        assert_eq!(body["name"], "Author");
    }

    #[tokio::test]
    async fn mutations_require_a_token() {
        let app = build_app(AppState::fake());

        let res = send(&app, Method::POST, "/blogs", None, Some(json!({"title": "A", "content": "B"}))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, Method::PATCH, "/blogs/x", Some("garbage"), Some(json!({"title": "X"}))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, Method::DELETE, "/blogs/x", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, Method::POST, "/upload/presigned-url", None, Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, Method::GET, "/blogs", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn blog_lifecycle() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let token = login_token(&app).await;

        let res = send(
            &app,
            Method::POST,
            "/blogs",
            Some(&token),
            Some(json!({"title": "A", "content": "B"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created = json_body(res).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "DRAFT");
        assert_eq!(created["tags"], json!([]));
        assert_eq!(created["views"], 0);
        assert!(created["createdAt"].is_string());
        assert_eq!(created["createdAt"], created["updatedAt"]);

        let res = send(&app, Method::GET, &format!("/blogs/{id}"), None, None).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(
            &app,
            Method::PATCH,
            &format!("/blogs/{id}"),
            Some(&token),
            Some(json!({"title": "X", "status": "PUBLISHED"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let updated = json_body(res).await;
        assert_eq!(updated["title"], "X");
        assert_eq!(updated["content"], "B");
        assert_eq!(updated["status"], "PUBLISHED");
        assert_eq!(updated["createdAt"], created["createdAt"]);

        let res = send(&app, Method::GET, "/blogs", None, None).await;
        assert_eq!(json_body(res).await.as_array().unwrap().len(), 1);

        for _ in 0..2 {
            let res = send(&app, Method::DELETE, &format!("/blogs/{id}"), Some(&token), None).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(json_body(res).await, json!({"deleted": true}));
        }

        let res = send(&app, Method::GET, &format!("/blogs/{id}"), None, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_missing_blog_is_404() {
        let app = build_app(AppState::fake());
        let token = login_token(&app).await;
        let res = send(&app, Method::PATCH, "/blogs/ghost", Some(&token), Some(json!({"title": "X"}))).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn public_read_counts_views() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let token = login_token(&app).await;

        let res = send(&app, Method::POST, "/blogs", Some(&token), Some(json!({"title": "A", "content": "B"}))).await;
        let id = json_body(res).await["id"].as_str().unwrap().to_string();

        send(&app, Method::GET, &format!("/blogs/{id}"), None, None).await;

        // the increment runs in a detached task
        let mut views = 0;
        for _ in 0..50 {
            views = state.blogs.find_one(&id).await.unwrap().views;
            if views == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(views, 1);
    }

    #[tokio::test]
    async fn upload_url_with_token() {
        let app = build_app(AppState::fake());
        let token = login_token(&app).await;
        let res = send(
            &app,
            Method::POST,
            "/upload/presigned-url",
            Some(&token),
            Some(json!({"contentType": "image/png"})),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let key = body["key"].as_str().unwrap();
        assert!(key.starts_with("uploads/"));
        assert_eq!(body["publicUrl"], format!("https://fake.local/{key}"));
        assert!(body["url"].as_str().unwrap().contains(key));
    }

    async fn send_with_secret(app: &Router, secret: Option<&str>) -> Response {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/blogs")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(s) = secret {
            req = req.header(ADMIN_SECRET_HEADER, s);
        }
        let req = req
            .body(Body::from(json!({"title": "A", "content": "B"}).to_string()))
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn shared_secret_mode_checks_header() {
        let app = build_app(AppState::fake_with_auth(AuthMode::SharedSecret(Some("letmein".into()))));
        assert_eq!(send_with_secret(&app, Some("letmein")).await.status(), StatusCode::CREATED);
        assert_eq!(send_with_secret(&app, Some("nope")).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(send_with_secret(&app, None).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn shared_secret_mode_without_secret_fails_closed() {
        let app = build_app(AppState::fake_with_auth(AuthMode::SharedSecret(None)));
        assert_eq!(send_with_secret(&app, Some("anything")).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(send_with_secret(&app, None).await.status(), StatusCode::UNAUTHORIZED);
    }
}
