use std::net::SocketAddr;

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowHeaders, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;
use crate::{auth, avatars, entries, users};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(entries::router())
                .merge(avatars::router()),
        )
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
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
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([axum::http::header::WWW_AUTHENTICATE])
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::avatars::services::MAX_AVATAR_BYTES;

    struct Reply {
        status: StatusCode,
        headers: axum::http::HeaderMap,
        body: Value,
    }

    async fn send(app: &Router, req: Request<Body>) -> Reply {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply { status, headers, body }
    }

    fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        req.body(Body::empty()).unwrap()
    }

    fn avatar_req(token: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        multipart_req(token, "file", content_type, data)
    }

    fn multipart_req(token: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"a\"\r\nContent-Type: {ct}\r\n\r\n",
                b = boundary,
                f = field,
                ct = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/upload/avatar")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn register(app: &Router, email: &str) -> Reply {
        send(
            app,
            json_req(
                "POST",
                "/api/auth/register",
                None,
                json!({ "email": email, "name": "Mia", "password": "password123" }),
            ),
        )
        .await
    }

    async fn access_token(app: &Router, email: &str) -> String {
        let reply = register(app, email).await;
        assert_eq!(reply.status, StatusCode::CREATED);
        reply.body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let app = build_app(AppState::fake());
        let reply = send(&app, get_req("/health", None)).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["status"], "healthy");
    }

    #[tokio::test]
    async fn register_returns_tokens_and_rejects_duplicates() {
        let app = build_app(AppState::fake());
        let reply = register(&app, "mia@example.com").await;
        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(reply.body["token_type"], "bearer");
        assert!(reply.body["access_token"].is_string());
        assert!(reply.body["refresh_token"].is_string());
        assert_eq!(reply.body["user"]["email"], "mia@example.com");
        assert!(reply.body["user"].get("password_hash").is_none());

        let dup = register(&app, "mia@example.com").await;
        assert_eq!(dup.status, StatusCode::CONFLICT);
        assert_eq!(dup.body["detail"], "Email already registered");
    }

    #[tokio::test]
    async fn register_validates_input() {
        let app = build_app(AppState::fake());
        let reply = send(
            &app,
            json_req(
                "POST",
                "/api/auth/register",
                None,
                json!({ "email": "x@example.com", "name": "X", "password": "short" }),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);

        let reply = send(
            &app,
            json_req(
                "POST",
                "/api/auth/register",
                None,
                json!({ "email": "not-an-email", "name": "X", "password": "password123" }),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn login_does_not_reveal_which_part_failed() {
        let app = build_app(AppState::fake());
        register(&app, "lee@example.com").await;

        let ok = send(
            &app,
            json_req(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "lee@example.com", "password": "password123" }),
            ),
        )
        .await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body["token_type"], "bearer");

        let wrong_pw = send(
            &app,
            json_req(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "lee@example.com", "password": "password124" }),
            ),
        )
        .await;
        let unknown = send(
            &app,
            json_req(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": "nobody@example.com", "password": "password123" }),
            ),
        )
        .await;
        assert_eq!(wrong_pw.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw.body, unknown.body);
        assert_eq!(unknown.body["detail"], "Invalid email or password");
    }

    #[tokio::test]
    async fn refresh_requires_refresh_token() {
        let app = build_app(AppState::fake());
        let reg = register(&app, "ana@example.com").await;
        let access = reg.body["access_token"].as_str().unwrap();
        let refresh = reg.body["refresh_token"].as_str().unwrap();

        let ok = send(
            &app,
            json_req("POST", "/api/auth/refresh", None, json!({ "refresh_token": refresh })),
        )
        .await;
        assert_eq!(ok.status, StatusCode::OK);
        assert!(ok.body["access_token"].is_string());

        let wrong = send(
            &app,
            json_req("POST", "/api/auth/refresh", None, json!({ "refresh_token": access })),
        )
        .await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body["detail"], "Invalid token type");

        let garbage = send(
            &app,
            json_req("POST", "/api/auth/refresh", None, json!({ "refresh_token": "x.y.z" })),
        )
        .await;
        assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
        assert_eq!(garbage.body["detail"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_and_refresh_tokens() {
        let app = build_app(AppState::fake());
        let reg = register(&app, "sam@example.com").await;
        let refresh = reg.body["refresh_token"].as_str().unwrap();

        let missing = send(&app, get_req("/api/users/me", None)).await;
        assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
        assert_eq!(missing.headers[header::WWW_AUTHENTICATE], "Bearer");

        let wrong_type = send(&app, get_req("/api/users/me", Some(refresh))).await;
        assert_eq!(wrong_type.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_type.body["detail"], "Invalid token type");
        assert_eq!(wrong_type.headers[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn profile_read_and_partial_update() {
        let app = build_app(AppState::fake());
        let token = access_token(&app, "kai@example.com").await;

        let me = send(&app, get_req("/api/users/me", Some(&token))).await;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["name"], "Mia");
        assert_eq!(me.body["avatar_url"], Value::Null);

        let patched = send(
            &app,
            json_req("PATCH", "/api/users/me", Some(&token), json!({ "avatar_url": "https://cdn.test/k.png" })),
        )
        .await;
        assert_eq!(patched.status, StatusCode::OK);
        assert_eq!(patched.body["name"], "Mia");
        assert_eq!(patched.body["avatar_url"], "https://cdn.test/k.png");

        let bad = send(
            &app,
            json_req("PATCH", "/api/users/me", Some(&token), json!({ "name": "" })),
        )
        .await;
        assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn one_entry_per_day_and_averages() {
        let app = build_app(AppState::fake());
        let token = access_token(&app, "rio@example.com").await;

        let today = send(&app, get_req("/api/entries/today", Some(&token))).await;
        assert_eq!(today.status, StatusCode::OK);
        assert_eq!(today.body, Value::Null);

        let entry = json!({ "mood": 1, "feelings": ["calm"], "reflection": "ok", "sleep_hours": 7.5 });
        let created = send(&app, json_req("POST", "/api/entries", Some(&token), entry.clone())).await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body["mood"], 1);
        assert_eq!(created.body["feelings"], json!(["calm"]));

        let again = send(&app, json_req("POST", "/api/entries", Some(&token), entry)).await;
        assert_eq!(again.status, StatusCode::CONFLICT);
        assert_eq!(again.body["detail"], "You have already logged your mood today");

        let today = send(&app, get_req("/api/entries/today", Some(&token))).await;
        assert_eq!(today.body["id"], created.body["id"]);

        let list = send(&app, get_req("/api/entries?limit=5", Some(&token))).await;
        assert_eq!(list.body.as_array().unwrap().len(), 1);

        let avg = send(&app, get_req("/api/entries/averages", Some(&token))).await;
        assert_eq!(avg.status, StatusCode::OK);
        assert_eq!(avg.body["entries_count"], 1);
        assert_eq!(avg.body["current_mood_avg"], 1.0);
        assert_eq!(avg.body["current_sleep_avg"], 7.5);
        assert_eq!(avg.body["previous_mood_avg"], Value::Null);
        assert_eq!(avg.body["mood_trend"], "same");
    }

    #[tokio::test]
    async fn averages_without_entries_are_zeroed() {
        let app = build_app(AppState::fake());
        let token = access_token(&app, "zoe@example.com").await;
        let avg = send(&app, get_req("/api/entries/averages", Some(&token))).await;
        assert_eq!(avg.status, StatusCode::OK);
        assert_eq!(avg.body["entries_count"], 0);
        assert_eq!(avg.body["current_mood_avg"], 0.0);
        assert_eq!(avg.body["sleep_trend"], "same");
    }

    #[tokio::test]
    async fn invalid_entry_is_rejected() {
        let app = build_app(AppState::fake());
        let token = access_token(&app, "max@example.com").await;
        let reply = send(
            &app,
            json_req("POST", "/api/entries", Some(&token), json!({ "mood": 5, "sleep_hours": 8 })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn avatar_upload_returns_data_url() {
        let app = build_app(AppState::fake());
        let token = access_token(&app, "ava@example.com").await;

        let ok = send(&app, avatar_req(&token, "image/png", b"hi!")).await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body["url"], "data:image/png;base64,aGkh");
        assert_eq!(ok.body["size"], 3);
        assert_eq!(ok.body["type"], "image/png");
        assert_eq!(ok.body["success"], true);

        let gif = send(&app, avatar_req(&token, "image/gif", b"GIF89a")).await;
        assert_eq!(gif.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn avatar_size_limit_is_inclusive() {
        let app = build_app(AppState::fake());
        let token = access_token(&app, "big@example.com").await;

        let max = vec![0u8; MAX_AVATAR_BYTES];
        let ok = send(&app, avatar_req(&token, "image/png", &max)).await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body["size"], MAX_AVATAR_BYTES);

        let over = vec![0u8; MAX_AVATAR_BYTES + 1];
        let rejected = send(&app, avatar_req(&token, "image/png", &over)).await;
        assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejected.body["detail"], "File too large. Maximum size is 2MB.");
    }

    #[tokio::test]
    async fn avatar_upload_requires_file_field() {
        let app = build_app(AppState::fake());
        let token = access_token(&app, "nofile@example.com").await;
        let reply = send(&app, multipart_req(&token, "picture", "image/png", b"hi!")).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["detail"], "file is required");
    }

    #[tokio::test]
    async fn malformed_body_and_query_get_json_detail() {
        let app = build_app(AppState::fake());

        let missing = send(
            &app,
            json_req("POST", "/api/auth/register", None, json!({ "email": "a@b.co" })),
        )
        .await;
        assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(missing.body["detail"].as_str().unwrap().contains("name"));

        let token = access_token(&app, "query@example.com").await;
        let bad_limit = send(&app, get_req("/api/entries?limit=abc", Some(&token))).await;
        assert_eq!(bad_limit.status, StatusCode::BAD_REQUEST);
        assert!(bad_limit.body["detail"].is_string());

        let mut garbled = json_req("POST", "/api/auth/login", None, json!({}));
        *garbled.body_mut() = Body::from("{not json");
        let syntax = send(&app, garbled).await;
        assert_eq!(syntax.status, StatusCode::BAD_REQUEST);
        assert!(syntax.body["detail"].is_string());
    }
}
