use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Duration, Utc};
use cv_gate::config::AppConfig;
use cv_gate::entities::{prelude::*, *};
use cv_gate::infrastructure::database;
use cv_gate::services::user_service::UserService;
use cv_gate::utils::clock::ManualClock;
use cv_gate::{AppState, create_app};
use http_body_util::BodyExt;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: AppState,
    clock: Arc<ManualClock>,
    _dir: TempDir,
}

async fn setup() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cv.html"),
        "<html><head><title>{{ cv_title }}</title></head>\
         <body data-src=\"{{ cv_data_url }}\"><a href=\"{{ cv_repo_url }}\">src</a></body></html>",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("cvdata.json"),
        r#"{"title": "Jane Doe CV", "cv_repo_url": "https://example.com/cv"}"#,
    )
    .unwrap();

    let config = AppConfig {
        static_dir: dir.path().to_path_buf(),
        template_path: dir.path().join("cv.html"),
        ..AppConfig::in_memory()
    };

    let db = database::setup_database(&config).await.unwrap();
    UserService::create_user(&db, "admin", "admin-pass", true)
        .await
        .unwrap();
    UserService::create_user(&db, "viewer", "viewer-pass", false)
        .await
        .unwrap();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let state = AppState {
        db,
        config,
        clock: clock.clone(),
    };

    TestApp {
        app: create_app(state.clone()),
        state,
        clock,
        _dir: dir,
    }
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

async fn get(app: &Router, uri: &str, auth: Option<String>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn create_token(app: &Router, path: &str) -> String {
    let (status, body) = get(app, path, Some(basic("admin", "admin-pass"))).await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    String::from_utf8(body).unwrap()
}

#[tokio::test]
async fn test_token_lifecycle() {
    let t = setup().await;

    let token_id = create_token(&t.app, "/create_token/acme").await;
    assert_eq!(token_id.len(), 6);
    assert!(
        token_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );

    let stored = Tokens::find_by_id(token_id.clone())
        .one(t.state.db.connection())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "acme");
    assert!(stored.active);

    let (status, body) = get(&t.app, &format!("/cv/{}", token_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<title>Jane Doe CV</title>"));
    assert!(html.contains("data-src=\"/static/cvdata.json\""));
    assert!(html.contains("https://example.com/cv"));

    t.clock.advance(Duration::days(61));

    let (status, _) = get(&t.app, &format!("/cv/{}", token_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let rows = Connections::find()
        .filter(connections::Column::TokenId.eq(token_id.clone()))
        .order_by_asc(connections::Column::Id)
        .all(t.state.db.connection())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].token_valid);
    assert!(!rows[1].token_valid);
    assert_eq!(rows[1].client_ip, "unknown");

    let snapshot: Value = serde_json::from_str(&rows[0].request_data).unwrap();
    assert_eq!(snapshot["method"], "GET");
    assert_eq!(snapshot["path"], format!("/cv/{}", token_id));
}

#[tokio::test]
async fn test_explicit_expiry_is_honored() {
    let t = setup().await;

    let token_id = create_token(&t.app, "/create_token/short?expiry=2%20weeks").await;

    t.clock.advance(Duration::days(13));
    let (status, _) = get(&t.app, &format!("/cv/{}", token_id), None).await;
    assert_eq!(status, StatusCode::OK);

    t.clock.advance(Duration::days(2));
    let (status, _) = get(&t.app, &format!("/cv/{}", token_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_expiry_is_rejected() {
    let t = setup().await;

    let (status, body) = get(
        &t.app,
        "/create_token/acme?expiry=soonish",
        Some(basic("admin", "admin-pass")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("soonish"));

    let tokens = Tokens::find().all(t.state.db.connection()).await.unwrap();
    assert!(tokens.is_empty());
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let t = setup().await;

    let (status, _) = get(
        &t.app,
        "/create_token/acme",
        Some(basic("viewer", "viewer-pass")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let tokens = Tokens::find().all(t.state.db.connection()).await.unwrap();
    assert!(tokens.is_empty());
}

#[tokio::test]
async fn test_missing_or_wrong_credentials_get_challenge() {
    let t = setup().await;

    for auth in [None, Some(basic("admin", "wrong")), Some(basic("nobody", "x"))] {
        let mut builder = Request::builder().uri("/create_token/acme");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let response = t
            .app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.starts_with("Basic realm="));
    }
}

#[tokio::test]
async fn test_invalid_token_looks_like_unknown_route() {
    let t = setup().await;

    let (unknown_status, unknown_body) = get(&t.app, "/cv/nope00", None).await;
    let (route_status, route_body) = get(&t.app, "/no/such/page", None).await;

    assert_eq!(unknown_status, StatusCode::NOT_FOUND);
    assert_eq!(route_status, StatusCode::NOT_FOUND);
    assert_eq!(unknown_body, route_body);

    // the failed attempt is still logged
    let rows = Connections::find()
        .filter(connections::Column::TokenId.eq("nope00"))
        .all(t.state.db.connection())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].token_valid);
}

#[tokio::test]
async fn test_authorization_header_is_not_logged() {
    let t = setup().await;
    let token_id = create_token(&t.app, "/create_token/acme").await;

    let request = Request::builder()
        .uri(format!("/cv/{}?ref=mail", token_id))
        .header(header::AUTHORIZATION, "Bearer secret-value")
        .header(header::USER_AGENT, "integration-test")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row = Connections::find()
        .filter(connections::Column::TokenId.eq(token_id))
        .one(t.state.db.connection())
        .await
        .unwrap()
        .unwrap();
    assert!(!row.request_data.contains("secret-value"));

    let snapshot: Value = serde_json::from_str(&row.request_data).unwrap();
    assert_eq!(snapshot["args"]["ref"][0], "mail");
    assert_eq!(snapshot["headers"]["user-agent"][0], "integration-test");
}

#[tokio::test]
async fn test_health_and_openapi() {
    let t = setup().await;

    let (status, body) = get(&t.app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");

    let (status, body) = get(&t.app, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["paths"]["/cv/{token_id}"].is_object());
    assert!(json["paths"]["/create_token/{token_name}"].is_object());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_each_log_one_row() {
    let t = setup().await;
    let first = create_token(&t.app, "/create_token/first").await;
    let second = create_token(&t.app, "/create_token/second").await;

    let ids: Vec<String> = (0..20)
        .map(|i| match i % 4 {
            0 => first.clone(),
            1 => second.clone(),
            2 => format!("zz{:04}", i),
            _ => "-nope-".to_string(),
        })
        .collect();

    let requests = ids.iter().map(|id| {
        let app = t.app.clone();
        let uri = format!("/cv/{}", id);
        async move {
            app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap()
                .status()
        }
    });
    let statuses = futures::future::join_all(requests).await;

    for (id, status) in ids.iter().zip(&statuses) {
        let expected = if *id == first || *id == second {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        assert_eq!(*status, expected, "token {}", id);
    }

    let rows = Connections::find()
        .all(t.state.db.connection())
        .await
        .unwrap();
    assert_eq!(rows.len(), ids.len());
    for id in &ids {
        let matching: Vec<_> = rows.iter().filter(|r| &r.token_id == id).collect();
        let sent = ids.iter().filter(|i| *i == id).count();
        assert_eq!(matching.len(), sent, "rows for {}", id);
        let valid = *id == first || *id == second;
        assert!(matching.iter().all(|r| r.token_valid == valid));
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_request_span_carries_assigned_request_id() {
    use tracing_subscriber::layer::SubscriberExt;

    let t = setup().await;

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(move || writer.clone()),
    );
    let _guard = tracing::subscriber::set_default(subscriber);

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let request_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(
        output.contains(&format!("request_id={}", request_id)),
        "{}",
        output
    );
    assert!(!output.contains("request_id=unknown"));
}
