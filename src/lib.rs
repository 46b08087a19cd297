pub mod api;
pub mod client;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod pdf;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::infrastructure::database::Database;
use crate::utils::clock::Clock;
use axum::{
    Router,
    extract::Request,
    http::Response,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::cv::show_cv,
        api::handlers::tokens::create_token,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "cv", description = "Token-gated CV page"),
        (name = "tokens", description = "Access token administration"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/cv/:token_id", get(api::handlers::cv::show_cv))
        .route(
            "/create_token/:token_name",
            get(api::handlers::tokens::create_token).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::basic_auth_middleware,
            )),
        )
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .fallback(api::error::not_found)
        // Layers run outside-in: the request id is assigned before the span is made
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(|request: &Request, _span: &Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                }),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}

fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(api::middleware::request_id::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}
