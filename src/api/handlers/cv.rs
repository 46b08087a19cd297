use crate::AppState;
use crate::api::error::AppError;
use crate::services::connection_log::ConnectionLog;
use crate::services::cv_page::CvPage;
use crate::services::token_service::TokenService;
use crate::utils::snapshot::{RequestSnapshot, client_ip};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, Method, Uri, Version},
    response::Html,
};
use std::net::SocketAddr;

/// Serve the CV page to holders of a usable token
#[utoipa::path(
    get,
    path = "/cv/{token_id}",
    params(("token_id" = String, Path, description = "Access token id")),
    responses(
        (status = 200, description = "Rendered CV page (HTML)"),
        (status = 404, description = "Unknown, inactive or expired token")
    ),
    tag = "cv"
)]
#[allow(clippy::too_many_arguments)]
pub async fn show_cv(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let now = state.clock.now();

    // Validity is decided once; the log row and the response both use it
    let token_valid = TokenService::validate(&state.db, &token_id, now).await?;

    let remote_addr = client_ip(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.config.trust_forwarded_for,
    );
    let snapshot = RequestSnapshot::capture(&method, &uri, version, &headers, remote_addr);
    ConnectionLog::record(&state.db, &snapshot, &token_id, token_valid, now).await?;

    if !token_valid {
        return Err(AppError::NotFound);
    }

    let page = CvPage::render(&state.config).await?;
    Ok(Html(page))
}
