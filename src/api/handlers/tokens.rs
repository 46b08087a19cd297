use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::AuthUser;
use crate::services::token_service::TokenService;
use crate::utils::duration::parse_duration;
use axum::{
    Extension,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreateTokenQuery {
    /// Interval from now until the token expires, e.g. "30d" or "2 weeks"
    pub expiry: Option<String>,
}

#[derive(Debug, Validate)]
struct NewToken {
    #[validate(length(min = 1, max = 128))]
    name: String,
    #[validate(length(min = 1, max = 64))]
    expiry: Option<String>,
}

/// Create a CV access token. Responds with the bare token id as plain text.
#[utoipa::path(
    get,
    path = "/create_token/{token_name}",
    params(
        ("token_name" = String, Path, description = "Display name for the new token"),
        CreateTokenQuery
    ),
    responses(
        (status = 200, description = "Token id", body = String, content_type = "text/plain"),
        (status = 400, description = "Invalid name or expiry"),
        (status = 401, description = "Missing or wrong credentials"),
        (status = 403, description = "Authenticated user is not an administrator")
    ),
    security(("basic_auth" = [])),
    tag = "tokens"
)]
pub async fn create_token(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(token_name): Path<String>,
    Query(query): Query<CreateTokenQuery>,
) -> Result<String, AppError> {
    if !user.is_admin {
        tracing::warn!(username = %user.username, "Non-admin user attempted token creation");
        return Err(AppError::Forbidden);
    }

    let request = NewToken {
        name: token_name,
        expiry: query.expiry,
    };
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let ttl = match request.expiry.as_deref() {
        Some(raw) => parse_duration(raw)
            .map_err(|e| AppError::BadRequest(format!("invalid expiry {:?}: {}", raw, e)))?,
        None => state.config.default_token_ttl,
    };

    let expiry = state
        .clock
        .now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::BadRequest("expiry out of range".to_string()))?;

    let token = TokenService::create(
        &state.db,
        &request.name,
        expiry,
        state.config.token_id_attempts,
    )
    .await?;

    tracing::info!(created_by = %user.username, token_id = %token.id, "Token issued");
    Ok(token.id)
}
