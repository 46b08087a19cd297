use crate::AppState;
use crate::api::error::AppError;
use crate::services::user_service::UserService;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// The authenticated caller, inserted as a request extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub is_admin: bool,
}

/// Username and password from an `Authorization: Basic ...` header
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| {
            let (scheme, rest) = h.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("basic").then_some(rest.trim())
        })?;

    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some((username, password)) = basic_credentials(req.headers()) else {
        return Err(AppError::Unauthorized);
    };

    match UserService::authenticate(&state.db, &username, &password).await? {
        Some(user) => {
            req.extensions_mut().insert(AuthUser {
                username: user.username,
                is_admin: user.is_admin,
            });
            Ok(next.run(req).await)
        }
        None => {
            tracing::warn!(username = %username, "Rejected basic auth credentials");
            Err(AppError::Unauthorized)
        }
    }
}
