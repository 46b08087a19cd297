use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::infrastructure::database::Database;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};

/// Length of every token id handed out by the service
pub const TOKEN_ID_LEN: usize = 6;

pub struct TokenService;

impl TokenService {
    /// Six characters drawn uniformly from the URL-safe base64 alphabet
    pub fn generate_id() -> String {
        // 6 bytes encode to 8 characters; the first 6 carry 36 uniform random bits
        let mut bytes = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut bytes);
        let mut id = URL_SAFE_NO_PAD.encode(bytes);
        id.truncate(TOKEN_ID_LEN);
        id
    }

    /// A token grants access iff it is active and `now` has not passed its expiry
    pub fn is_usable(token: &tokens::Model, now: DateTime<Utc>) -> bool {
        token.active && now <= token.expiry
    }

    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        token_id: &str,
    ) -> Result<Option<tokens::Model>, DbErr> {
        Tokens::find_by_id(token_id.to_string()).one(conn).await
    }

    /// Access gate: unknown, inactive and expired ids are all just `false`
    pub async fn validate(
        db: &Database,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let token_id = token_id.to_string();
        let token = db
            .transaction(|txn| Box::pin(async move { Ok(Self::find(txn, &token_id).await?) }))
            .await?;

        Ok(token.is_some_and(|t| Self::is_usable(&t, now)))
    }

    pub async fn create(
        db: &Database,
        name: &str,
        expiry: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<tokens::Model, AppError> {
        Self::create_with(db, name, expiry, max_attempts, Self::generate_id).await
    }

    /// Insert a new active token, drawing ids from `next_id` until one is free.
    pub async fn create_with<G>(
        db: &Database,
        name: &str,
        expiry: DateTime<Utc>,
        max_attempts: u32,
        mut next_id: G,
    ) -> Result<tokens::Model, AppError>
    where
        G: FnMut() -> String + Send + 'static,
    {
        let name = name.to_string();
        let token = db
            .transaction(move |txn| {
                Box::pin(async move {
                    for attempt in 1..=max_attempts {
                        let id = next_id();
                        if Self::find(txn, &id).await?.is_some() {
                            tracing::warn!(
                                "Token id collision on attempt {}/{}, redrawing",
                                attempt,
                                max_attempts
                            );
                            continue;
                        }

                        let token = tokens::ActiveModel {
                            id: Set(id),
                            name: Set(name),
                            active: Set(true),
                            expiry: Set(expiry),
                        };
                        return Ok(token.insert(txn).await?);
                    }

                    Err(AppError::Internal(format!(
                        "no free token id after {} attempts",
                        max_attempts
                    )))
                })
            })
            .await?;

        tracing::info!(
            token_id = %token.id,
            token_name = %token.name,
            expiry = %token.expiry,
            "🔑 Created access token"
        );
        Ok(token)
    }
}
