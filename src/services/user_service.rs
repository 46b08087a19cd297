use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::infrastructure::database::Database;
use crate::utils::password::{hash_password, verify_password};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};

/// Users are provisioned out-of-band (see the `manage_users` binary) and only
/// consumed by the basic-auth check.
pub struct UserService;

impl UserService {
    pub async fn create_user(
        db: &Database,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<users::Model, AppError> {
        if username.is_empty() || username.contains(':') {
            return Err(AppError::BadRequest(
                "username must be non-empty and must not contain ':'".to_string(),
            ));
        }

        let password_hash = hash_password(password)?;
        let username = username.to_string();

        db.transaction(|txn| {
            Box::pin(async move {
                if Users::find_by_id(username.clone()).one(txn).await?.is_some() {
                    return Err(AppError::BadRequest(format!(
                        "user {:?} already exists",
                        username
                    )));
                }
                let user = users::ActiveModel {
                    username: Set(username),
                    password: Set(password_hash),
                    is_admin: Set(is_admin),
                };
                Ok(user.insert(txn).await?)
            })
        })
        .await
    }

    /// The user if the credentials match, `None` otherwise
    pub async fn authenticate(
        db: &Database,
        username: &str,
        password: &str,
    ) -> Result<Option<users::Model>, AppError> {
        let username = username.to_string();
        let user = db
            .transaction(|txn| {
                Box::pin(async move { Ok(Users::find_by_id(username).one(txn).await?) })
            })
            .await?;

        Ok(user.filter(|u| verify_password(password, &u.password)))
    }

    pub async fn list_users(db: &Database) -> Result<Vec<users::Model>, AppError> {
        db.transaction(|txn| {
            Box::pin(async move {
                Ok(Users::find()
                    .order_by_asc(users::Column::Username)
                    .all(txn)
                    .await?)
            })
        })
        .await
    }
}
