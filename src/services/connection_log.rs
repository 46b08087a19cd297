use crate::api::error::AppError;
use crate::entities::connections;
use crate::infrastructure::database::Database;
use crate::utils::snapshot::RequestSnapshot;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Set};

/// Append-only audit trail of CV page access attempts
pub struct ConnectionLog;

impl ConnectionLog {
    pub async fn record(
        db: &Database,
        snapshot: &RequestSnapshot,
        token_id: &str,
        token_valid: bool,
        request_time: DateTime<Utc>,
    ) -> Result<connections::Model, AppError> {
        tracing::info!(
            target: "connections",
            token_id = %token_id,
            token_valid,
            client_ip = %snapshot.remote_addr,
            "CV access attempt"
        );

        let entry = connections::ActiveModel {
            request_time: Set(request_time),
            token_id: Set(token_id.to_string()),
            token_valid: Set(token_valid),
            client_ip: Set(snapshot.remote_addr.clone()),
            request_data: Set(snapshot.to_json()),
            ..Default::default()
        };

        db.transaction(|txn| Box::pin(async move { Ok(entry.insert(txn).await?) }))
            .await
    }
}
