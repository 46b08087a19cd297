use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{connections, tokens, users};
use futures::future::BoxFuture;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, Schema, SqlxSqliteConnector,
    TransactionTrait,
};
use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Shared database handle.
///
/// Every read and write goes through [`Database::transaction`], which holds a
/// single process-wide lock for the lifetime of one transaction. The service
/// is low traffic, so all storage access is serialized on one writer.
#[derive(Clone)]
pub struct Database {
    conn: DatabaseConnection,
    lock: Arc<Mutex<()>>,
}

impl Database {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Raw connection, for liveness checks only
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Run `operation` inside one transaction under the single-writer lock.
    ///
    /// Commits on `Ok`. On `Err` the failure is logged, the transaction is
    /// rolled back and the error is returned to the caller unchanged.
    pub async fn transaction<F, T>(&self, operation: F) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, AppError>> + Send,
        T: Send,
    {
        let _guard = self.lock.lock().await;
        let txn = self.conn.begin().await.map_err(|e| {
            tracing::warn!("Failed to open db transaction: {}", e);
            AppError::Database(e)
        })?;

        match operation(&txn).await {
            Ok(value) => {
                txn.commit().await.map_err(|e| {
                    tracing::warn!("Error while committing db transaction: {}", e);
                    AppError::Database(e)
                })?;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("Error while in db transaction, rolled back: {}", err);
                if let Err(e) = txn.rollback().await {
                    tracing::warn!("Rollback failed: {}", e);
                }
                Err(err)
            }
        }
    }
}

pub async fn setup_database(config: &AppConfig) -> anyhow::Result<Database> {
    info!("📂 Database: {}", config.database_url);

    let in_memory = config.database_url.contains(":memory:");

    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .log_statements(log::LevelFilter::Debug);

    // A private in-memory database lives and dies with its one connection
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
    };

    let pool = pool_options.connect_with(options).await?;
    let conn = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);

    info!("✅ Database connected successfully");

    run_migrations(&conn).await?;

    Ok(Database::new(conn))
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "tokens",
            schema
                .create_table_from_entity(tokens::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "connections",
            schema
                .create_table_from_entity(connections::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        db.execute(builder.build(&stmt)).await?;
        info!("   - Table '{}' checked/created", name);
    }

    for mut index in schema.create_index_from_entity(connections::Entity) {
        index.if_not_exists();
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}
