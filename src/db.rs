use crate::config::AppConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool with default tuning.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    connect(database_url, 10, 1).await
}

/// Establishes a connection pool tuned from the application config.
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    connect(
        &cfg.database_url,
        cfg.db_max_connections,
        cfg.db_min_connections,
    )
    .await
}

async fn connect(url: &str, max_conns: u32, min_conns: u32) -> Result<DbPool, DbErr> {
    let mut opts = ConnectOptions::new(url.to_owned());
    opts.max_connections(max_conns)
        .min_connections(min_conns)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let pool = Database::connect(opts).await?;
    info!("Database connection established");
    Ok(pool)
}

/// Runs all pending migrations.
pub async fn run_migrations(pool: &DatabaseConnection) -> Result<(), DbErr> {
    crate::migrator::Migrator::up(pool, None).await?;
    info!("Database migrations applied");
    Ok(())
}
