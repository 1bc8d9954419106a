use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::OnceCell;

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Process-wide Postgres pool, connected on first use. Concurrent first
/// callers wait on the same connection attempt.
pub async fn pool(database_url: &str, max_connections: u32) -> Result<&'static PgPool, sqlx::Error> {
    POOL.get_or_try_init(|| async {
        tracing::info!(max_connections, "connecting to database");
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
    })
    .await
}

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
