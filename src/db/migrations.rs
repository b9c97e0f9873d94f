//! Pool setup and schema bootstrap.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("schema.sql");

/// Open (creating if needed) the SQLite file at `db_path` and apply the schema.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .after_connect(|conn, _meta| Box::pin(async move { apply_pragmas(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    run_migrations(&pool).await?;

    info!("Ledger store ready at {}", db_path);
    Ok(pool)
}

/// Apply every statement in the embedded schema. All statements are
/// `IF NOT EXISTS`, so reruns are no-ops.
pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements: Vec<&str> = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    debug!("Applied {} schema statements", statements.len());
    Ok(())
}

async fn apply_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    // journal_mode reports the mode actually in effect
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    debug!("SQLite journal_mode: {}", journal_mode);

    for pragma in ["PRAGMA busy_timeout = 5000", "PRAGMA synchronous = NORMAL"] {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }
    Ok(())
}
