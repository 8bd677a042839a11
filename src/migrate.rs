//! Schema migrations.
//!
//! Migrations are applied in order, each inside its own transaction, and
//! recorded in `schema_migrations`. Re-running is a no-op for versions that
//! are already recorded, so `evalboard init` is idempotent.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

struct Migration {
    version: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_create_feedback",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                type TEXT NOT NULL,
                data TEXT,
                meta TEXT,
                snapshot TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#],
    },
    Migration {
        version: "0002_feedback_indexes",
        statements: &[
            "CREATE INDEX IF NOT EXISTS idx_feedback_user_id ON feedback(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_feedback_type ON feedback(type)",
            "CREATE INDEX IF NOT EXISTS idx_feedback_updated_at ON feedback(updated_at DESC)",
        ],
    },
];

/// Open the configured database and bring its schema up to date.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let applied = apply_migrations(&pool).await?;
    if applied.is_empty() {
        tracing::info!("schema is up to date");
    } else {
        tracing::info!(count = applied.len(), "applied migrations");
    }
    pool.close().await;
    Ok(())
}

/// Apply pending migrations to `pool`, returning the versions applied now.
pub async fn apply_migrations(pool: &SqlitePool) -> Result<Vec<&'static str>> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let mut applied = Vec::new();

    for migration in MIGRATIONS {
        let done: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?",
        )
        .bind(migration.version)
        .fetch_one(pool)
        .await?;

        if done {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {} failed", migration.version))?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(migration.version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(version = migration.version, "applied migration");
        applied.push(migration.version);
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_applies_all_then_nothing() {
        let pool = memory_pool().await;

        let first = apply_migrations(&pool).await.unwrap();
        assert_eq!(first.len(), MIGRATIONS.len());

        let second = apply_migrations(&pool).await.unwrap();
        assert!(second.is_empty());

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(recorded, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_feedback_table_exists() {
        let pool = memory_pool().await;
        apply_migrations(&pool).await.unwrap();

        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='feedback'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists);
    }
}
