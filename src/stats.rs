//! Feedback statistics.
//!
//! A quick summary of what has been collected: row counts by feedback type
//! and per-model thumbs up / down. Used by `evalboard stats` to confirm that
//! the chat frontend is actually posting feedback.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::sqlite_store::SqliteFeedbackStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteFeedbackStore::open(config).await?;
    let pool = store.pool();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
        .fetch_one(pool)
        .await?;

    let users: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM feedback")
        .fetch_one(pool)
        .await?;

    let last_ts: Option<i64> = sqlx::query_scalar("SELECT MAX(updated_at) FROM feedback")
        .fetch_one(pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("evalboard: feedback stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Feedback:    {}", total);
    println!("  Users:       {}", users);
    println!(
        "  Last update: {}",
        last_ts.map(format_ts_relative).unwrap_or_else(|| "never".to_string())
    );

    let type_rows = sqlx::query(
        "SELECT type, COUNT(*) AS n FROM feedback GROUP BY type ORDER BY n DESC, type ASC",
    )
    .fetch_all(pool)
    .await?;

    if !type_rows.is_empty() {
        println!();
        println!("  By type:");
        for row in &type_rows {
            let t: String = row.get("type");
            let n: i64 = row.get("n");
            println!("    {:<20} {:>8}", t, n);
        }
    }

    // Counts every rating row, including ones the review scorer would skip.
    let model_rows = sqlx::query(
        r#"
        SELECT
            CAST(json_extract(data, '$.model_id') AS TEXT) AS model_id,
            SUM(CASE WHEN CAST(json_extract(data, '$.rating') AS TEXT) = '1' THEN 1 ELSE 0 END) AS up,
            SUM(CASE WHEN CAST(json_extract(data, '$.rating') AS TEXT) = '-1' THEN 1 ELSE 0 END) AS down,
            COUNT(*) AS n
        FROM feedback
        WHERE type = 'rating'
        GROUP BY model_id
        ORDER BY n DESC, model_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    if !model_rows.is_empty() {
        println!();
        println!("  By model:");
        println!(
            "    {:<40} {:>6} {:>6} {:>6}",
            "MODEL", "ROWS", "UP", "DOWN"
        );
        println!("    {}", "-".repeat(60));
        for row in &model_rows {
            let model_id: Option<String> = row.get("model_id");
            println!(
                "    {:<40} {:>6} {:>6} {:>6}",
                model_id.as_deref().unwrap_or("(none)"),
                row.get::<i64, _>("n"),
                row.get::<i64, _>("up"),
                row.get::<i64, _>("down"),
            );
        }
    }

    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
