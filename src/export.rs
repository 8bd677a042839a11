//! Export and import feedback as JSON.
//!
//! The export format is a JSON array of full feedback rows, the same body
//! `GET /feedbacks/all/export` returns, so a file saved from the API can be
//! imported with `evalboard import`.

use anyhow::{Context, Result};
use std::path::Path;

use evalboard_core::models::FeedbackModel;
use evalboard_core::store::FeedbackStore;

use crate::config::Config;
use crate::sqlite_store::SqliteFeedbackStore;

/// Export every feedback row.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = SqliteFeedbackStore::open(config).await?;
    let rows = store.list_feedbacks().await?;
    store.close().await;

    let json = serde_json::to_string_pretty(&rows)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} feedback rows to {}", rows.len(), path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

/// Restore rows from an export file into `store`, returning how many were written.
///
/// Rows are upserted by id in a single batch, so importing the same file
/// twice is harmless and a failed import writes nothing.
pub async fn import_feedbacks(store: &dyn FeedbackStore, rows: &[FeedbackModel]) -> Result<usize> {
    for row in rows {
        if row.id.is_empty() || row.user_id.is_empty() {
            anyhow::bail!("feedback rows must have a non-empty id and user_id");
        }
    }
    store.restore_feedbacks(rows).await
}

/// CLI entry point for `evalboard import <file>`.
pub async fn run_import(config: &Config, input: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let rows: Vec<FeedbackModel> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a feedback export", input.display()))?;

    let store = SqliteFeedbackStore::open(config).await?;
    let count = import_feedbacks(&store, &rows).await?;
    store.close().await;

    tracing::info!(count, file = %input.display(), "imported feedback");
    println!("Imported {} feedback rows.", count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalboard_core::store::memory::InMemoryFeedbackStore;
    use serde_json::json;

    fn exported() -> Vec<FeedbackModel> {
        serde_json::from_value(json!([
            {
                "id": "f1", "user_id": "u1", "version": 0, "type": "rating",
                "data": {"model_id": "m1", "rating": 1},
                "meta": null, "snapshot": {"chat": {}},
                "created_at": 10, "updated_at": 12
            },
            {
                "id": "f2", "user_id": "u2", "type": "rating",
                "data": {"model_id": "m1", "rating": "-1"},
                "created_at": 20, "updated_at": 20
            }
        ]))
        .unwrap()
    }

    #[tokio::test]
    async fn test_import_preserves_rows() {
        let store = InMemoryFeedbackStore::new();
        let rows = exported();
        assert_eq!(import_feedbacks(&store, &rows).await.unwrap(), 2);

        let f1 = store.get_feedback("f1", None).await.unwrap().unwrap();
        assert_eq!(f1, rows[0]);
        assert_eq!(f1.updated_at, 12);

        // idempotent
        import_feedbacks(&store, &rows).await.unwrap();
        assert_eq!(store.list_feedbacks().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_rejects_blank_ids() {
        let store = InMemoryFeedbackStore::new();
        let mut rows = exported();
        rows[1].user_id.clear();
        assert!(import_feedbacks(&store, &rows).await.is_err());
        assert!(store.list_feedbacks().await.unwrap().is_empty());
    }
}
