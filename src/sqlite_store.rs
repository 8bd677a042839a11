//! SQLite-backed [`FeedbackStore`] implementation.
//!
//! `data`, `meta`, and `snapshot` are stored as JSON text. Page sorting on
//! `model_id` and `rating` goes through `json_extract`, so mixed string and
//! integer ratings sort with SQLite's NULL < number < text ordering.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use evalboard_core::models::{
    FeedbackForm, FeedbackIdResponse, FeedbackModel, ReviewFeedback, RATING_FEEDBACK_TYPE,
};
use evalboard_core::store::{
    FeedbackOrder, FeedbackPage, FeedbackPageQuery, FeedbackStore, SortDirection,
};

use crate::config::Config;
use crate::{db, migrate};

const COLUMNS: &str =
    "id, user_id, version, type, data, meta, snapshot, created_at, updated_at";

/// SQLite implementation of the [`FeedbackStore`] trait.
pub struct SqliteFeedbackStore {
    pool: SqlitePool,
}

impl SqliteFeedbackStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Connect to the configured database and apply pending migrations.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn to_json_text(value: &Option<Value>) -> Result<Option<String>> {
    Ok(match value {
        Some(v) => Some(serde_json::to_string(v)?),
        None => None,
    })
}

/// Decode a JSON column. Text that does not parse is logged and read as `None`.
fn from_json_text(id: &str, column: &str, text: Option<String>) -> Option<Value> {
    let text = text?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(id, column, error = %e, "feedback column is not valid JSON");
            None
        }
    }
}

fn row_to_model(row: &SqliteRow) -> FeedbackModel {
    let id: String = row.get("id");
    FeedbackModel {
        user_id: row.get("user_id"),
        version: row.get("version"),
        feedback_type: row.get("type"),
        data: from_json_text(&id, "data", row.get("data")),
        meta: from_json_text(&id, "meta", row.get("meta")),
        snapshot: from_json_text(&id, "snapshot", row.get("snapshot")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        id,
    }
}

async fn upsert<'e, E>(executor: E, feedback: &FeedbackModel) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO feedback (id, user_id, version, type, data, meta, snapshot,
                              created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            version = excluded.version,
            type = excluded.type,
            data = excluded.data,
            meta = excluded.meta,
            snapshot = excluded.snapshot,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&feedback.id)
    .bind(&feedback.user_id)
    .bind(feedback.version)
    .bind(&feedback.feedback_type)
    .bind(to_json_text(&feedback.data)?)
    .bind(to_json_text(&feedback.meta)?)
    .bind(to_json_text(&feedback.snapshot)?)
    .bind(feedback.created_at)
    .bind(feedback.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// `WHERE` clause for an id lookup, narrowed to `owner` when given.
fn id_filter(owner: Option<&str>) -> &'static str {
    if owner.is_some() {
        "WHERE id = ? AND user_id = ?"
    } else {
        "WHERE id = ?"
    }
}

fn order_expr(order: FeedbackOrder) -> &'static str {
    match order {
        FeedbackOrder::ModelId => "json_extract(data, '$.model_id')",
        FeedbackOrder::Rating => "json_extract(data, '$.rating')",
        FeedbackOrder::CreatedAt => "created_at",
        FeedbackOrder::UpdatedAt => "updated_at",
    }
}

fn direction_sql(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn insert_feedback(&self, user_id: &str, form: FeedbackForm) -> Result<FeedbackModel> {
        let model = FeedbackModel::new(user_id, form, now_ts());
        self.restore_feedback(&model).await?;
        Ok(model)
    }

    async fn restore_feedback(&self, feedback: &FeedbackModel) -> Result<()> {
        upsert(&self.pool, feedback).await
    }

    async fn restore_feedbacks(&self, feedbacks: &[FeedbackModel]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for feedback in feedbacks {
            upsert(&mut *tx, feedback).await?;
        }
        tx.commit().await?;
        Ok(feedbacks.len())
    }

    async fn get_feedback(&self, id: &str, owner: Option<&str>) -> Result<Option<FeedbackModel>> {
        let sql = format!("SELECT {} FROM feedback {}", COLUMNS, id_filter(owner));
        let mut query = sqlx::query(&sql).bind(id);
        if let Some(uid) = owner {
            query = query.bind(uid);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_model))
    }

    async fn update_feedback(
        &self,
        id: &str,
        owner: Option<&str>,
        form: FeedbackForm,
    ) -> Result<Option<FeedbackModel>> {
        let sql = format!(
            "UPDATE feedback SET type = ?, data = ?, meta = ?, snapshot = ?, updated_at = ? {}",
            id_filter(owner)
        );
        let mut query = sqlx::query(&sql)
            .bind(&form.feedback_type)
            .bind(to_json_text(&form.data)?)
            .bind(to_json_text(&form.meta)?)
            .bind(to_json_text(&form.snapshot)?)
            .bind(now_ts())
            .bind(id);
        if let Some(uid) = owner {
            query = query.bind(uid);
        }
        let result = query.execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_feedback(id, owner).await
    }

    async fn delete_feedback(&self, id: &str, owner: Option<&str>) -> Result<bool> {
        let sql = format!("DELETE FROM feedback {}", id_filter(owner));
        let mut query = sqlx::query(&sql).bind(id);
        if let Some(uid) = owner {
            query = query.bind(uid);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_feedbacks(&self) -> Result<Vec<FeedbackModel>> {
        let sql = format!(
            "SELECT {} FROM feedback ORDER BY created_at DESC, id ASC",
            COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_model).collect())
    }

    async fn list_feedbacks_for_user(&self, user_id: &str) -> Result<Vec<FeedbackModel>> {
        let sql = format!(
            "SELECT {} FROM feedback WHERE user_id = ? ORDER BY created_at DESC, id ASC",
            COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_model).collect())
    }

    async fn list_feedback_ids(&self) -> Result<Vec<FeedbackIdResponse>> {
        let rows = sqlx::query(
            "SELECT id, user_id, created_at, updated_at FROM feedback \
             ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| FeedbackIdResponse {
                id: row.get("id"),
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    async fn feedbacks_for_reviews(&self) -> Result<Vec<ReviewFeedback>> {
        let rows = sqlx::query("SELECT id, data FROM feedback WHERE type = ?")
            .bind(RATING_FEEDBACK_TYPE)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let data = from_json_text(&id, "data", row.get("data"));
                ReviewFeedback { id, data }
            })
            .collect())
    }

    async fn feedback_page(&self, query: &FeedbackPageQuery) -> Result<FeedbackPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM feedback ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            COLUMNS,
            order_expr(query.order_by),
            direction_sql(query.direction)
        );
        let rows = sqlx::query(&sql)
            .bind(query.limit.max(0))
            .bind(query.skip.max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(FeedbackPage {
            items: rows.iter().map(row_to_model).collect(),
            total,
        })
    }

    async fn delete_feedbacks_for_user(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feedback WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_feedbacks(&self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feedback")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_migrations;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteFeedbackStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_migrations(&pool).await.unwrap();
        SqliteFeedbackStore::new(pool)
    }

    fn rating(model_id: &str, rating: Value) -> FeedbackForm {
        FeedbackForm {
            feedback_type: RATING_FEEDBACK_TYPE.to_string(),
            data: Some(json!({ "model_id": model_id, "rating": rating })),
            meta: Some(json!({ "chat_id": "c1" })),
            snapshot: None,
        }
    }

    fn row(id: &str, model_id: &str, rating: Value, ts: i64) -> FeedbackModel {
        FeedbackModel {
            id: id.to_string(),
            user_id: "u1".to_string(),
            version: 0,
            feedback_type: RATING_FEEDBACK_TYPE.to_string(),
            data: Some(json!({ "model_id": model_id, "rating": rating })),
            meta: None,
            snapshot: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip_json() {
        let store = store().await;
        let created = store.insert_feedback("u1", rating("m1", json!("1"))).await.unwrap();

        let fetched = store.get_feedback(&created.id, None).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.meta.unwrap()["chat_id"], "c1");
        assert!(fetched.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_owner_scoped_update_and_delete() {
        let store = store().await;
        let created = store.insert_feedback("u1", rating("m1", json!("1"))).await.unwrap();

        assert!(store.get_feedback(&created.id, Some("u2")).await.unwrap().is_none());
        assert!(store
            .update_feedback(&created.id, Some("u2"), rating("m1", json!("-1")))
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_feedback(&created.id, Some("u2")).await.unwrap());

        let updated = store
            .update_feedback(&created.id, Some("u1"), rating("m9", json!("-1")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.data.unwrap()["model_id"], "m9");
        assert_eq!(updated.created_at, created.created_at);

        assert!(store.delete_feedback(&created.id, None).await.unwrap());
        assert!(store.get_feedback(&created.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_feedbacks_for_reviews_filters_type() {
        let store = store().await;
        store.insert_feedback("u1", rating("m1", json!(1))).await.unwrap();
        store
            .insert_feedback(
                "u1",
                FeedbackForm {
                    feedback_type: "arena".to_string(),
                    data: Some(json!({ "model_id": "m2", "rating": "1" })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let rows = store.feedbacks_for_reviews().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data.as_ref().unwrap()["rating"], 1);
    }

    #[tokio::test]
    async fn test_page_orders_by_json_field() {
        let store = store().await;
        store.restore_feedback(&row("a", "m-c", json!("1"), 1)).await.unwrap();
        store.restore_feedback(&row("b", "m-a", json!("-1"), 2)).await.unwrap();
        store.restore_feedback(&row("c", "m-b", json!(1), 3)).await.unwrap();

        let page = store
            .feedback_page(&FeedbackPageQuery {
                order_by: FeedbackOrder::ModelId,
                direction: SortDirection::Asc,
                skip: 0,
                limit: 30,
            })
            .await
            .unwrap();
        let ids: Vec<&str> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(page.total, 3);

        let page = store
            .feedback_page(&FeedbackPageQuery {
                skip: 2,
                limit: 30,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "a");
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_restore_batch_is_atomic() {
        let store = store().await;
        sqlx::query(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON feedback \
             WHEN NEW.id = 'poison' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let batch = vec![
            row("a", "m1", json!("1"), 1),
            row("poison", "m1", json!("1"), 2),
            row("c", "m1", json!("1"), 3),
        ];
        assert!(store.restore_feedbacks(&batch).await.is_err());
        assert!(store.list_feedbacks().await.unwrap().is_empty());

        let written = store.restore_feedbacks(&[batch[0].clone(), batch[2].clone()]).await.unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.list_feedbacks().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_json_column_reads_as_none() {
        let store = store().await;
        sqlx::query(
            "INSERT INTO feedback (id, user_id, version, type, data, meta, snapshot, \
             created_at, updated_at) VALUES ('bad', 'u1', 0, 'rating', '{not json', NULL, NULL, 1, 1)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let fetched = store.get_feedback("bad", None).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "u1");
        assert!(fetched.data.is_none());

        let reviews = store.feedbacks_for_reviews().await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, "bad");
        assert!(reviews[0].data.is_none());
    }

    #[tokio::test]
    async fn test_bulk_deletes() {
        let store = store().await;
        assert!(!store.delete_all_feedbacks().await.unwrap());
        store.insert_feedback("u1", rating("m1", json!("1"))).await.unwrap();
        store.insert_feedback("u2", rating("m1", json!("1"))).await.unwrap();

        assert!(store.delete_feedbacks_for_user("u1").await.unwrap());
        assert_eq!(store.list_feedbacks_for_user("u1").await.unwrap().len(), 0);
        assert_eq!(store.list_feedback_ids().await.unwrap().len(), 1);

        assert!(store.delete_all_feedbacks().await.unwrap());
        assert!(store.list_feedbacks().await.unwrap().is_empty());
    }
}
