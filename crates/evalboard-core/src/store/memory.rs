//! In-memory [`FeedbackStore`] implementation for testing and embedding.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Sorting mirrors the
//! SQLite backend: JSON fields compare as NULL < number < text, and ties
//! are broken by id ascending.

use std::cmp::Ordering;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{
    FeedbackForm, FeedbackIdResponse, FeedbackModel, ReviewFeedback, RATING_FEEDBACK_TYPE,
};

use super::{FeedbackOrder, FeedbackPage, FeedbackPageQuery, FeedbackStore, SortDirection};

/// In-memory feedback store.
pub struct InMemoryFeedbackStore {
    rows: RwLock<Vec<FeedbackModel>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryFeedbackStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn owned_by(row: &FeedbackModel, owner: Option<&str>) -> bool {
    owner.map_or(true, |uid| row.user_id == uid)
}

/// Sort key with SQLite's cross-type ordering.
#[derive(Debug, PartialEq)]
enum SortKey {
    Null,
    Num(f64),
    Text(String),
}

impl SortKey {
    fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_f64().map_or(SortKey::Null, SortKey::Num),
            Some(Value::String(s)) => SortKey::Text(s.clone()),
            Some(Value::Bool(b)) => SortKey::Num(if *b { 1.0 } else { 0.0 }),
            _ => SortKey::Null,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Null => 0,
            SortKey::Num(_) => 1,
            SortKey::Text(_) => 2,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Num(a), SortKey::Num(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn sort_key(row: &FeedbackModel, order: FeedbackOrder) -> SortKey {
    let data_field = |name: &str| SortKey::from_json(row.data.as_ref().and_then(|d| d.get(name)));
    match order {
        FeedbackOrder::ModelId => data_field("model_id"),
        FeedbackOrder::Rating => data_field("rating"),
        FeedbackOrder::CreatedAt => SortKey::Num(row.created_at as f64),
        FeedbackOrder::UpdatedAt => SortKey::Num(row.updated_at as f64),
    }
}

fn newest_first(rows: &mut [FeedbackModel]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn insert_feedback(&self, user_id: &str, form: FeedbackForm) -> Result<FeedbackModel> {
        let model = FeedbackModel::new(user_id, form, now_ts());
        self.rows.write().unwrap().push(model.clone());
        Ok(model)
    }

    async fn restore_feedback(&self, feedback: &FeedbackModel) -> Result<()> {
        let mut rows = self.rows.write().unwrap();
        rows.retain(|r| r.id != feedback.id);
        rows.push(feedback.clone());
        Ok(())
    }

    async fn restore_feedbacks(&self, feedbacks: &[FeedbackModel]) -> Result<usize> {
        let mut rows = self.rows.write().unwrap();
        for feedback in feedbacks {
            rows.retain(|r| r.id != feedback.id);
            rows.push(feedback.clone());
        }
        Ok(feedbacks.len())
    }

    async fn get_feedback(&self, id: &str, owner: Option<&str>) -> Result<Option<FeedbackModel>> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.id == id && owned_by(r, owner))
            .cloned())
    }

    async fn update_feedback(
        &self,
        id: &str,
        owner: Option<&str>,
        form: FeedbackForm,
    ) -> Result<Option<FeedbackModel>> {
        let mut rows = self.rows.write().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id == id && owned_by(r, owner)) else {
            return Ok(None);
        };
        row.apply_form(form, now_ts());
        Ok(Some(row.clone()))
    }

    async fn delete_feedback(&self, id: &str, owner: Option<&str>) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.id == id && owned_by(r, owner)));
        Ok(rows.len() < before)
    }

    async fn list_feedbacks(&self) -> Result<Vec<FeedbackModel>> {
        let mut rows = self.rows.read().unwrap().clone();
        newest_first(&mut rows);
        Ok(rows)
    }

    async fn list_feedbacks_for_user(&self, user_id: &str) -> Result<Vec<FeedbackModel>> {
        let mut rows: Vec<FeedbackModel> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }

    async fn list_feedback_ids(&self) -> Result<Vec<FeedbackIdResponse>> {
        Ok(self
            .list_feedbacks()
            .await?
            .into_iter()
            .map(|r| FeedbackIdResponse {
                id: r.id,
                user_id: r.user_id,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect())
    }

    async fn feedbacks_for_reviews(&self) -> Result<Vec<ReviewFeedback>> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.feedback_type == RATING_FEEDBACK_TYPE)
            .map(ReviewFeedback::from)
            .collect())
    }

    async fn feedback_page(&self, query: &FeedbackPageQuery) -> Result<FeedbackPage> {
        let mut rows = self.rows.read().unwrap().clone();
        let total = rows.len() as i64;

        rows.sort_by(|a, b| {
            let ord = sort_key(a, query.order_by).compare(&sort_key(b, query.order_by));
            let ord = match query.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then_with(|| a.id.cmp(&b.id))
        });

        let items = rows
            .into_iter()
            .skip(query.skip.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();

        Ok(FeedbackPage { items, total })
    }

    async fn delete_feedbacks_for_user(&self, user_id: &str) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|r| r.user_id != user_id);
        Ok(rows.len() < before)
    }

    async fn delete_all_feedbacks(&self) -> Result<bool> {
        let mut rows = self.rows.write().unwrap();
        let had_rows = !rows.is_empty();
        rows.clear();
        Ok(had_rows)
    }
}
