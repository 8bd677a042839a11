//! Storage abstraction for feedback.
//!
//! The [`FeedbackStore`] trait defines every persistence operation the HTTP
//! API and CLI need, so the SQLite backend in the `evalboard` crate and the
//! [`memory::InMemoryFeedbackStore`] used in tests are interchangeable.
//!
//! Operations that take an `owner` scope the lookup to a single user's rows
//! when it is `Some(user_id)`; admins pass `None` to reach any row.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{FeedbackForm, FeedbackIdResponse, FeedbackModel, ReviewFeedback};

/// Column a feedback page is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackOrder {
    ModelId,
    Rating,
    CreatedAt,
    #[default]
    UpdatedAt,
}

impl FeedbackOrder {
    /// Parse an `order_by` query value. Unknown values fall back to `updated_at`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("model_id") => FeedbackOrder::ModelId,
            Some("rating") => FeedbackOrder::Rating,
            Some("created_at") => FeedbackOrder::CreatedAt,
            _ => FeedbackOrder::UpdatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Parse a `direction` query value. Anything but `asc` sorts descending.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

/// Parameters for [`FeedbackStore::feedback_page`].
#[derive(Debug, Clone, Default)]
pub struct FeedbackPageQuery {
    pub order_by: FeedbackOrder,
    pub direction: SortDirection,
    pub skip: i64,
    pub limit: i64,
}

/// A page of feedback rows plus the total row count.
#[derive(Debug, Clone)]
pub struct FeedbackPage {
    pub items: Vec<FeedbackModel>,
    pub total: i64,
}

/// Abstract storage backend for feedback.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_feedback`](FeedbackStore::insert_feedback) | Create a row for a user |
/// | [`restore_feedback`](FeedbackStore::restore_feedback) | Insert or replace a row verbatim |
/// | [`restore_feedbacks`](FeedbackStore::restore_feedbacks) | Restore a batch, all or nothing |
/// | [`get_feedback`](FeedbackStore::get_feedback) | Fetch one row, optionally owner-scoped |
/// | [`update_feedback`](FeedbackStore::update_feedback) | Overwrite a row's form fields |
/// | [`delete_feedback`](FeedbackStore::delete_feedback) | Remove one row |
/// | [`list_feedbacks`](FeedbackStore::list_feedbacks) | All rows, newest first |
/// | [`list_feedbacks_for_user`](FeedbackStore::list_feedbacks_for_user) | One user's rows |
/// | [`list_feedback_ids`](FeedbackStore::list_feedback_ids) | Id/timestamp projection |
/// | [`feedbacks_for_reviews`](FeedbackStore::feedbacks_for_reviews) | Rating rows for the leaderboard |
/// | [`feedback_page`](FeedbackStore::feedback_page) | Sorted, paginated listing |
/// | [`delete_feedbacks_for_user`](FeedbackStore::delete_feedbacks_for_user) | Remove a user's rows |
/// | [`delete_all_feedbacks`](FeedbackStore::delete_all_feedbacks) | Remove every row |
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Create a new feedback row owned by `user_id`.
    async fn insert_feedback(&self, user_id: &str, form: FeedbackForm) -> Result<FeedbackModel>;

    /// Insert `feedback` as-is, replacing any existing row with the same id.
    async fn restore_feedback(&self, feedback: &FeedbackModel) -> Result<()>;

    /// Restore every row in `feedbacks` atomically. On error no row is written.
    async fn restore_feedbacks(&self, feedbacks: &[FeedbackModel]) -> Result<usize>;

    async fn get_feedback(&self, id: &str, owner: Option<&str>) -> Result<Option<FeedbackModel>>;

    /// Overwrite `type`, `data`, `meta`, and `snapshot`, bumping `updated_at`.
    ///
    /// Returns `None` when no row matches `id` (within `owner`, if given).
    async fn update_feedback(
        &self,
        id: &str,
        owner: Option<&str>,
        form: FeedbackForm,
    ) -> Result<Option<FeedbackModel>>;

    /// Returns `true` if a row was deleted.
    async fn delete_feedback(&self, id: &str, owner: Option<&str>) -> Result<bool>;

    /// All rows, `created_at` descending.
    async fn list_feedbacks(&self) -> Result<Vec<FeedbackModel>>;

    async fn list_feedbacks_for_user(&self, user_id: &str) -> Result<Vec<FeedbackModel>>;

    async fn list_feedback_ids(&self) -> Result<Vec<FeedbackIdResponse>>;

    /// `{id, data}` of every `type = "rating"` row, for review scoring.
    async fn feedbacks_for_reviews(&self) -> Result<Vec<ReviewFeedback>>;

    async fn feedback_page(&self, query: &FeedbackPageQuery) -> Result<FeedbackPage>;

    /// Returns `true` if any rows were deleted.
    async fn delete_feedbacks_for_user(&self, user_id: &str) -> Result<bool>;

    /// Returns `true` if any rows were deleted.
    async fn delete_all_feedbacks(&self) -> Result<bool>;
}
