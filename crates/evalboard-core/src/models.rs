//! Feedback data models shared by every storage backend and the HTTP layer.
//!
//! A feedback row is a user's reaction to a model response. Its `data`
//! payload is free-form JSON; the review scorer only looks at
//! `data.model_id` and `data.rating`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Feedback `type` whose rows feed the review leaderboard.
pub const RATING_FEEDBACK_TYPE: &str = "rating";

/// A persisted feedback row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackModel {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(rename = "type")]
    pub feedback_type: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(default)]
    pub snapshot: Option<Value>,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub updated_at: i64,
}

impl FeedbackModel {
    /// Build a fresh row for `user_id` from a submitted form.
    ///
    /// Assigns a new UUID v4, version 0, and `created_at == updated_at == now`.
    pub fn new(user_id: &str, form: FeedbackForm, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            version: 0,
            feedback_type: form.feedback_type,
            data: form.data,
            meta: form.meta,
            snapshot: form.snapshot,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the mutable fields from `form` and bump `updated_at`.
    pub fn apply_form(&mut self, form: FeedbackForm, now: i64) {
        self.feedback_type = form.feedback_type;
        self.data = form.data;
        self.meta = form.meta;
        self.snapshot = form.snapshot;
        self.updated_at = now;
    }
}

/// Request body for creating or updating feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackForm {
    #[serde(rename = "type")]
    pub feedback_type: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(default)]
    pub snapshot: Option<Value>,
}

/// Feedback as returned by list endpoints (no conversation snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub id: String,
    pub user_id: String,
    pub version: i64,
    #[serde(rename = "type")]
    pub feedback_type: String,
    pub data: Option<Value>,
    pub meta: Option<Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<FeedbackModel> for FeedbackResponse {
    fn from(model: FeedbackModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            version: model.version,
            feedback_type: model.feedback_type,
            data: model.data,
            meta: model.meta,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackIdResponse {
    pub id: String,
    pub user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Display information about the author of a feedback row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackUserResponse {
    #[serde(flatten)]
    pub feedback: FeedbackResponse,
    pub user: Option<UserSummary>,
}

/// One page of the admin feedback listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackListResponse {
    pub items: Vec<FeedbackUserResponse>,
    /// Total number of rows across all pages.
    pub total: i64,
}

/// The minimal projection of a feedback row consumed by the review scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    pub id: String,
    pub data: Option<Value>,
}

impl From<&FeedbackModel> for ReviewFeedback {
    fn from(model: &FeedbackModel) -> Self {
        Self {
            id: model.id.clone(),
            data: model.data.clone(),
        }
    }
}
