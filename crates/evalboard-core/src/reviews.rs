//! Confidence-weighted review scoring.
//!
//! Turns thumbs-up / thumbs-down feedback into a per-model leaderboard.
//! Each model's positive rate is smoothed toward 0.5 and then blended with
//! a neutral prior in proportion to its sample size:
//!
//! ```text
//! smoothed = (pos + 0.5) / (N + 1)
//! score    = (N / (N + k)) * smoothed + (k / (N + k)) * 0.5      k = 10
//! ```
//!
//! A model with one thumbs-up scores 0.5227, not 1.0; a model needs a few
//! dozen ratings before its score approaches its observed rate.
//!
//! # Ordering
//!
//! Entries are sorted by `score` descending. Equal (rounded) scores are
//! ordered by `model_id` ascending, so output never depends on map
//! iteration order.
//!
//! # Rounding
//!
//! Scores are rounded to 4 decimal places, half away from zero.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ReviewFeedback;

/// Virtual sample size of the neutral prior (`k`).
pub const PRIOR_WEIGHT: f64 = 10.0;

/// Score a model converges to when it has no usable feedback.
pub const NEUTRAL_SCORE: f64 = 0.5;

const SCORE_DECIMALS: i32 = 4;

/// A single model's row on the review leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub model_id: String,
    /// Confidence-weighted score in `[0, 1]`, rounded to 4 decimals.
    pub score: f64,
    /// Number of usable ratings (`positive + negative`).
    pub total: u64,
    pub positive: u64,
    pub negative: u64,
}

/// Response body for `GET /reviews`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewsResponse {
    pub entries: Vec<ReviewEntry>,
}

/// A parsed `data.rating` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Positive,
    Negative,
    Unrecognized,
}

impl Rating {
    /// Parse the string form of a rating. Only `"1"` and `"-1"` are recognized.
    pub fn parse(s: &str) -> Self {
        match s {
            "1" => Rating::Positive,
            "-1" => Rating::Negative,
            _ => Rating::Unrecognized,
        }
    }

    /// Parse a raw JSON rating.
    ///
    /// Strings are taken verbatim and integers by their decimal form, so
    /// both `"1"` and `1` are positive. Floats keep their fractional part
    /// (`1.0` stays `"1.0"`) and are unrecognized, as are booleans, null,
    /// and containers.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self::parse(s),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Self::parse(&n.to_string()),
            _ => Rating::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ModelCounts {
    positive: u64,
    negative: u64,
}

impl ModelCounts {
    fn total(&self) -> u64 {
        self.positive + self.negative
    }
}

/// Extract `(model_id, rating)` from a record, or `None` if it is unusable.
fn usable_rating(feedback: &ReviewFeedback) -> Option<(&str, Rating)> {
    let data = feedback.data.as_ref()?.as_object()?;
    let model_id = data.get("model_id")?.as_str().filter(|id| !id.is_empty())?;
    match Rating::from_value(data.get("rating")) {
        Rating::Unrecognized => None,
        rating => Some((model_id, rating)),
    }
}

/// Confidence-weighted score for `positive` out of `total` ratings, unrounded.
pub fn confidence_score(positive: u64, total: u64) -> f64 {
    let n = total as f64;
    let smoothed = (positive as f64 + 0.5) / (n + 1.0);
    (n / (n + PRIOR_WEIGHT)) * smoothed + (PRIOR_WEIGHT / (n + PRIOR_WEIGHT)) * NEUTRAL_SCORE
}

fn round_score(score: f64) -> f64 {
    let factor = 10f64.powi(SCORE_DECIMALS);
    (score * factor).round() / factor
}

/// Aggregate feedback per model and rank models by confidence-weighted score.
///
/// Records without a `data` object, without a non-empty string `model_id`,
/// or whose rating is not `"1"` / `"-1"` are skipped. Models that end up
/// with no usable records do not appear in the output.
pub fn compute_reviews<'a, I>(feedbacks: I) -> Vec<ReviewEntry>
where
    I: IntoIterator<Item = &'a ReviewFeedback>,
{
    let mut counts: BTreeMap<String, ModelCounts> = BTreeMap::new();

    for feedback in feedbacks {
        let Some((model_id, rating)) = usable_rating(feedback) else {
            continue;
        };
        let entry = counts.entry(model_id.to_string()).or_default();
        match rating {
            Rating::Positive => entry.positive += 1,
            Rating::Negative => entry.negative += 1,
            Rating::Unrecognized => {}
        }
    }

    let mut entries: Vec<ReviewEntry> = counts
        .into_iter()
        .map(|(model_id, c)| ReviewEntry {
            model_id,
            score: round_score(confidence_score(c.positive, c.total())),
            total: c.total(),
            positive: c.positive,
            negative: c.negative,
        })
        .collect();

    entries.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.model_id.cmp(&b.model_id),
        other => other,
    });

    entries
}
