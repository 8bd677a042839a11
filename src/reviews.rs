//! `evalboard reviews`: print the model leaderboard from the local database.

use anyhow::Result;

use evalboard_core::reviews::{compute_reviews, ReviewEntry, ReviewsResponse};
use evalboard_core::store::FeedbackStore;

use crate::config::Config;
use crate::sqlite_store::SqliteFeedbackStore;

/// Compute reviews from every rating row in `store`.
pub async fn load_reviews(store: &dyn FeedbackStore) -> Result<Vec<ReviewEntry>> {
    let feedbacks = store.feedbacks_for_reviews().await?;
    Ok(compute_reviews(&feedbacks))
}

/// CLI entry point. With `json`, prints the same body as `GET /reviews`.
pub async fn run_reviews(config: &Config, json: bool) -> Result<()> {
    let store = SqliteFeedbackStore::open(config).await?;
    let entries = load_reviews(&store).await?;
    store.close().await;

    if json {
        let body = ReviewsResponse { entries };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No rated feedback yet.");
        return Ok(());
    }

    println!(
        "{:>4}  {:<40} {:>7} {:>6} {:>6} {:>6}",
        "RANK", "MODEL", "SCORE", "TOTAL", "UP", "DOWN"
    );
    println!("  {}", "-".repeat(78));
    for (i, e) in entries.iter().enumerate() {
        println!(
            "{:>4}  {:<40} {:>7.4} {:>6} {:>6} {:>6}",
            i + 1,
            e.model_id,
            e.score,
            e.total,
            e.positive,
            e.negative
        );
    }

    Ok(())
}
