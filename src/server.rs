//! HTTP API.
//!
//! Serves feedback CRUD and the review leaderboard under
//! `/api/v1/evaluations`.
//!
//! # Endpoints
//!
//! | Method | Path | Access | Description |
//! |--------|------|--------|-------------|
//! | `GET` | `/reviews` | admin | Models ranked by confidence-weighted score |
//! | `GET` | `/feedbacks/all` | admin | Every feedback row |
//! | `GET` | `/feedbacks/all/ids` | admin | Ids and timestamps only |
//! | `DELETE` | `/feedbacks/all` | admin | Remove every row |
//! | `GET` | `/feedbacks/all/export` | admin | Every row including snapshots |
//! | `GET` | `/feedbacks/list` | admin | Sorted, paginated listing |
//! | `GET` | `/feedbacks/user` | verified | Caller's own rows |
//! | `DELETE` | `/feedbacks` | verified | Remove caller's own rows |
//! | `POST` | `/feedback` | verified | Create a row |
//! | `GET` | `/feedback/{id}` | verified | Fetch a row |
//! | `POST` | `/feedback/{id}` | verified | Update a row |
//! | `DELETE` | `/feedback/{id}` | verified | Delete a row |
//!
//! `GET /health` sits outside the prefix and needs no token.
//!
//! Non-admin callers only ever see their own rows through the `/feedback/{id}`
//! routes; someone else's id is reported as `not_found`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "feedback not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal` (500). Malformed JSON bodies and query strings are reported as
//! `bad_request`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use evalboard_core::models::{
    FeedbackForm, FeedbackIdResponse, FeedbackListResponse, FeedbackModel, FeedbackResponse,
    FeedbackUserResponse,
};
use evalboard_core::reviews::{compute_reviews, ReviewsResponse};
use evalboard_core::store::{FeedbackOrder, FeedbackPageQuery, FeedbackStore, SortDirection};

use crate::auth::{AuthUser, TokenRegistry};
use crate::config::Config;
use crate::sqlite_store::SqliteFeedbackStore;

/// Path prefix of the evaluations API.
pub const API_PREFIX: &str = "/api/v1/evaluations";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn FeedbackStore>,
    pub tokens: Arc<TokenRegistry>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn FeedbackStore>) -> Self {
        let tokens = TokenRegistry::from_config(&config.auth);
        Self {
            config: Arc::new(config),
            store,
            tokens: Arc::new(tokens),
        }
    }
}

/// Starts the HTTP server against the configured SQLite database.
///
/// Pending migrations are applied before binding, so a fresh database
/// path works without a separate `evalboard init`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteFeedbackStore::open(config).await?);
    run_server_with_store(config, store).await
}

/// Starts the HTTP server with a caller-supplied store.
pub async fn run_server_with_store(
    config: &Config,
    store: Arc<dyn FeedbackStore>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone(), store);

    if state.tokens.is_empty() {
        tracing::warn!("no auth tokens configured; every API call will be rejected");
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("evalboard listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full router (API routes, health check, CORS, request tracing).
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let evaluations = Router::new()
        .route("/reviews", get(handle_reviews))
        .route(
            "/feedbacks/all",
            get(handle_all_feedbacks).delete(handle_delete_all_feedbacks),
        )
        .route("/feedbacks/all/ids", get(handle_all_feedback_ids))
        .route("/feedbacks/all/export", get(handle_export_feedbacks))
        .route("/feedbacks/list", get(handle_feedback_list))
        .route("/feedbacks/user", get(handle_user_feedbacks))
        .route("/feedbacks", delete(handle_delete_user_feedbacks))
        .route("/feedback", post(handle_create_feedback))
        .route(
            "/feedback/{id}",
            get(handle_get_feedback)
                .post(handle_update_feedback)
                .delete(handle_delete_feedback),
        );

    Router::new()
        .nest(API_PREFIX, evaluations)
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Handler error that renders as the JSON error contract.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Store failures surface as a generic 500; the cause goes to the log only.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("store error: {:#}", err);
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: "internal server error".to_string(),
        }
    }
}

/// Body rejections (bad JSON, missing fields, wrong content type) become 400.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

// ============ Auth extractors ============

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<AuthUser, AppError> {
    let token = bearer_token(parts).ok_or_else(|| unauthorized("missing bearer token"))?;
    state
        .tokens
        .authenticate(token)
        .cloned()
        .ok_or_else(|| unauthorized("invalid token"))
}

/// A caller whose role is `user` or `admin`.
pub struct VerifiedUser(pub AuthUser);

impl FromRequestParts<AppState> for VerifiedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = authenticate(parts, state)?;
        if !user.is_verified() {
            return Err(unauthorized("account is pending approval"));
        }
        Ok(VerifiedUser(user))
    }
}

/// A caller whose role is `admin`.
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = authenticate(parts, state)?;
        if !user.is_admin() {
            return Err(unauthorized("admin access required"));
        }
        Ok(AdminUser(user))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Reviews ============

/// Handler for `GET /reviews`: the full leaderboard, unpaginated.
async fn handle_reviews(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ReviewsResponse>, AppError> {
    let feedbacks = state.store.feedbacks_for_reviews().await?;
    let entries = compute_reviews(&feedbacks);
    tracing::debug!(
        feedbacks = feedbacks.len(),
        models = entries.len(),
        "computed reviews"
    );
    Ok(Json(ReviewsResponse { entries }))
}

// ============ Admin feedback collection ============

async fn handle_all_feedbacks(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackResponse>>, AppError> {
    let rows = state.store.list_feedbacks().await?;
    Ok(Json(rows.into_iter().map(FeedbackResponse::from).collect()))
}

async fn handle_all_feedback_ids(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackIdResponse>>, AppError> {
    Ok(Json(state.store.list_feedback_ids().await?))
}

async fn handle_delete_all_feedbacks(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<bool>, AppError> {
    let deleted = state.store.delete_all_feedbacks().await?;
    tracing::info!(user = %admin.id, deleted, "deleted all feedback");
    Ok(Json(deleted))
}

async fn handle_export_feedbacks(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackModel>>, AppError> {
    Ok(Json(state.store.list_feedbacks().await?))
}

/// Query parameters for `GET /feedbacks/list`.
#[derive(Debug, Deserialize)]
struct ListParams {
    order_by: Option<String>,
    direction: Option<String>,
    page: Option<i64>,
}

async fn handle_feedback_list(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<FeedbackListResponse>, AppError> {
    let Query(params) = params?;
    let limit = state.config.feedback.page_size;
    let page = params.page.unwrap_or(1).max(1);
    let skip = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| bad_request("page out of range"))?;

    let query = FeedbackPageQuery {
        order_by: FeedbackOrder::parse(params.order_by.as_deref()),
        direction: SortDirection::parse(params.direction.as_deref()),
        skip,
        limit,
    };
    let page = state.store.feedback_page(&query).await?;

    let items = page
        .items
        .into_iter()
        .map(|row| with_user(&state.tokens, row))
        .collect();

    Ok(Json(FeedbackListResponse {
        items,
        total: page.total,
    }))
}

fn with_user(tokens: &TokenRegistry, row: FeedbackModel) -> FeedbackUserResponse {
    let user = tokens.user_summary(&row.user_id);
    FeedbackUserResponse {
        feedback: row.into(),
        user,
    }
}

// ============ Caller's own feedback ============

async fn handle_user_feedbacks(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackUserResponse>>, AppError> {
    let rows = state.store.list_feedbacks_for_user(&user.id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| with_user(&state.tokens, row))
            .collect(),
    ))
}

async fn handle_delete_user_feedbacks(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
) -> Result<Json<bool>, AppError> {
    Ok(Json(state.store.delete_feedbacks_for_user(&user.id).await?))
}

// ============ Single feedback ============

async fn handle_create_feedback(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
    form: Result<Json<FeedbackForm>, JsonRejection>,
) -> Result<Json<FeedbackModel>, AppError> {
    let Json(form) = form?;
    if form.feedback_type.trim().is_empty() {
        return Err(bad_request("feedback type must not be empty"));
    }
    let feedback = state.store.insert_feedback(&user.id, form).await?;
    tracing::debug!(id = %feedback.id, user = %user.id, "created feedback");
    Ok(Json(feedback))
}

async fn handle_get_feedback(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeedbackModel>, AppError> {
    state
        .store
        .get_feedback(&id, user.scope())
        .await?
        .map(Json)
        .ok_or_else(|| not_found("feedback not found"))
}

async fn handle_update_feedback(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: Result<Json<FeedbackForm>, JsonRejection>,
) -> Result<Json<FeedbackModel>, AppError> {
    let Json(form) = form?;
    state
        .store
        .update_feedback(&id, user.scope(), form)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("feedback not found"))
}

async fn handle_delete_feedback(
    VerifiedUser(user): VerifiedUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<bool>, AppError> {
    if state.store.delete_feedback(&id, user.scope()).await? {
        Ok(Json(true))
    } else {
        Err(not_found("feedback not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("bearer  abc "))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_store_error_maps_to_internal() {
        let err: AppError = anyhow::anyhow!("disk I/O error").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal");
        assert!(!err.message.contains("disk"));
    }
}
