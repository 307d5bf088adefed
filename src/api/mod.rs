//! REST backend over the product catalog and user activity.

pub mod analytics;
pub mod error;
pub mod products;
pub mod search;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::db::Database;

pub use error::ApiError;

pub struct ApiState {
    pub db: Database,
}

impl ApiState {
    pub fn new(db: Database) -> Arc<Self> {
        Arc::new(Self { db })
    }
}

/// Number of pages needed for `total` items.
pub(crate) fn page_count(total: i64, size: i64) -> i64 {
    (total + size - 1) / size
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

pub fn router(state: Arc<ApiState>) -> Router {
    let api = Router::new()
        .route("/products", get(products::list).post(products::create))
        .route("/products/categories/list", get(products::categories))
        .route("/products/popular/list", get(products::popular))
        .route(
            "/products/:product_id",
            get(products::get_one)
                .put(products::update)
                .delete(products::remove),
        )
        .route("/search/query", post(search::query))
        .route("/search/suggestions", get(search::suggestions))
        .route("/search/categories", get(search::categories))
        .route("/search/quick", get(search::quick))
        .route("/users", get(users::list).post(users::create))
        .route("/users/active/list", get(users::active))
        .route("/users/recent/list", get(users::recent))
        .route(
            "/users/:user_id",
            get(users::get_one).put(users::update).delete(users::remove),
        )
        .route("/users/:user_id/stats", get(users::stats))
        .route("/users/:user_id/action", post(users::log_action))
        .route("/analytics/stats", get(analytics::general))
        .route("/analytics/users/stats", get(analytics::users))
        .route("/analytics/products/stats", get(analytics::products))
        .route("/analytics/queries/stats", get(analytics::queries));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

pub async fn root() -> Json<Status> {
    Json(Status {
        message: "Aurora Bot API",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}
