use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::{check_range, ApiError};
use super::ApiState;
use crate::db::models::{ProductFilter, ProductRecord};

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub products: Vec<ProductRecord>,
    pub total_found: usize,
    /// Seconds spent in the query.
    pub search_time: f64,
    pub search_type: String,
}

/// POST /search/query
pub async fn query(
    State(state): State<Arc<ApiState>>,
    Json(filter): Json<ProductFilter>,
) -> Result<Json<SearchResponse>, ApiError> {
    check_range("limit", filter.limit, 1, 100)?;
    check_range("offset", filter.offset, 0, i64::MAX)?;

    let started = Instant::now();
    let products = state.db.search_products(&filter).await?;
    tracing::debug!(query = %filter.query, found = products.len(), "product search");

    Ok(Json(SearchResponse {
        total_found: products.len(),
        products,
        search_time: started.elapsed().as_secs_f64(),
        search_type: "database_search".to_string(),
    }))
}

fn default_suggestions() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub query: String,
    #[serde(default = "default_suggestions")]
    pub limit: i64,
}

/// Product names starting with the typed prefix.
pub async fn suggestions(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    if params.query.chars().count() < 2 {
        return Err(ApiError::BadRequest("query must be at least 2 characters".into()));
    }
    let limit = check_range("limit", params.limit, 1, 20)?;

    let prefix = params.query.to_lowercase();
    let products = state
        .db
        .search_products(&ProductFilter::text(&params.query, limit))
        .await?;

    let mut seen = HashSet::new();
    let names = products
        .into_iter()
        .map(|p| p.name)
        .filter(|name| name.to_lowercase().starts_with(&prefix))
        .filter(|name| seen.insert(name.clone()))
        .take(limit as usize)
        .collect();
    Ok(Json(names))
}

#[derive(Debug, Deserialize)]
pub struct CategoryParams {
    pub query: String,
}

pub async fn categories(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<CategoryParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    if params.query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    let needle = params.query.to_lowercase();
    let matching = state
        .db
        .categories()
        .await?
        .into_iter()
        .filter(|c| c.to_lowercase().contains(&needle))
        .collect();
    Ok(Json(matching))
}

fn default_quick() -> i64 {
    5
}

#[derive(Debug, Deserialize)]
pub struct QuickParams {
    pub q: String,
    #[serde(default = "default_quick")]
    pub limit: i64,
}

/// Autocomplete lookup.
pub async fn quick(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<QuickParams>,
) -> Result<Json<Vec<ProductRecord>>, ApiError> {
    if params.q.chars().count() < 2 {
        return Err(ApiError::BadRequest("q must be at least 2 characters".into()));
    }
    let limit = check_range("limit", params.limit, 1, 10)?;
    let products = state
        .db
        .search_products(&ProductFilter::text(&params.q, limit))
        .await?;
    Ok(Json(products))
}
