use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{check_range, ApiError};
use super::ApiState;
use crate::db::models::ActionCount;

/// Prefix the bot uses when logging user questions.
pub const QUESTION_ACTION: &str = "asked: ";

fn default_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    #[serde(default = "default_days")]
    pub days: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneralStats {
    pub period_days: i64,
    pub total_users: i64,
    pub active_users: usize,
    pub total_products: i64,
    pub categories_count: usize,
    pub popular_categories: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

pub async fn general(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<PeriodParams>,
) -> Result<Json<GeneralStats>, ApiError> {
    let days = check_range("days", params.days, 1, 365)?;
    let categories = state.db.categories().await?;
    Ok(Json(GeneralStats {
        period_days: days,
        total_users: state.db.count_users().await?,
        active_users: state.db.active_users(days * 24).await?.len(),
        total_products: state.db.count_products().await?,
        categories_count: categories.len(),
        popular_categories: categories.into_iter().take(5).collect(),
        generated_at: Utc::now(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveWindows {
    pub last_24h: usize,
    pub last_7d: usize,
    pub last_30d: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserAnalytics {
    pub period_days: i64,
    pub active_users: ActiveWindows,
    pub recent_registrations: usize,
    pub generated_at: DateTime<Utc>,
}

pub async fn users(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<PeriodParams>,
) -> Result<Json<UserAnalytics>, ApiError> {
    let days = check_range("days", params.days, 1, 365)?;
    let db = &state.db;
    Ok(Json(UserAnalytics {
        period_days: days,
        active_users: ActiveWindows {
            last_24h: db.active_users(24).await?.len(),
            last_7d: db.active_users(24 * 7).await?.len(),
            last_30d: db.active_users(24 * 30).await?.len(),
        },
        recent_registrations: db.recent_users(10).await?.len(),
        generated_at: Utc::now(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PopularEntry {
    pub name: String,
    pub rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductAnalytics {
    pub total_products: i64,
    pub categories_count: usize,
    pub category_distribution: BTreeMap<String, i64>,
    pub popular_products: Vec<PopularEntry>,
    pub generated_at: DateTime<Utc>,
}

pub async fn products(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ProductAnalytics>, ApiError> {
    let db = &state.db;
    let categories = db.categories().await?;

    let mut distribution = BTreeMap::new();
    for category in &categories {
        distribution.insert(category.clone(), db.count_by_category(category).await?);
    }

    let popular = db
        .popular_products(10)
        .await?
        .into_iter()
        .map(|p| PopularEntry {
            name: p.name,
            rating: p.rating,
            review_count: p.review_count,
        })
        .collect();

    Ok(Json(ProductAnalytics {
        total_products: db.count_products().await?,
        categories_count: categories.len(),
        category_distribution: distribution,
        popular_products: popular,
        generated_at: Utc::now(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryAnalytics {
    pub period_days: i64,
    pub total_questions: i64,
    pub top_questions: Vec<ActionCount>,
    pub generated_at: DateTime<Utc>,
}

/// Questions the bot logged during the period.
pub async fn queries(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<PeriodParams>,
) -> Result<Json<QueryAnalytics>, ApiError> {
    let days = check_range("days", params.days, 1, 365)?;
    let (total, top) = state.db.action_summary(QUESTION_ACTION, days, 10).await?;
    Ok(Json(QueryAnalytics {
        period_days: days,
        total_questions: total,
        top_questions: top
            .into_iter()
            .map(|a| ActionCount {
                action: a.action.trim_start_matches(QUESTION_ACTION).to_string(),
                count: a.count,
            })
            .collect(),
        generated_at: Utc::now(),
    }))
}
