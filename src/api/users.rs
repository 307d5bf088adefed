use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::{check_range, page_offset, ApiError};
use super::{page_count, ApiState, Message};
use crate::db::models::{NewUser, User, UserActivity, UserUpdate};

const NOT_FOUND: &str = "Пользователь не найден";

fn default_page() -> i64 {
    1
}

fn default_ten() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_ten")]
    pub size: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub pages: i64,
}

pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<UserPage>, ApiError> {
    let page = check_range("page", params.page, 1, i64::MAX)?;
    let size = check_range("size", params.size, 1, 100)?;
    let users = state.db.list_users(page_offset(page, size)?, size).await?;
    let total = state.db.count_users().await?;
    Ok(Json(UserPage {
        users,
        total,
        page,
        size,
        pages: page_count(total, size),
    }))
}

pub async fn get_one(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    state
        .db
        .get_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))
}

pub async fn create(
    State(state): State<Arc<ApiState>>,
    Json(new): Json<NewUser>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.db.create_user(&new).await?))
}

pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    state
        .db
        .update_user(user_id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))
}

pub async fn remove(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Message>, ApiError> {
    if !state.db.delete_user(user_id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.into()));
    }
    Ok(Json(Message {
        message: "Пользователь успешно удален",
    }))
}

fn default_days() -> i64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    #[serde(default = "default_days")]
    pub days: i64,
}

pub async fn stats(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<StatsParams>,
) -> Result<Json<UserActivity>, ApiError> {
    let days = check_range("days", params.days, 1, 365)?;
    if state.db.get_user(user_id).await?.is_none() {
        return Err(ApiError::NotFound(NOT_FOUND.into()));
    }
    Ok(Json(state.db.user_stats(user_id, days).await?))
}

#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub action: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

pub async fn log_action(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
    Json(body): Json<ActionBody>,
) -> Result<Json<Message>, ApiError> {
    if state.db.get_user(user_id).await?.is_none() {
        return Err(ApiError::NotFound(NOT_FOUND.into()));
    }
    state
        .db
        .log_user_action(user_id, &body.action, body.metadata)
        .await?;
    Ok(Json(Message {
        message: "Действие залогировано",
    }))
}

fn default_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
pub struct ActiveParams {
    #[serde(default = "default_hours")]
    pub hours: i64,
}

pub async fn active(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ActiveParams>,
) -> Result<Json<Vec<User>>, ApiError> {
    let hours = check_range("hours", params.hours, 1, 168)?;
    Ok(Json(state.db.active_users(hours).await?))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    #[serde(default = "default_ten")]
    pub limit: i64,
}

pub async fn recent(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<User>>, ApiError> {
    let limit = check_range("limit", params.limit, 1, 50)?;
    Ok(Json(state.db.recent_users(limit).await?))
}
