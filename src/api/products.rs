use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::{check_range, page_offset, ApiError};
use super::{page_count, ApiState, Message};
use crate::db::models::{NewProduct, ProductRecord, ProductUpdate};

const NOT_FOUND: &str = "Продукт не найден";

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<ProductRecord>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub pages: i64,
}

pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ProductPage>, ApiError> {
    let page = check_range("page", params.page, 1, i64::MAX)?;
    let size = check_range("size", params.size, 1, 100)?;
    let category = params.category.as_deref().filter(|c| !c.is_empty());

    let (products, total) = state
        .db
        .list_products(page_offset(page, size)?, size, category)
        .await?;

    Ok(Json(ProductPage {
        products,
        total,
        page,
        size,
        pages: page_count(total, size),
    }))
}

pub async fn get_one(
    State(state): State<Arc<ApiState>>,
    Path(product_id): Path<String>,
) -> Result<Json<ProductRecord>, ApiError> {
    state
        .db
        .get_product(&product_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))
}

pub async fn create(
    State(state): State<Arc<ApiState>>,
    Json(new): Json<NewProduct>,
) -> Result<Json<ProductRecord>, ApiError> {
    if new.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Название продукта обязательно".into()));
    }
    let product = state.db.create_product(&new).await?;
    tracing::info!("Created product {}", product.id);
    Ok(Json(product))
}

pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path(product_id): Path<String>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<ProductRecord>, ApiError> {
    state
        .db
        .update_product(&product_id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.into()))
}

pub async fn remove(
    State(state): State<Arc<ApiState>>,
    Path(product_id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    if !state.db.delete_product(&product_id).await? {
        return Err(ApiError::NotFound(NOT_FOUND.into()));
    }
    Ok(Json(Message {
        message: "Продукт успешно удален",
    }))
}

pub async fn categories(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db.categories().await?))
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_size")]
    pub limit: i64,
}

pub async fn popular(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<ProductRecord>>, ApiError> {
    let limit = check_range("limit", params.limit, 1, 50)?;
    Ok(Json(state.db.popular_products(limit).await?))
}
